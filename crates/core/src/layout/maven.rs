//! Maven 2 repository layout.
//!
//! `group/path/artifactId/version/artifactId-version[-classifier].extension`, where a snapshot
//! version directory (`1.0-SNAPSHOT`) may hold timestamped files
//! (`foo-1.0-20240101.120000-3.jar`).

use crate::constants::{MAVEN2_LAYOUT, MAVEN_METADATA_FILE, SNAPSHOT_SUFFIX};
use crate::metadata::SnapshotBuild;
use crate::{StorageError, StorageResult};
use std::fmt;

/// Extensions that contain a dot and must not be split into classifier and extension.
const COMPOUND_EXTENSIONS: [&str; 4] = ["tar.gz", "tar.bz2", "tar.xz", "tar.zst"];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MavenCoordinates {
    pub group_id: String,
    pub artifact_id: String,
    /// Version directory, e.g. `1.0` or `1.0-SNAPSHOT`.
    pub version: String,
    /// Version as written in the file name; differs from `version` for timestamped snapshots.
    pub file_version: String,
    pub classifier: Option<String>,
    pub extension: String,
}

impl MavenCoordinates {
    pub fn new(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        version: impl Into<String>,
        classifier: Option<String>,
        extension: impl Into<String>,
    ) -> Self {
        let version = version.into();
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            file_version: version.clone(),
            version,
            classifier,
            extension: extension.into(),
        }
    }

    pub fn is_snapshot(&self) -> bool {
        is_snapshot_version(&self.version)
    }

    /// The timestamped build this file belongs to, if any.
    pub fn snapshot_build(&self) -> Option<SnapshotBuild> {
        if self.file_version == self.version {
            return None;
        }
        SnapshotBuild::parse(&self.file_version)
    }

    pub fn group_path(&self) -> String {
        self.group_id.replace('.', "/")
    }

    /// Directory holding the artifact-level metadata document.
    pub fn artifact_base_path(&self) -> String {
        format!("{}/{}", self.group_path(), self.artifact_id)
    }

    pub fn version_path(&self) -> String {
        format!("{}/{}", self.artifact_base_path(), self.version)
    }

    pub fn file_name(&self) -> String {
        match &self.classifier {
            Some(classifier) => format!(
                "{}-{}-{}.{}",
                self.artifact_id, self.file_version, classifier, self.extension
            ),
            None => format!("{}-{}.{}", self.artifact_id, self.file_version, self.extension),
        }
    }

    pub fn to_path(&self) -> String {
        format!("{}/{}", self.version_path(), self.file_name())
    }
}

impl fmt::Display for MavenCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group_id, self.artifact_id, self.file_version)?;
        if let Some(classifier) = &self.classifier {
            write!(f, ":{classifier}")?;
        }
        write!(f, "@{}", self.extension)
    }
}

/// Whether `version` is `<base>-SNAPSHOT` with a non-empty base.
pub fn is_snapshot_version(version: &str) -> bool {
    version
        .strip_suffix(SNAPSHOT_SUFFIX)
        .and_then(|base| base.strip_suffix('-'))
        .is_some_and(|base| !base.is_empty())
}

/// Whether a file name is a Maven metadata document (`maven-metadata.xml`,
/// `maven-metadata-<repo>.xml`).
pub fn is_metadata_file(file_name: &str) -> bool {
    file_name == MAVEN_METADATA_FILE
        || (file_name.starts_with("maven-metadata-") && file_name.ends_with(".xml"))
}

fn malformed(path: &str, reason: impl Into<String>) -> StorageError {
    StorageError::MalformedCoordinates {
        layout: MAVEN2_LAYOUT,
        path: path.to_owned(),
        reason: reason.into(),
    }
}

/// Splits the tail after the version into classifier and extension.
fn split_classifier(path: &str, tail: &str) -> StorageResult<(Option<String>, String)> {
    if let Some(extension) = tail.strip_prefix('.') {
        if extension.is_empty() {
            return Err(malformed(path, "empty extension"));
        }
        return Ok((None, extension.to_owned()));
    }

    let Some(rest) = tail.strip_prefix('-') else {
        return Err(malformed(path, "file name does not match the version directory"));
    };

    let compound = COMPOUND_EXTENSIONS
        .iter()
        .find(|ext| rest.len() > ext.len() + 1 && rest.ends_with(&format!(".{ext}")));
    let (classifier, extension) = match compound {
        Some(ext) => (&rest[..rest.len() - ext.len() - 1], (*ext).to_owned()),
        None => match rest.find('.') {
            Some(idx) => (&rest[..idx], rest[idx + 1..].to_owned()),
            None => return Err(malformed(path, "missing extension")),
        },
    };

    if classifier.is_empty() || extension.is_empty() {
        return Err(malformed(path, "empty classifier or extension"));
    }
    Ok((Some(classifier.to_owned()), extension))
}

/// Parses a repository-relative path into Maven coordinates.
///
/// # Errors
///
/// Returns [`StorageError::MalformedCoordinates`] if the path has fewer than four segments or
/// the file name does not start with `artifactId-version`.
pub fn parse_coordinates(path: &str) -> StorageResult<MavenCoordinates> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.len() < 4 {
        return Err(malformed(
            path,
            "expected group/artifactId/version/file with at least one group segment",
        ));
    }

    let n = segments.len();
    let file_name = segments[n - 1];
    let version = segments[n - 2];
    let artifact_id = segments[n - 3];
    let group_id = segments[..n - 3].join(".");

    let Some(after_artifact) = file_name
        .strip_prefix(artifact_id)
        .and_then(|rest| rest.strip_prefix('-'))
    else {
        return Err(malformed(
            path,
            format!("file name does not start with '{artifact_id}-'"),
        ));
    };

    // Plain version first, then a timestamped snapshot of the version directory.
    if let Some(tail) = after_artifact.strip_prefix(version) {
        if let Ok((classifier, extension)) = split_classifier(path, tail) {
            return Ok(MavenCoordinates {
                group_id,
                artifact_id: artifact_id.to_owned(),
                version: version.to_owned(),
                file_version: version.to_owned(),
                classifier,
                extension,
            });
        }
    }

    let snapshot_base = version
        .strip_suffix(SNAPSHOT_SUFFIX)
        .filter(|_| is_snapshot_version(version));
    if let Some(base) = snapshot_base {
        if let Some(stamped) = after_artifact.strip_prefix(base) {
            // stamped: YYYYMMDD.HHMMSS-N[-classifier].ext
            let build_end = stamped
                .get(16..)
                .and_then(|rest| rest.find(['.', '-']).map(|idx| idx + 16));
            if let Some(end) = build_end {
                let file_version = format!("{base}{}", &stamped[..end]);
                if SnapshotBuild::parse(&file_version).is_some() {
                    let (classifier, extension) = split_classifier(path, &stamped[end..])?;
                    return Ok(MavenCoordinates {
                        group_id,
                        artifact_id: artifact_id.to_owned(),
                        version: version.to_owned(),
                        file_version,
                        classifier,
                        extension,
                    });
                }
            }
        }
    }

    Err(malformed(
        path,
        format!("file name does not match version '{version}'"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_release_artifact() {
        let c = parse_coordinates("com/example/foo/1.0/foo-1.0.jar").unwrap();
        assert_eq!(c.group_id, "com.example");
        assert_eq!(c.artifact_id, "foo");
        assert_eq!(c.version, "1.0");
        assert_eq!(c.classifier, None);
        assert_eq!(c.extension, "jar");
        assert_eq!(c.artifact_base_path(), "com/example/foo");
        assert_eq!(c.to_path(), "com/example/foo/1.0/foo-1.0.jar");
        assert!(!c.is_snapshot());
    }

    #[test]
    fn test_parse_classifier_and_compound_extension() {
        let c = parse_coordinates("org/acme/tool/2.1/tool-2.1-sources.jar").unwrap();
        assert_eq!(c.classifier.as_deref(), Some("sources"));
        assert_eq!(c.extension, "jar");

        let c = parse_coordinates("org/acme/tool/2.1/tool-2.1-bin.tar.gz").unwrap();
        assert_eq!(c.classifier.as_deref(), Some("bin"));
        assert_eq!(c.extension, "tar.gz");

        let c = parse_coordinates("org/acme/tool/2.1/tool-2.1.jar.sha1").unwrap();
        assert_eq!(c.extension, "jar.sha1");
    }

    #[test]
    fn test_parse_timestamped_snapshot() {
        let c = parse_coordinates(
            "com/example/foo/1.0-SNAPSHOT/foo-1.0-20240102.030405-7-tests.jar",
        )
        .unwrap();
        assert_eq!(c.version, "1.0-SNAPSHOT");
        assert_eq!(c.file_version, "1.0-20240102.030405-7");
        assert_eq!(c.classifier.as_deref(), Some("tests"));
        assert_eq!(c.extension, "jar");
        assert_eq!(c.snapshot_build().unwrap().build_number, 7);
        assert_eq!(
            c.to_path(),
            "com/example/foo/1.0-SNAPSHOT/foo-1.0-20240102.030405-7-tests.jar"
        );

        let plain = parse_coordinates("com/example/foo/1.0-SNAPSHOT/foo-1.0-SNAPSHOT.pom").unwrap();
        assert_eq!(plain.file_version, "1.0-SNAPSHOT");
        assert!(plain.snapshot_build().is_none());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for path in [
            "foo/1.0/foo-1.0.jar",
            "com/example/foo/1.0/bar-1.0.jar",
            "com/example/foo/1.0/foo-2.0.jar",
            "com/example/foo/1.0/foo-1.0",
            "com/example/foo/1.0-SNAPSHOT/foo-1.0-2024.jar",
        ] {
            assert!(
                matches!(
                    parse_coordinates(path),
                    Err(StorageError::MalformedCoordinates { .. })
                ),
                "{path}"
            );
        }
    }

    #[test]
    fn test_snapshot_version_needs_dash_and_base() {
        assert!(is_snapshot_version("1.0-SNAPSHOT"));
        assert!(is_snapshot_version("1.0-rc-1-SNAPSHOT"));
        assert!(!is_snapshot_version("1.0SNAPSHOT"));
        assert!(!is_snapshot_version("-SNAPSHOT"));
        assert!(!is_snapshot_version("SNAPSHOT"));
        assert!(!is_snapshot_version("1.0"));

        let c = parse_coordinates("com/example/foo/1.0SNAPSHOT/foo-1.0SNAPSHOT.jar").unwrap();
        assert!(!c.is_snapshot());
    }

    #[test]
    fn test_metadata_file_names() {
        assert!(is_metadata_file("maven-metadata.xml"));
        assert!(is_metadata_file("maven-metadata-central.xml"));
        assert!(!is_metadata_file("maven-metadata.xml.sha1"));
        assert!(!is_metadata_file("foo-1.0.pom"));
    }
}
