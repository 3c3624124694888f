//! Hierarchical NuGet layout: `<id>/<version>/<id>.<version>.nupkg`, with the package
//! manifest at `<id>/<version>/<id>.nuspec` and a base64 SHA-512 side-file next to the
//! package.

use crate::constants::NUGET_LAYOUT;
use crate::{StorageError, StorageResult};
use std::fmt;

pub const PACKAGE_EXTENSION: &str = "nupkg";
pub const MANIFEST_EXTENSION: &str = "nuspec";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NugetCoordinates {
    pub id: String,
    pub version: String,
    pub extension: String,
}

impl NugetCoordinates {
    pub fn new(id: impl Into<String>, version: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            extension: extension.into(),
        }
    }

    pub fn to_path(&self) -> String {
        if self.extension == MANIFEST_EXTENSION {
            return format!("{}/{}/{}.{}", self.id, self.version, self.id, MANIFEST_EXTENSION);
        }
        format!(
            "{}/{}/{}.{}.{}",
            self.id, self.version, self.id, self.version, self.extension
        )
    }

    /// Path of the manifest that belongs to this package.
    pub fn manifest_path(&self) -> String {
        format!("{}/{}/{}.{}", self.id, self.version, self.id, MANIFEST_EXTENSION)
    }
}

impl fmt::Display for NugetCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}@{}", self.id, self.version, self.extension)
    }
}

fn malformed(path: &str, reason: impl Into<String>) -> StorageError {
    StorageError::MalformedCoordinates {
        layout: NUGET_LAYOUT,
        path: path.to_owned(),
        reason: reason.into(),
    }
}

/// Strips `prefix` from `s` ignoring ASCII case. NuGet ids and versions are case-insensitive.
fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}

/// Parses `<id>/<version>/<file>`.
///
/// # Errors
///
/// Returns [`StorageError::MalformedCoordinates`] unless the path has exactly three segments
/// and the file is `<id>.nuspec` or `<id>.<version>.<extension>`.
pub fn parse_coordinates(path: &str) -> StorageResult<NugetCoordinates> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let [id, version, file_name] = segments.as_slice() else {
        return Err(malformed(path, "expected <id>/<version>/<file>"));
    };

    let Some(rest) = strip_prefix_ignore_case(file_name, id).and_then(|r| r.strip_prefix('.'))
    else {
        return Err(malformed(path, format!("file name does not start with '{id}.'")));
    };

    if rest.eq_ignore_ascii_case(MANIFEST_EXTENSION) {
        return Ok(NugetCoordinates::new(*id, *version, MANIFEST_EXTENSION));
    }

    let extension = strip_prefix_ignore_case(rest, version)
        .and_then(|r| r.strip_prefix('.'))
        .filter(|ext| !ext.is_empty())
        .ok_or_else(|| malformed(path, format!("file name does not match version '{version}'")))?;

    Ok(NugetCoordinates::new(*id, *version, extension.to_ascii_lowercase()))
}

pub fn is_manifest(file_name: &str) -> bool {
    file_name
        .rsplit_once('.')
        .is_some_and(|(_, ext)| ext.eq_ignore_ascii_case(MANIFEST_EXTENSION))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_package() {
        let c = parse_coordinates("Newtonsoft.Json/13.0.1/newtonsoft.json.13.0.1.nupkg").unwrap();
        assert_eq!(c.id, "Newtonsoft.Json");
        assert_eq!(c.version, "13.0.1");
        assert_eq!(c.extension, "nupkg");
        assert_eq!(c.manifest_path(), "Newtonsoft.Json/13.0.1/Newtonsoft.Json.nuspec");
    }

    #[test]
    fn test_parse_manifest_and_checksum() {
        let c = parse_coordinates("foo/1.0.0/foo.nuspec").unwrap();
        assert_eq!(c.extension, "nuspec");
        assert_eq!(c.to_path(), "foo/1.0.0/foo.nuspec");

        let c = parse_coordinates("foo/1.0.0/foo.1.0.0.nupkg.sha512").unwrap();
        assert_eq!(c.extension, "nupkg.sha512");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for path in [
            "foo/foo.1.0.0.nupkg",
            "a/foo/1.0.0/foo.1.0.0.nupkg",
            "foo/1.0.0/bar.1.0.0.nupkg",
            "foo/1.0.0/foo.2.0.0.nupkg",
            "foo/1.0.0/foo.1.0.0",
        ] {
            assert!(parse_coordinates(path).is_err(), "{path}");
        }
    }
}
