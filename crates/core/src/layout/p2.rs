//! P2 (Eclipse update site) layout.
//!
//! Installable units live in `plugins/<id>_<version>.jar`, `features/<id>_<version>.jar` and
//! `binary/<id>_<version>`, optionally below a site prefix. The site indexes (`artifacts.*`,
//! `content.*`, `compositeArtifacts.*`, `compositeContent.*`, `p2.index`) are metadata.

use crate::constants::P2_LAYOUT;
use crate::{StorageError, StorageResult};
use std::fmt;

const INDEX_STEMS: [&str; 4] = [
    "artifacts",
    "content",
    "compositeArtifacts",
    "compositeContent",
];
const INDEX_EXTENSIONS: [&str; 3] = ["jar", "xml", "xml.xz"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum P2Classifier {
    Bundle,
    Feature,
    Binary,
}

impl P2Classifier {
    /// P2 artifact classifier as written in `artifacts.xml`.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bundle => "osgi.bundle",
            Self::Feature => "org.eclipse.update.feature",
            Self::Binary => "binary",
        }
    }

    pub const fn directory(self) -> &'static str {
        match self {
            Self::Bundle => "plugins",
            Self::Feature => "features",
            Self::Binary => "binary",
        }
    }

    fn from_directory(dir: &str) -> Option<Self> {
        match dir {
            "plugins" => Some(Self::Bundle),
            "features" => Some(Self::Feature),
            "binary" => Some(Self::Binary),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct P2Coordinates {
    /// Site directory the unit lives under; empty for a site at the repository root.
    pub site: String,
    pub classifier: P2Classifier,
    pub id: String,
    pub version: String,
    pub extension: Option<String>,
}

impl P2Coordinates {
    pub fn to_path(&self) -> String {
        let mut path = String::new();
        if !self.site.is_empty() {
            path.push_str(&self.site);
            path.push('/');
        }
        path.push_str(self.classifier.directory());
        path.push('/');
        path.push_str(&self.id);
        path.push('_');
        path.push_str(&self.version);
        if let Some(extension) = &self.extension {
            path.push('.');
            path.push_str(extension);
        }
        path
    }
}

impl fmt::Display for P2Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.classifier.as_str(), self.id, self.version)
    }
}

fn malformed(path: &str, reason: impl Into<String>) -> StorageError {
    StorageError::MalformedCoordinates {
        layout: P2_LAYOUT,
        path: path.to_owned(),
        reason: reason.into(),
    }
}

/// Whether a file name is a P2 site index.
pub fn is_index_file(file_name: &str) -> bool {
    if file_name == "p2.index" {
        return true;
    }
    INDEX_STEMS.iter().any(|stem| {
        file_name
            .strip_prefix(stem)
            .and_then(|rest| rest.strip_prefix('.'))
            .is_some_and(|ext| INDEX_EXTENSIONS.contains(&ext))
    })
}

/// Parses `[site/]plugins|features|binary/<id>_<version>[.jar]`.
///
/// # Errors
///
/// Returns [`StorageError::MalformedCoordinates`] if the unit directory is unknown or the file
/// name has no `_` separating id and version.
pub fn parse_coordinates(path: &str) -> StorageResult<P2Coordinates> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.len() < 2 {
        return Err(malformed(path, "expected <plugins|features|binary>/<id>_<version>"));
    }

    let n = segments.len();
    let file_name = segments[n - 1];
    let classifier = P2Classifier::from_directory(segments[n - 2])
        .ok_or_else(|| malformed(path, format!("unknown unit directory '{}'", segments[n - 2])))?;

    let (stem, extension) = match classifier {
        P2Classifier::Binary => (file_name, None),
        P2Classifier::Bundle | P2Classifier::Feature => match file_name.strip_suffix(".jar") {
            Some(stem) => (stem, Some("jar".to_owned())),
            None => return Err(malformed(path, "bundles and features must be .jar files")),
        },
    };

    let (id, version) = stem
        .rsplit_once('_')
        .filter(|(id, version)| !id.is_empty() && !version.is_empty())
        .ok_or_else(|| malformed(path, "expected <id>_<version>"))?;

    Ok(P2Coordinates {
        site: segments[..n - 2].join("/"),
        classifier,
        id: id.to_owned(),
        version: version.to_owned(),
        extension,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bundle_under_site() {
        let c = parse_coordinates("updates/plugins/org.acme.core_1.2.0.v20240101.jar").unwrap();
        assert_eq!(c.site, "updates");
        assert_eq!(c.classifier, P2Classifier::Bundle);
        assert_eq!(c.id, "org.acme.core");
        assert_eq!(c.version, "1.2.0.v20240101");
        assert_eq!(c.to_path(), "updates/plugins/org.acme.core_1.2.0.v20240101.jar");
    }

    #[test]
    fn test_parse_feature_and_binary() {
        let c = parse_coordinates("features/org.acme.feature_2.0.0.jar").unwrap();
        assert_eq!(c.classifier, P2Classifier::Feature);
        assert_eq!(c.site, "");

        let c = parse_coordinates("binary/org.acme.launcher_2.0.0").unwrap();
        assert_eq!(c.classifier, P2Classifier::Binary);
        assert_eq!(c.extension, None);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(parse_coordinates("plugins/noversion.jar").is_err());
        assert!(parse_coordinates("plugins/a_1.0.zip").is_err());
        assert!(parse_coordinates("other/a_1.0.jar").is_err());
        assert!(parse_coordinates("a_1.0.jar").is_err());
    }

    #[test]
    fn test_index_files() {
        assert!(is_index_file("artifacts.jar"));
        assert!(is_index_file("content.xml.xz"));
        assert!(is_index_file("compositeContent.xml"));
        assert!(is_index_file("p2.index"));
        assert!(!is_index_file("artifacts.jar.md5"));
        assert!(!is_index_file("contents.xml"));
    }
}
