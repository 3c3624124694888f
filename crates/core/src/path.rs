//! Repository-relative paths.
//!
//! A [`RepositoryPath`] is an owned value: the repository it belongs to, a normalized relative
//! path (`/`-separated, no leading slash, empty for the repository root) and a lazily filled
//! coordinates cache. Conversion to a physical location always goes through the repository
//! basedir.

use crate::layout::ArtifactCoordinates;
use crate::{StorageError, StorageResult};
use depot_types::{Repository, RepositoryId, StorageId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

#[derive(Clone)]
pub struct RepositoryPath {
    repository: Arc<Repository>,
    relative: String,
    coordinates: OnceLock<ArtifactCoordinates>,
}

/// Normalizes a relative path.
///
/// Backslashes are treated as separators, empty and `.` segments are dropped.
fn normalize(relative: &str) -> StorageResult<String> {
    let mut segments = Vec::new();
    for segment in relative.split(['/', '\\']) {
        match segment {
            "" | "." => continue,
            ".." => {
                return Err(StorageError::InvalidPath {
                    path: relative.to_owned(),
                    reason: "parent traversal is not allowed".into(),
                })
            }
            s if s.contains('\0') => {
                return Err(StorageError::InvalidPath {
                    path: relative.to_owned(),
                    reason: "NUL byte in path".into(),
                })
            }
            s => segments.push(s),
        }
    }
    Ok(segments.join("/"))
}

impl RepositoryPath {
    /// Resolves `relative` against `repository`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidPath`] if the path tries to leave the repository root.
    pub fn new(repository: Arc<Repository>, relative: &str) -> StorageResult<Self> {
        Ok(Self {
            repository,
            relative: normalize(relative)?,
            coordinates: OnceLock::new(),
        })
    }

    /// The repository root.
    pub fn root(repository: Arc<Repository>) -> Self {
        Self {
            repository,
            relative: String::new(),
            coordinates: OnceLock::new(),
        }
    }

    pub fn repository(&self) -> &Arc<Repository> {
        &self.repository
    }

    pub fn storage_id(&self) -> &StorageId {
        self.repository.storage_id()
    }

    pub fn repository_id(&self) -> &RepositoryId {
        self.repository.id()
    }

    pub fn relative(&self) -> &str {
        &self.relative
    }

    pub fn into_relative(self) -> String {
        self.relative
    }

    pub fn is_root(&self) -> bool {
        self.relative.is_empty()
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.relative.split('/').filter(|s| !s.is_empty())
    }

    pub fn file_name(&self) -> Option<&str> {
        if self.is_root() {
            return None;
        }
        self.relative.rsplit('/').next()
    }

    /// Parent path, `None` for the repository root.
    pub fn parent(&self) -> Option<RepositoryPath> {
        if self.is_root() {
            return None;
        }
        let parent = match self.relative.rfind('/') {
            Some(idx) => self.relative[..idx].to_owned(),
            None => String::new(),
        };
        Some(Self {
            repository: Arc::clone(&self.repository),
            relative: parent,
            coordinates: OnceLock::new(),
        })
    }

    /// Appends `child` (which may contain several segments).
    pub fn resolve(&self, child: &str) -> StorageResult<RepositoryPath> {
        let child = normalize(child)?;
        let relative = match (self.is_root(), child.is_empty()) {
            (_, true) => self.relative.clone(),
            (true, false) => child,
            (false, false) => format!("{}/{}", self.relative, child),
        };
        Ok(Self {
            repository: Arc::clone(&self.repository),
            relative,
            coordinates: OnceLock::new(),
        })
    }

    /// Replaces the last segment with `name`.
    pub fn resolve_sibling(&self, name: &str) -> StorageResult<RepositoryPath> {
        match self.parent() {
            Some(parent) => parent.resolve(name),
            None => Err(StorageError::InvalidPath {
                path: name.to_owned(),
                reason: "the repository root has no siblings".into(),
            }),
        }
    }

    /// Whether `self` equals `other` or lies below it.
    pub fn starts_with(&self, other: &RepositoryPath) -> bool {
        if self.repository.qualified_id() != other.repository.qualified_id() {
            return false;
        }
        other.is_root()
            || self.relative == other.relative
            || self
                .relative
                .strip_prefix(&other.relative)
                .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Physical location below the repository basedir.
    pub fn physical_path(&self) -> PathBuf {
        let mut path = self.repository.basedir().to_path_buf();
        for segment in self.segments() {
            path.push(segment);
        }
        path
    }

    /// Canonical key for the path lock registry: `storage/repository/relative`.
    pub fn lock_key(&self) -> String {
        format!(
            "{}/{}/{}",
            self.repository.storage_id(),
            self.repository.id(),
            self.relative
        )
    }

    /// Returns the cached coordinates, computing them with `parse` on first use.
    ///
    /// A failed parse is not cached.
    pub fn coordinates_with<F>(&self, parse: F) -> StorageResult<&ArtifactCoordinates>
    where
        F: FnOnce(&str) -> StorageResult<ArtifactCoordinates>,
    {
        if let Some(coordinates) = self.coordinates.get() {
            return Ok(coordinates);
        }
        let parsed = parse(&self.relative)?;
        Ok(self.coordinates.get_or_init(|| parsed))
    }

    /// Attaches this path as context to a file-layer error.
    pub fn error(&self, error: depot_files::FilesError) -> StorageError {
        StorageError::from_files(&self.repository.qualified_id(), &self.relative, error)
    }

    pub fn not_found(&self) -> StorageError {
        StorageError::NotFound {
            repository: self.repository.qualified_id(),
            path: self.relative.clone(),
        }
    }
}

impl PartialEq for RepositoryPath {
    fn eq(&self, other: &Self) -> bool {
        self.repository.storage_id() == other.repository.storage_id()
            && self.repository.id() == other.repository.id()
            && self.relative == other.relative
    }
}

impl Eq for RepositoryPath {}

impl Hash for RepositoryPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.repository.storage_id().hash(state);
        self.repository.id().hash(state);
        self.relative.hash(state);
    }
}

impl fmt::Display for RepositoryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.repository.qualified_id(), self.relative)
    }
}

impl fmt::Debug for RepositoryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryPath")
            .field("repository", &self.repository.qualified_id())
            .field("relative", &self.relative)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MAVEN2_LAYOUT;
    use crate::layout::RawCoordinates;
    use std::collections::HashSet;

    fn repository(id: &str) -> Arc<Repository> {
        Arc::new(
            Repository::new(
                StorageId::new("storage0").unwrap(),
                RepositoryId::new(id).unwrap(),
                "/srv/depot/storage0/releases",
                MAVEN2_LAYOUT,
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_new_normalizes_separators() {
        let path = RepositoryPath::new(repository("releases"), "/com\\example//./foo/").unwrap();
        assert_eq!(path.relative(), "com/example/foo");
        assert_eq!(path.file_name(), Some("foo"));
        assert_eq!(
            path.physical_path(),
            PathBuf::from("/srv/depot/storage0/releases/com/example/foo")
        );
    }

    #[test]
    fn test_new_rejects_traversal() {
        let result = RepositoryPath::new(repository("releases"), "com/../../etc/passwd");
        assert!(matches!(result, Err(StorageError::InvalidPath { .. })));
    }

    #[test]
    fn test_parent_resolve_and_sibling() {
        let root = RepositoryPath::root(repository("releases"));
        assert!(root.is_root());
        assert!(root.parent().is_none());

        let jar = root.resolve("com/example/foo/1.0/foo-1.0.jar").unwrap();
        let pom = jar.resolve_sibling("foo-1.0.pom").unwrap();
        assert_eq!(pom.relative(), "com/example/foo/1.0/foo-1.0.pom");

        let version = jar.parent().unwrap();
        assert_eq!(version.relative(), "com/example/foo/1.0");
        assert!(jar.starts_with(&version));
        assert!(!version.starts_with(&jar));

        let other = root.resolve("com/example/foo/1.0x").unwrap();
        assert!(!other.starts_with(&version));

        assert_eq!(root.resolve("com").unwrap().parent().unwrap(), root);
    }

    #[test]
    fn test_equality_ignores_cache_and_uses_repository() {
        let a = RepositoryPath::new(repository("releases"), "a/b").unwrap();
        let b = RepositoryPath::new(repository("releases"), "a//b").unwrap();
        let c = RepositoryPath::new(repository("snapshots"), "a/b").unwrap();

        a.coordinates_with(|p| {
            Ok(ArtifactCoordinates::Raw(RawCoordinates {
                path: p.to_owned(),
            }))
        })
        .unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<RepositoryPath> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_coordinates_are_cached() {
        let path = RepositoryPath::new(repository("releases"), "a/b").unwrap();
        let mut calls = 0;
        for _ in 0..3 {
            path.coordinates_with(|p| {
                calls += 1;
                Ok(ArtifactCoordinates::Raw(RawCoordinates {
                    path: p.to_owned(),
                }))
            })
            .unwrap();
        }
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_lock_key() {
        let path = RepositoryPath::new(repository("releases"), "com/example/foo").unwrap();
        assert_eq!(path.lock_key(), "storage0/releases/com/example/foo");
    }
}
