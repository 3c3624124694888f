//! Storage: a named collection of repositories.

use crate::{Repository, RepositoryId, StorageId, TypesError, TypesResult};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A named collection of [`Repository`] values keyed by repository id.
#[derive(Debug, Clone)]
pub struct Storage {
    id: StorageId,
    basedir: PathBuf,
    repositories: BTreeMap<RepositoryId, Arc<Repository>>,
}

impl Storage {
    pub fn new(id: StorageId, basedir: impl Into<PathBuf>) -> Self {
        Self {
            id,
            basedir: basedir.into(),
            repositories: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &StorageId {
        &self.id
    }

    pub fn basedir(&self) -> &Path {
        &self.basedir
    }

    /// Adds a repository and returns the shared handle the core will use.
    ///
    /// # Errors
    ///
    /// Returns `TypesError` if:
    /// - the repository was built for another storage ([`TypesError::StorageMismatch`])
    /// - a repository with the same id already exists ([`TypesError::DuplicateRepository`])
    pub fn add_repository(&mut self, repository: Repository) -> TypesResult<Arc<Repository>> {
        if repository.storage_id() != &self.id {
            return Err(TypesError::StorageMismatch {
                repository: repository.id().to_string(),
                expected: repository.storage_id().to_string(),
                actual: self.id.to_string(),
            });
        }

        if self.repositories.contains_key(repository.id()) {
            return Err(TypesError::DuplicateRepository {
                storage: self.id.to_string(),
                repository: repository.id().to_string(),
            });
        }

        let repository = Arc::new(repository);
        self.repositories
            .insert(repository.id().clone(), Arc::clone(&repository));
        Ok(repository)
    }

    pub fn repository(&self, id: &str) -> Option<&Arc<Repository>> {
        self.repositories
            .iter()
            .find(|(key, _)| key.as_str() == id)
            .map(|(_, repo)| repo)
    }

    pub fn remove_repository(&mut self, id: &RepositoryId) -> Option<Arc<Repository>> {
        self.repositories.remove(id)
    }

    pub fn repositories(&self) -> impl Iterator<Item = &Arc<Repository>> {
        self.repositories.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo(storage: &str, id: &str) -> Repository {
        Repository::new(
            StorageId::new(storage).unwrap(),
            RepositoryId::new(id).unwrap(),
            format!("/srv/{storage}/{id}"),
            "Maven 2",
        )
        .unwrap()
    }

    #[test]
    fn test_add_and_lookup_repository() {
        let mut storage = Storage::new(StorageId::new("storage0").unwrap(), "/srv/storage0");
        storage.add_repository(repo("storage0", "releases")).unwrap();
        storage.add_repository(repo("storage0", "snapshots")).unwrap();

        assert!(storage.repository("releases").is_some());
        assert!(storage.repository("missing").is_none());
        let ids: Vec<&str> = storage.repositories().map(|r| r.id().as_str()).collect();
        assert_eq!(ids, vec!["releases", "snapshots"]);
    }

    #[test]
    fn test_duplicate_repository_rejected() {
        let mut storage = Storage::new(StorageId::new("storage0").unwrap(), "/srv/storage0");
        storage.add_repository(repo("storage0", "releases")).unwrap();
        let result = storage.add_repository(repo("storage0", "releases"));
        assert!(matches!(
            result,
            Err(TypesError::DuplicateRepository { .. })
        ));
    }

    #[test]
    fn test_foreign_repository_rejected() {
        let mut storage = Storage::new(StorageId::new("storage0").unwrap(), "/srv/storage0");
        let result = storage.add_repository(repo("storage1", "releases"));
        assert!(matches!(result, Err(TypesError::StorageMismatch { .. })));
    }

    #[test]
    fn test_remove_repository() {
        let mut storage = Storage::new(StorageId::new("storage0").unwrap(), "/srv/storage0");
        storage.add_repository(repo("storage0", "releases")).unwrap();
        let removed = storage.remove_repository(&RepositoryId::new("releases").unwrap());
        assert!(removed.is_some());
        assert!(storage.repository("releases").is_none());
    }
}
