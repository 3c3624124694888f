//! Artifact catalog collaborator.
//!
//! The catalog is the database-backed index of stored artifacts. The core never writes catalog
//! entries on the write path; it only looks records up and removes them when an artifact is
//! deleted.

use crate::{StorageError, StorageResult};
use depot_types::{RepositoryId, StorageId};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;

/// A catalog entry for one stored artifact.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ArtifactRecord {
    pub storage_id: StorageId,
    pub repository_id: RepositoryId,
    pub path: String,
}

impl ArtifactRecord {
    pub fn new(storage_id: StorageId, repository_id: RepositoryId, path: impl Into<String>) -> Self {
        Self {
            storage_id,
            repository_id,
            path: path.into(),
        }
    }
}

pub trait ArtifactCatalog: Send + Sync + fmt::Debug {
    fn find_one_artifact(
        &self,
        storage_id: &StorageId,
        repository_id: &RepositoryId,
        path: &str,
    ) -> StorageResult<Option<ArtifactRecord>>;

    fn delete(&self, record: &ArtifactRecord) -> StorageResult<()>;
}

/// Catalog that holds nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCatalog;

impl ArtifactCatalog for NoopCatalog {
    fn find_one_artifact(
        &self,
        _storage_id: &StorageId,
        _repository_id: &RepositoryId,
        _path: &str,
    ) -> StorageResult<Option<ArtifactRecord>> {
        Ok(None)
    }

    fn delete(&self, _record: &ArtifactRecord) -> StorageResult<()> {
        Ok(())
    }
}

type RecordKey = (StorageId, RepositoryId, String);

/// Process-local catalog.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    records: RwLock<BTreeMap<RecordKey, ArtifactRecord>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a record.
    pub fn insert(&self, record: ArtifactRecord) {
        let key = (
            record.storage_id.clone(),
            record.repository_id.clone(),
            record.path.clone(),
        );
        self.records.write().insert(key, record);
    }

    pub fn contains(&self, storage_id: &StorageId, repository_id: &RepositoryId, path: &str) -> bool {
        self.records
            .read()
            .contains_key(&(storage_id.clone(), repository_id.clone(), path.to_owned()))
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl ArtifactCatalog for InMemoryCatalog {
    fn find_one_artifact(
        &self,
        storage_id: &StorageId,
        repository_id: &RepositoryId,
        path: &str,
    ) -> StorageResult<Option<ArtifactRecord>> {
        Ok(self
            .records
            .read()
            .get(&(storage_id.clone(), repository_id.clone(), path.to_owned()))
            .cloned())
    }

    fn delete(&self, record: &ArtifactRecord) -> StorageResult<()> {
        let key = (
            record.storage_id.clone(),
            record.repository_id.clone(),
            record.path.clone(),
        );
        match self.records.write().remove(&key) {
            Some(_) => Ok(()),
            None => Err(StorageError::Catalog(format!(
                "no record for {}:{}/{}",
                record.storage_id, record.repository_id, record.path
            ))),
        }
    }
}
