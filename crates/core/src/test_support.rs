//! Fixtures shared by the unit tests of this crate.

use crate::catalog::{ArtifactCatalog, InMemoryCatalog};
use crate::config::CoreConfig;
use crate::constants::MAVEN2_LAYOUT;
use crate::events::tests::RecordingListener;
use crate::events::EventDispatcher;
use crate::fs::RepositoryFileSystem;
use crate::layout::LayoutProviderRegistry;
use depot_files::LocalStorageBackend;
use depot_types::{Repository, RepositoryId, RepositoryPolicy, StorageId};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

pub(crate) const STORAGE: &str = "storage0";

/// A filesystem over a temp directory with a recording listener attached.
pub(crate) struct Fixture {
    pub(crate) temp: TempDir,
    pub(crate) fs: Arc<RepositoryFileSystem>,
    pub(crate) catalog: Arc<InMemoryCatalog>,
    pub(crate) events: Arc<RecordingListener>,
}

impl Fixture {
    pub(crate) fn new() -> Self {
        Self::build(None)
    }

    /// Fixture whose filesystem talks to `catalog` instead of the in-memory one.
    pub(crate) fn with_catalog(catalog: Arc<dyn ArtifactCatalog>) -> Self {
        Self::build(Some(catalog))
    }

    fn build(catalog_override: Option<Arc<dyn ArtifactCatalog>>) -> Self {
        let temp = TempDir::new().unwrap();
        let catalog = Arc::new(InMemoryCatalog::new());
        let events = Arc::new(RecordingListener::default());
        let dispatcher = EventDispatcher::new();
        dispatcher.subscribe(events.clone());

        let active: Arc<dyn ArtifactCatalog> = match catalog_override {
            Some(other) => other,
            None => catalog.clone(),
        };
        let fs = RepositoryFileSystem::new(
            Arc::new(LocalStorageBackend::new()),
            Arc::new(LayoutProviderRegistry::with_defaults()),
            CoreConfig::default(),
        )
        .with_catalog(active)
        .with_events(dispatcher);

        Self {
            temp,
            fs: Arc::new(fs),
            catalog,
            events,
        }
    }

    pub(crate) fn repository(
        &self,
        id: &str,
        layout: &str,
        policy: RepositoryPolicy,
        trash: bool,
    ) -> Arc<Repository> {
        let repository = Repository::new(
            StorageId::new(STORAGE).unwrap(),
            RepositoryId::new(id).unwrap(),
            self.temp.path().join(STORAGE).join(id),
            layout,
        )
        .unwrap()
        .with_policy(policy)
        .with_trash(trash);
        Arc::new(repository)
    }

    pub(crate) fn maven(&self, id: &str, policy: RepositoryPolicy, trash: bool) -> Arc<Repository> {
        self.repository(id, MAVEN2_LAYOUT, policy, trash)
    }

    /// Writes a file directly, bypassing the repository filesystem.
    pub(crate) fn put(&self, repository: &Repository, relative: &str, bytes: &[u8]) {
        let path = repository.basedir().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, bytes).unwrap();
    }
}
