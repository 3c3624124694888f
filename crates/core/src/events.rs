//! Repository lifecycle notifications.
//!
//! Dispatch is fire-and-forget: a failing listener is logged and the storage operation that
//! produced the event stands.

use crate::path::RepositoryPath;
use depot_files::Checksums;
use depot_types::{RepositoryId, StorageId};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryEvent {
    ArtifactStored {
        path: RepositoryPath,
        checksums: Checksums,
    },
    ArtifactDeleted {
        path: RepositoryPath,
        trashed: bool,
    },
    TrashEmptied {
        storage_id: StorageId,
        repository_id: RepositoryId,
    },
    TrashRestored {
        storage_id: StorageId,
        repository_id: RepositoryId,
        restored: usize,
    },
    MetadataUpdated {
        path: RepositoryPath,
    },
}

impl RepositoryEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ArtifactStored { .. } => "artifact_stored",
            Self::ArtifactDeleted { .. } => "artifact_deleted",
            Self::TrashEmptied { .. } => "trash_emptied",
            Self::TrashRestored { .. } => "trash_restored",
            Self::MetadataUpdated { .. } => "metadata_updated",
        }
    }
}

pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

pub trait RepositoryEventListener: Send + Sync {
    fn handle(&self, event: &RepositoryEvent) -> Result<(), ListenerError>;
}

/// Fans events out to every subscribed listener.
#[derive(Clone, Default)]
pub struct EventDispatcher {
    listeners: Arc<RwLock<Vec<Arc<dyn RepositoryEventListener>>>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: Arc<dyn RepositoryEventListener>) {
        self.listeners.write().push(listener);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn dispatch(&self, event: &RepositoryEvent) {
        let listeners = self.listeners.read().clone();
        for listener in listeners {
            if let Err(e) = listener.handle(event) {
                tracing::warn!(event = event.kind(), error = %e, "event listener failed");
            }
        }
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Listener that writes every event to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingListener;

impl RepositoryEventListener for LoggingListener {
    fn handle(&self, event: &RepositoryEvent) -> Result<(), ListenerError> {
        match event {
            RepositoryEvent::ArtifactStored { path, checksums } => {
                tracing::info!(%path, digests = checksums.len(), "artifact stored");
            }
            RepositoryEvent::ArtifactDeleted { path, trashed } => {
                tracing::info!(%path, trashed, "artifact deleted");
            }
            RepositoryEvent::TrashEmptied {
                storage_id,
                repository_id,
            } => {
                tracing::info!(%storage_id, %repository_id, "trash emptied");
            }
            RepositoryEvent::TrashRestored {
                storage_id,
                repository_id,
                restored,
            } => {
                tracing::info!(%storage_id, %repository_id, restored, "trash restored");
            }
            RepositoryEvent::MetadataUpdated { path } => {
                tracing::info!(%path, "metadata updated");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Keeps every event it receives.
    #[derive(Default)]
    pub(crate) struct RecordingListener {
        events: Mutex<Vec<RepositoryEvent>>,
    }

    impl RecordingListener {
        pub(crate) fn events(&self) -> Vec<RepositoryEvent> {
            self.events.lock().clone()
        }

        pub(crate) fn kinds(&self) -> Vec<&'static str> {
            self.events.lock().iter().map(RepositoryEvent::kind).collect()
        }
    }

    impl RepositoryEventListener for RecordingListener {
        fn handle(&self, event: &RepositoryEvent) -> Result<(), ListenerError> {
            self.events.lock().push(event.clone());
            Ok(())
        }
    }

    struct FailingListener;

    impl RepositoryEventListener for FailingListener {
        fn handle(&self, _event: &RepositoryEvent) -> Result<(), ListenerError> {
            Err("sink unavailable".into())
        }
    }

    fn trash_emptied() -> RepositoryEvent {
        RepositoryEvent::TrashEmptied {
            storage_id: StorageId::new("storage0").unwrap(),
            repository_id: RepositoryId::new("releases").unwrap(),
        }
    }

    #[test]
    fn test_failing_listener_does_not_stop_dispatch() {
        let dispatcher = EventDispatcher::new();
        let recorder = Arc::new(RecordingListener::default());
        dispatcher.subscribe(Arc::new(FailingListener));
        dispatcher.subscribe(recorder.clone());

        dispatcher.dispatch(&trash_emptied());
        assert_eq!(recorder.kinds(), vec!["trash_emptied"]);
    }

    #[test]
    fn test_clones_share_listeners() {
        let dispatcher = EventDispatcher::new();
        let clone = dispatcher.clone();
        clone.subscribe(Arc::new(LoggingListener));
        assert_eq!(dispatcher.listener_count(), 1);
    }
}
