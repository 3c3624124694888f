//! # Depot Core
//!
//! Storage core of the depot artifact repository.
//!
//! This crate owns the mapping between artifact identities and bytes on a storage backend:
//! - Repository paths and the virtual filesystem that attaches digests to every stream
//! - Layout providers (Maven 2, NuGet, P2, Raw) that interpret paths as coordinates
//! - A path lock registry that serializes metadata read-modify-write per artifact
//! - The metadata manager that keeps `maven-metadata.xml` consistent
//!
//! **No transport concerns**: HTTP endpoints, authentication and configuration persistence
//! live with the callers. They construct a [`RepositoryFileSystem`] once at startup and share
//! it by `Arc`.
//!
//! ## Wiring
//!
//! ```no_run
//! use depot_core::{ArtifactManager, CoreConfig, LayoutProviderRegistry, RepositoryFileSystem};
//! use depot_files::LocalStorageBackend;
//! use std::sync::Arc;
//!
//! let fs = RepositoryFileSystem::new(
//!     Arc::new(LocalStorageBackend::new()),
//!     Arc::new(LayoutProviderRegistry::with_defaults()),
//!     CoreConfig::default(),
//! );
//! let artifacts = ArtifactManager::new(Arc::new(fs));
//! # let _ = artifacts;
//! ```

pub mod artifact;
pub mod catalog;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod fs;
pub mod layout;
pub mod locks;
pub mod metadata;
pub mod path;

#[cfg(test)]
pub(crate) mod test_support;

pub use artifact::ArtifactManager;
pub use catalog::{ArtifactCatalog, ArtifactRecord, InMemoryCatalog, NoopCatalog};
pub use config::CoreConfig;
pub use error::{StorageError, StorageResult};
pub use events::{EventDispatcher, LoggingListener, RepositoryEvent, RepositoryEventListener};
pub use fs::{RepositoryFileSystem, RepositoryInputStream, RepositoryOutputStream};
pub use layout::{ArtifactCoordinates, LayoutProvider, LayoutProviderRegistry};
pub use locks::{PathLock, PathLockRegistry, PathReadGuard, PathWriteGuard};
pub use metadata::{Metadata, MetadataManager, PruneReport, SnapshotRetention};
pub use path::RepositoryPath;
