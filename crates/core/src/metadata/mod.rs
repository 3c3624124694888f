//! Maven metadata: the document model, version ordering and the manager that keeps
//! `maven-metadata.xml` documents consistent under concurrent deploys.

pub mod document;
pub mod manager;
pub mod version;

pub use document::{
    sort_snapshot_versions, Metadata, Plugin, Plugins, PomSummary, Snapshot, SnapshotVersion,
    SnapshotVersions, Versioning, Versions,
};
pub use manager::{MetadataManager, PruneReport, SnapshotRetention};
pub use version::{max_version, sort_versions, MavenVersion, SnapshotBuild};
