//! Metadata manager.
//!
//! Reads, regenerates, merges and prunes `maven-metadata.xml` documents. Every mutating
//! operation holds the write half of the artifact base path's lock for its whole
//! read-modify-write sequence; the group-level plugin document is additionally locked on the
//! group path, always after the base. A snapshot version directory's document is guarded by
//! the lock of the artifact base above it, never by a lock of its own.
//!
//! ## Documents
//!
//! ```text
//! com/example/maven-metadata.xml                  # group: plugin prefixes
//! com/example/foo/maven-metadata.xml              # artifact: versions, latest, release
//! com/example/foo/1.0-SNAPSHOT/maven-metadata.xml # version: snapshot builds
//! ```

use crate::constants::{MAVEN_METADATA_FILE, METADATA_MODEL_VERSION, METADATA_TIMESTAMP_FORMAT};
use crate::events::RepositoryEvent;
use crate::fs::RepositoryFileSystem;
use crate::layout::maven::is_snapshot_version;
use crate::layout::MavenCoordinates;
use crate::metadata::document::{
    sort_snapshot_versions, Metadata, Plugin, PomSummary, Snapshot, SnapshotVersion,
    SnapshotVersions, Versioning, Versions,
};
use crate::metadata::version::SnapshotBuild;
use crate::path::RepositoryPath;
use crate::{StorageError, StorageResult};
use chrono::{DateTime, Utc};
use depot_files::Checksums;
use depot_types::RepositoryPolicy;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

/// Which timestamped snapshot builds survive a prune.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotRetention {
    /// Keep the `n` newest builds by build number.
    KeepLatest(usize),
    /// Keep builds whose timestamp is at or after the cutoff.
    KeepNewerThan(DateTime<Utc>),
}

/// Outcome of [`MetadataManager::delete_timestamped_snapshots`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    /// Timestamped versions of the removed builds, oldest first.
    pub builds_removed: Vec<String>,
    pub builds_kept: usize,
    /// Artifact files removed; their checksum side-files are not counted.
    pub files_removed: usize,
    /// `snapshotVersion` values that are not timestamped builds and were left alone.
    pub skipped: Vec<String>,
}

fn now_timestamp() -> String {
    Utc::now().format(METADATA_TIMESTAMP_FORMAT).to_string()
}

/// Splits an artifact base path `com/example/foo` into (`com.example`, `foo`).
fn base_coordinates(base: &RepositoryPath) -> StorageResult<(String, String)> {
    let segments: Vec<&str> = base.segments().collect();
    match segments.split_last() {
        Some((artifact_id, group)) if !group.is_empty() => {
            Ok((group.join("."), (*artifact_id).to_owned()))
        }
        _ => Err(StorageError::InvalidPath {
            path: base.to_string(),
            reason: "expected <group>/<artifactId>".into(),
        }),
    }
}

/// Path whose lock guards the document in `dir`.
///
/// Generation and pruning write per-version documents while holding the artifact base lock,
/// so a `-SNAPSHOT` directory below an artifact base maps to that base.
fn lock_scope(dir: &RepositoryPath) -> RepositoryPath {
    if dir.file_name().is_some_and(is_snapshot_version) {
        if let Some(base) = dir.parent() {
            if base.segments().count() >= 2 {
                return base;
            }
        }
    }
    dir.clone()
}

#[derive(Debug, Clone)]
pub struct MetadataManager {
    fs: Arc<RepositoryFileSystem>,
}

impl MetadataManager {
    pub fn new(fs: Arc<RepositoryFileSystem>) -> Self {
        Self { fs }
    }

    pub fn fs(&self) -> &Arc<RepositoryFileSystem> {
        &self.fs
    }

    /// `maven-metadata.xml` inside `dir`.
    pub fn metadata_path(dir: &RepositoryPath) -> StorageResult<RepositoryPath> {
        dir.resolve(MAVEN_METADATA_FILE)
    }

    // ========================================================================
    // Read and store
    // ========================================================================

    /// Reads the document in `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] when there is no document and
    /// [`StorageError::MetadataCorrupt`] when it cannot be parsed.
    pub fn read_metadata(&self, dir: &RepositoryPath) -> StorageResult<Metadata> {
        let lock = self.fs.locks().lock(&lock_scope(dir));
        let _guard = lock.read();
        self.read_unlocked(dir)
    }

    /// Writes `metadata` into `dir` with its checksum side-files.
    pub fn store_metadata(&self, dir: &RepositoryPath, metadata: &Metadata) -> StorageResult<Checksums> {
        self.ensure_supported(dir, "store_metadata")?;
        let lock = self.fs.locks().lock(&lock_scope(dir));
        let _guard = lock.write();
        self.store_unlocked(dir, metadata)
    }

    fn read_unlocked(&self, dir: &RepositoryPath) -> StorageResult<Metadata> {
        let file = Self::metadata_path(dir)?;
        if !self.fs.exists(&file) {
            return Err(file.not_found());
        }
        let xml = self.fs.read_to_string(&file)?;
        Metadata::from_xml(&xml, &dir.repository().qualified_id(), file.relative())
    }

    fn store_unlocked(&self, dir: &RepositoryPath, metadata: &Metadata) -> StorageResult<Checksums> {
        let file = Self::metadata_path(dir)?;
        let xml = metadata.to_xml()?;
        let checksums = self.fs.write_bytes(&file, xml.as_bytes())?;
        self.fs.store_checksums(&file, &checksums, true)?;

        tracing::debug!(path = %file, "stored metadata");
        self.fs
            .events()
            .dispatch(&RepositoryEvent::MetadataUpdated { path: file });
        Ok(checksums)
    }

    /// Removes the document in `dir` and its side-files. Returns whether one existed.
    fn delete_document(&self, dir: &RepositoryPath) -> StorageResult<bool> {
        let file = Self::metadata_path(dir)?;
        if !self.fs.exists(&file) {
            return Ok(false);
        }
        let provider = self.fs.provider(&file)?;
        provider.delete_path(&self.fs, &file, true, true)?;

        tracing::info!(path = %file, "removed metadata");
        self.fs
            .events()
            .dispatch(&RepositoryEvent::MetadataUpdated { path: file });
        Ok(true)
    }

    /// Drops the version listing in `dir`.
    ///
    /// A document that also carries a group plugin list keeps the plugins; anything else is
    /// removed with its side-files.
    fn clear_versions_unlocked(&self, dir: &RepositoryPath) -> StorageResult<()> {
        match self.read_unlocked(dir) {
            Ok(mut existing) if !existing.plugins.is_empty() => {
                if existing.versioning.take().is_some() {
                    self.store_unlocked(dir, &existing)?;
                }
                Ok(())
            }
            Err(e) if e.is_not_found() => Ok(()),
            _ => {
                self.delete_document(dir)?;
                Ok(())
            }
        }
    }

    fn ensure_supported(&self, path: &RepositoryPath, operation: &'static str) -> StorageResult<()> {
        if self.fs.provider(path)?.supports_metadata() {
            return Ok(());
        }
        Err(StorageError::UnsupportedLayout {
            layout: path.repository().layout().to_owned(),
            operation,
        })
    }

    // ========================================================================
    // Generate
    // ========================================================================

    /// Regenerates the documents of the artifact at `base` from what is on disk.
    ///
    /// Release repositories get a root document listing every version directory that holds an
    /// artifact. Snapshot repositories additionally get one document per `-SNAPSHOT` version
    /// directory listing its timestamped builds. When the latest version's pom declares
    /// `maven-plugin` packaging, the group document's plugin list is updated too.
    ///
    /// # Returns
    ///
    /// The root document, or `None` when no version remains (an existing document is removed).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if:
    /// - the repository is not a Maven repository ([`StorageError::UnsupportedLayout`])
    /// - the repository policy is mixed ([`StorageError::UnsupportedPolicy`])
    /// - `base` has fewer than two segments ([`StorageError::InvalidPath`])
    pub fn generate_metadata(&self, base: &RepositoryPath) -> StorageResult<Option<Metadata>> {
        self.ensure_supported(base, "generate_metadata")?;
        let repository = base.repository();
        if repository.policy() == RepositoryPolicy::Mixed {
            return Err(StorageError::UnsupportedPolicy {
                repository: repository.qualified_id(),
                policy: repository.policy(),
            });
        }

        let lock = self.fs.locks().lock(base);
        let _guard = lock.write();
        self.generate_unlocked(base)
    }

    fn generate_unlocked(&self, base: &RepositoryPath) -> StorageResult<Option<Metadata>> {
        let repository = base.repository();
        let (group_id, artifact_id) = base_coordinates(base)?;
        let versions = self.version_directories(base)?;

        if versions.is_empty() {
            self.clear_versions_unlocked(base)?;
            self.remove_plugin_unlocked(base)?;
            return Ok(None);
        }

        let snapshots = repository.policy() == RepositoryPolicy::Snapshot;
        let mut names = Vec::with_capacity(versions.len());
        for (version, dir) in versions {
            if snapshots && is_snapshot_version(&version) {
                self.generate_version_unlocked(&dir, &group_id, &artifact_id, &version)?;
            }
            names.push(version);
        }

        let mut metadata = Metadata {
            group_id: Some(group_id),
            artifact_id: Some(artifact_id),
            versioning: Some(Versioning {
                versions: Versions { version: names },
                last_updated: Some(now_timestamp()),
                ..Versioning::default()
            }),
            ..Metadata::default()
        };
        metadata.normalize_versions();
        self.store_unlocked(base, &metadata)?;
        self.update_plugin_group(base, &metadata)?;

        tracing::info!(path = %base, versions = metadata.versions().len(), "regenerated metadata");
        Ok(Some(metadata))
    }

    /// Child directories of `base` that directly contain at least one artifact.
    fn version_directories(&self, base: &RepositoryPath) -> StorageResult<Vec<(String, RepositoryPath)>> {
        if !self.fs.is_directory(base) {
            return Ok(Vec::new());
        }
        let provider = self.fs.provider(base)?;

        let mut versions = Vec::new();
        for child in self.fs.list(base)? {
            if !self.fs.is_directory(&child) {
                continue;
            }
            let Some(name) = child.file_name().map(str::to_owned) else {
                continue;
            };
            let has_artifact = self
                .fs
                .list(&child)?
                .iter()
                .any(|file| !self.fs.is_directory(file) && provider.is_artifact(file.relative()));
            if has_artifact {
                versions.push((name, child));
            }
        }
        Ok(versions)
    }

    /// Writes the per-version document of a snapshot version directory.
    ///
    /// Timestamped files contribute their build; plain `-SNAPSHOT` files are listed with the
    /// version itself as value. Returns `None` (removing any stale document) when the directory
    /// holds no artifact.
    fn generate_version_unlocked(
        &self,
        dir: &RepositoryPath,
        group_id: &str,
        artifact_id: &str,
        version: &str,
    ) -> StorageResult<Option<Metadata>> {
        let now = now_timestamp();
        let mut entries = Vec::new();
        let mut latest: Option<SnapshotBuild> = None;

        for file in self.fs.list(dir)? {
            if self.fs.is_directory(&file) || !self.fs.is_artifact(&file)? {
                continue;
            }
            let Some(maven) = self.fs.artifact_coordinates(&file)?.as_maven() else {
                continue;
            };

            let (value, updated) = match maven.snapshot_build() {
                Some(build) => {
                    let entry = (
                        build.value(),
                        build.timestamp.format(METADATA_TIMESTAMP_FORMAT).to_string(),
                    );
                    if latest.as_ref().map_or(true, |current| build > *current) {
                        latest = Some(build);
                    }
                    entry
                }
                None => (maven.file_version.clone(), now.clone()),
            };
            entries.push(SnapshotVersion {
                classifier: maven.classifier.clone(),
                extension: maven.extension.clone(),
                value,
                updated,
            });
        }

        if entries.is_empty() {
            self.delete_document(dir)?;
            return Ok(None);
        }
        sort_snapshot_versions(&mut entries);

        let metadata = Metadata {
            model_version: Some(METADATA_MODEL_VERSION.to_owned()),
            group_id: Some(group_id.to_owned()),
            artifact_id: Some(artifact_id.to_owned()),
            version: Some(version.to_owned()),
            versioning: Some(Versioning {
                snapshot: latest.map(|build| Snapshot {
                    timestamp: Some(build.timestamp_string()),
                    build_number: Some(build.build_number),
                    local_copy: None,
                }),
                last_updated: Some(now),
                snapshot_versions: SnapshotVersions {
                    snapshot_version: entries,
                },
                ..Versioning::default()
            }),
            ..Metadata::default()
        };
        self.store_unlocked(dir, &metadata)?;
        Ok(Some(metadata))
    }

    /// Adds the artifact to its group's plugin list when its latest pom is a plugin.
    ///
    /// An unreadable pom is logged and leaves the group document alone.
    fn update_plugin_group(&self, base: &RepositoryPath, metadata: &Metadata) -> StorageResult<()> {
        let (Some(latest), Some(artifact_id)) = (
            metadata.versioning.as_ref().and_then(|v| v.latest.as_deref()),
            metadata.artifact_id.as_deref(),
        ) else {
            return Ok(());
        };
        let Some(group_dir) = base.parent() else {
            return Ok(());
        };

        let version_dir = base.resolve(latest)?;
        let Some(pom) = self
            .fs
            .list(&version_dir)?
            .into_iter()
            .filter(|file| file.relative().ends_with(".pom"))
            .last()
        else {
            return Ok(());
        };

        let xml = self.fs.read_to_string(&pom)?;
        let summary = match PomSummary::from_xml(&xml, &base.repository().qualified_id(), pom.relative()) {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!(path = %pom, error = %e, "unreadable pom; plugin metadata left as is");
                return Ok(());
            }
        };
        if !summary.is_plugin() {
            return Ok(());
        }

        let lock = self.fs.locks().lock(&group_dir);
        let _guard = lock.write();
        let mut group = match self.read_unlocked(&group_dir) {
            Ok(group) => group,
            Err(e) if e.is_not_found() => Metadata::default(),
            Err(e) => return Err(e),
        };
        group.upsert_plugin(Plugin {
            name: summary.name,
            prefix: Plugin::prefix_for(artifact_id),
            artifact_id: artifact_id.to_owned(),
        });
        self.store_unlocked(&group_dir, &group)?;
        Ok(())
    }

    /// Removes the plugin entry of the artifact at `base` from its group document.
    ///
    /// Used once the artifact itself is gone. The group document is removed when no plugin and
    /// no version remains in it.
    ///
    /// # Returns
    ///
    /// `true` if the group document listed the artifact.
    pub fn remove_plugin(&self, base: &RepositoryPath) -> StorageResult<bool> {
        self.ensure_supported(base, "remove_plugin")?;
        let lock = self.fs.locks().lock(base);
        let _guard = lock.write();
        self.remove_plugin_unlocked(base)
    }

    fn remove_plugin_unlocked(&self, base: &RepositoryPath) -> StorageResult<bool> {
        let (Some(group_dir), Some(artifact_id)) = (base.parent(), base.file_name()) else {
            return Ok(false);
        };

        let lock = self.fs.locks().lock(&group_dir);
        let _guard = lock.write();
        let mut group = match self.read_unlocked(&group_dir) {
            Ok(group) => group,
            Err(e) if e.is_not_found() => return Ok(false),
            Err(e) => return Err(e),
        };
        if !group.remove_plugin(artifact_id) {
            return Ok(false);
        }

        if group.plugins.is_empty() && group.versions().is_empty() {
            self.delete_document(&group_dir)?;
        } else {
            self.store_unlocked(&group_dir, &group)?;
        }
        tracing::info!(path = %base, "removed plugin from group metadata");
        Ok(true)
    }

    // ========================================================================
    // Merge and version removal
    // ========================================================================

    /// Merges `incoming` into the document in `dir` and stores the result.
    ///
    /// With no existing document, `incoming` is stored as the new document.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::MetadataCorrupt`] if an existing document cannot be parsed; it
    /// is never replaced silently.
    pub fn merge_and_store(&self, dir: &RepositoryPath, incoming: &Metadata) -> StorageResult<Metadata> {
        self.ensure_supported(dir, "merge_and_store")?;
        let lock = self.fs.locks().lock(&lock_scope(dir));
        let _guard = lock.write();

        let mut merged = match self.read_unlocked(dir) {
            Ok(mut existing) => {
                existing.merge(incoming);
                existing
            }
            Err(e) if e.is_not_found() => {
                tracing::debug!(path = %dir, "no metadata to merge into; storing incoming document");
                let mut fresh = incoming.clone();
                fresh.normalize_versions();
                fresh
            }
            Err(e) => return Err(e),
        };
        merged.set_last_updated(now_timestamp());
        self.store_unlocked(dir, &merged)?;
        Ok(merged)
    }

    /// Drops `version` from the root document at `base` and recomputes `latest`/`release`.
    ///
    /// The document is removed when its last version goes. Returns the stored document.
    pub fn remove_version(&self, base: &RepositoryPath, version: &str) -> StorageResult<Option<Metadata>> {
        self.ensure_supported(base, "remove_version")?;
        let lock = self.fs.locks().lock(base);
        let _guard = lock.write();

        let mut metadata = match self.read_unlocked(base) {
            Ok(metadata) => metadata,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };
        if let Some(versioning) = metadata.versioning.as_mut() {
            versioning.versions.version.retain(|v| v != version);
        }

        if metadata.versions().is_empty() {
            self.clear_versions_unlocked(base)?;
            return Ok(None);
        }
        metadata.normalize_versions();
        metadata.set_last_updated(now_timestamp());
        self.store_unlocked(base, &metadata)?;
        Ok(Some(metadata))
    }

    // ========================================================================
    // Prune
    // ========================================================================

    /// Removes timestamped snapshot builds from `version_dir` according to `retention`.
    ///
    /// Builds are taken from the per-version document, which is generated first if missing.
    /// Every file of a pruned build goes (main artifact, pom and other classifiers, with their
    /// side-files) through the layout's delete cascade, honouring the repository's trash. The
    /// per-version document is then regenerated; the root document is regenerated as well if
    /// no artifact remains in the directory.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidPath`] if `version_dir` is not a `-SNAPSHOT` directory
    /// below an artifact base.
    pub fn delete_timestamped_snapshots(
        &self,
        version_dir: &RepositoryPath,
        retention: SnapshotRetention,
    ) -> StorageResult<PruneReport> {
        self.ensure_supported(version_dir, "delete_timestamped_snapshots")?;
        let not_snapshot_dir = || StorageError::InvalidPath {
            path: version_dir.to_string(),
            reason: "not a snapshot version directory".into(),
        };
        let version = version_dir
            .file_name()
            .filter(|name| is_snapshot_version(name))
            .map(str::to_owned)
            .ok_or_else(not_snapshot_dir)?;
        let base = version_dir.parent().ok_or_else(not_snapshot_dir)?;
        let (group_id, artifact_id) = base_coordinates(&base)?;

        let lock = self.fs.locks().lock(&base);
        let _guard = lock.write();

        let metadata = match self.read_unlocked(version_dir) {
            Ok(metadata) => Some(metadata),
            Err(e) if e.is_not_found() => {
                self.generate_version_unlocked(version_dir, &group_id, &artifact_id, &version)?
            }
            Err(e) => return Err(e),
        };
        let mut report = PruneReport::default();
        let Some(metadata) = metadata else {
            return Ok(report);
        };

        let mut builds = BTreeSet::new();
        let entries = metadata
            .versioning
            .iter()
            .flat_map(|v| v.snapshot_versions.snapshot_version.iter());
        for entry in entries {
            match SnapshotBuild::parse(&entry.value) {
                Some(build) => {
                    builds.insert(build);
                }
                None if !report.skipped.contains(&entry.value) => {
                    tracing::warn!(
                        path = %version_dir,
                        value = %entry.value,
                        "skipping snapshot entry that is not a timestamped build"
                    );
                    report.skipped.push(entry.value.clone());
                }
                None => {}
            }
        }

        let doomed: Vec<SnapshotBuild> = match retention {
            SnapshotRetention::KeepLatest(keep) => {
                let excess = builds.len().saturating_sub(keep);
                builds.iter().take(excess).cloned().collect()
            }
            SnapshotRetention::KeepNewerThan(cutoff) => builds
                .iter()
                .filter(|build| build.timestamp_utc() < cutoff)
                .cloned()
                .collect(),
        };
        report.builds_kept = builds.len() - doomed.len();
        if doomed.is_empty() {
            return Ok(report);
        }

        let doomed_values: HashSet<String> = doomed.iter().map(SnapshotBuild::value).collect();
        let provider = self.fs.provider(version_dir)?;
        for file in self.fs.list(version_dir)? {
            if self.fs.is_directory(&file) || !provider.is_artifact(file.relative()) {
                continue;
            }
            let build = self
                .fs
                .artifact_coordinates(&file)?
                .as_maven()
                .and_then(MavenCoordinates::snapshot_build);
            if build.is_some_and(|build| doomed_values.contains(&build.value())) {
                provider.delete_path(&self.fs, &file, false, true)?;
                report.files_removed += 1;
            }
        }
        report.builds_removed = doomed.iter().map(SnapshotBuild::value).collect();

        let remaining =
            self.generate_version_unlocked(version_dir, &group_id, &artifact_id, &version)?;
        if remaining.is_none() && version_dir.repository().policy() != RepositoryPolicy::Mixed {
            self.generate_unlocked(&base)?;
        }

        tracing::info!(
            path = %version_dir,
            removed = report.builds_removed.len(),
            kept = report.builds_kept,
            files = report.files_removed,
            "pruned snapshot builds"
        );
        Ok(report)
    }
}
