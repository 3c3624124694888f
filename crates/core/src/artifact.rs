//! Artifact management service.
//!
//! [`ArtifactManager`] is what a deploy endpoint or maintenance job calls. It enforces the
//! repository's deployment and deletion rules, streams bytes through the repository
//! filesystem, persists checksum side-files and keeps Maven metadata in step with what is on
//! disk.

use crate::constants::MAVEN_METADATA_FILE;
use crate::events::RepositoryEvent;
use crate::fs::RepositoryFileSystem;
use crate::layout::{LayoutProvider, MavenCoordinates};
use crate::metadata::{Metadata, MetadataManager, PruneReport, SnapshotRetention};
use crate::path::RepositoryPath;
use crate::{StorageError, StorageResult};
use depot_files::{ChecksumReport, Checksums, FilesError};
use depot_types::RepositoryPolicy;
use std::io::{self, Read};
use std::sync::Arc;

/// Metadata touched by a delete.
#[derive(Debug)]
enum MetadataImpact {
    /// A file or version directory of the artifact at this base went away.
    Version(RepositoryPath),
    /// The artifact base itself went away.
    Base(RepositoryPath),
}

#[derive(Debug, Clone)]
pub struct ArtifactManager {
    fs: Arc<RepositoryFileSystem>,
    metadata: MetadataManager,
}

impl ArtifactManager {
    pub fn new(fs: Arc<RepositoryFileSystem>) -> Self {
        Self {
            metadata: MetadataManager::new(Arc::clone(&fs)),
            fs,
        }
    }

    pub fn fs(&self) -> &Arc<RepositoryFileSystem> {
        &self.fs
    }

    pub fn metadata(&self) -> &MetadataManager {
        &self.metadata
    }

    // ========================================================================
    // Store
    // ========================================================================

    /// Stores the bytes of `reader` at `path`.
    ///
    /// Uploaded `maven-metadata.xml` documents are merged into the existing document rather
    /// than overwriting it. Anything else is streamed through the layout's digests, checked
    /// against `expected` (when checksum verification is enabled), and published together with
    /// its checksum side-files. Storing a Maven artifact regenerates the artifact's metadata.
    ///
    /// # Arguments
    ///
    /// * `path` - Target path inside the repository.
    /// * `reader` - Source of the artifact bytes.
    /// * `expected` - Checksums supplied by the client; an algorithm the layout does not
    ///   compute is computed for the comparison.
    ///
    /// # Returns
    ///
    /// The checksums of the stored file.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if:
    /// - the file exists and the repository forbids redeployment
    ///   ([`StorageError::RedeploymentNotAllowed`])
    /// - the version does not fit the repository policy ([`StorageError::PolicyViolation`])
    /// - an expected checksum disagrees with the bytes ([`StorageError::ChecksumMismatch`])
    /// - the path is not valid for the layout, or any I/O fails
    pub fn store<R: Read>(
        &self,
        path: &RepositoryPath,
        mut reader: R,
        expected: &Checksums,
    ) -> StorageResult<Checksums> {
        let repository = path.repository();
        let provider = self.fs.provider(path)?;
        let relative = path.relative();
        let is_checksum = provider.is_checksum(relative);
        let is_metadata = provider.is_metadata(relative);

        let maven = if provider == LayoutProvider::Maven2 && !is_checksum && !is_metadata {
            self.fs.artifact_coordinates(path)?.as_maven().cloned()
        } else {
            None
        };
        if let Some(coordinates) = &maven {
            check_policy(path, coordinates)?;
        }

        let redeploy_exempt = is_checksum
            || is_metadata
            || maven.as_ref().is_some_and(MavenCoordinates::is_snapshot);
        if self.fs.exists(path) && !redeploy_exempt && !repository.allows_redeployment() {
            return Err(StorageError::RedeploymentNotAllowed {
                repository: repository.qualified_id(),
                path: relative.to_owned(),
            });
        }

        if provider.supports_metadata() && path.file_name() == Some(MAVEN_METADATA_FILE) {
            return self.store_metadata_upload(path, reader);
        }

        let mut stream = self.fs.open_write(path)?;
        if self.fs.config().verify_checksums_on_store() {
            for (algorithm, value) in expected {
                stream.expect_checksum(*algorithm, value);
            }
        }
        io::copy(&mut reader, &mut stream)
            .map_err(|e| path.error(FilesError::io(path.physical_path(), e)))?;
        let checksums = stream.close()?;

        if !is_checksum {
            self.fs.store_checksums(path, &checksums, true)?;
        }
        if let Some(coordinates) = &maven {
            let base = RepositoryPath::new(
                Arc::clone(path.repository()),
                &coordinates.artifact_base_path(),
            )?;
            self.refresh_metadata(&base)?;
        }

        tracing::info!(%path, bytes = ?self.fs.size(path).ok(), "stored artifact");
        self.fs.events().dispatch(&RepositoryEvent::ArtifactStored {
            path: path.clone(),
            checksums: checksums.clone(),
        });
        Ok(checksums)
    }

    fn store_metadata_upload<R: Read>(&self, path: &RepositoryPath, mut reader: R) -> StorageResult<Checksums> {
        let mut xml = String::new();
        reader
            .read_to_string(&mut xml)
            .map_err(|e| path.error(FilesError::io(path.physical_path(), e)))?;
        let incoming = Metadata::from_xml(&xml, &path.repository().qualified_id(), path.relative())?;

        let dir = path.parent().ok_or_else(|| StorageError::InvalidPath {
            path: path.to_string(),
            reason: "metadata must live below an artifact directory".into(),
        })?;
        self.metadata.merge_and_store(&dir, &incoming)?;

        let provider = self.fs.provider(path)?;
        let mut checksums = Checksums::new();
        for algorithm in provider.digest_algorithms() {
            if let Some(value) = self.fs.checksum(path, algorithm)? {
                checksums.insert(algorithm, value);
            }
        }
        self.fs.events().dispatch(&RepositoryEvent::ArtifactStored {
            path: path.clone(),
            checksums: checksums.clone(),
        });
        Ok(checksums)
    }

    // ========================================================================
    // Delete
    // ========================================================================

    /// Deletes `path` and regenerates the metadata of the Maven artifact it belonged to.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::DeletionNotAllowed`] if the repository forbids deletion, or
    /// forced deletion when `force` is set.
    pub fn delete(&self, path: &RepositoryPath, force: bool) -> StorageResult<()> {
        let repository = path.repository();
        if !repository.allows_deletion() {
            return Err(StorageError::DeletionNotAllowed {
                repository: repository.qualified_id(),
                path: path.relative().to_owned(),
                reason: "the repository does not allow deletion",
            });
        }
        if force && !repository.allows_force_deletion() {
            return Err(StorageError::DeletionNotAllowed {
                repository: repository.qualified_id(),
                path: path.relative().to_owned(),
                reason: "the repository does not allow forced deletion",
            });
        }

        let impact = self.metadata_impact(path)?;
        self.fs.delete(path, force)?;
        match impact {
            Some(MetadataImpact::Version(base)) => self.refresh_metadata(&base)?,
            Some(MetadataImpact::Base(base)) => self.forget_artifact_base(&base)?,
            None => {}
        }
        Ok(())
    }

    /// Which metadata a delete of `path` invalidates.
    fn metadata_impact(&self, path: &RepositoryPath) -> StorageResult<Option<MetadataImpact>> {
        let provider = self.fs.provider(path)?;
        if !provider.supports_metadata() || !self.fs.exists(path) {
            return Ok(None);
        }

        if !self.fs.is_directory(path) {
            if !provider.is_artifact(path.relative()) {
                return Ok(None);
            }
            let coordinates = self.fs.artifact_coordinates(path)?;
            return match coordinates.as_maven() {
                Some(maven) => Ok(Some(MetadataImpact::Version(RepositoryPath::new(
                    Arc::clone(path.repository()),
                    &maven.artifact_base_path(),
                )?))),
                None => Ok(None),
            };
        }

        let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
            return Ok(None);
        };
        // A version directory is listed in the document of the artifact base above it.
        if let Some(document) = self.document_in(&parent) {
            if document.versions().iter().any(|version| version == name) {
                return Ok(Some(MetadataImpact::Version(parent)));
            }
        }
        if let Some(document) = self.document_in(path) {
            if document.artifact_id.as_deref() == Some(name) || !document.versions().is_empty() {
                return Ok(Some(MetadataImpact::Base(path.clone())));
            }
        }
        Ok(None)
    }

    /// The metadata document in `dir`, if there is a readable one.
    fn document_in(&self, dir: &RepositoryPath) -> Option<Metadata> {
        match self.metadata.read_metadata(dir) {
            Ok(document) => Some(document),
            Err(e) if e.is_not_found() => None,
            Err(e) => {
                tracing::warn!(path = %dir, error = %e, "ignoring unreadable metadata");
                None
            }
        }
    }

    /// Drops a deleted artifact from its group's plugin list.
    fn forget_artifact_base(&self, base: &RepositoryPath) -> StorageResult<()> {
        if base.repository().policy() == RepositoryPolicy::Mixed {
            tracing::debug!(path = %base, "metadata is not maintained for mixed repositories");
            return Ok(());
        }
        self.metadata.remove_plugin(base)?;
        Ok(())
    }

    fn refresh_metadata(&self, base: &RepositoryPath) -> StorageResult<()> {
        if base.repository().policy() == RepositoryPolicy::Mixed {
            tracing::debug!(path = %base, "metadata is not maintained for mixed repositories");
            return Ok(());
        }
        self.metadata.generate_metadata(base)?;
        Ok(())
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Rewrites checksum side-files below `base`, or below each of its `version_directories`.
    pub fn regenerate_checksums(
        &self,
        base: &RepositoryPath,
        version_directories: &[String],
        force: bool,
    ) -> StorageResult<ChecksumReport> {
        let provider = self.fs.provider(base)?;
        provider.generate_checksums(&self.fs, base, version_directories, force)
    }

    /// Regenerates the Maven metadata of the artifact at `base`.
    pub fn rebuild_metadata(&self, base: &RepositoryPath) -> StorageResult<Option<Metadata>> {
        self.metadata.generate_metadata(base)
    }

    pub fn prune_snapshots(
        &self,
        version_dir: &RepositoryPath,
        retention: SnapshotRetention,
    ) -> StorageResult<PruneReport> {
        self.metadata.delete_timestamped_snapshots(version_dir, retention)
    }
}

/// Release repositories take only release versions, snapshot repositories only snapshots.
fn check_policy(path: &RepositoryPath, coordinates: &MavenCoordinates) -> StorageResult<()> {
    let repository = path.repository();
    let reason = match (repository.policy(), coordinates.is_snapshot()) {
        (RepositoryPolicy::Release, true) => "snapshot versions cannot be deployed to a release repository",
        (RepositoryPolicy::Snapshot, false) => "release versions cannot be deployed to a snapshot repository",
        _ => return Ok(()),
    };
    Err(StorageError::PolicyViolation {
        repository: repository.qualified_id(),
        path: path.relative().to_owned(),
        reason: reason.to_owned(),
    })
}
