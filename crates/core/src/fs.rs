//! Virtual repository filesystem.
//!
//! Every read, write and delete against a repository goes through [`RepositoryFileSystem`].
//! It resolves [`RepositoryPath`]s against the repository basedir, wraps streams in digest
//! decorators configured by the repository's layout, writes through a temp file so readers
//! never observe a partial artifact, and implements trash and undelete.
//!
//! ## Physical layout below a basedir
//!
//! ```text
//! <basedir>/
//! ├── com/example/foo/...   # repository content
//! ├── .temp/<uuid>.tmp      # in-flight writes, moved into place on close
//! └── .trash/com/...        # soft-deleted content, mirrors the content tree
//! ```

use crate::catalog::{ArtifactCatalog, NoopCatalog};
use crate::config::CoreConfig;
use crate::events::{EventDispatcher, RepositoryEvent};
use crate::layout::{ArtifactCoordinates, LayoutProvider, LayoutProviderRegistry};
use crate::locks::PathLockRegistry;
use crate::path::RepositoryPath;
use crate::{StorageError, StorageResult};
use depot_files::{
    ChecksumFiles, Checksums, DigestAlgorithm, DigestReader, DigestSet, DigestWriter, FilesError,
    StorageBackend,
};
use depot_types::Repository;
use std::fmt;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug)]
pub struct RepositoryFileSystem {
    backend: Arc<dyn StorageBackend>,
    layouts: Arc<LayoutProviderRegistry>,
    locks: Arc<PathLockRegistry>,
    catalog: Arc<dyn ArtifactCatalog>,
    events: EventDispatcher,
    checksums: ChecksumFiles,
    config: CoreConfig,
}

impl RepositoryFileSystem {
    /// Creates a filesystem with no catalog, no listeners and its own lock registry.
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        layouts: Arc<LayoutProviderRegistry>,
        config: CoreConfig,
    ) -> Self {
        let checksums = ChecksumFiles::new(Arc::clone(&backend))
            .with_skipped_directories(config.reserved_dir_names());
        Self {
            locks: Arc::new(PathLockRegistry::new(config.lock_prune_threshold())),
            backend,
            layouts,
            catalog: Arc::new(NoopCatalog),
            events: EventDispatcher::new(),
            checksums,
            config,
        }
    }

    #[must_use]
    pub fn with_catalog(mut self, catalog: Arc<dyn ArtifactCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    #[must_use]
    pub fn with_locks(mut self, locks: Arc<PathLockRegistry>) -> Self {
        self.locks = locks;
        self
    }

    #[must_use]
    pub fn with_events(mut self, events: EventDispatcher) -> Self {
        self.events = events;
        self
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    pub fn layouts(&self) -> &Arc<LayoutProviderRegistry> {
        &self.layouts
    }

    pub fn locks(&self) -> &Arc<PathLockRegistry> {
        &self.locks
    }

    pub fn catalog(&self) -> &dyn ArtifactCatalog {
        self.catalog.as_ref()
    }

    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }

    pub fn checksum_files(&self) -> &ChecksumFiles {
        &self.checksums
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    // ========================================================================
    // Resolution and attributes
    // ========================================================================

    /// Resolves `relative` inside `repository`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if:
    /// - the repository's layout is not registered ([`StorageError::UnknownLayout`])
    /// - the path escapes the root or points into the trash or temp area
    ///   ([`StorageError::InvalidPath`])
    pub fn resolve(&self, repository: &Arc<Repository>, relative: &str) -> StorageResult<RepositoryPath> {
        self.layouts.provider_for(repository)?;
        let path = RepositoryPath::new(Arc::clone(repository), relative)?;
        if let Some(first) = path.segments().next() {
            if self.config.is_reserved(first) {
                return Err(StorageError::InvalidPath {
                    path: relative.to_owned(),
                    reason: format!("'{first}' is reserved"),
                });
            }
        }
        Ok(path)
    }

    pub fn provider(&self, path: &RepositoryPath) -> StorageResult<LayoutProvider> {
        self.layouts.provider_for(path.repository())
    }

    pub fn exists(&self, path: &RepositoryPath) -> bool {
        self.backend.exists(&path.physical_path())
    }

    pub fn is_directory(&self, path: &RepositoryPath) -> bool {
        self.backend.is_dir(&path.physical_path())
    }

    pub fn size(&self, path: &RepositoryPath) -> StorageResult<u64> {
        self.backend
            .size(&path.physical_path())
            .map_err(|e| path.error(e))
    }

    pub fn is_artifact(&self, path: &RepositoryPath) -> StorageResult<bool> {
        Ok(!self.is_directory(path) && self.provider(path)?.is_artifact(path.relative()))
    }

    pub fn is_metadata(&self, path: &RepositoryPath) -> StorageResult<bool> {
        Ok(self.provider(path)?.is_metadata(path.relative()))
    }

    pub fn is_checksum(&self, path: &RepositoryPath) -> StorageResult<bool> {
        Ok(self.provider(path)?.is_checksum(path.relative()))
    }

    /// Coordinates of `path`, parsed once and cached on the path.
    pub fn artifact_coordinates<'p>(
        &self,
        path: &'p RepositoryPath,
    ) -> StorageResult<&'p ArtifactCoordinates> {
        let provider = self.provider(path)?;
        path.coordinates_with(|relative| provider.parse_coordinates(relative))
    }

    /// Direct children of a directory, sorted. The trash and temp areas are never listed.
    pub fn list(&self, path: &RepositoryPath) -> StorageResult<Vec<RepositoryPath>> {
        let children = self
            .backend
            .list_children(&path.physical_path())
            .map_err(|e| path.error(e))?;

        let mut listed = Vec::with_capacity(children.len());
        for child in children {
            let Some(name) = child.file_name().and_then(|n| n.to_str()) else {
                tracing::warn!(path = %child.display(), "skipping non UTF-8 file name");
                continue;
            };
            if path.is_root() && self.config.is_reserved(name) {
                continue;
            }
            listed.push(path.resolve(name)?);
        }
        Ok(listed)
    }

    /// Every file at or below `path`, depth first in sorted order.
    pub fn list_files(&self, path: &RepositoryPath) -> StorageResult<Vec<RepositoryPath>> {
        let mut files = Vec::new();
        if !self.is_directory(path) {
            if self.exists(path) {
                files.push(path.clone());
            }
            return Ok(files);
        }
        self.collect_files(path, &mut files)?;
        Ok(files)
    }

    fn collect_files(&self, dir: &RepositoryPath, files: &mut Vec<RepositoryPath>) -> StorageResult<()> {
        for child in self.list(dir)? {
            if self.is_directory(&child) {
                self.collect_files(&child, files)?;
            } else {
                files.push(child);
            }
        }
        Ok(())
    }

    // ========================================================================
    // Streams
    // ========================================================================

    /// Opens `path` for reading with the layout's digests attached.
    ///
    /// Checksum side-files get no digests. For every other file, each algorithm whose
    /// side-file exists and is non-empty starts out with that value as its expected digest.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if the path is absent and
    /// [`StorageError::IsDirectory`] if it is a directory.
    pub fn open_read(&self, path: &RepositoryPath) -> StorageResult<RepositoryInputStream> {
        let provider = self.provider(path)?;
        let physical = path.physical_path();
        if !self.backend.exists(&physical) {
            return Err(path.not_found());
        }
        if self.backend.is_dir(&physical) {
            return Err(path.error(FilesError::IsDirectory(physical)));
        }

        let inner = self.backend.open_read(&physical).map_err(|e| path.error(e))?;
        let mut digests = self.digest_set(provider, path);
        let algorithms: Vec<DigestAlgorithm> = digests.algorithms().collect();
        for algorithm in algorithms {
            let side_file = self
                .checksums
                .read_for(&physical, algorithm)
                .map_err(|e| path.error(e))?;
            if let Some(value) = side_file {
                digests.set_expected(algorithm, value);
            }
        }

        tracing::debug!(%path, digests = ?digests, "opened for read");
        Ok(RepositoryInputStream {
            path: path.clone(),
            reader: DigestReader::new(inner, digests),
        })
    }

    /// Reads a whole file as UTF-8 without digests.
    pub fn read_to_string(&self, path: &RepositoryPath) -> StorageResult<String> {
        let physical = path.physical_path();
        if self.backend.is_dir(&physical) {
            return Err(path.error(FilesError::IsDirectory(physical)));
        }
        let mut content = String::new();
        self.backend
            .open_read(&physical)
            .map_err(|e| path.error(e))?
            .read_to_string(&mut content)
            .map_err(|e| path.error(FilesError::io(&physical, e)))?;
        Ok(content)
    }

    /// Opens `path` for writing with the layout's digests attached.
    ///
    /// Bytes go to a temp file under the repository's temp area; [`RepositoryOutputStream::close`]
    /// moves it into place. Missing parent directories are created.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::IsDirectory`] if `path` is the root or an existing directory.
    pub fn open_write(&self, path: &RepositoryPath) -> StorageResult<RepositoryOutputStream> {
        let provider = self.provider(path)?;
        let target = path.physical_path();
        if path.is_root() || self.backend.is_dir(&target) {
            return Err(path.error(FilesError::IsDirectory(target)));
        }

        if let Some(parent) = target.parent() {
            self.backend.create_dirs(parent).map_err(|e| path.error(e))?;
        }
        let temp_dir = path
            .repository()
            .basedir()
            .join(self.config.temp_dir_name());
        self.backend
            .create_dirs(&temp_dir)
            .map_err(|e| path.error(e))?;
        let temp = temp_dir.join(format!("{}.tmp", Uuid::new_v4()));

        let inner = self.backend.open_write(&temp).map_err(|e| path.error(e))?;
        let digests = self.digest_set(provider, path);

        tracing::debug!(%path, temp = %temp.display(), "opened for write");
        Ok(RepositoryOutputStream {
            path: path.clone(),
            target,
            temp,
            backend: Arc::clone(&self.backend),
            writer: Some(DigestWriter::new(inner, digests)),
        })
    }

    /// Writes `bytes` to `path` and returns the finalized digests.
    pub fn write_bytes(&self, path: &RepositoryPath, bytes: &[u8]) -> StorageResult<Checksums> {
        let mut stream = self.open_write(path)?;
        stream
            .write_all(bytes)
            .map_err(|e| path.error(FilesError::io(path.physical_path(), e)))?;
        stream.close()
    }

    fn digest_set(&self, provider: LayoutProvider, path: &RepositoryPath) -> DigestSet {
        if provider.is_checksum(path.relative()) {
            return DigestSet::empty(provider.checksum_encoding());
        }
        DigestSet::new(&provider.digest_algorithms(), provider.checksum_encoding())
    }

    // ========================================================================
    // Checksums
    // ========================================================================

    /// Checksum of `path` for `algorithm`.
    ///
    /// Returns the side-file value when present. Otherwise the digest is computed, persisted
    /// as a new side-file and returned. Checksum files themselves have no checksum.
    pub fn checksum(
        &self,
        path: &RepositoryPath,
        algorithm: DigestAlgorithm,
    ) -> StorageResult<Option<String>> {
        let provider = self.provider(path)?;
        if provider.is_checksum(path.relative()) {
            return Ok(None);
        }
        let physical = path.physical_path();
        if !self.backend.exists(&physical) {
            return Err(path.not_found());
        }
        if self.backend.is_dir(&physical) {
            return Err(path.error(FilesError::IsDirectory(physical)));
        }

        if let Some(value) = self
            .checksums
            .read_for(&physical, algorithm)
            .map_err(|e| path.error(e))?
        {
            return Ok(Some(value));
        }

        let computed = self
            .checksums
            .compute(&physical, &[algorithm], provider.checksum_encoding())
            .map_err(|e| path.error(e))?;
        let Some(value) = computed.get(&algorithm).cloned() else {
            return Ok(None);
        };
        self.checksums
            .write_for(&physical, algorithm, &value, false)
            .map_err(|e| path.error(e))?;
        Ok(Some(value))
    }

    /// Persists `checksums` as side-files of `path`. Returns how many files were written.
    pub fn store_checksums(
        &self,
        path: &RepositoryPath,
        checksums: &Checksums,
        force: bool,
    ) -> StorageResult<usize> {
        self.checksums
            .write_all(&path.physical_path(), checksums, force)
            .map_err(|e| path.error(e))
    }

    // ========================================================================
    // Delete, trash and undelete
    // ========================================================================

    /// Deletes `path` through its layout's cascade and fires `ArtifactDeleted`.
    ///
    /// With trash enabled and `force` unset the content is moved to the trash instead. Deleting
    /// a missing path is logged and succeeds without an event.
    pub fn delete(&self, path: &RepositoryPath, force: bool) -> StorageResult<()> {
        if path.is_root() {
            return Err(StorageError::InvalidPath {
                path: path.to_string(),
                reason: "the repository root cannot be deleted".into(),
            });
        }
        let provider = self.provider(path)?;
        let existed = self.exists(path);

        provider.delete_path(self, path, force, true)?;

        if existed {
            self.events.dispatch(&RepositoryEvent::ArtifactDeleted {
                path: path.clone(),
                trashed: self.uses_trash(path.repository(), force),
            });
        }
        Ok(())
    }

    /// Trash location of `path`: `<basedir>/<trash>/<relative>`.
    pub fn trash_location(&self, path: &RepositoryPath) -> PathBuf {
        let mut location = self.trash_root(path.repository());
        for segment in path.segments() {
            location.push(segment);
        }
        location
    }

    fn trash_root(&self, repository: &Repository) -> PathBuf {
        repository.basedir().join(self.config.trash_dir_name())
    }

    fn uses_trash(&self, repository: &Repository, force: bool) -> bool {
        repository.trash_enabled() && !force
    }

    /// Removes one file or tree, or moves it to the trash. Returns whether it was trashed.
    pub(crate) fn remove_physical(&self, path: &RepositoryPath, force: bool) -> StorageResult<bool> {
        let physical = path.physical_path();
        if !self.uses_trash(path.repository(), force) {
            self.backend.delete(&physical).map_err(|e| path.error(e))?;
            tracing::debug!(%path, "deleted");
            return Ok(false);
        }

        let trashed = self.trash_location(path);
        if self.backend.exists(&trashed) {
            self.backend.delete(&trashed).map_err(|e| path.error(e))?;
        }
        self.backend
            .move_path(&physical, &trashed)
            .map_err(|e| path.error(e))?;
        tracing::debug!(%path, "moved to trash");
        Ok(true)
    }

    /// Permanently removes everything in the repository's trash. Succeeds on an empty trash.
    pub fn delete_trash(&self, repository: &Arc<Repository>) -> StorageResult<()> {
        let root = self.trash_root(repository);
        if self.backend.exists(&root) {
            self.backend.delete(&root).map_err(|e| {
                StorageError::from_files(&repository.qualified_id(), self.config.trash_dir_name(), e)
            })?;
            tracing::info!(repository = %repository.qualified_id(), "trash emptied");
        }

        self.events.dispatch(&RepositoryEvent::TrashEmptied {
            storage_id: repository.storage_id().clone(),
            repository_id: repository.id().clone(),
        });
        Ok(())
    }

    /// Restores everything in the repository's trash. Returns the number of files restored.
    ///
    /// A trashed file whose original location is occupied again stays in the trash.
    pub fn undelete(&self, repository: &Arc<Repository>) -> StorageResult<usize> {
        let root = self.trash_root(repository);
        let restored = self.restore(repository, &root, repository.basedir())?;
        self.finish_restore(repository, &root, restored);
        Ok(restored)
    }

    /// Restores one trashed path (file or directory) with its checksum side-files.
    pub fn undelete_path(&self, path: &RepositoryPath) -> StorageResult<usize> {
        let repository = path.repository();
        let trashed = self.trash_location(path);
        if !self.backend.exists(&trashed) {
            tracing::warn!(%path, "nothing to restore from trash");
            return Ok(0);
        }

        let mut restored = self.restore(repository, &trashed, &path.physical_path())?;
        if !self.backend.is_dir(&path.physical_path()) {
            let provider = self.provider(path)?;
            for sibling in provider.checksum_siblings(path.relative()) {
                let sibling = RepositoryPath::new(Arc::clone(repository), &sibling)?;
                let from = self.trash_location(&sibling);
                if self.backend.exists(&from) {
                    restored += self.restore(repository, &from, &sibling.physical_path())?;
                }
            }
        }

        self.finish_restore(repository, &self.trash_root(repository), restored);
        Ok(restored)
    }

    fn finish_restore(&self, repository: &Arc<Repository>, trash_root: &Path, restored: usize) {
        if self.backend.is_dir(trash_root) {
            if let Err(e) = self.prune_empty_dirs(trash_root) {
                tracing::warn!(repository = %repository.qualified_id(), error = %e, "failed to tidy trash");
            }
        }
        tracing::info!(repository = %repository.qualified_id(), restored, "trash restored");
        self.events.dispatch(&RepositoryEvent::TrashRestored {
            storage_id: repository.storage_id().clone(),
            repository_id: repository.id().clone(),
            restored,
        });
    }

    /// Moves `from` (file or tree) to `to` without overwriting anything.
    fn restore(&self, repository: &Repository, from: &Path, to: &Path) -> StorageResult<usize> {
        let context = |e: FilesError| {
            StorageError::from_files(
                &repository.qualified_id(),
                &from.display().to_string(),
                e,
            )
        };

        if !self.backend.exists(from) {
            return Ok(0);
        }

        if !self.backend.is_dir(from) {
            if self.backend.exists(to) {
                tracing::warn!(
                    target_path = %to.display(),
                    "not restoring over an existing file; it stays in trash"
                );
                return Ok(0);
            }
            self.backend.move_path(from, to).map_err(context)?;
            return Ok(1);
        }

        let mut restored = 0;
        for child in self.backend.list_children(from).map_err(context)? {
            let Some(name) = child.file_name() else {
                continue;
            };
            restored += self.restore(repository, &child, &to.join(name))?;
        }
        Ok(restored)
    }

    /// Removes empty directories below and including `dir`. Returns whether `dir` was removed.
    fn prune_empty_dirs(&self, dir: &Path) -> Result<bool, FilesError> {
        let mut empty = true;
        for child in self.backend.list_children(dir)? {
            if !self.backend.is_dir(&child) || !self.prune_empty_dirs(&child)? {
                empty = false;
            }
        }
        if empty {
            self.backend.delete(dir)?;
        }
        Ok(empty)
    }
}

// ============================================================================
// Input stream
// ============================================================================

/// A read stream over a repository file with its digests attached.
pub struct RepositoryInputStream {
    path: RepositoryPath,
    reader: DigestReader<Box<dyn Read + Send>>,
}

impl RepositoryInputStream {
    pub fn path(&self) -> &RepositoryPath {
        &self.path
    }

    pub fn digests(&self) -> &DigestSet {
        self.reader.digests()
    }

    pub fn algorithms(&self) -> Vec<DigestAlgorithm> {
        self.reader.digests().algorithms().collect()
    }

    /// The checksum to report: the side-file value when one exists, otherwise the streamed
    /// digest (complete once the stream is exhausted).
    pub fn checksum(&mut self, algorithm: DigestAlgorithm) -> Option<String> {
        self.reader.digests_mut().checksum(algorithm)
    }

    /// The digest of the bytes streamed so far, ignoring any side-file.
    pub fn computed(&mut self, algorithm: DigestAlgorithm) -> Option<String> {
        self.reader.finalize(algorithm)
    }

    /// Reads to the end so every digest covers the whole file.
    pub fn drain(&mut self) -> StorageResult<u64> {
        let physical = self.path.physical_path();
        self.reader
            .drain()
            .map_err(|e| self.path.error(FilesError::io(physical, e)))
    }

    /// Compares the side-file values against the streamed digests.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ChecksumMismatch`] for the first side-file that disagrees.
    pub fn verify(&mut self) -> StorageResult<()> {
        self.reader
            .digests_mut()
            .verify()
            .map_err(|e| self.path.error(e))
    }
}

impl Read for RepositoryInputStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl fmt::Debug for RepositoryInputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryInputStream")
            .field("path", &self.path)
            .field("digests", self.reader.digests())
            .finish()
    }
}

// ============================================================================
// Output stream
// ============================================================================

/// A write stream into a repository file.
///
/// Bytes land in a temp file. [`Self::close`] finalizes the digests, verifies any expected
/// checksums and moves the temp file into place. Dropping the stream without closing it
/// discards the temp file.
pub struct RepositoryOutputStream {
    path: RepositoryPath,
    target: PathBuf,
    temp: PathBuf,
    backend: Arc<dyn StorageBackend>,
    writer: Option<DigestWriter<Box<dyn Write + Send>>>,
}

impl RepositoryOutputStream {
    pub fn path(&self) -> &RepositoryPath {
        &self.path
    }

    pub fn bytes_written(&self) -> u64 {
        self.writer
            .as_ref()
            .map(|w| w.digests().bytes_processed())
            .unwrap_or(0)
    }

    /// Records a checksum supplied out of band (e.g. by the deploying client).
    ///
    /// An algorithm the layout does not carry is added if no bytes have been written yet.
    /// Returns whether the expectation was recorded.
    pub fn expect_checksum(&mut self, algorithm: DigestAlgorithm, value: &str) -> bool {
        let Some(writer) = self.writer.as_mut() else {
            return false;
        };
        let digests = writer.digests_mut();
        if !digests.contains(algorithm) && digests.bytes_processed() == 0 {
            digests.add_algorithm(algorithm);
        }
        digests.set_expected(algorithm, value)
    }

    /// Flushes, verifies and publishes the file.
    ///
    /// Digests are finalized before anything can fail, so they are always complete.
    ///
    /// # Returns
    ///
    /// The finalized digest of every attached algorithm.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ChecksumMismatch`] if an expected checksum disagrees with the
    /// written bytes, or an I/O error if the flush or the final move fails. The target is left
    /// untouched in every error case.
    pub fn close(mut self) -> StorageResult<Checksums> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(Checksums::new());
        };

        let flushed = writer.finish();
        let verified = writer.digests_mut().verify();
        let checksums = writer.digests_mut().finalize_all();
        drop(writer);

        if let Err(e) = flushed {
            self.discard_temp();
            return Err(self.path.error(FilesError::io(&self.temp, e)));
        }
        if let Err(e) = verified {
            self.discard_temp();
            return Err(self.path.error(e));
        }
        if let Err(e) = self.backend.move_path(&self.temp, &self.target) {
            self.discard_temp();
            return Err(self.path.error(e));
        }

        tracing::debug!(path = %self.path, digests = checksums.len(), "closed output stream");
        Ok(checksums)
    }

    fn discard_temp(&self) {
        if !self.backend.exists(&self.temp) {
            return;
        }
        if let Err(e) = self.backend.delete(&self.temp) {
            tracing::warn!(temp = %self.temp.display(), error = %e, "failed to remove temp file");
        }
    }
}

impl Write for RepositoryOutputStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.writer.as_mut() {
            Some(writer) => writer.write(buf),
            None => Err(io::Error::other("output stream is closed")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.writer.as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for RepositoryOutputStream {
    fn drop(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            writer.digests_mut().finalize_all();
            drop(writer);
            self.discard_temp();
            tracing::warn!(path = %self.path, "output stream dropped without close; write discarded");
        }
    }
}

impl fmt::Debug for RepositoryOutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryOutputStream")
            .field("path", &self.path)
            .field("temp", &self.temp)
            .field("open", &self.writer.is_some())
            .finish()
    }
}
