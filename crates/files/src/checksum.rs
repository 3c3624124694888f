//! Checksum side-files.
//!
//! A side-file sits next to its artifact as `<artifact>.<algorithm>` (algorithm lowercased,
//! dashes stripped, e.g. `foo-1.0.jar.sha1`) and holds the encoded digest as ASCII text.
//! Side-files are created lazily and never overwritten unless the caller forces it.

use crate::backend::StorageBackend;
use crate::constants::COPY_BUFFER_SIZE;
use crate::digest::{Checksums, DigestAlgorithm, DigestEncoding, DigestSet};
use crate::stream::DigestReader;
use crate::{FilesError, FilesResult};
use std::ffi::OsString;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Outcome of a bulk [`ChecksumFiles::store_checksums`] walk.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChecksumReport {
    /// Non-checksum files visited
    pub files_processed: usize,
    /// Side-files created or overwritten
    pub checksums_written: usize,
    /// Side-files left alone because they already existed
    pub checksums_skipped: usize,
    /// Files whose checksums could not be computed or written
    pub failed: Vec<PathBuf>,
}

impl ChecksumReport {
    /// Adds the counts of `other` to `self`.
    pub fn absorb(&mut self, other: ChecksumReport) {
        self.files_processed += other.files_processed;
        self.checksums_written += other.checksums_written;
        self.checksums_skipped += other.checksums_skipped;
        self.failed.extend(other.failed);
    }
}

/// Reads, writes and regenerates checksum side-files through a [`StorageBackend`].
#[derive(Debug, Clone)]
pub struct ChecksumFiles {
    backend: Arc<dyn StorageBackend>,
    skipped_directories: Vec<String>,
}

impl ChecksumFiles {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            skipped_directories: Vec::new(),
        }
    }

    /// Directory names never descended into by [`Self::store_checksums`].
    #[must_use]
    pub fn with_skipped_directories<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skipped_directories = names.into_iter().map(Into::into).collect();
        self
    }

    /// Sibling side-file path for `artifact` and `algorithm`.
    pub fn checksum_path(artifact: &Path, algorithm: DigestAlgorithm) -> PathBuf {
        let mut name = OsString::from(artifact.as_os_str());
        name.push(".");
        name.push(algorithm.extension());
        PathBuf::from(name)
    }

    /// Whether `path` names a side-file of any supported algorithm.
    pub fn is_checksum_file(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(DigestAlgorithm::from_extension)
            .is_some()
    }

    /// Reads a side-file, trimming surrounding whitespace.
    ///
    /// Returns `None` when the file is absent or blank.
    ///
    /// # Errors
    ///
    /// Returns `FilesError` if the path is a directory or the file cannot be read.
    pub fn read_if_present(&self, path: &Path) -> FilesResult<Option<String>> {
        if !self.backend.exists(path) {
            return Ok(None);
        }

        let mut content = String::new();
        self.backend
            .open_read(path)?
            .read_to_string(&mut content)
            .map_err(|e| FilesError::io(path, e))?;

        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        Ok(Some(trimmed.to_owned()))
    }

    /// Reads the side-file of `artifact` for `algorithm`.
    pub fn read_for(
        &self,
        artifact: &Path,
        algorithm: DigestAlgorithm,
    ) -> FilesResult<Option<String>> {
        self.read_if_present(&Self::checksum_path(artifact, algorithm))
    }

    /// Writes a side-file.
    ///
    /// No-op when the file exists and `force` is false. Returns whether the file was written.
    pub fn write(&self, path: &Path, digest: &str, force: bool) -> FilesResult<bool> {
        if self.backend.exists(path) && !force {
            return Ok(false);
        }

        let mut writer = self.backend.open_write(path)?;
        writer
            .write_all(digest.trim().as_bytes())
            .and_then(|()| writer.flush())
            .map_err(|e| FilesError::io(path, e))?;
        Ok(true)
    }

    /// Writes the side-file of `artifact` for `algorithm`.
    pub fn write_for(
        &self,
        artifact: &Path,
        algorithm: DigestAlgorithm,
        digest: &str,
        force: bool,
    ) -> FilesResult<bool> {
        self.write(&Self::checksum_path(artifact, algorithm), digest, force)
    }

    /// Writes one side-file per entry of `checksums`. Returns how many were written.
    pub fn write_all(
        &self,
        artifact: &Path,
        checksums: &Checksums,
        force: bool,
    ) -> FilesResult<usize> {
        let mut written = 0;
        for (algorithm, digest) in checksums {
            if self.write_for(artifact, *algorithm, digest, force)? {
                written += 1;
            }
        }
        Ok(written)
    }

    /// Streams a file through a digest reader and returns the finalized digests.
    pub fn compute(
        &self,
        path: &Path,
        algorithms: &[DigestAlgorithm],
        encoding: DigestEncoding,
    ) -> FilesResult<Checksums> {
        let inner = self.backend.open_read(path)?;
        let mut reader = DigestReader::new(
            BufReader::with_capacity(COPY_BUFFER_SIZE, inner),
            DigestSet::new(algorithms, encoding),
        );
        reader.drain().map_err(|e| FilesError::io(path, e))?;
        Ok(reader.digests_mut().finalize_all())
    }

    /// Walks `base` and writes one side-file per non-checksum file per algorithm.
    ///
    /// Checksum files, directories and skipped directory names are not checksummed. A file whose
    /// digests cannot be computed or written is logged and recorded in
    /// [`ChecksumReport::failed`]; the walk continues.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::NotFound`] if `base` does not exist, or an error if a directory
    /// cannot be listed.
    pub fn store_checksums(
        &self,
        base: &Path,
        algorithms: &[DigestAlgorithm],
        encoding: DigestEncoding,
        force: bool,
    ) -> FilesResult<ChecksumReport> {
        if !self.backend.exists(base) {
            return Err(FilesError::NotFound(base.to_path_buf()));
        }

        let mut report = ChecksumReport::default();
        if self.backend.is_dir(base) {
            self.walk(base, algorithms, encoding, force, &mut report)?;
        } else if !Self::is_checksum_file(base) {
            self.store_one(base, algorithms, encoding, force, &mut report);
        }
        Ok(report)
    }

    fn walk(
        &self,
        dir: &Path,
        algorithms: &[DigestAlgorithm],
        encoding: DigestEncoding,
        force: bool,
        report: &mut ChecksumReport,
    ) -> FilesResult<()> {
        for child in self.backend.list_children(dir)? {
            if self.backend.is_dir(&child) {
                let skipped = child
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| self.skipped_directories.iter().any(|s| s == n))
                    .unwrap_or(false);
                if !skipped {
                    self.walk(&child, algorithms, encoding, force, report)?;
                }
                continue;
            }

            if Self::is_checksum_file(&child) {
                continue;
            }

            self.store_one(&child, algorithms, encoding, force, report);
        }
        Ok(())
    }

    fn store_one(
        &self,
        file: &Path,
        algorithms: &[DigestAlgorithm],
        encoding: DigestEncoding,
        force: bool,
        report: &mut ChecksumReport,
    ) {
        report.files_processed += 1;

        let missing: Vec<DigestAlgorithm> = algorithms
            .iter()
            .copied()
            .filter(|alg| force || !self.backend.exists(&Self::checksum_path(file, *alg)))
            .collect();

        report.checksums_skipped += algorithms.len() - missing.len();
        if missing.is_empty() {
            return;
        }

        let result = self
            .compute(file, &missing, encoding)
            .and_then(|checksums| self.write_all(file, &checksums, true));

        match result {
            Ok(written) => report.checksums_written += written,
            Err(e) => {
                tracing::warn!(path = %file.display(), error = %e, "failed to store checksums");
                report.failed.push(file.to_path_buf());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LocalStorageBackend;
    use std::fs;
    use tempfile::TempDir;

    fn checksums() -> ChecksumFiles {
        ChecksumFiles::new(Arc::new(LocalStorageBackend::new()))
    }

    #[test]
    fn test_checksum_path_appends_extension() {
        let path = ChecksumFiles::checksum_path(
            Path::new("/repo/com/example/foo/1.0/foo-1.0.jar"),
            DigestAlgorithm::Sha1,
        );
        assert_eq!(path, Path::new("/repo/com/example/foo/1.0/foo-1.0.jar.sha1"));

        let path = ChecksumFiles::checksum_path(
            Path::new("pkg/1.0/pkg.1.0.nupkg"),
            DigestAlgorithm::Sha512,
        );
        assert_eq!(path, Path::new("pkg/1.0/pkg.1.0.nupkg.sha512"));
    }

    #[test]
    fn test_is_checksum_file() {
        assert!(ChecksumFiles::is_checksum_file(Path::new("a.jar.md5")));
        assert!(ChecksumFiles::is_checksum_file(Path::new("a.jar.sha256")));
        assert!(!ChecksumFiles::is_checksum_file(Path::new("a.jar")));
        assert!(!ChecksumFiles::is_checksum_file(Path::new("maven-metadata.xml")));
    }

    #[test]
    fn test_read_if_present_trims_and_handles_absence() {
        let temp = TempDir::new().unwrap();
        let manager = checksums();
        let path = temp.path().join("foo.jar.md5");

        assert_eq!(manager.read_if_present(&path).unwrap(), None);

        fs::write(&path, "  abc123 \n").unwrap();
        assert_eq!(manager.read_if_present(&path).unwrap().as_deref(), Some("abc123"));

        fs::write(&path, "\n \t").unwrap();
        assert_eq!(manager.read_if_present(&path).unwrap(), None);
    }

    #[test]
    fn test_write_respects_force() {
        let temp = TempDir::new().unwrap();
        let manager = checksums();
        let path = temp.path().join("foo.jar.sha1");

        assert!(manager.write(&path, "first", false).unwrap());
        assert!(!manager.write(&path, "second", false).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "first");

        assert!(manager.write(&path, "third", true).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "third");
    }

    #[test]
    fn test_store_checksums_walks_tree() {
        let temp = TempDir::new().unwrap();
        let manager = checksums().with_skipped_directories([".trash"]);
        let root = temp.path();
        fs::create_dir_all(root.join("com/example/foo/1.0")).unwrap();
        fs::create_dir_all(root.join(".trash")).unwrap();
        fs::write(root.join("com/example/foo/1.0/foo-1.0.jar"), b"jar").unwrap();
        fs::write(root.join("com/example/foo/1.0/foo-1.0.pom"), b"pom").unwrap();
        fs::write(root.join(".trash/old.jar"), b"old").unwrap();

        let algorithms = [DigestAlgorithm::Md5, DigestAlgorithm::Sha1];
        let report = manager
            .store_checksums(root, &algorithms, DigestEncoding::Hex, false)
            .unwrap();

        assert_eq!(report.files_processed, 2);
        assert_eq!(report.checksums_written, 4);
        assert!(report.failed.is_empty());
        assert_eq!(
            fs::read_to_string(root.join("com/example/foo/1.0/foo-1.0.jar.sha1")).unwrap(),
            DigestAlgorithm::Sha1.digest(b"jar", DigestEncoding::Hex)
        );
        assert!(!root.join(".trash/old.jar.md5").exists());

        // Second pass: everything exists, nothing is rewritten and checksum files are skipped.
        let report = manager
            .store_checksums(root, &algorithms, DigestEncoding::Hex, false)
            .unwrap();
        assert_eq!(report.files_processed, 2);
        assert_eq!(report.checksums_written, 0);
        assert_eq!(report.checksums_skipped, 4);
    }

    #[test]
    fn test_store_checksums_force_regenerates() {
        let temp = TempDir::new().unwrap();
        let manager = checksums();
        let artifact = temp.path().join("foo-1.0.jar");
        fs::write(&artifact, b"jar").unwrap();
        fs::write(temp.path().join("foo-1.0.jar.md5"), "stale").unwrap();

        let report = manager
            .store_checksums(&artifact, &[DigestAlgorithm::Md5], DigestEncoding::Hex, true)
            .unwrap();
        assert_eq!(report.checksums_written, 1);
        assert_eq!(
            manager.read_for(&artifact, DigestAlgorithm::Md5).unwrap().unwrap(),
            DigestAlgorithm::Md5.digest(b"jar", DigestEncoding::Hex)
        );
    }

    #[test]
    fn test_store_checksums_missing_base() {
        let temp = TempDir::new().unwrap();
        let result = checksums().store_checksums(
            &temp.path().join("missing"),
            &[DigestAlgorithm::Md5],
            DigestEncoding::Hex,
            false,
        );
        assert!(matches!(result, Err(FilesError::NotFound(_))));
    }
}
