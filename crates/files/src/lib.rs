//! Depot file layer
//!
//! Byte-level building blocks of the depot storage core. Nothing here knows about
//! repositories, layouts or coordinates; it works on physical paths only.
//!
//! ## Components
//!
//! - [`StorageBackend`]: the capability set the core needs from physical storage
//!   (open-read, open-write, exists, is-directory, create-directories, delete, list-children,
//!   move/copy, file-size), with [`LocalStorageBackend`] over `std::fs`
//! - [`DigestAlgorithm`] and [`DigestSet`]: ordered, incrementally fed digest accumulators with
//!   idempotent finalization
//! - [`DigestReader`] and [`DigestWriter`]: stream decorators that feed every transferred byte
//!   into a [`DigestSet`]
//! - [`ChecksumFiles`]: sibling checksum side-files (`<artifact>.<algorithm>`)
//!
//! ## Example Usage
//!
//! ```no_run
//! use depot_files::{DigestAlgorithm, DigestEncoding, DigestSet, DigestWriter};
//! use std::io::Write;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let digests = DigestSet::new(
//!     &[DigestAlgorithm::Md5, DigestAlgorithm::Sha1],
//!     DigestEncoding::Hex,
//! );
//! let mut writer = DigestWriter::new(Vec::new(), digests);
//! writer.write_all(b"artifact bytes")?;
//! let checksums = writer.finish()?;
//! assert!(checksums.contains_key(&DigestAlgorithm::Sha1));
//! # Ok(())
//! # }
//! ```

mod backend;
mod checksum;
mod constants;
mod digest;
mod stream;

pub use backend::{LocalStorageBackend, StorageBackend};
pub use checksum::{ChecksumFiles, ChecksumReport};
pub use constants::COPY_BUFFER_SIZE;
pub use digest::{Checksums, DigestAlgorithm, DigestEncoding, DigestSet};
pub use stream::{DigestReader, DigestWriter};

use std::path::PathBuf;

/// Errors that can occur during file operations
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    /// Physical target does not exist
    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Physical target is a directory where a file was expected
    #[error("is a directory: {}", .0.display())]
    IsDirectory(PathBuf),

    /// Path validation failed
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Digest algorithm name is not supported
    #[error("unsupported digest algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Computed digest disagrees with the expected digest
    #[error("{algorithm} checksum mismatch: expected {expected}, computed {actual}")]
    ChecksumMismatch {
        algorithm: DigestAlgorithm,
        expected: String,
        actual: String,
    },

    /// I/O error with the path it concerned
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FilesError {
    /// Wraps an I/O error, mapping `NotFound` to [`FilesError::NotFound`].
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            return FilesError::NotFound(path);
        }
        FilesError::Io { path, source }
    }
}

pub type FilesResult<T> = std::result::Result<T, FilesError>;
