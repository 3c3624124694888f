//! Depot data model.
//!
//! Plain value types shared by every depot crate:
//!
//! - [`StorageId`] and [`RepositoryId`]: validated identifiers
//! - [`Repository`]: one policy-governed storage root holding artifacts of one layout
//! - [`Storage`]: a named collection of repositories
//!
//! Nothing in this crate performs I/O. Repositories are built once at configuration time and
//! shared read-only (behind `Arc`) by the storage core.

mod ids;
mod repository;
mod storage;

pub use ids::{RepositoryId, StorageId};
pub use repository::{Repository, RepositoryPolicy, RepositoryType};
pub use storage::Storage;

/// Errors that can occur when building data model values.
#[derive(Debug, thiserror::Error)]
pub enum TypesError {
    /// Identifier was empty, contained a path separator, or was a relative path component
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Repository policy string is not one of release, snapshot or mixed
    #[error("unknown repository policy: {0}")]
    UnknownPolicy(String),

    /// Repository type string is not one of hosted, proxy or group
    #[error("unknown repository type: {0}")]
    UnknownRepositoryType(String),

    /// A repository with the same id is already registered in the storage
    #[error("repository {repository} already exists in storage {storage}")]
    DuplicateRepository { storage: String, repository: String },

    /// Repository was built for a different storage
    #[error("repository {repository} belongs to storage {expected}, not {actual}")]
    StorageMismatch {
        repository: String,
        expected: String,
        actual: String,
    },
}

pub type TypesResult<T> = std::result::Result<T, TypesError>;
