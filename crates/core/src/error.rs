use depot_files::{DigestAlgorithm, FilesError};
use depot_types::{RepositoryPolicy, TypesError};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("not found: {repository}/{path}")]
    NotFound { repository: String, path: String },
    #[error("is a directory: {repository}/{path}")]
    IsDirectory { repository: String, path: String },
    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },
    #[error("malformed {layout} coordinates '{path}': {reason}")]
    MalformedCoordinates {
        layout: &'static str,
        path: String,
        reason: String,
    },
    #[error("unsupported digest algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error(
        "{algorithm} checksum mismatch for {repository}/{path}: expected {expected}, computed {actual}"
    )]
    ChecksumMismatch {
        repository: String,
        path: String,
        algorithm: DigestAlgorithm,
        expected: String,
        actual: String,
    },
    #[error("corrupt metadata at {repository}/{path}: {reason}")]
    MetadataCorrupt {
        repository: String,
        path: String,
        reason: String,
    },
    #[error("failed to serialize metadata: {0}")]
    MetadataSerialization(String),
    #[error("unknown repository policy: {0}")]
    UnknownPolicy(String),
    #[error("metadata generation is not supported for {policy} repository {repository}")]
    UnsupportedPolicy {
        repository: String,
        policy: RepositoryPolicy,
    },
    #[error("unknown layout: {0}")]
    UnknownLayout(String),
    #[error("{operation} is not supported by the {layout} layout")]
    UnsupportedLayout {
        layout: String,
        operation: &'static str,
    },
    #[error("redeployment is not allowed in {repository}: {path}")]
    RedeploymentNotAllowed { repository: String, path: String },
    #[error("deletion is not allowed in {repository}: {path} ({reason})")]
    DeletionNotAllowed {
        repository: String,
        path: String,
        reason: &'static str,
    },
    #[error("{repository} rejects {path}: {reason}")]
    PolicyViolation {
        repository: String,
        path: String,
        reason: String,
    },
    #[error("catalog error: {0}")]
    Catalog(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Files(#[from] FilesError),
    #[error(transparent)]
    Types(#[from] TypesError),
}

impl StorageError {
    /// Attaches repository and path context to a file-layer error.
    ///
    /// Kinds with a dedicated variant (`NotFound`, `IsDirectory`, `ChecksumMismatch`,
    /// `UnsupportedAlgorithm`) are mapped onto it; everything else is wrapped as-is.
    pub fn from_files(repository: &str, path: &str, error: FilesError) -> Self {
        match error {
            FilesError::NotFound(_) => StorageError::NotFound {
                repository: repository.to_owned(),
                path: path.to_owned(),
            },
            FilesError::IsDirectory(_) => StorageError::IsDirectory {
                repository: repository.to_owned(),
                path: path.to_owned(),
            },
            FilesError::ChecksumMismatch {
                algorithm,
                expected,
                actual,
            } => StorageError::ChecksumMismatch {
                repository: repository.to_owned(),
                path: path.to_owned(),
                algorithm,
                expected,
                actual,
            },
            FilesError::UnsupportedAlgorithm(name) => StorageError::UnsupportedAlgorithm(name),
            other => StorageError::Files(other),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StorageError::NotFound { .. } | StorageError::Files(FilesError::NotFound(_))
        )
    }
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;
