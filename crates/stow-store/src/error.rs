use std::fmt;

use stow_codec::CodecError;

/// Errors reported by a [`Transport`](crate::traits::Transport).
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The bucket does not exist.
    #[error("bucket does not exist: {0}")]
    NoSuchBucket(String),

    /// The object does not exist.
    #[error("object does not exist: {bucket}/{key}")]
    NoSuchKey { bucket: String, key: String },

    /// The bucket exists and belongs to someone else.
    #[error("bucket already exists: {0}")]
    BucketAlreadyExists(String),

    /// The bucket exists and is already owned by the caller.
    #[error("bucket already owned by you: {0}")]
    BucketAlreadyOwnedByYou(String),

    /// The bucket still holds objects.
    #[error("bucket not empty: {0}")]
    BucketNotEmpty(String),

    #[error("invalid bucket name {name:?}: {reason}")]
    InvalidBucketName { name: String, reason: String },

    #[error("invalid object key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    /// The payload stream did not yield the declared number of bytes.
    #[error("payload length mismatch: declared {declared}, read {actual}")]
    LengthMismatch { declared: u64, actual: u64 },

    /// I/O error from the underlying backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal transport error: {0}")]
    Internal(String),
}

impl TransportError {
    /// Whether the error reports a missing object or bucket.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NoSuchKey { .. } | Self::NoSuchBucket(_))
    }

    /// Whether the error reports that a bucket already exists.
    pub fn is_bucket_exists(&self) -> bool {
        matches!(
            self,
            Self::BucketAlreadyExists(_) | Self::BucketAlreadyOwnedByYou(_)
        )
    }

    /// S3-style error code, as reported in [`DeleteFailure::code`].
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoSuchBucket(_) => "NoSuchBucket",
            Self::NoSuchKey { .. } => "NoSuchKey",
            Self::BucketAlreadyExists(_) => "BucketAlreadyExists",
            Self::BucketAlreadyOwnedByYou(_) => "BucketAlreadyOwnedByYou",
            Self::BucketNotEmpty(_) => "BucketNotEmpty",
            Self::InvalidBucketName { .. } => "InvalidBucketName",
            Self::InvalidKey { .. } | Self::LengthMismatch { .. } => "InvalidArgument",
            Self::Io(e) if e.kind() == std::io::ErrorKind::PermissionDenied => "AccessDenied",
            Self::Io(_) | Self::Internal(_) => "InternalError",
        }
    }
}

/// Result alias for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// One object a batch delete could not remove.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeleteFailure {
    pub bucket: String,
    pub key: String,
    /// Machine-readable error code, e.g. `AccessDenied`.
    pub code: String,
    pub message: String,
}

impl DeleteFailure {
    /// Record `error` as the reason `bucket/key` was not removed.
    pub fn from_error(bucket: &str, key: &str, error: &TransportError) -> Self {
        Self {
            bucket: bucket.to_string(),
            key: key.to_string(),
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }
}

impl fmt::Display for DeleteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}: {} ({})",
            self.bucket, self.key, self.message, self.code
        )
    }
}

/// Errors from [`StorageClient`](crate::client::StorageClient) operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    /// A batch delete finished with per-object failures.
    #[error("failed to remove {} object(s):\n{}", .failures.len(), join_failures(.failures))]
    BatchRemoval { failures: Vec<DeleteFailure> },

    /// Configuration could not be loaded or parsed.
    #[error("configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Whether the error reports a missing object or bucket.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_not_found())
    }
}

fn join_failures(failures: &[DeleteFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
