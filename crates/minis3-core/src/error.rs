//! Error types for the minis3-core crate

use thiserror::Error;

/// Result type alias using `CoreError`
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur in placement, replication and versioning
#[derive(Error, Debug)]
pub enum CoreError {
    /// Fewer UP nodes than the requested replica count
    #[error("insufficient replicas: required {required}, available {available}")]
    InsufficientReplicas { required: usize, available: usize },

    /// Replica count must be at least one
    #[error("invalid replication factor: {0}")]
    InvalidReplicationFactor(usize),

    /// A storage node could not be reached
    #[error("node unreachable: {0}")]
    NodeUnreachable(String),

    /// A storage node rejected a request
    #[error("node {node} error: {message}")]
    NodeError { node: String, message: String },

    /// Version number was never written for the entry
    #[error("version {version} not found for {bucket}/{key}")]
    VersionNotFound {
        bucket: String,
        key: String,
        version: u64,
    },

    /// Version exists but has been deleted
    #[error("version {version} of {bucket}/{key} has been deleted")]
    VersionGone {
        bucket: String,
        key: String,
        version: u64,
    },

    /// Every version of the entry is tombstoned, or none was ever written
    #[error("no versions available for {bucket}/{key}")]
    NoVersionsAvailable { bucket: String, key: String },

    /// Object entry not found
    #[error("object not found: {bucket}/{key}")]
    EntryNotFound { bucket: String, key: String },

    /// Entry was dropped together with its bucket
    #[error("object entry #{entry_id} no longer exists")]
    EntryRemoved { entry_id: u64 },

    /// Bucket not found
    #[error("bucket not found: {0}")]
    BucketNotFound(String),

    /// Bucket already exists
    #[error("bucket already exists: {0}")]
    BucketAlreadyExists(String),

    /// Bucket still holds live objects
    #[error("bucket is not empty: {0}")]
    BucketNotEmpty(String),

    /// Storage node not found
    #[error("node not found: {0}")]
    NodeNotFound(String),

    /// Storage node name already registered
    #[error("node already exists: {0}")]
    NodeAlreadyExists(String),

    /// Invalid bucket name
    #[error("invalid bucket name: {0}")]
    InvalidBucketName(String),

    /// Invalid object key
    #[error("invalid object key: {0}")]
    InvalidObjectKey(String),

    /// Invalid node name or address
    #[error("invalid node: {0}")]
    InvalidNode(String),

    /// No replica of the version could be read
    #[error("all {attempted} replicas failed for {bucket}/{key} version {version}")]
    AllReplicasFailed {
        bucket: String,
        key: String,
        version: u64,
        attempted: usize,
    },

    /// Not a single replica write succeeded
    #[error("no replica written for {bucket}/{key} version {version}")]
    NoReplicaWritten {
        bucket: String,
        key: String,
        version: u64,
    },

    /// Version counter kept moving under us
    #[error("concurrent allocation conflict on entry {entry_id} after {attempts} attempts")]
    ConcurrentAllocationConflict { entry_id: u64, attempts: u32 },

    /// Blob node error
    #[error("blob node error: {0}")]
    BlobNode(#[from] minis3_blockstore::BlobNodeError),

    /// Crypto error
    #[error("crypto error: {0}")]
    Crypto(#[from] minis3_crypto::CryptoError),
}

impl CoreError {
    /// Whether the error is caused by bad caller input
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidBucketName(_)
                | Self::InvalidObjectKey(_)
                | Self::InvalidNode(_)
                | Self::InvalidReplicationFactor(_)
        )
    }
}
