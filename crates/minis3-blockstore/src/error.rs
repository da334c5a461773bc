//! Error types for the minis3-blockstore crate

use thiserror::Error;

/// Result type alias using `BlobNodeError`
pub type Result<T> = std::result::Result<T, BlobNodeError>;

/// Errors that can occur while talking to, or acting as, a storage node
#[derive(Error, Debug)]
pub enum BlobNodeError {
    /// Nothing stored at the path
    #[error("blob not found: {0}")]
    NotFound(String),

    /// Node could not be reached
    #[error("connection error: {0}")]
    Connection(String),

    /// Node did not answer in time
    #[error("operation timed out after {millis}ms")]
    Timeout { millis: u64 },

    /// Node answered with a non-success status
    #[error("node returned {status}: {message}")]
    Http { status: u16, message: String },

    /// Node is known to be unavailable
    #[error("node unavailable: {0}")]
    Unavailable(String),

    /// Path rejected by containment rules
    #[error("invalid blob path: {0}")]
    InvalidPath(String),

    /// Blob too large
    #[error("blob too large: {size} bytes exceeds maximum {max} bytes")]
    TooLarge { size: u64, max: u64 },

    /// Empty payload
    #[error("blob cannot be empty")]
    Empty,

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl BlobNodeError {
    /// Whether this error means the bytes are absent rather than unreachable
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Classify a reqwest failure
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout_millis: u64) -> Self {
        if err.is_timeout() {
            BlobNodeError::Timeout {
                millis: timeout_millis,
            }
        } else if err.is_connect() {
            BlobNodeError::Connection(err.to_string())
        } else {
            BlobNodeError::Http {
                status: err.status().map(|s| s.as_u16()).unwrap_or(0),
                message: err.to_string(),
            }
        }
    }
}
