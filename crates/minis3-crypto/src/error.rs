//! Error types for the minis3-crypto crate

use thiserror::Error;

/// Result type alias using `CryptoError`
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Errors that can occur while handling digests
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Digest has the wrong number of bytes
    #[error("invalid digest: {0}")]
    InvalidDigest(String),

    /// Hash verification failed
    #[error("hash verification failed: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    /// Hex decoding error
    #[error("hex decoding error: {0}")]
    HexDecode(#[from] hex::FromHexError),
}
