//! Hashing utilities using SHA-256
//!
//! One primitive serves two purposes in minis3:
//! - Content checksums recorded on every object version
//! - Uniformly distributed scores for rendezvous placement

use crate::{CryptoError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Size of a SHA-256 digest in bytes
pub const HASH_BYTE_SIZE: usize = 32;

/// Type alias for digest bytes
pub type HashOutput = [u8; HASH_BYTE_SIZE];

/// A SHA-256 digest with hex conversions
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sha256Hash(HashOutput);

impl Sha256Hash {
    /// Create a new hash from bytes
    pub fn new(bytes: HashOutput) -> Self {
        Self(bytes)
    }

    /// Parse a lowercase or uppercase hex string
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s)?;
        if bytes.len() != HASH_BYTE_SIZE {
            return Err(CryptoError::InvalidDigest(format!(
                "digest must be {} bytes, got {}",
                HASH_BYTE_SIZE,
                bytes.len()
            )));
        }
        let mut arr = [0u8; HASH_BYTE_SIZE];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Get the hash as bytes
    pub fn as_bytes(&self) -> &HashOutput {
        &self.0
    }

    /// Convert to a lowercase hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// The first 8 bytes read as a big-endian unsigned integer
    pub fn prefix_u64(&self) -> u64 {
        let mut head = [0u8; 8];
        head.copy_from_slice(&self.0[..8]);
        u64::from_be_bytes(head)
    }
}

impl fmt::Debug for Sha256Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sha256Hash({})", self.to_hex())
    }
}

impl fmt::Display for Sha256Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl AsRef<[u8]> for Sha256Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<HashOutput> for Sha256Hash {
    fn from(bytes: HashOutput) -> Self {
        Self(bytes)
    }
}

/// Hash the given data using SHA-256
pub fn sha256(data: &[u8]) -> Sha256Hash {
    let digest = Sha256::digest(data);
    let mut arr = [0u8; HASH_BYTE_SIZE];
    arr.copy_from_slice(&digest);
    Sha256Hash(arr)
}

/// Hex-encoded SHA-256 checksum of an object payload
pub fn checksum(data: &[u8]) -> String {
    sha256(data).to_hex()
}

/// Check `data` against a recorded hex checksum
pub fn verify_checksum(data: &[u8], expected: &str) -> Result<()> {
    let actual = checksum(data);
    if actual.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(CryptoError::HashMismatch {
            expected: expected.to_string(),
            actual,
        })
    }
}

/// Leading 64 bits of the SHA-256 digest of `input`
pub fn digest_prefix_u64(input: &[u8]) -> u64 {
    sha256(input).prefix_u64()
}
