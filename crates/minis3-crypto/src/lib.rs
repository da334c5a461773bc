//! # minis3 Crypto
//!
//! Digest primitives shared by the minis3 storage system.
//!
//! This crate provides:
//! - **Content checksums**: hex-encoded SHA-256 over the exact bytes of an object version
//! - **Placement hashing**: the 64-bit prefix of a SHA-256 digest used to rank storage nodes
//! - **Verification**: comparison of a payload against a recorded checksum
//!
//! ## Example
//!
//! ```rust
//! use minis3_crypto::hashing::{checksum, verify_checksum};
//!
//! let sum = checksum(b"Hello, World!");
//! assert!(verify_checksum(b"Hello, World!", &sum).is_ok());
//! ```

pub mod error;
pub mod hashing;

pub use error::{CryptoError, Result};
pub use hashing::{checksum, digest_prefix_u64, sha256, verify_checksum, Sha256Hash};
