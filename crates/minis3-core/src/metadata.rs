//! Bucket, object, version and node metadata types

use crate::{CoreError, Result};
use chrono::{DateTime, Utc};
use minis3_blockstore::NodeEndpoint;
use serde::{Deserialize, Serialize};

/// Maximum object key length in bytes
pub const MAX_KEY_LENGTH: usize = 1024;

/// A named namespace of objects
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    pub id: u64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Bucket {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}

/// One key inside a bucket; owns the version counter
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectEntry {
    pub id: u64,
    pub bucket_id: u64,
    pub key: String,
    pub created_at: DateTime<Utc>,
    /// Next version number to hand out; starts at 1
    pub next_version: u64,
}

impl ObjectEntry {
    pub fn new(id: u64, bucket_id: u64, key: impl Into<String>) -> Self {
        Self {
            id,
            bucket_id,
            key: key.into(),
            created_at: Utc::now(),
            next_version: 1,
        }
    }
}

/// Outcome of the write to one replica, as recorded at upload time
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WriteStatus {
    Success,
    Failed,
}

impl WriteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Where one copy of a version lives
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplicaDescriptor {
    pub node_id: u64,
    pub node_name: String,
    pub storage_path: String,
    pub write_status: WriteStatus,
}

/// An immutable snapshot of an object's bytes
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectVersion {
    pub entry_id: u64,
    pub version: u64,
    pub size_bytes: u64,
    /// Hex SHA-256 of the stored bytes
    pub checksum: String,
    /// Replicas in placement order; this is also the read preference order
    pub replicas: Vec<ReplicaDescriptor>,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl ObjectVersion {
    /// Number of replicas whose write succeeded
    pub fn successful_replicas(&self) -> usize {
        self.replicas
            .iter()
            .filter(|r| r.write_status.is_success())
            .count()
    }
}

/// Registry status of a storage node
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeStatus {
    Up,
    Down,
    Maintenance,
}

impl NodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "UP",
            Self::Down => "DOWN",
            Self::Maintenance => "MAINTENANCE",
        }
    }
}

impl std::str::FromStr for NodeStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "UP" => Ok(Self::Up),
            "DOWN" => Ok(Self::Down),
            "MAINTENANCE" => Ok(Self::Maintenance),
            other => Err(CoreError::InvalidNode(format!("unknown status: {}", other))),
        }
    }
}

/// A storage node known to the registry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageNode {
    pub id: u64,
    pub name: String,
    pub base_url: String,
    pub status: NodeStatus,
    pub last_heartbeat: DateTime<Utc>,
}

impl StorageNode {
    pub fn new(id: u64, name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            base_url: base_url.into(),
            status: NodeStatus::Up,
            last_heartbeat: Utc::now(),
        }
    }

    /// Set status
    pub fn with_status(mut self, status: NodeStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_up(&self) -> bool {
        self.status == NodeStatus::Up
    }

    /// Address the blob client talks to
    pub fn endpoint(&self) -> NodeEndpoint {
        NodeEndpoint::new(self.id, self.name.clone(), self.base_url.clone())
    }
}

/// Key fed to the placement hash for an object
pub fn replication_key(bucket: &str, key: &str) -> String {
    format!("{}/{}", bucket, key)
}

/// Path of a version's blob; identical on every replica
pub fn storage_path(bucket: &str, entry_id: u64, version: u64) -> String {
    format!("{}/{}/{}/blob", bucket, entry_id, version)
}

/// Validate bucket name according to S3 rules
pub fn validate_bucket_name(name: &str) -> Result<()> {
    if name.len() < 3 || name.len() > 63 {
        return Err(CoreError::InvalidBucketName(
            "Bucket name must be between 3 and 63 characters".to_string(),
        ));
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
    {
        return Err(CoreError::InvalidBucketName(
            "Bucket name can only contain lowercase letters, numbers, hyphens, and periods"
                .to_string(),
        ));
    }

    let alnum = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit();
    if !name.starts_with(alnum) || !name.ends_with(alnum) {
        return Err(CoreError::InvalidBucketName(
            "Bucket name must start and end with a letter or number".to_string(),
        ));
    }

    Ok(())
}

/// Validate object key
pub fn validate_object_key(key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(CoreError::InvalidObjectKey("Key cannot be empty".to_string()));
    }

    if key.len() > MAX_KEY_LENGTH {
        return Err(CoreError::InvalidObjectKey(format!(
            "Key cannot exceed {} bytes",
            MAX_KEY_LENGTH
        )));
    }

    Ok(())
}

/// Validate a storage node name and base URL
pub fn validate_node(name: &str, base_url: &str) -> Result<()> {
    if name.len() < 2 || name.len() > 50 {
        return Err(CoreError::InvalidNode(
            "Node name must be between 2 and 50 characters".to_string(),
        ));
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(CoreError::InvalidNode(
            "Node name can only contain letters, numbers, hyphens, underscores, and periods"
                .to_string(),
        ));
    }

    let alnum = |c: char| c.is_ascii_alphanumeric();
    if !name.starts_with(alnum) || !name.ends_with(alnum) {
        return Err(CoreError::InvalidNode(
            "Node name must start and end with a letter or number".to_string(),
        ));
    }

    let host = base_url
        .strip_prefix("http://")
        .or_else(|| base_url.strip_prefix("https://"));
    match host {
        Some(rest) if !rest.trim_matches('/').is_empty() && !rest.contains(char::is_whitespace) => {
            Ok(())
        }
        _ => Err(CoreError::InvalidNode(format!(
            "Base URL must be an http(s) URL: {}",
            base_url
        ))),
    }
}
