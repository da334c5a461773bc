//! Gateway and storage node configuration

use minis3_blockstore::{HttpClientConfig, DEFAULT_MAX_BLOB_SIZE};
use minis3_core::{ReplicationConfig, ServiceConfig, VersioningConfig, DEFAULT_REPLICATION_FACTOR};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Storage node registered when the gateway starts
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSeed {
    pub name: String,
    pub base_url: String,
}

/// Gateway server configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Replicas per upload when the request does not say
    pub default_replication_factor: usize,
    /// Largest accepted object (bytes)
    pub max_object_size: usize,
    /// Timeout for each storage node call (milliseconds)
    pub per_call_timeout_ms: u64,
    /// TCP connect timeout towards storage nodes (milliseconds)
    pub connect_timeout_ms: u64,
    /// Bound on a whole upload fan-out (milliseconds)
    pub upload_deadline_ms: Option<u64>,
    /// Replica writes in flight per upload
    pub max_parallel_writes: usize,
    /// Verify checksums of fetched bytes
    pub verify_checksums: bool,
    /// Version counter CAS attempts
    pub max_allocation_attempts: u32,
    /// Enable CORS
    pub cors_enabled: bool,
    /// Nodes to register at startup
    pub nodes: Vec<NodeSeed>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            default_replication_factor: DEFAULT_REPLICATION_FACTOR,
            max_object_size: DEFAULT_MAX_BLOB_SIZE as usize,
            per_call_timeout_ms: 30_000,
            connect_timeout_ms: 5_000,
            upload_deadline_ms: None,
            max_parallel_writes: 4,
            verify_checksums: false,
            max_allocation_attempts: 64,
            cors_enabled: true,
            nodes: Vec::new(),
        }
    }
}

impl GatewayConfig {
    /// Load from a file (format by extension) layered with `MINIS3_*` variables
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::with_name(path))
            .add_source(::config::Environment::with_prefix("MINIS3").try_parsing(true))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Blob client settings
    pub fn client_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            timeout: Duration::from_millis(self.per_call_timeout_ms),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
        }
    }

    /// Object service settings
    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            default_replication_factor: self.default_replication_factor,
            replication: ReplicationConfig {
                per_call_timeout: Duration::from_millis(self.per_call_timeout_ms),
                upload_deadline: self.upload_deadline_ms.map(Duration::from_millis),
                max_parallel_writes: self.max_parallel_writes,
                verify_checksums: self.verify_checksums,
            },
            versioning: VersioningConfig {
                max_allocation_attempts: self.max_allocation_attempts,
            },
        }
    }
}

/// Storage node server configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Directory blobs are stored under
    pub base_dir: PathBuf,
    /// Largest accepted blob (bytes)
    pub max_file_size: u64,
}

impl Default for NodeServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8081,
            base_dir: PathBuf::from("./data"),
            max_file_size: DEFAULT_MAX_BLOB_SIZE,
        }
    }
}

impl NodeServerConfig {
    /// Load from a file layered with `MINIS3_NODE_*` variables
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::with_name(path))
            .add_source(::config::Environment::with_prefix("MINIS3_NODE").try_parsing(true))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
