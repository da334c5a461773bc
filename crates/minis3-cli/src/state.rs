//! Application state

use crate::config::{GatewayConfig, NodeServerConfig};
use minis3_blockstore::{FsBlobStore, HttpBlobNodeClient};
use minis3_core::{CoreError, MemoryMetadataStore, MemoryNodeRegistry, ObjectService};
use std::sync::Arc;
use tracing::{info, warn};

/// Object service as wired by the gateway
pub type GatewayService = ObjectService<MemoryMetadataStore, MemoryNodeRegistry, HttpBlobNodeClient>;

/// Application state shared across gateway handlers
pub struct AppState {
    /// Gateway configuration
    pub config: GatewayConfig,
    /// Placement, replication and versioning
    pub service: GatewayService,
}

impl AppState {
    /// Create a new application state
    pub async fn new(config: GatewayConfig) -> anyhow::Result<Self> {
        let client = Arc::new(HttpBlobNodeClient::new(config.client_config())?);
        let service = ObjectService::new(
            Arc::new(MemoryMetadataStore::new()),
            Arc::new(MemoryNodeRegistry::new()),
            client,
            config.service_config(),
        );

        for seed in &config.nodes {
            match service.register_node(&seed.name, &seed.base_url).await {
                Ok(node) => info!(node = %node.name, base_url = %node.base_url, "seed node registered"),
                Err(CoreError::NodeAlreadyExists(name)) => {
                    warn!(node = %name, "duplicate seed node ignored")
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!("metadata is held in memory and will not survive a restart");

        Ok(Self { config, service })
    }
}

/// State of a storage node server
pub struct NodeState {
    /// Node configuration
    pub config: NodeServerConfig,
    /// Local blob store
    pub store: FsBlobStore,
}

impl NodeState {
    /// Open the node's base directory
    pub async fn new(config: NodeServerConfig) -> anyhow::Result<Self> {
        let store = FsBlobStore::open(&config.base_dir, config.max_file_size).await?;
        Ok(Self { config, store })
    }
}
