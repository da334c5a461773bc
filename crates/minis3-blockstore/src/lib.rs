//! # minis3 Blockstore
//!
//! Storage node access layer for the minis3 object store.
//!
//! This crate provides:
//! - **Blob node client**: a uniform store/fetch/delete/health contract against one node
//! - **HTTP client**: talks to `minis3-node` servers with per-call timeouts
//! - **Memory client**: in-process nodes with fault injection for tests
//! - **Local store**: the filesystem backend a storage node serves from
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │        Replication Coordinator          │
//! ├─────────────────────────────────────────┤
//! │          BlobNodeClient Trait           │
//! ├────────────────────┬────────────────────┤
//! │ HttpBlobNodeClient │ MemoryBlobNodeClient│
//! ├────────────────────┴────────────────────┤
//! │      minis3-node  →  FsBlobStore        │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use minis3_blockstore::{BlobNodeClient, HttpBlobNodeClient, HttpClientConfig, NodeEndpoint};
//!
//! let client = HttpBlobNodeClient::new(HttpClientConfig::default())?;
//! let node = NodeEndpoint::new(1, "node-a", "http://10.0.0.5:8081");
//! client.store(&node, "photos/7/1/blob", data).await?;
//! let bytes = client.fetch(&node, "photos/7/1/blob").await?;
//! ```

pub mod error;
pub mod fs;
pub mod http;
pub mod memory;

pub use error::{BlobNodeError, Result};
pub use fs::{validate_blob_path, FsBlobStore, StoreHealth};
pub use http::{HttpBlobNodeClient, HttpClientConfig};
pub use memory::MemoryBlobNodeClient;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Default maximum blob size accepted by a storage node (10 MiB)
pub const DEFAULT_MAX_BLOB_SIZE: u64 = 10 * 1024 * 1024;

/// Address of a single storage node as seen by a client
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeEndpoint {
    /// Registry id of the node
    pub id: u64,
    /// Unique node name
    pub name: String,
    /// Base URL, e.g. `http://10.0.0.5:8081`
    pub address: String,
}

impl NodeEndpoint {
    /// Create a new endpoint
    pub fn new(id: u64, name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            address: address.into(),
        }
    }

    /// Join a route onto the base address
    pub fn url(&self, route: &str) -> String {
        format!(
            "{}/{}",
            self.address.trim_end_matches('/'),
            route.trim_start_matches('/')
        )
    }
}

/// Liveness reported by a node's health endpoint
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NodeHealth {
    Up,
    Down,
}

impl NodeHealth {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "UP",
            Self::Down => "DOWN",
        }
    }
}

/// Client for the blob protocol spoken by every storage node.
///
/// `path` is an opaque relative address chosen by the caller. The node is
/// responsible for rejecting paths that would escape its storage root.
#[async_trait]
pub trait BlobNodeClient: Send + Sync {
    /// Store `data` at `path` on `node`, replacing any previous content
    async fn store(&self, node: &NodeEndpoint, path: &str, data: Bytes) -> Result<()>;

    /// Fetch the bytes stored at `path` on `node`
    async fn fetch(&self, node: &NodeEndpoint, path: &str) -> Result<Bytes>;

    /// Delete the bytes at `path` on `node`; deleting a missing path succeeds
    async fn delete(&self, node: &NodeEndpoint, path: &str) -> Result<()>;

    /// Probe the node. Transport failures report `Down`.
    async fn health(&self, node: &NodeEndpoint) -> NodeHealth;
}

#[async_trait]
impl<C: BlobNodeClient + ?Sized> BlobNodeClient for Arc<C> {
    async fn store(&self, node: &NodeEndpoint, path: &str, data: Bytes) -> Result<()> {
        (**self).store(node, path, data).await
    }

    async fn fetch(&self, node: &NodeEndpoint, path: &str) -> Result<Bytes> {
        (**self).fetch(node, path).await
    }

    async fn delete(&self, node: &NodeEndpoint, path: &str) -> Result<()> {
        (**self).delete(node, path).await
    }

    async fn health(&self, node: &NodeEndpoint) -> NodeHealth {
        (**self).health(node).await
    }
}
