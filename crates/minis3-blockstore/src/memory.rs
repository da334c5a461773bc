//! In-memory storage nodes for testing, with fault injection

use crate::{validate_blob_path, BlobNodeClient, BlobNodeError, NodeEndpoint, NodeHealth, Result};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Copy, Debug, Default)]
struct Faults {
    offline: bool,
    fail_stores: bool,
    fail_fetches: bool,
    latency: Option<Duration>,
}

#[derive(Default)]
struct MemoryNode {
    blobs: DashMap<String, Bytes>,
    faults: RwLock<Faults>,
}

/// A set of in-process storage nodes addressed by node id.
///
/// Nodes spring into existence on first use. Each node can be taken offline,
/// made to reject stores or fetches, or slowed down.
#[derive(Clone, Default)]
pub struct MemoryBlobNodeClient {
    nodes: Arc<DashMap<u64, Arc<MemoryNode>>>,
    stores: Arc<AtomicUsize>,
    fetches: Arc<AtomicUsize>,
    deletes: Arc<AtomicUsize>,
}

impl MemoryBlobNodeClient {
    /// Create an empty set of nodes
    pub fn new() -> Self {
        Self::default()
    }

    fn node(&self, id: u64) -> Arc<MemoryNode> {
        self.nodes.entry(id).or_default().value().clone()
    }

    /// Take a node offline (every call fails) or bring it back
    pub fn set_offline(&self, id: u64, offline: bool) {
        self.node(id).faults.write().offline = offline;
    }

    /// Make stores on a node fail
    pub fn fail_stores(&self, id: u64, fail: bool) {
        self.node(id).faults.write().fail_stores = fail;
    }

    /// Make fetches on a node fail
    pub fn fail_fetches(&self, id: u64, fail: bool) {
        self.node(id).faults.write().fail_fetches = fail;
    }

    /// Delay every call on a node
    pub fn set_latency(&self, id: u64, latency: Option<Duration>) {
        self.node(id).faults.write().latency = latency;
    }

    /// Overwrite stored bytes without going through `store`
    pub fn corrupt(&self, id: u64, path: &str, data: impl Into<Bytes>) {
        self.node(id).blobs.insert(path.to_string(), data.into());
    }

    /// Bytes held by a node at a path
    pub fn get(&self, id: u64, path: &str) -> Option<Bytes> {
        self.nodes
            .get(&id)
            .and_then(|node| node.blobs.get(path).map(|b| b.value().clone()))
    }

    /// Number of blobs held by one node
    pub fn blob_count(&self, id: u64) -> usize {
        self.nodes.get(&id).map(|node| node.blobs.len()).unwrap_or(0)
    }

    /// Number of blobs held across all nodes
    pub fn total_blobs(&self) -> usize {
        self.nodes.iter().map(|node| node.blobs.len()).sum()
    }

    /// Store calls received so far
    pub fn store_calls(&self) -> usize {
        self.stores.load(Ordering::SeqCst)
    }

    /// Fetch calls received so far
    pub fn fetch_calls(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Delete calls received so far
    pub fn delete_calls(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    async fn enter(&self, endpoint: &NodeEndpoint) -> Result<(Arc<MemoryNode>, Faults)> {
        let node = self.node(endpoint.id);
        let faults = *node.faults.read();
        if let Some(latency) = faults.latency {
            tokio::time::sleep(latency).await;
        }
        if faults.offline {
            return Err(BlobNodeError::Connection(format!(
                "node {} is offline",
                endpoint.name
            )));
        }
        Ok((node, faults))
    }
}

#[async_trait]
impl BlobNodeClient for MemoryBlobNodeClient {
    async fn store(&self, endpoint: &NodeEndpoint, path: &str, data: Bytes) -> Result<()> {
        self.stores.fetch_add(1, Ordering::SeqCst);
        let (node, faults) = self.enter(endpoint).await?;
        if faults.fail_stores {
            return Err(BlobNodeError::Http {
                status: 500,
                message: format!("injected store failure on {}", endpoint.name),
            });
        }
        validate_blob_path(path)?;
        if data.is_empty() {
            return Err(BlobNodeError::Empty);
        }
        node.blobs.insert(path.to_string(), data);
        Ok(())
    }

    async fn fetch(&self, endpoint: &NodeEndpoint, path: &str) -> Result<Bytes> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let (node, faults) = self.enter(endpoint).await?;
        if faults.fail_fetches {
            return Err(BlobNodeError::Http {
                status: 500,
                message: format!("injected fetch failure on {}", endpoint.name),
            });
        }
        validate_blob_path(path)?;
        node.blobs
            .get(path)
            .map(|b| b.value().clone())
            .ok_or_else(|| BlobNodeError::NotFound(path.to_string()))
    }

    async fn delete(&self, endpoint: &NodeEndpoint, path: &str) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        let (node, _) = self.enter(endpoint).await?;
        validate_blob_path(path)?;
        node.blobs.remove(path);
        Ok(())
    }

    async fn health(&self, endpoint: &NodeEndpoint) -> NodeHealth {
        match self.enter(endpoint).await {
            Ok(_) => NodeHealth::Up,
            Err(_) => NodeHealth::Down,
        }
    }
}
