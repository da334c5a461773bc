//! Storage node registry

use crate::{
    metadata::{validate_node, NodeStatus, StorageNode},
    CoreError, Result,
};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

/// Source of truth for which storage nodes exist and which are UP
#[async_trait]
pub trait NodeRegistry: Send + Sync {
    /// Snapshot of every node currently UP
    async fn list_up_nodes(&self) -> Result<Vec<StorageNode>>;

    async fn get_node(&self, id: u64) -> Result<Option<StorageNode>>;

    /// Register a new node in the UP state
    async fn register(&self, name: &str, base_url: &str) -> Result<StorageNode>;

    async fn get_by_name(&self, name: &str) -> Result<Option<StorageNode>>;

    async fn list_nodes(&self) -> Result<Vec<StorageNode>>;

    /// Change a node's status and refresh its heartbeat
    async fn set_status(&self, name: &str, status: NodeStatus) -> Result<StorageNode>;
}

/// In-memory node registry
#[derive(Clone, Default)]
pub struct MemoryNodeRegistry {
    nodes: Arc<DashMap<u64, StorageNode>>,
    names: Arc<DashMap<String, u64>>,
    next_id: Arc<AtomicU64>,
}

impl MemoryNodeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove a node entirely
    pub fn remove(&self, name: &str) -> Option<StorageNode> {
        let (_, id) = self.names.remove(name)?;
        self.nodes.remove(&id).map(|(_, node)| node)
    }
}

#[async_trait]
impl NodeRegistry for MemoryNodeRegistry {
    async fn list_up_nodes(&self) -> Result<Vec<StorageNode>> {
        Ok(self
            .nodes
            .iter()
            .filter(|n| n.is_up())
            .map(|n| n.clone())
            .collect())
    }

    async fn get_node(&self, id: u64) -> Result<Option<StorageNode>> {
        Ok(self.nodes.get(&id).map(|n| n.clone()))
    }

    async fn register(&self, name: &str, base_url: &str) -> Result<StorageNode> {
        validate_node(name, base_url)?;

        match self.names.entry(name.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(CoreError::NodeAlreadyExists(name.to_string()))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
                let node = StorageNode::new(id, name, base_url.trim_end_matches('/'));
                self.nodes.insert(id, node.clone());
                slot.insert(id);
                info!(node = %node.name, id, base_url = %node.base_url, "storage node registered");
                Ok(node)
            }
        }
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<StorageNode>> {
        let Some(id) = self.names.get(name).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.nodes.get(&id).map(|n| n.clone()))
    }

    async fn list_nodes(&self) -> Result<Vec<StorageNode>> {
        let mut nodes: Vec<StorageNode> = self.nodes.iter().map(|n| n.clone()).collect();
        nodes.sort_by_key(|n| n.id);
        Ok(nodes)
    }

    async fn set_status(&self, name: &str, status: NodeStatus) -> Result<StorageNode> {
        let id = self
            .names
            .get(name)
            .map(|id| *id)
            .ok_or_else(|| CoreError::NodeNotFound(name.to_string()))?;

        let mut node = self
            .nodes
            .get_mut(&id)
            .ok_or_else(|| CoreError::NodeNotFound(name.to_string()))?;
        node.status = status;
        node.last_heartbeat = Utc::now();
        info!(node = %name, status = status.as_str(), "node status changed");
        Ok(node.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_and_lookup() {
        let registry = MemoryNodeRegistry::new();
        let a = registry.register("node-a", "http://a:8081/").await.unwrap();
        let b = registry.register("node-b", "http://b:8081").await.unwrap();

        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert_eq!(a.base_url, "http://a:8081");
        assert_eq!(a.status, NodeStatus::Up);

        assert_eq!(registry.get_node(2).await.unwrap().unwrap().name, "node-b");
        assert_eq!(registry.get_by_name("node-a").await.unwrap().unwrap().id, 1);
        assert!(registry.get_by_name("node-z").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_and_invalid_names() {
        let registry = MemoryNodeRegistry::new();
        registry.register("node-a", "http://a:8081").await.unwrap();

        assert!(matches!(
            registry.register("node-a", "http://other:8081").await,
            Err(CoreError::NodeAlreadyExists(_))
        ));
        assert!(matches!(
            registry.register("x", "http://a:8081").await,
            Err(CoreError::InvalidNode(_))
        ));
    }

    #[tokio::test]
    async fn test_status_filters_up_nodes() {
        let registry = MemoryNodeRegistry::new();
        registry.register("node-a", "http://a:8081").await.unwrap();
        registry.register("node-b", "http://b:8081").await.unwrap();
        registry.register("node-c", "http://c:8081").await.unwrap();

        registry.set_status("node-b", NodeStatus::Down).await.unwrap();
        registry
            .set_status("node-c", NodeStatus::Maintenance)
            .await
            .unwrap();

        let up = registry.list_up_nodes().await.unwrap();
        assert_eq!(up.len(), 1);
        assert_eq!(up[0].name, "node-a");
        assert_eq!(registry.list_nodes().await.unwrap().len(), 3);

        assert!(matches!(
            registry.set_status("ghost", NodeStatus::Up).await,
            Err(CoreError::NodeNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_remove() {
        let registry = MemoryNodeRegistry::new();
        let node = registry.register("node-a", "http://a:8081").await.unwrap();

        assert!(registry.remove("node-a").is_some());
        assert!(registry.get_node(node.id).await.unwrap().is_none());
        assert!(registry.remove("node-a").is_none());
    }
}
