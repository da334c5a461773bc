//! Rendezvous-hash replica placement
//!
//! Every node gets a score derived from `SHA-256(key "@" node_name)`; the R
//! highest-scoring UP nodes hold the object. Adding or removing a node only
//! moves the keys that ranked that node in their top R.

use crate::{metadata::StorageNode, registry::NodeRegistry, CoreError, Result};
use minis3_crypto::digest_prefix_u64;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, error, instrument};

/// Raw 53-bit placement score of `node_name` for `key`
pub fn raw_score(key: &str, node_name: &str) -> u64 {
    let input = format!("{}@{}", key, node_name);
    let value = digest_prefix_u64(input.as_bytes());
    let mixed = value ^ (value >> 1);
    mixed >> 11
}

/// Placement score in `[0, 1)`
pub fn score(key: &str, node_name: &str) -> f64 {
    raw_score(key, node_name) as f64 * (1.0 / (1u64 << 53) as f64)
}

/// Order nodes by descending score, ties broken by ascending name
pub fn rank(key: &str, nodes: &[StorageNode]) -> Vec<StorageNode> {
    let mut scored: Vec<(u64, &StorageNode)> = nodes
        .iter()
        .map(|node| (raw_score(key, &node.name), node))
        .collect();

    scored.sort_by(|(sa, a), (sb, b)| match sb.cmp(sa) {
        Ordering::Equal => a.name.cmp(&b.name),
        other => other,
    });

    scored.into_iter().map(|(_, node)| node.clone()).collect()
}

/// Pick `replicas` nodes for `key` from an explicit candidate set
pub fn select_from(key: &str, nodes: &[StorageNode], replicas: usize) -> Result<Vec<StorageNode>> {
    if replicas == 0 {
        return Err(CoreError::InvalidReplicationFactor(replicas));
    }

    if nodes.len() < replicas {
        return Err(CoreError::InsufficientReplicas {
            required: replicas,
            available: nodes.len(),
        });
    }

    let mut ranked = rank(key, nodes);
    ranked.truncate(replicas);
    Ok(ranked)
}

/// Picks replica sets from the registry's UP nodes
pub struct PlacementSelector<R: NodeRegistry> {
    registry: Arc<R>,
}

impl<R: NodeRegistry> PlacementSelector<R> {
    pub fn new(registry: Arc<R>) -> Self {
        Self { registry }
    }

    /// Select `replicas` nodes for a replication key.
    ///
    /// The returned order is also the read preference order.
    #[instrument(skip(self))]
    pub async fn select(&self, key: &str, replicas: usize) -> Result<Vec<StorageNode>> {
        let up = self.registry.list_up_nodes().await?;

        let selected = select_from(key, &up, replicas).inspect_err(|e| {
            if let CoreError::InsufficientReplicas { .. } = e {
                error!(error = %e, "placement failed");
            }
        })?;

        debug!(
            nodes = ?selected.iter().map(|n| n.name.as_str()).collect::<Vec<_>>(),
            "replicas selected"
        );
        Ok(selected)
    }
}
