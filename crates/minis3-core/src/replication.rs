//! Multi-node writes and failover reads
//!
//! ```text
//!            write(bytes)                       read(version)
//!                 │                                  │
//!     ┌───────────┼───────────┐          replicas in stored order
//!     ▼           ▼           ▼                      │
//!  node A      node B      node C        FAILED? ── skip
//!  SUCCESS     FAILED      SUCCESS       unknown node? ── skip
//!     └───────────┼───────────┘          fetch error? ── next
//!                 ▼                      first success ── return
//!      descriptors, placement order
//! ```

use crate::{
    metadata::{storage_path, ObjectVersion, ReplicaDescriptor, StorageNode, WriteStatus},
    registry::NodeRegistry,
    CoreError, Result,
};
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use minis3_blockstore::{BlobNodeClient, BlobNodeError, NodeHealth};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Tunables for replica I/O
#[derive(Clone, Debug)]
pub struct ReplicationConfig {
    /// Timeout for each individual node call
    pub per_call_timeout: Duration,
    /// Optional bound on the whole upload fan-out
    pub upload_deadline: Option<Duration>,
    /// Replica writes in flight at once
    pub max_parallel_writes: usize,
    /// Recompute the checksum of fetched bytes
    pub verify_checksums: bool,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            per_call_timeout: Duration::from_secs(30),
            upload_deadline: None,
            max_parallel_writes: 4,
            verify_checksums: false,
        }
    }
}

/// Result of writing one version to its replica set
#[derive(Clone, Debug)]
pub struct WriteReport {
    pub storage_path: String,
    /// One descriptor per selected node, in placement order
    pub replicas: Vec<ReplicaDescriptor>,
    pub successful: usize,
    /// Fewer successes than selected nodes
    pub degraded: bool,
}

/// Bytes read back from one replica
#[derive(Clone, Debug)]
pub struct FetchedReplica {
    pub data: Bytes,
    pub node: StorageNode,
}

/// Writes versions to their replica sets and reads them back with failover.
///
/// Holds no durable state; replica outcomes are returned to the caller to record.
pub struct ReplicationCoordinator<R: NodeRegistry, C: BlobNodeClient> {
    registry: Arc<R>,
    client: Arc<C>,
    config: ReplicationConfig,
}

impl<R: NodeRegistry, C: BlobNodeClient> ReplicationCoordinator<R, C> {
    pub fn new(registry: Arc<R>, client: Arc<C>, config: ReplicationConfig) -> Self {
        Self {
            registry,
            client,
            config,
        }
    }

    pub fn config(&self) -> &ReplicationConfig {
        &self.config
    }

    /// Write `data` to every node in `nodes`.
    ///
    /// One node failing never cancels the others. Fails with `NoReplicaWritten`
    /// only when every write failed.
    #[instrument(skip(self, nodes, data), fields(size = data.len(), replicas = nodes.len()))]
    pub async fn write(
        &self,
        bucket: &str,
        key: &str,
        entry_id: u64,
        version: u64,
        nodes: &[StorageNode],
        data: Bytes,
    ) -> Result<WriteReport> {
        let path = storage_path(bucket, entry_id, version);
        let deadline = self.config.upload_deadline.map(|d| Instant::now() + d);

        // Collect before streaming: buffering a lazily mapped iterator leaves
        // the upload future non-`Send`.
        let writes: Vec<_> = nodes
            .iter()
            .map(|node| {
                let data = data.clone();
                let path = path.as_str();
                async move {
                    let status = match self.store_one(node, path, data, deadline).await {
                        Ok(()) => {
                            debug!(node = %node.name, "replica written");
                            WriteStatus::Success
                        }
                        Err(e) => {
                            warn!(node = %node.name, error = %e, "replica write failed");
                            WriteStatus::Failed
                        }
                    };
                    ReplicaDescriptor {
                        node_id: node.id,
                        node_name: node.name.clone(),
                        storage_path: path.to_string(),
                        write_status: status,
                    }
                }
            })
            .collect();

        let replicas: Vec<ReplicaDescriptor> = stream::iter(writes)
            .buffered(self.config.max_parallel_writes.max(1))
            .collect()
            .await;

        let successful = replicas.iter().filter(|r| r.write_status.is_success()).count();
        if successful == 0 {
            error!(bucket, key, version, "no replica accepted the write");
            return Err(CoreError::NoReplicaWritten {
                bucket: bucket.to_string(),
                key: key.to_string(),
                version,
            });
        }

        let degraded = successful < nodes.len();
        if degraded {
            warn!(
                bucket,
                key,
                version,
                successful,
                required = nodes.len(),
                "write is degraded"
            );
        } else {
            info!(bucket, key, version, successful, "version replicated");
        }

        Ok(WriteReport {
            storage_path: path,
            replicas,
            successful,
            degraded,
        })
    }

    async fn store_one(
        &self,
        node: &StorageNode,
        path: &str,
        data: Bytes,
        deadline: Option<Instant>,
    ) -> std::result::Result<(), BlobNodeError> {
        let now = Instant::now();
        let mut limit = now + self.config.per_call_timeout;
        if let Some(deadline) = deadline {
            if deadline <= now {
                return Err(BlobNodeError::Timeout { millis: 0 });
            }
            limit = limit.min(deadline);
        }

        let endpoint = node.endpoint();
        match tokio::time::timeout_at(limit, self.client.store(&endpoint, path, data)).await {
            Ok(result) => result,
            Err(_) => Err(BlobNodeError::Timeout {
                millis: (limit - now).as_millis() as u64,
            }),
        }
    }

    /// Read a version from the first replica that answers.
    #[instrument(skip(self, version), fields(version = version.version))]
    pub async fn read(&self, bucket: &str, key: &str, version: &ObjectVersion) -> Result<FetchedReplica> {
        let mut attempted = 0;

        // Write status is not trusted here: a store that timed out on our
        // side may still have landed on the node.
        for replica in &version.replicas {
            let node = match self.registry.get_node(replica.node_id).await {
                Ok(Some(node)) => node,
                Ok(None) => {
                    warn!(node_id = replica.node_id, "replica node no longer registered");
                    continue;
                }
                Err(e) => {
                    warn!(node_id = replica.node_id, error = %e, "node lookup failed");
                    continue;
                }
            };

            attempted += 1;
            match self.fetch_one(&node, &replica.storage_path, &version.checksum).await {
                Ok(data) => {
                    info!(node = %node.name, bucket, key, "version served");
                    return Ok(FetchedReplica { data, node });
                }
                Err(e) => {
                    warn!(node = %node.name, error = %e, "replica fetch failed, trying next");
                }
            }
        }

        error!(bucket, key, version = version.version, attempted, "all replicas failed");
        Err(CoreError::AllReplicasFailed {
            bucket: bucket.to_string(),
            key: key.to_string(),
            version: version.version,
            attempted,
        })
    }

    async fn fetch_one(&self, node: &StorageNode, path: &str, expected: &str) -> Result<Bytes> {
        let endpoint = node.endpoint();
        let timeout = self.config.per_call_timeout;
        let data = tokio::time::timeout(timeout, self.client.fetch(&endpoint, path))
            .await
            .map_err(|_| BlobNodeError::Timeout {
                millis: timeout.as_millis() as u64,
            })??;

        if self.config.verify_checksums {
            minis3_crypto::verify_checksum(&data, expected)?;
        }
        Ok(data)
    }

    /// Live health probe of one node
    pub async fn probe(&self, node: &StorageNode) -> NodeHealth {
        let endpoint = node.endpoint();
        tokio::time::timeout(self.config.per_call_timeout, self.client.health(&endpoint))
            .await
            .unwrap_or(NodeHealth::Down)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MemoryNodeRegistry;
    use chrono::Utc;
    use minis3_blockstore::MemoryBlobNodeClient;

    struct Fixture {
        registry: Arc<MemoryNodeRegistry>,
        client: Arc<MemoryBlobNodeClient>,
        nodes: Vec<StorageNode>,
    }

    async fn fixture(count: usize) -> Fixture {
        let registry = Arc::new(MemoryNodeRegistry::new());
        let mut nodes = Vec::new();
        for i in 0..count {
            let name = format!("node-{}", (b'a' + i as u8) as char);
            nodes.push(
                registry
                    .register(&name, &format!("http://{}:8081", name))
                    .await
                    .unwrap(),
            );
        }
        Fixture {
            registry,
            client: Arc::new(MemoryBlobNodeClient::new()),
            nodes,
        }
    }

    impl Fixture {
        fn coordinator(
            &self,
            config: ReplicationConfig,
        ) -> ReplicationCoordinator<MemoryNodeRegistry, MemoryBlobNodeClient> {
            ReplicationCoordinator::new(Arc::clone(&self.registry), Arc::clone(&self.client), config)
        }
    }

    fn version_from(report: &WriteReport, data: &[u8]) -> ObjectVersion {
        ObjectVersion {
            entry_id: 1,
            version: 1,
            size_bytes: data.len() as u64,
            checksum: minis3_crypto::checksum(data),
            replicas: report.replicas.clone(),
            deleted: false,
            created_at: Utc::now(),
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_write_all_replicas() {
        let fx = fixture(3).await;
        let coordinator = fx.coordinator(ReplicationConfig::default());

        let report = coordinator
            .write("photos", "cat.png", 7, 1, &fx.nodes, Bytes::from_static(b"meow"))
            .await
            .unwrap();

        assert_eq!(report.storage_path, "photos/7/1/blob");
        assert_eq!(report.successful, 3);
        assert!(!report.degraded);
        let order: Vec<u64> = report.replicas.iter().map(|r| r.node_id).collect();
        assert_eq!(order, fx.nodes.iter().map(|n| n.id).collect::<Vec<_>>());
        for node in &fx.nodes {
            assert_eq!(
                fx.client.get(node.id, "photos/7/1/blob").unwrap().as_ref(),
                b"meow"
            );
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_partial_write_is_degraded() {
        let fx = fixture(3).await;
        fx.client.fail_stores(fx.nodes[1].id, true);
        let coordinator = fx.coordinator(ReplicationConfig::default());

        let report = coordinator
            .write("photos", "cat.png", 7, 1, &fx.nodes, Bytes::from_static(b"meow"))
            .await
            .unwrap();

        assert!(report.degraded);
        assert_eq!(report.successful, 2);
        let statuses: Vec<WriteStatus> = report.replicas.iter().map(|r| r.write_status).collect();
        assert_eq!(
            statuses,
            vec![WriteStatus::Success, WriteStatus::Failed, WriteStatus::Success]
        );
    }

    #[tokio::test]
    async fn test_zero_successes_is_an_error() {
        let fx = fixture(2).await;
        for node in &fx.nodes {
            fx.client.set_offline(node.id, true);
        }
        let coordinator = fx.coordinator(ReplicationConfig::default());

        let err = coordinator
            .write("b01", "k", 1, 4, &fx.nodes, Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NoReplicaWritten { version: 4, .. }));
    }

    #[tokio::test]
    async fn test_slow_node_times_out_without_blocking_others() {
        let fx = fixture(2).await;
        fx.client
            .set_latency(fx.nodes[0].id, Some(Duration::from_secs(5)));
        let coordinator = fx.coordinator(ReplicationConfig {
            per_call_timeout: Duration::from_millis(100),
            ..Default::default()
        });

        let report = coordinator
            .write("b01", "k", 1, 1, &fx.nodes, Bytes::from_static(b"x"))
            .await
            .unwrap();
        assert_eq!(report.replicas[0].write_status, WriteStatus::Failed);
        assert_eq!(report.replicas[1].write_status, WriteStatus::Success);
    }

    #[tokio::test]
    async fn test_upload_deadline_cuts_outstanding_writes() {
        let fx = fixture(3).await;
        for node in &fx.nodes {
            fx.client.set_latency(node.id, Some(Duration::from_millis(300)));
        }
        fx.client.set_latency(fx.nodes[0].id, None);
        let coordinator = fx.coordinator(ReplicationConfig {
            upload_deadline: Some(Duration::from_millis(100)),
            ..Default::default()
        });

        let report = coordinator
            .write("b01", "k", 1, 1, &fx.nodes, Bytes::from_static(b"x"))
            .await
            .unwrap();
        assert_eq!(report.successful, 1);
        assert_eq!(report.replicas[0].write_status, WriteStatus::Success);
        assert!(report.replicas[1..]
            .iter()
            .all(|r| r.write_status == WriteStatus::Failed));
    }

    #[tokio::test]
    async fn test_parallel_writes_are_bounded() {
        let fx = fixture(4).await;
        for node in &fx.nodes {
            fx.client.set_latency(node.id, Some(Duration::from_millis(50)));
        }
        let coordinator = fx.coordinator(ReplicationConfig {
            max_parallel_writes: 1,
            ..Default::default()
        });

        let start = std::time::Instant::now();
        coordinator
            .write("b01", "k", 1, 1, &fx.nodes, Bytes::from_static(b"x"))
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[test_log::test(tokio::test)]
    async fn test_read_fails_over() {
        let fx = fixture(2).await;
        let coordinator = fx.coordinator(ReplicationConfig::default());
        let report = coordinator
            .write("b01", "k", 1, 1, &fx.nodes, Bytes::from_static(b"data"))
            .await
            .unwrap();
        let version = version_from(&report, b"data");

        fx.client.fail_fetches(fx.nodes[0].id, true);
        let fetched = coordinator.read("b01", "k", &version).await.unwrap();
        assert_eq!(fetched.data.as_ref(), b"data");
        assert_eq!(fetched.node.id, fx.nodes[1].id);
    }

    #[tokio::test]
    async fn test_read_tries_failed_and_skips_unregistered_replicas() {
        let fx = fixture(3).await;
        let coordinator = fx.coordinator(ReplicationConfig::default());
        fx.client.fail_stores(fx.nodes[0].id, true);
        let report = coordinator
            .write("b01", "k", 1, 1, &fx.nodes, Bytes::from_static(b"data"))
            .await
            .unwrap();
        let version = version_from(&report, b"data");

        fx.registry.remove(&fx.nodes[1].name);
        let fetches_before = fx.client.fetch_calls();

        let fetched = coordinator.read("b01", "k", &version).await.unwrap();
        assert_eq!(fetched.node.id, fx.nodes[2].id);
        // node-a is asked even though its write failed; node-b is never asked
        assert_eq!(fx.client.fetch_calls() - fetches_before, 2);
    }

    #[tokio::test]
    async fn test_read_serves_replica_recorded_as_failed() {
        let fx = fixture(2).await;
        let coordinator = fx.coordinator(ReplicationConfig::default());
        fx.client.fail_stores(fx.nodes[1].id, true);
        let report = coordinator
            .write("b01", "k", 1, 1, &fx.nodes, Bytes::from_static(b"late"))
            .await
            .unwrap();
        assert_eq!(report.replicas[1].write_status, WriteStatus::Failed);
        let version = version_from(&report, b"late");

        // The store reached node-b after the caller gave up on it
        fx.client
            .corrupt(fx.nodes[1].id, &report.storage_path, Bytes::from_static(b"late"));
        fx.client.fail_fetches(fx.nodes[0].id, true);

        let fetched = coordinator.read("b01", "k", &version).await.unwrap();
        assert_eq!(fetched.node.id, fx.nodes[1].id);
        assert_eq!(fetched.data.as_ref(), b"late");
    }

    #[tokio::test]
    async fn test_read_exhausted() {
        let fx = fixture(2).await;
        let coordinator = fx.coordinator(ReplicationConfig::default());
        let report = coordinator
            .write("b01", "k", 1, 1, &fx.nodes, Bytes::from_static(b"data"))
            .await
            .unwrap();
        let version = version_from(&report, b"data");

        for node in &fx.nodes {
            fx.client.set_offline(node.id, true);
        }
        let err = coordinator.read("b01", "k", &version).await.unwrap_err();
        assert!(matches!(err, CoreError::AllReplicasFailed { attempted: 2, .. }));
    }

    #[tokio::test]
    async fn test_checksum_mismatch_fails_over_when_verifying() {
        let fx = fixture(2).await;
        let coordinator = fx.coordinator(ReplicationConfig {
            verify_checksums: true,
            ..Default::default()
        });
        let report = coordinator
            .write("b01", "k", 1, 1, &fx.nodes, Bytes::from_static(b"good"))
            .await
            .unwrap();
        let version = version_from(&report, b"good");

        fx.client
            .corrupt(fx.nodes[0].id, &report.storage_path, Bytes::from_static(b"evil"));
        let fetched = coordinator.read("b01", "k", &version).await.unwrap();
        assert_eq!(fetched.data.as_ref(), b"good");
        assert_eq!(fetched.node.id, fx.nodes[1].id);

        // Without verification the corrupt copy is served
        let lax = fx.coordinator(ReplicationConfig::default());
        let fetched = lax.read("b01", "k", &version).await.unwrap();
        assert_eq!(fetched.data.as_ref(), b"evil");
    }

    #[tokio::test]
    async fn test_probe() {
        let fx = fixture(1).await;
        let coordinator = fx.coordinator(ReplicationConfig::default());
        assert_eq!(coordinator.probe(&fx.nodes[0]).await, NodeHealth::Up);
        fx.client.set_offline(fx.nodes[0].id, true);
        assert_eq!(coordinator.probe(&fx.nodes[0]).await, NodeHealth::Down);
    }
}
