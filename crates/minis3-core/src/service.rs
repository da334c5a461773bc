//! Caller-facing object operations

use crate::{
    metadata::{
        replication_key, validate_bucket_name, validate_object_key, Bucket, NodeStatus,
        ObjectEntry, ObjectVersion, ReplicaDescriptor, StorageNode,
    },
    placement::PlacementSelector,
    registry::NodeRegistry,
    replication::{ReplicationConfig, ReplicationCoordinator},
    store::MetadataStore,
    versioning::{VersionManager, VersioningConfig},
    CoreError, Result,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use minis3_blockstore::{BlobNodeClient, NodeHealth};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, instrument};

/// Default number of replicas per version
pub const DEFAULT_REPLICATION_FACTOR: usize = 2;

/// Configuration for the object service
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    /// Replica count used when an upload does not ask for one
    pub default_replication_factor: usize,
    pub replication: ReplicationConfig,
    pub versioning: VersioningConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            default_replication_factor: DEFAULT_REPLICATION_FACTOR,
            replication: ReplicationConfig::default(),
            versioning: VersioningConfig::default(),
        }
    }
}

/// Returned by a successful upload
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub bucket: String,
    pub key: String,
    pub version: u64,
    pub checksum: String,
    pub size_bytes: u64,
    pub replication_factor: usize,
    pub replicas: Vec<ReplicaDescriptor>,
    pub successful_replicas: usize,
    pub degraded: bool,
    pub created_at: DateTime<Utc>,
}

/// Bytes of one version plus its metadata
#[derive(Clone, Debug)]
pub struct DownloadedObject {
    pub data: Bytes,
    pub checksum: String,
    pub version: u64,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
    /// Name of the node the bytes came from
    pub served_by: String,
}

/// Returned when a version is tombstoned
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteReceipt {
    pub bucket: String,
    pub key: String,
    pub version: u64,
    pub deleted_at: DateTime<Utc>,
}

/// Listing row for an object with at least one live version
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectSummary {
    pub key: String,
    pub latest_version: u64,
    pub size_bytes: u64,
    pub checksum: String,
    pub last_modified: DateTime<Utc>,
    pub version_count: usize,
}

/// Object storage with replicated, versioned objects
pub struct ObjectService<M: MetadataStore, R: NodeRegistry, C: BlobNodeClient> {
    store: Arc<M>,
    registry: Arc<R>,
    placement: PlacementSelector<R>,
    versions: VersionManager<M>,
    replication: ReplicationCoordinator<R, C>,
    config: ServiceConfig,
    /// Uploads hold a bucket's guard shared, bucket deletion holds it exclusive
    bucket_guards: DashMap<String, Arc<RwLock<()>>>,
}

impl<M: MetadataStore, R: NodeRegistry, C: BlobNodeClient> ObjectService<M, R, C> {
    /// Create a new service
    pub fn new(store: Arc<M>, registry: Arc<R>, client: Arc<C>, config: ServiceConfig) -> Self {
        Self {
            placement: PlacementSelector::new(Arc::clone(&registry)),
            versions: VersionManager::new(Arc::clone(&store), config.versioning.clone()),
            replication: ReplicationCoordinator::new(
                Arc::clone(&registry),
                client,
                config.replication.clone(),
            ),
            store,
            registry,
            config,
            bucket_guards: DashMap::new(),
        }
    }

    fn bucket_guard(&self, name: &str) -> Arc<RwLock<()>> {
        self.bucket_guards
            .entry(name.to_string())
            .or_default()
            .value()
            .clone()
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<M> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<R> {
        &self.registry
    }

    // ==================== Buckets ====================

    /// Create a bucket
    #[instrument(skip(self))]
    pub async fn create_bucket(&self, name: &str) -> Result<Bucket> {
        validate_bucket_name(name)?;
        let bucket = self.store.create_bucket(name).await?;
        info!(bucket = %bucket.name, "bucket created");
        Ok(bucket)
    }

    /// Get a bucket by name
    pub async fn get_bucket(&self, name: &str) -> Result<Bucket> {
        self.store
            .get_bucket(name)
            .await?
            .ok_or_else(|| CoreError::BucketNotFound(name.to_string()))
    }

    pub async fn list_buckets(&self) -> Result<Vec<Bucket>> {
        self.store.list_buckets().await
    }

    /// Delete a bucket with no live objects
    #[instrument(skip(self))]
    pub async fn delete_bucket(&self, name: &str) -> Result<()> {
        self.get_bucket(name).await?;
        let guard = self.bucket_guard(name);
        let _exclusive = guard.write().await;
        self.store.delete_bucket(name).await?;
        self.bucket_guards.remove(name);
        info!(bucket = %name, "bucket deleted");
        Ok(())
    }

    // ==================== Nodes ====================

    pub async fn register_node(&self, name: &str, base_url: &str) -> Result<StorageNode> {
        self.registry.register(name, base_url).await
    }

    pub async fn list_nodes(&self) -> Result<Vec<StorageNode>> {
        self.registry.list_nodes().await
    }

    /// Get a node by name
    pub async fn get_node(&self, name: &str) -> Result<StorageNode> {
        self.registry
            .get_by_name(name)
            .await?
            .ok_or_else(|| CoreError::NodeNotFound(name.to_string()))
    }

    pub async fn set_node_status(&self, name: &str, status: NodeStatus) -> Result<StorageNode> {
        self.registry.set_status(name, status).await
    }

    /// Probe a node's health endpoint right now
    pub async fn probe_node(&self, name: &str) -> Result<(StorageNode, NodeHealth)> {
        let node = self.get_node(name).await?;
        let health = self.replication.probe(&node).await;
        Ok((node, health))
    }

    // ==================== Objects ====================

    /// Store a new version of `bucket/key` on `replication_factor` nodes.
    ///
    /// Placement runs before any metadata is touched, so a placement failure
    /// leaves no entry and no consumed version number behind.
    #[instrument(skip(self, data), fields(size = data.len()))]
    pub async fn upload(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        replication_factor: Option<usize>,
    ) -> Result<UploadReceipt> {
        validate_object_key(key)?;
        self.get_bucket(bucket).await?;
        let guard = self.bucket_guard(bucket);
        let _shared = guard.read().await;
        // Looked up again under the guard: a delete may have won the race
        let bucket_meta = self.get_bucket(bucket).await?;
        let replicas = replication_factor.unwrap_or(self.config.default_replication_factor);

        let nodes = self
            .placement
            .select(&replication_key(bucket, key), replicas)
            .await?;

        let entry = self.store.get_or_create_entry(bucket_meta.id, key).await?;
        let version = self.versions.allocate(&entry).await?;
        let checksum = minis3_crypto::checksum(&data);
        let size_bytes = data.len() as u64;

        let report = self
            .replication
            .write(bucket, key, entry.id, version, &nodes, data)
            .await?;

        let record = ObjectVersion {
            entry_id: entry.id,
            version,
            size_bytes,
            checksum: checksum.clone(),
            replicas: report.replicas,
            deleted: false,
            created_at: Utc::now(),
        };
        let created_at = record.created_at;
        let replicas_written = record.replicas.clone();
        self.store.insert_version(record).await?;

        info!(bucket, key, version, degraded = report.degraded, "object uploaded");

        Ok(UploadReceipt {
            bucket: bucket.to_string(),
            key: key.to_string(),
            version,
            checksum,
            size_bytes,
            replication_factor: replicas,
            replicas: replicas_written,
            successful_replicas: report.successful,
            degraded: report.degraded,
            created_at,
        })
    }

    /// Read a version (latest live one when `version` is `None`)
    #[instrument(skip(self))]
    pub async fn download(
        &self,
        bucket: &str,
        key: &str,
        version: Option<u64>,
    ) -> Result<DownloadedObject> {
        let entry = self.entry(bucket, key).await?;
        let target = self.versions.resolve(bucket, &entry, version).await?;
        let fetched = self.replication.read(bucket, key, &target).await?;

        Ok(DownloadedObject {
            data: fetched.data,
            checksum: target.checksum,
            version: target.version,
            size_bytes: target.size_bytes,
            created_at: target.created_at,
            served_by: fetched.node.name,
        })
    }

    /// Tombstone a version. Replica bytes are left in place.
    #[instrument(skip(self))]
    pub async fn delete_version(&self, bucket: &str, key: &str, version: u64) -> Result<DeleteReceipt> {
        let entry = self.entry(bucket, key).await?;
        self.versions.tombstone(bucket, &entry, version).await?;
        info!(bucket, key, version, "version deleted");

        Ok(DeleteReceipt {
            bucket: bucket.to_string(),
            key: key.to_string(),
            version,
            deleted_at: Utc::now(),
        })
    }

    /// Objects in a bucket that still have a live version, sorted by key
    pub async fn list_objects(&self, bucket: &str, prefix: Option<&str>) -> Result<Vec<ObjectSummary>> {
        let bucket_meta = self.get_bucket(bucket).await?;
        let entries = self.store.list_entries(bucket_meta.id, prefix).await?;

        let mut objects = Vec::new();
        for entry in entries {
            let live = self.versions.list_live(&entry).await?;
            if let Some(latest) = live.last() {
                objects.push(ObjectSummary {
                    key: entry.key.clone(),
                    latest_version: latest.version,
                    size_bytes: latest.size_bytes,
                    checksum: latest.checksum.clone(),
                    last_modified: latest.created_at,
                    version_count: live.len(),
                });
            }
        }
        Ok(objects)
    }

    /// Live versions of an object, ascending
    pub async fn list_versions(&self, bucket: &str, key: &str) -> Result<Vec<ObjectVersion>> {
        let entry = self.entry(bucket, key).await?;
        self.versions.list_live(&entry).await
    }

    async fn entry(&self, bucket: &str, key: &str) -> Result<ObjectEntry> {
        let bucket_meta = self.get_bucket(bucket).await?;
        self.store
            .get_entry(bucket_meta.id, key)
            .await?
            .ok_or_else(|| CoreError::EntryNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }
}
