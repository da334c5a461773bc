//! Version allocation, resolution and tombstones

use crate::{
    metadata::{ObjectEntry, ObjectVersion},
    store::MetadataStore,
    CoreError, Result,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Configuration for version allocation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VersioningConfig {
    /// Compare-and-swap attempts before giving up on a contended counter
    pub max_allocation_attempts: u32,
}

impl Default for VersioningConfig {
    fn default() -> Self {
        Self {
            max_allocation_attempts: 64,
        }
    }
}

/// Hands out version numbers and resolves which version a read targets
pub struct VersionManager<M: MetadataStore> {
    store: Arc<M>,
    config: VersioningConfig,
}

impl<M: MetadataStore> VersionManager<M> {
    pub fn new(store: Arc<M>, config: VersioningConfig) -> Self {
        Self { store, config }
    }

    /// Reserve the next version number of an entry.
    ///
    /// Numbers are unique and strictly increasing, and a reserved number is
    /// never handed out again even if nothing is written under it.
    #[instrument(skip(self, entry), fields(entry_id = entry.id))]
    pub async fn allocate(&self, entry: &ObjectEntry) -> Result<u64> {
        let attempts = self.config.max_allocation_attempts.max(1);

        for attempt in 1..=attempts {
            let current = self.store.load_next_version(entry.id).await?;
            if self
                .store
                .compare_and_swap_next_version(entry.id, current, current + 1)
                .await?
            {
                debug!(version = current, attempt, "version allocated");
                return Ok(current);
            }
            tokio::task::yield_now().await;
        }

        warn!(attempts, "version counter contention exhausted retries");
        Err(CoreError::ConcurrentAllocationConflict {
            entry_id: entry.id,
            attempts,
        })
    }

    /// Highest live version
    pub async fn resolve_latest(&self, bucket: &str, entry: &ObjectEntry) -> Result<ObjectVersion> {
        self.store
            .latest_version(entry.id)
            .await?
            .ok_or_else(|| CoreError::NoVersionsAvailable {
                bucket: bucket.to_string(),
                key: entry.key.clone(),
            })
    }

    /// An exact version; tombstoned versions are reported as gone
    pub async fn resolve_version(
        &self,
        bucket: &str,
        entry: &ObjectEntry,
        version: u64,
    ) -> Result<ObjectVersion> {
        match self.store.get_version(entry.id, version).await? {
            None => Err(CoreError::VersionNotFound {
                bucket: bucket.to_string(),
                key: entry.key.clone(),
                version,
            }),
            Some(v) if v.deleted => Err(CoreError::VersionGone {
                bucket: bucket.to_string(),
                key: entry.key.clone(),
                version,
            }),
            Some(v) => Ok(v),
        }
    }

    /// Resolve `version` if given, else the latest live version
    pub async fn resolve(
        &self,
        bucket: &str,
        entry: &ObjectEntry,
        version: Option<u64>,
    ) -> Result<ObjectVersion> {
        match version {
            Some(v) => self.resolve_version(bucket, entry, v).await,
            None => self.resolve_latest(bucket, entry).await,
        }
    }

    /// Mark a version deleted. Deleting twice is a no-op.
    pub async fn tombstone(
        &self,
        bucket: &str,
        entry: &ObjectEntry,
        version: u64,
    ) -> Result<ObjectVersion> {
        self.store
            .set_deleted(entry.id, version)
            .await?
            .ok_or_else(|| CoreError::VersionNotFound {
                bucket: bucket.to_string(),
                key: entry.key.clone(),
                version,
            })
    }

    /// Live versions in ascending order
    pub async fn list_live(&self, entry: &ObjectEntry) -> Result<Vec<ObjectVersion>> {
        self.store.list_versions(entry.id).await
    }
}
