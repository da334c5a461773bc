//! Metadata persistence for buckets, entries and versions

use crate::{
    metadata::{Bucket, ObjectEntry, ObjectVersion},
    CoreError, Result,
};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Storage for bucket, entry and version records.
///
/// The version counter is exposed as load + compare-and-swap so callers can
/// allocate numbers without holding a lock across awaits.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Create a bucket; fails if the name is taken
    async fn create_bucket(&self, name: &str) -> Result<Bucket>;

    async fn get_bucket(&self, name: &str) -> Result<Option<Bucket>>;

    async fn list_buckets(&self) -> Result<Vec<Bucket>>;

    /// Delete a bucket and its entries. Fails with `BucketNotEmpty` while any
    /// live version remains.
    async fn delete_bucket(&self, name: &str) -> Result<()>;

    /// Fetch the entry for `key`, creating it with counter 1 if absent
    async fn get_or_create_entry(&self, bucket_id: u64, key: &str) -> Result<ObjectEntry>;

    async fn get_entry(&self, bucket_id: u64, key: &str) -> Result<Option<ObjectEntry>>;

    /// Entries of a bucket sorted by key, optionally filtered by prefix
    async fn list_entries(&self, bucket_id: u64, prefix: Option<&str>) -> Result<Vec<ObjectEntry>>;

    /// Current value of the entry's version counter
    async fn load_next_version(&self, entry_id: u64) -> Result<u64>;

    /// Move the counter from `expected` to `new`; false if it had moved
    async fn compare_and_swap_next_version(
        &self,
        entry_id: u64,
        expected: u64,
        new: u64,
    ) -> Result<bool>;

    async fn insert_version(&self, version: ObjectVersion) -> Result<()>;

    /// Exact version, tombstoned or not
    async fn get_version(&self, entry_id: u64, version: u64) -> Result<Option<ObjectVersion>>;

    /// Highest version not tombstoned
    async fn latest_version(&self, entry_id: u64) -> Result<Option<ObjectVersion>>;

    /// Non-tombstoned versions, ascending
    async fn list_versions(&self, entry_id: u64) -> Result<Vec<ObjectVersion>>;

    /// Mark a version deleted; returns the updated record or `None` if absent
    async fn set_deleted(&self, entry_id: u64, version: u64) -> Result<Option<ObjectVersion>>;
}

struct StoredEntry {
    entry: ObjectEntry,
    next_version: AtomicU64,
    versions: RwLock<BTreeMap<u64, ObjectVersion>>,
}

impl StoredEntry {
    fn snapshot(&self) -> ObjectEntry {
        let mut entry = self.entry.clone();
        entry.next_version = self.next_version.load(Ordering::SeqCst);
        entry
    }

    fn has_live_versions(&self) -> bool {
        self.versions.read().values().any(|v| !v.deleted)
    }
}

/// In-memory metadata store
#[derive(Clone, Default)]
pub struct MemoryMetadataStore {
    buckets: Arc<DashMap<String, Bucket>>,
    bucket_ids: Arc<DashMap<u64, String>>,
    entries: Arc<DashMap<u64, Arc<StoredEntry>>>,
    keys: Arc<DashMap<(u64, String), u64>>,
    next_bucket_id: Arc<AtomicU64>,
    next_entry_id: Arc<AtomicU64>,
}

impl MemoryMetadataStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn stored(&self, entry_id: u64) -> Result<Arc<StoredEntry>> {
        self.entries
            .get(&entry_id)
            .map(|e| Arc::clone(e.value()))
            .ok_or(CoreError::EntryRemoved { entry_id })
    }

    fn bucket_entries(&self, bucket_id: u64) -> Vec<Arc<StoredEntry>> {
        self.entries
            .iter()
            .filter(|e| e.entry.bucket_id == bucket_id)
            .map(|e| Arc::clone(e.value()))
            .collect()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn create_bucket(&self, name: &str) -> Result<Bucket> {
        match self.buckets.entry(name.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(CoreError::BucketAlreadyExists(name.to_string()))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let id = self.next_bucket_id.fetch_add(1, Ordering::SeqCst) + 1;
                let bucket = Bucket::new(id, name);
                self.bucket_ids.insert(id, bucket.name.clone());
                slot.insert(bucket.clone());
                Ok(bucket)
            }
        }
    }

    async fn get_bucket(&self, name: &str) -> Result<Option<Bucket>> {
        Ok(self.buckets.get(name).map(|b| b.clone()))
    }

    async fn list_buckets(&self) -> Result<Vec<Bucket>> {
        let mut buckets: Vec<Bucket> = self.buckets.iter().map(|b| b.clone()).collect();
        buckets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(buckets)
    }

    async fn delete_bucket(&self, name: &str) -> Result<()> {
        let bucket = self
            .buckets
            .get(name)
            .map(|b| b.clone())
            .ok_or_else(|| CoreError::BucketNotFound(name.to_string()))?;

        if self
            .bucket_entries(bucket.id)
            .iter()
            .any(|e| e.has_live_versions())
        {
            return Err(CoreError::BucketNotEmpty(name.to_string()));
        }

        // Unlist the bucket before sweeping so no new entry can appear under it
        self.bucket_ids.remove(&bucket.id);
        self.buckets.remove(name);
        for stored in self.bucket_entries(bucket.id) {
            self.keys.remove(&(bucket.id, stored.entry.key.clone()));
            self.entries.remove(&stored.entry.id);
        }
        Ok(())
    }

    async fn get_or_create_entry(&self, bucket_id: u64, key: &str) -> Result<ObjectEntry> {
        if !self.bucket_ids.contains_key(&bucket_id) {
            return Err(CoreError::BucketNotFound(format!("#{}", bucket_id)));
        }

        let entry_id = *self
            .keys
            .entry((bucket_id, key.to_string()))
            .or_insert_with(|| {
                let id = self.next_entry_id.fetch_add(1, Ordering::SeqCst) + 1;
                self.entries.insert(
                    id,
                    Arc::new(StoredEntry {
                        entry: ObjectEntry::new(id, bucket_id, key),
                        next_version: AtomicU64::new(1),
                        versions: RwLock::new(BTreeMap::new()),
                    }),
                );
                id
            });

        // Lost a race with delete_bucket: undo rather than leave an orphan
        if !self.bucket_ids.contains_key(&bucket_id) {
            self.keys.remove(&(bucket_id, key.to_string()));
            self.entries.remove(&entry_id);
            return Err(CoreError::BucketNotFound(format!("#{}", bucket_id)));
        }

        Ok(self.stored(entry_id)?.snapshot())
    }

    async fn get_entry(&self, bucket_id: u64, key: &str) -> Result<Option<ObjectEntry>> {
        let Some(entry_id) = self.keys.get(&(bucket_id, key.to_string())).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.entries.get(&entry_id).map(|e| e.snapshot()))
    }

    async fn list_entries(&self, bucket_id: u64, prefix: Option<&str>) -> Result<Vec<ObjectEntry>> {
        let prefix = prefix.unwrap_or("");
        let mut entries: Vec<ObjectEntry> = self
            .bucket_entries(bucket_id)
            .iter()
            .filter(|e| e.entry.key.starts_with(prefix))
            .map(|e| e.snapshot())
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }

    async fn load_next_version(&self, entry_id: u64) -> Result<u64> {
        Ok(self.stored(entry_id)?.next_version.load(Ordering::SeqCst))
    }

    async fn compare_and_swap_next_version(
        &self,
        entry_id: u64,
        expected: u64,
        new: u64,
    ) -> Result<bool> {
        Ok(self
            .stored(entry_id)?
            .next_version
            .compare_exchange(expected, new, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok())
    }

    async fn insert_version(&self, version: ObjectVersion) -> Result<()> {
        let stored = self.stored(version.entry_id)?;
        stored.versions.write().insert(version.version, version);
        Ok(())
    }

    async fn get_version(&self, entry_id: u64, version: u64) -> Result<Option<ObjectVersion>> {
        Ok(self.stored(entry_id)?.versions.read().get(&version).cloned())
    }

    async fn latest_version(&self, entry_id: u64) -> Result<Option<ObjectVersion>> {
        Ok(self
            .stored(entry_id)?
            .versions
            .read()
            .values()
            .rev()
            .find(|v| !v.deleted)
            .cloned())
    }

    async fn list_versions(&self, entry_id: u64) -> Result<Vec<ObjectVersion>> {
        Ok(self
            .stored(entry_id)?
            .versions
            .read()
            .values()
            .filter(|v| !v.deleted)
            .cloned()
            .collect())
    }

    async fn set_deleted(&self, entry_id: u64, version: u64) -> Result<Option<ObjectVersion>> {
        let stored = self.stored(entry_id)?;
        let mut versions = stored.versions.write();
        Ok(versions.get_mut(&version).map(|v| {
            v.deleted = true;
            v.clone()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn version(entry_id: u64, number: u64) -> ObjectVersion {
        ObjectVersion {
            entry_id,
            version: number,
            size_bytes: 1,
            checksum: "00".to_string(),
            replicas: Vec::new(),
            deleted: false,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_bucket_lifecycle() {
        let store = MemoryMetadataStore::new();
        let bucket = store.create_bucket("photos").await.unwrap();
        assert_eq!(bucket.id, 1);

        assert!(matches!(
            store.create_bucket("photos").await,
            Err(CoreError::BucketAlreadyExists(_))
        ));

        store.create_bucket("archive").await.unwrap();
        let names: Vec<String> = store
            .list_buckets()
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.name)
            .collect();
        assert_eq!(names, vec!["archive", "photos"]);

        store.delete_bucket("photos").await.unwrap();
        assert!(store.get_bucket("photos").await.unwrap().is_none());
        assert!(matches!(
            store.delete_bucket("photos").await,
            Err(CoreError::BucketNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_bucket_with_live_versions_is_not_empty() {
        let store = MemoryMetadataStore::new();
        let bucket = store.create_bucket("docs").await.unwrap();
        let entry = store.get_or_create_entry(bucket.id, "a.txt").await.unwrap();
        store.insert_version(version(entry.id, 1)).await.unwrap();

        assert!(matches!(
            store.delete_bucket("docs").await,
            Err(CoreError::BucketNotEmpty(_))
        ));

        store.set_deleted(entry.id, 1).await.unwrap();
        store.delete_bucket("docs").await.unwrap();
        assert!(store.get_entry(bucket.id, "a.txt").await.unwrap().is_none());
    }

    async fn store_with_buckets(names: &[&str]) -> MemoryMetadataStore {
        let store = MemoryMetadataStore::new();
        for name in names {
            store.create_bucket(name).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_get_or_create_entry_is_stable() {
        let store = store_with_buckets(&["one", "two"]).await;
        let first = store.get_or_create_entry(1, "k").await.unwrap();
        let second = store.get_or_create_entry(1, "k").await.unwrap();
        let other = store.get_or_create_entry(2, "k").await.unwrap();

        assert_eq!(first.id, second.id);
        assert_ne!(first.id, other.id);
        assert_eq!(first.next_version, 1);
    }

    #[tokio::test]
    async fn test_counter_compare_and_swap() {
        let store = store_with_buckets(&["one"]).await;
        let entry = store.get_or_create_entry(1, "k").await.unwrap();

        assert!(store.compare_and_swap_next_version(entry.id, 1, 2).await.unwrap());
        assert!(!store.compare_and_swap_next_version(entry.id, 1, 2).await.unwrap());
        assert_eq!(store.load_next_version(entry.id).await.unwrap(), 2);
        assert_eq!(
            store.get_entry(1, "k").await.unwrap().unwrap().next_version,
            2
        );
    }

    #[tokio::test]
    async fn test_latest_skips_tombstones() {
        let store = store_with_buckets(&["one"]).await;
        let entry = store.get_or_create_entry(1, "k").await.unwrap();
        for v in 1..=3 {
            store.insert_version(version(entry.id, v)).await.unwrap();
        }

        store.set_deleted(entry.id, 3).await.unwrap();
        assert_eq!(store.latest_version(entry.id).await.unwrap().unwrap().version, 2);

        let live: Vec<u64> = store
            .list_versions(entry.id)
            .await
            .unwrap()
            .iter()
            .map(|v| v.version)
            .collect();
        assert_eq!(live, vec![1, 2]);

        assert!(store.get_version(entry.id, 3).await.unwrap().unwrap().deleted);
        assert!(store.set_deleted(entry.id, 9).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_entries_by_prefix() {
        let store = store_with_buckets(&["one"]).await;
        for key in ["b/2", "a/1", "b/1", "c"] {
            store.get_or_create_entry(1, key).await.unwrap();
        }

        let keys: Vec<String> = store
            .list_entries(1, Some("b/"))
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.key)
            .collect();
        assert_eq!(keys, vec!["b/1", "b/2"]);
        assert_eq!(store.list_entries(1, None).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_entries_need_a_live_bucket() {
        let store = store_with_buckets(&["docs"]).await;
        assert!(matches!(
            store.get_or_create_entry(42, "k").await,
            Err(CoreError::BucketNotFound(_))
        ));

        let entry = store.get_or_create_entry(1, "k").await.unwrap();
        store.delete_bucket("docs").await.unwrap();

        assert!(matches!(
            store.get_or_create_entry(1, "k").await,
            Err(CoreError::BucketNotFound(_))
        ));
        assert!(store.list_entries(1, None).await.unwrap().is_empty());

        // A writer still holding the old entry gets a clear error
        assert!(matches!(
            store.insert_version(version(entry.id, 1)).await,
            Err(CoreError::EntryRemoved { entry_id }) if entry_id == entry.id
        ));
    }
}
