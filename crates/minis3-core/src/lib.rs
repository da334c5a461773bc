//! # minis3 Core
//!
//! Placement and replication engine for the minis3 object store.
//!
//! This crate provides:
//! - **Placement**: rendezvous hashing from a replication key to an ordered replica set
//! - **Replication**: bounded parallel writes and failover reads across storage nodes
//! - **Versioning**: compare-and-swap version allocation, resolution and tombstones
//! - **Metadata**: bucket, entry, version and node records behind store traits
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │             ObjectService               │
//! ├──────────────┬─────────────┬────────────┤
//! │  Placement   │ Replication │ Versioning │
//! │  Selector    │ Coordinator │  Manager   │
//! ├──────────────┴──────┬──────┴────────────┤
//! │    NodeRegistry     │   MetadataStore   │
//! ├─────────────────────┴───────────────────┤
//! │        BlobNodeClient (blockstore)      │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use minis3_core::{MemoryMetadataStore, MemoryNodeRegistry, ObjectService, ServiceConfig};
//!
//! let service = ObjectService::new(store, registry, client, ServiceConfig::default());
//! service.create_bucket("photos").await?;
//! let receipt = service.upload("photos", "cat.png", data, Some(2)).await?;
//! let object = service.download("photos", "cat.png", None).await?;
//! ```

pub mod error;
pub mod metadata;
pub mod placement;
pub mod registry;
pub mod replication;
pub mod service;
pub mod store;
pub mod versioning;

pub use error::{CoreError, Result};
pub use metadata::{
    Bucket, NodeStatus, ObjectEntry, ObjectVersion, ReplicaDescriptor, StorageNode, WriteStatus,
};
pub use placement::PlacementSelector;
pub use registry::{MemoryNodeRegistry, NodeRegistry};
pub use replication::{ReplicationConfig, ReplicationCoordinator, WriteReport};
pub use service::{
    DeleteReceipt, DownloadedObject, ObjectService, ObjectSummary, ServiceConfig, UploadReceipt,
    DEFAULT_REPLICATION_FACTOR,
};
pub use store::{MemoryMetadataStore, MetadataStore};
pub use versioning::{VersionManager, VersioningConfig};
