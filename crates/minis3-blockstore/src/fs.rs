//! Local filesystem blob store served by a storage node

use crate::{BlobNodeError, NodeHealth, Result};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, instrument};

/// Reject paths that are empty, absolute, or step outside the root.
///
/// The check is lexical: every component must be a plain name.
pub fn validate_blob_path(path: &str) -> Result<&Path> {
    if path.trim().is_empty() {
        return Err(BlobNodeError::InvalidPath("path cannot be empty".to_string()));
    }

    let candidate = Path::new(path);
    for component in candidate.components() {
        match component {
            Component::Normal(_) => {}
            Component::CurDir => {}
            _ => {
                return Err(BlobNodeError::InvalidPath(format!(
                    "path traversal attempt: {}",
                    path
                )))
            }
        }
    }

    if !candidate.components().any(|c| matches!(c, Component::Normal(_))) {
        return Err(BlobNodeError::InvalidPath(format!("path names no file: {}", path)));
    }

    Ok(candidate)
}

/// Health snapshot of a local store
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreHealth {
    pub status: NodeHealth,
    pub base_dir: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Blob store rooted at a single directory
#[derive(Clone, Debug)]
pub struct FsBlobStore {
    base_dir: PathBuf,
    max_blob_size: u64,
}

impl FsBlobStore {
    /// Open (and create if needed) a store rooted at `base_dir`
    pub async fn open(base_dir: impl AsRef<Path>, max_blob_size: u64) -> Result<Self> {
        tokio::fs::create_dir_all(base_dir.as_ref()).await?;
        let base_dir = tokio::fs::canonicalize(base_dir.as_ref()).await?;
        info!(base_dir = %base_dir.display(), "blob store initialized");
        Ok(Self {
            base_dir,
            max_blob_size,
        })
    }

    /// Root directory
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Largest accepted blob
    pub fn max_blob_size(&self) -> u64 {
        self.max_blob_size
    }

    /// Resolve a relative blob path inside the root
    pub fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = validate_blob_path(path)?;
        Ok(self.base_dir.join(relative))
    }

    /// Write a blob, replacing existing content
    #[instrument(skip(self, data), fields(size = data.len()))]
    pub async fn put(&self, path: &str, data: &[u8]) -> Result<PathBuf> {
        if data.is_empty() {
            return Err(BlobNodeError::Empty);
        }
        let size = data.len() as u64;
        if size > self.max_blob_size {
            return Err(BlobNodeError::TooLarge {
                size,
                max: self.max_blob_size,
            });
        }

        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write-then-rename so readers never observe a partial blob.
        let staging = target.with_extension("partial");
        tokio::fs::write(&staging, data).await?;
        tokio::fs::rename(&staging, &target).await?;

        debug!(target = %target.display(), "blob written");
        Ok(target)
    }

    /// Read a blob
    pub async fn get(&self, path: &str) -> Result<Bytes> {
        let target = self.resolve(path)?;
        match tokio::fs::metadata(&target).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => {
                return Err(BlobNodeError::InvalidPath(format!("not a file: {}", path)));
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(BlobNodeError::NotFound(path.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        let data = tokio::fs::read(&target).await?;
        Ok(Bytes::from(data))
    }

    /// Remove a blob; returns whether anything was deleted
    pub async fn remove(&self, path: &str) -> Result<bool> {
        let target = self.resolve(path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Check that the root is still a writable directory
    pub async fn health(&self) -> StoreHealth {
        let reason = match tokio::fs::metadata(&self.base_dir).await {
            Ok(meta) if !meta.is_dir() => Some("storage root is not a directory".to_string()),
            Ok(meta) if meta.permissions().readonly() => {
                Some("storage directory is read-only".to_string())
            }
            Ok(_) => None,
            Err(e) => Some(format!("storage directory not accessible: {}", e)),
        };

        StoreHealth {
            status: if reason.is_none() {
                NodeHealth::Up
            } else {
                NodeHealth::Down
            },
            base_dir: self.base_dir.display().to_string(),
            reason,
            timestamp: Utc::now(),
        }
    }
}
