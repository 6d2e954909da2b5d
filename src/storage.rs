//! Staging area for uploaded videos awaiting analysis.
//!
//! Each blob is stored as `<id>.bin` with a `<id>.json` sidecar describing it.
//! Entries older than the configured TTL are removed by [`BlobStore::sweep_expired`].

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::error::{HookError, Result};

const ID_PREFIX: &str = "video_";

/// Sidecar metadata for a staged blob
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlobEntry {
    pub id: String,
    pub name: String,
    pub media_type: String,
    pub size: u64,
    pub stored_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub entry: BlobEntry,
    pub bytes: Vec<u8>,
}

/// Key to byte-blob store with time-based expiry
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, name: &str, media_type: &str, bytes: &[u8]) -> Result<String>;
    async fn get(&self, id: &str) -> Result<Option<StoredBlob>>;
    /// Returns whether anything was removed
    async fn delete(&self, id: &str) -> Result<bool>;
    async fn list(&self) -> Result<Vec<BlobEntry>>;
    /// Remove entries stored before `now - ttl`; returns how many were removed
    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize>;
}

pub struct FileBlobStore {
    dir: PathBuf,
    ttl: Duration,
}

impl FileBlobStore {
    pub fn new<P: Into<PathBuf>>(dir: P, ttl: Duration) -> Self {
        Self { dir: dir.into(), ttl }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.dir.clone(), Duration::seconds(config.ttl_secs as i64))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn blob_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.bin", id))
    }

    fn entry_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    async fn read_entry(&self, id: &str) -> Result<Option<BlobEntry>> {
        match tokio::fs::read_to_string(self.entry_path(id)).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove(path: &Path) -> Result<bool> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Ids are generated by `put`; anything else could escape the directory
fn validate_id(id: &str) -> Result<()> {
    let valid = id.starts_with(ID_PREFIX)
        && id.len() > ID_PREFIX.len()
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(HookError::Storage(format!("Invalid blob id: {}", id)))
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn put(&self, name: &str, media_type: &str, bytes: &[u8]) -> Result<String> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| HookError::Storage(format!("Failed to create staging directory: {}", e)))?;

        let id = format!("{}{}", ID_PREFIX, Uuid::new_v4().simple());
        let entry = BlobEntry {
            id: id.clone(),
            name: name.to_string(),
            media_type: media_type.to_string(),
            size: bytes.len() as u64,
            stored_at: Utc::now(),
        };

        tokio::fs::write(self.blob_path(&id), bytes).await?;
        tokio::fs::write(self.entry_path(&id), serde_json::to_string_pretty(&entry)?).await?;

        info!("Staged {} ({} bytes) as {}", name, bytes.len(), id);
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Option<StoredBlob>> {
        validate_id(id)?;
        let Some(entry) = self.read_entry(id).await? else {
            return Ok(None);
        };

        match tokio::fs::read(self.blob_path(id)).await {
            Ok(bytes) => Ok(Some(StoredBlob { entry, bytes })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Staged blob {} has metadata but no data", id);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        validate_id(id)?;
        let blob = Self::remove(&self.blob_path(id)).await?;
        let entry = Self::remove(&self.entry_path(id)).await?;
        debug!("Deleted staged blob {}", id);
        Ok(blob || entry)
    }

    async fn list(&self) -> Result<Vec<BlobEntry>> {
        let mut entries = Vec::new();

        let mut dir_entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(entries),
            Err(e) => return Err(e.into()),
        };

        while let Some(dir_entry) = dir_entries.next_entry().await? {
            let path = dir_entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                match tokio::fs::read_to_string(&path).await {
                    Ok(content) => match serde_json::from_str::<BlobEntry>(&content) {
                        Ok(entry) => entries.push(entry),
                        Err(e) => warn!("Skipping unreadable sidecar {}: {}", path.display(), e),
                    },
                    Err(e) => warn!("Skipping unreadable sidecar {}: {}", path.display(), e),
                }
            }
        }

        entries.sort_by(|a, b| b.stored_at.cmp(&a.stored_at));
        Ok(entries)
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let cutoff = now - self.ttl;
        let mut removed = 0;

        for entry in self.list().await? {
            if entry.stored_at < cutoff && self.delete(&entry.id).await? {
                removed += 1;
            }
        }

        if removed > 0 {
            info!("Swept {} expired staged videos", removed);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> FileBlobStore {
        FileBlobStore::new(dir.path().join("staging"), Duration::hours(1))
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let id = store.put("clip.mp4", "video/mp4", b"movie bytes").await.unwrap();
        assert!(id.starts_with("video_"));

        let blob = store.get(&id).await.unwrap().unwrap();
        assert_eq!(blob.bytes, b"movie bytes");
        assert_eq!(blob.entry.name, "clip.mp4");
        assert_eq!(blob.entry.media_type, "video/mp4");
        assert_eq!(blob.entry.size, 11);

        assert!(store.delete(&id).await.unwrap());
        assert!(store.get(&id).await.unwrap().is_none());
        assert!(!store.delete(&id).await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_and_malformed_ids() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        assert!(store.get("video_doesnotexist").await.unwrap().is_none());
        assert!(matches!(store.get("../etc/passwd").await, Err(HookError::Storage(_))));
        assert!(store.delete("video_../x").await.is_err());
    }

    #[tokio::test]
    async fn test_sweep_removes_only_expired_entries() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let old = store.put("old.mp4", "video/mp4", b"old").await.unwrap();
        let fresh = store.put("fresh.mp4", "video/mp4", b"fresh").await.unwrap();

        // Backdate one sidecar past the TTL
        let mut entry = store.read_entry(&old).await.unwrap().unwrap();
        entry.stored_at = Utc::now() - Duration::hours(2);
        std::fs::write(store.entry_path(&old), serde_json::to_string(&entry).unwrap()).unwrap();

        assert_eq!(store.sweep_expired(Utc::now()).await.unwrap(), 1);
        assert!(store.get(&old).await.unwrap().is_none());
        assert!(store.get(&fresh).await.unwrap().is_some());

        // Far enough in the future everything expires
        assert_eq!(store.sweep_expired(Utc::now() + Duration::hours(3)).await.unwrap(), 1);
        assert!(store.list().await.unwrap().is_empty());
    }

    #[test]
    fn test_list_on_missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        assert!(tokio_test::block_on(store.list()).unwrap().is_empty());
    }
}
