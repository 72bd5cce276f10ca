//! File-per-entry persistent cache.
//!
//! Each entry lives at `<dir>/<sha256-of-key>.json` and records the key it was
//! stored under, so a digest collision or a hand-edited file reads as a miss.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{Cache, CacheKey};

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry<V> {
    key: serde_json::Value,
    value: V,
    created_at: DateTime<Utc>,
}

/// Persistent cache storing one JSON file per key.
#[derive(Debug, Clone)]
pub struct DiskCache {
    dir: PathBuf,
    ttl: Option<Duration>,
}

impl DiskCache {
    /// Cache rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ttl: None,
        }
    }

    /// Treat entries older than `ttl` as absent (and delete them on read).
    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    fn entry_path(&self, digest: &str) -> PathBuf {
        self.dir.join(format!("{}.json", digest))
    }

    fn is_expired(&self, created_at: DateTime<Utc>) -> bool {
        match self.ttl {
            Some(ttl) => (Utc::now() - created_at).to_std().unwrap_or_default() > ttl,
            None => false,
        }
    }
}

#[async_trait]
impl<K, V> Cache<K, V> for DiskCache
where
    K: CacheKey + Send + Sync,
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn get(&self, key: &K) -> Option<V> {
        let digest = key.digest();
        let path = self.entry_path(&digest);

        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Failed to read cache entry {}: {}", path.display(), e);
                return None;
            }
        };

        let entry: StoredEntry<V> = match serde_json::from_slice(&data) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Cache entry {} is corrupt, ignoring: {}", path.display(), e);
                return None;
            }
        };

        if serde_json::to_value(key).ok().as_ref() != Some(&entry.key) {
            warn!(key = %&digest[..8], "Cache entry key mismatch, ignoring");
            return None;
        }

        if self.is_expired(entry.created_at) {
            debug!(key = %&digest[..8], "Cache entry expired, removing");
            if let Err(e) = tokio::fs::remove_file(&path).await {
                warn!("Failed to remove expired cache entry {}: {}", path.display(), e);
            }
            return None;
        }

        Some(entry.value)
    }

    async fn put(&self, key: &K, value: V) -> anyhow::Result<()> {
        let digest = key.digest();
        let path = self.entry_path(&digest);

        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create cache dir {}", self.dir.display()))?;

        let entry = StoredEntry {
            key: serde_json::to_value(key)?,
            value,
            created_at: Utc::now(),
        };
        let data = serde_json::to_vec_pretty(&entry)?;

        // Write-then-rename so readers never observe a partial entry.
        let tmp = self.dir.join(format!(
            "{}.json.tmp-{}-{}",
            digest,
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        let stored = match tokio::fs::write(&tmp, data).await {
            Ok(()) => tokio::fs::rename(&tmp, &path)
                .await
                .with_context(|| format!("failed to move cache entry into {}", path.display())),
            Err(e) => Err(e).with_context(|| format!("failed to write {}", tmp.display())),
        };
        if stored.is_err() {
            if let Err(e) = tokio::fs::remove_file(&tmp).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to remove temp cache file {}: {}", tmp.display(), e);
                }
            }
        }
        stored?;

        debug!(key = %&digest[..8], "Stored cache entry");
        Ok(())
    }
}
