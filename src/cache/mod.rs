//! Whole-run response cache.
//!
//! Model-level caching cannot memoize a multi-step agent trace, so complete
//! agent runs are cached here, keyed by the full request (message + model).
//! [`DiskCache`] persists one JSON file per entry; [`CachedRunner`] composes
//! a cache around any [`AgentRunner`](crate::agent::AgentRunner).
//!
//! Entries never expire unless a TTL is configured, so answers about current
//! events can go stale.

mod disk;
mod runner;

pub use disk::DiskCache;
pub use runner::{CacheRef, CachedRunner};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Key-value store used to memoize runs.
#[async_trait]
pub trait Cache<K, V>: Send + Sync
where
    K: Send + Sync,
    V: Send,
{
    /// Look up a stored value. Unreadable entries count as misses.
    async fn get(&self, key: &K) -> Option<V>;

    /// Store a value, replacing any previous one.
    async fn put(&self, key: &K, value: V) -> anyhow::Result<()>;
}

/// Cache key: the complete request that produced an answer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestKey {
    pub message: String,
    pub model: String,
}

impl RequestKey {
    pub fn new(message: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            model: model.into(),
        }
    }
}

/// Something with a stable content digest usable as a file name.
pub trait CacheKey: Serialize {
    /// Hex SHA-256 of the key's JSON serialization.
    fn digest(&self) -> String {
        // Serializing plain structs of strings cannot fail.
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        hex::encode(Sha256::digest(&bytes))
    }
}

impl CacheKey for RequestKey {}
