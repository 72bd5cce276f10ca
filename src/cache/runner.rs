//! Memoizing wrapper around an agent runner.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{Cache, CacheKey, RequestKey};
use crate::agent::{AgentRunner, RunnerRef};

/// Shared reference to a response cache.
pub type CacheRef = Arc<dyn Cache<RequestKey, String>>;

/// Serves repeated requests from a cache and runs the agent only on misses.
///
/// Concurrent misses for the same key are serialized: the first caller
/// computes, later callers wait and then read the stored result. Failed runs
/// are never cached.
pub struct CachedRunner {
    inner: RunnerRef,
    cache: CacheRef,
    in_flight: InFlight,
}

type InFlight = Mutex<HashMap<String, Slot>>;

/// Per-key lock plus the number of callers currently holding or waiting on it.
#[derive(Default)]
struct Slot {
    lock: Arc<tokio::sync::Mutex<()>>,
    holders: usize,
}

/// A caller's membership in the in-flight map for one key.
///
/// Leaving happens on drop, so a cancelled request (client disconnect) does
/// not strand its entry.
struct SlotGuard<'a> {
    in_flight: &'a InFlight,
    digest: String,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl<'a> SlotGuard<'a> {
    fn join(in_flight: &'a InFlight, digest: String) -> Self {
        let mut map = in_flight.lock().unwrap_or_else(|e| e.into_inner());
        let slot = map.entry(digest.clone()).or_default();
        slot.holders += 1;
        let lock = Arc::clone(&slot.lock);
        drop(map);

        Self {
            in_flight,
            digest,
            lock,
        }
    }
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        let mut map = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(slot) = map.get_mut(&self.digest) {
            slot.holders = slot.holders.saturating_sub(1);
            if slot.holders == 0 {
                map.remove(&self.digest);
            }
        }
    }
}

impl CachedRunner {
    pub fn new(inner: RunnerRef, cache: CacheRef) -> Self {
        Self {
            inner,
            cache,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached answer for `(message, model)`, computing and storing
    /// it on a miss.
    pub async fn get_or_compute(&self, message: &str, model: &str) -> anyhow::Result<String> {
        if message.is_empty() {
            return Ok(String::new());
        }

        let key = RequestKey::new(message, model);
        if let Some(hit) = self.cache.get(&key).await {
            debug!(model = %model, "Response cache hit");
            return Ok(hit);
        }

        let slot = SlotGuard::join(&self.in_flight, key.digest());
        let _locked = slot.lock.lock().await;
        self.compute_locked(&key).await
    }

    async fn compute_locked(&self, key: &RequestKey) -> anyhow::Result<String> {
        // Another caller may have filled the entry while we waited.
        if let Some(hit) = self.cache.get(key).await {
            debug!(model = %key.model, "Response cache hit after wait");
            return Ok(hit);
        }

        debug!(model = %key.model, "Response cache miss, running agent");
        let output = self.inner.run_agent(&key.message, &key.model).await?;

        if let Err(e) = self.cache.put(key, output.clone()).await {
            warn!("Failed to persist response cache entry: {:#}", e);
        }
        Ok(output)
    }

    #[cfg(test)]
    fn in_flight_len(&self) -> usize {
        self.in_flight.lock().map(|m| m.len()).unwrap_or(0)
    }
}

#[async_trait]
impl AgentRunner for CachedRunner {
    async fn run_agent(&self, message: &str, model: &str) -> anyhow::Result<String> {
        self.get_or_compute(message, model).await
    }
}
