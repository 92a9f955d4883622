//! In-process TTL cache.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use super::DividendCache;

struct CacheEntry {
    value: String,
    expires_at: Instant,
}

/// Minimum spacing between full sweeps triggered by writes.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

struct Entries {
    map: HashMap<String, CacheEntry>,
    last_sweep: Instant,
}

impl Entries {
    fn sweep(&mut self, now: Instant) {
        let before = self.map.len();
        self.map.retain(|_, e| e.expires_at > now);
        self.last_sweep = now;
        debug!(evicted = before - self.map.len(), "Evicted expired cache entries");
    }
}

/// `HashMap` behind a `RwLock`. An expired entry is removed when it is
/// read, and every write sweeps the whole map once `SWEEP_INTERVAL` has
/// passed since the last sweep, so keys that are never read again still go.
pub struct MemoryCache {
    entries: RwLock<Entries>,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self {
            entries: RwLock::new(Entries {
                map: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove expired entries now.
    pub async fn evict_expired(&self) {
        self.entries.write().await.sweep(Instant::now());
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.map.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl DividendCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.map.get(key) {
                None => return Ok(None),
                Some(e) if e.expires_at > now => return Ok(Some(e.value.clone())),
                Some(_) => {}
            }
        }

        // Expired: re-check under the write lock, a writer may have refreshed it.
        let mut entries = self.entries.write().await;
        if entries.map.get(key).is_some_and(|e| e.expires_at <= now) {
            entries.map.remove(key);
        }
        Ok(entries
            .map
            .get(key)
            .filter(|e| e.expires_at > now)
            .map(|e| e.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        if now.duration_since(entries.last_sweep) >= SWEEP_INTERVAL {
            entries.sweep(now);
        }
        entries.map.insert(
            key.to_string(),
            CacheEntry {
                value: value.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(())
    }
}
