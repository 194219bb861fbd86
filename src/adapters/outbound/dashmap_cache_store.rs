//! DashMap Cache Store
//!
//! Implements CacheStore in-process using DashMap for lock-free concurrent
//! access. Used when no networked substrate is configured.

use crate::domain::ports::{CacheError, CacheStore};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct StoredValue {
    data: Vec<u8>,
    expires_at: Instant,
}

impl StoredValue {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Shortest sweep period accepted by [`DashMapCacheStore::start_gc`].
const MIN_GC_INTERVAL: Duration = Duration::from_secs(1);

/// DashMap-backed cache store.
///
/// Expiry is checked on read; a background task sweeps entries nobody
/// reads again.
#[derive(Clone)]
pub struct DashMapCacheStore {
    entries: Arc<DashMap<String, StoredValue>>,
}

impl DashMapCacheStore {
    /// Create a new, empty store.
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
        }
    }

    /// Start the background expiry sweep.
    pub fn start_gc(&self, interval: Duration) {
        let entries = self.entries.clone();
        let interval = interval.max(MIN_GC_INTERVAL);

        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;

                let removed = purge_expired(&entries);
                if removed > 0 {
                    tracing::debug!("cache GC removed {} expired entries", removed);
                }
            }
        });
    }

    /// Remove all expired entries now.
    pub fn cleanup_expired(&self) -> usize {
        purge_expired(&self.entries)
    }

    /// Number of entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn remove_matching<F>(&self, matches: F) -> usize
    where
        F: Fn(&str) -> bool,
    {
        let to_remove: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| matches(entry.key()))
            .map(|entry| entry.key().clone())
            .collect();

        // Count only keys still present; a concurrent delete may win.
        to_remove
            .iter()
            .filter(|key| self.entries.remove(key.as_str()).is_some())
            .count()
    }
}

impl Default for DashMapCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

fn purge_expired(entries: &DashMap<String, StoredValue>) -> usize {
    let now = Instant::now();
    let before = entries.len();
    entries.retain(|_, value| !value.is_expired(now));
    before.saturating_sub(entries.len())
}

#[async_trait]
impl CacheStore for DashMapCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(now) {
                return Ok(Some(entry.data.clone()));
            }
        }
        // Expired or absent; drop any stale entry outside the read guard.
        self.entries.remove_if(key, |_, v| v.is_expired(now));
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        self.entries.insert(
            key.to_string(),
            StoredValue {
                data: value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.entries.remove(key).is_some())
    }

    async fn scan_delete(&self, pattern: &str) -> Result<usize, CacheError> {
        let pattern = glob::Pattern::new(pattern)
            .map_err(|e| CacheError::Backend(format!("invalid pattern '{}': {}", pattern, e)))?;

        Ok(self.remove_matching(|key| pattern.matches(key)))
    }

    async fn flush(&self) -> Result<usize, CacheError> {
        let count = self.entries.len();
        self.entries.clear();
        Ok(count)
    }

    fn mode(&self) -> &'static str {
        "local"
    }
}
