//! Cache Store Port
//!
//! Defines the interface to the shared key-value substrate that backs both
//! geo-lookup memoization and response caching.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Failure of the cache substrate.
///
/// Request-path callers treat every variant as a cache miss.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("cache backend error: {0}")]
    Backend(String),

    #[error("cached entry could not be decoded: {0}")]
    Codec(String),
}

/// Shared key-value store with TTLs and pattern eviction.
///
/// Keys passed in are logical keys; implementations may namespace them.
/// Patterns are glob-style (`*` and `?`).
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get the value for a key, if present and not expired.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Store a value with a time-to-live. Last write wins.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;

    /// Remove a key. Returns whether it existed.
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    /// Delete every key matching the pattern.
    ///
    /// Not atomic: keys written while the scan runs may survive. Returns
    /// the number of keys deleted.
    async fn scan_delete(&self, pattern: &str) -> Result<usize, CacheError>;

    /// Remove every key owned by this store. Returns the number removed.
    async fn flush(&self) -> Result<usize, CacheError>;

    /// Short name of the backend, for health output.
    fn mode(&self) -> &'static str;
}
