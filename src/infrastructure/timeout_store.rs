//! Timeout-bounded Cache Store
//!
//! Decorator that puts a time budget on every substrate call so that a slow
//! or unreachable backend can never stall a request.

use crate::domain::ports::{CacheError, CacheStore};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Time budgets for substrate calls.
#[derive(Debug, Clone, Copy)]
pub struct StoreTimeouts {
    /// Budget for get / set / delete on the request path
    pub op: Duration,
    /// Budget for scan-and-delete and flush
    pub bulk: Duration,
}

impl Default for StoreTimeouts {
    fn default() -> Self {
        Self {
            op: Duration::from_millis(250),
            bulk: Duration::from_secs(30),
        }
    }
}

/// CacheStore wrapper that fails calls exceeding their budget.
pub struct TimeoutCacheStore {
    inner: Arc<dyn CacheStore>,
    timeouts: StoreTimeouts,
}

impl TimeoutCacheStore {
    pub fn new(inner: Arc<dyn CacheStore>, timeouts: StoreTimeouts) -> Self {
        Self { inner, timeouts }
    }
}

async fn bounded<T, F>(budget: Duration, fut: F) -> Result<T, CacheError>
where
    F: Future<Output = Result<T, CacheError>>,
{
    match tokio::time::timeout(budget, fut).await {
        Ok(result) => result,
        Err(_) => Err(CacheError::Timeout(budget)),
    }
}

#[async_trait]
impl CacheStore for TimeoutCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        bounded(self.timeouts.op, self.inner.get(key)).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        bounded(self.timeouts.op, self.inner.set(key, value, ttl)).await
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        bounded(self.timeouts.op, self.inner.delete(key)).await
    }

    async fn scan_delete(&self, pattern: &str) -> Result<usize, CacheError> {
        bounded(self.timeouts.bulk, self.inner.scan_delete(pattern)).await
    }

    async fn flush(&self) -> Result<usize, CacheError> {
        bounded(self.timeouts.bulk, self.inner.flush()).await
    }

    fn mode(&self) -> &'static str {
        self.inner.mode()
    }
}
