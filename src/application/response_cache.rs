//! Response Cache
//!
//! Read-through caching of handler results on the shared substrate. Keys
//! come from [`CacheKeyBuilder`](crate::domain::services::CacheKeyBuilder),
//! so segment isolation is a property of the key alone.

use crate::domain::entities::{CacheKey, CachedResponse};
use crate::domain::ports::{CacheError, CacheStore};
use crate::infrastructure::LogThrottle;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Headers every stored response varies on.
pub const BASE_VARY: [&str; 2] = ["Cookie", "Accept-Language"];

/// What happened to a request passing through the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    /// Served from the store; the handler did not run
    Hit,
    /// Handler ran and its result was handed to the store
    Miss,
    /// Handler ran and its result is not cacheable
    Bypass,
}

impl CacheOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hit => "HIT",
            Self::Miss => "MISS",
            Self::Bypass => "BYPASS",
        }
    }
}

/// Segment-aware response cache.
///
/// All substrate failures degrade to miss behaviour; the handler's
/// result is always returned.
#[derive(Clone)]
pub struct ResponseCache {
    store: Arc<dyn CacheStore>,
    throttle: Arc<LogThrottle>,
    vary: String,
}

impl ResponseCache {
    /// Create a cache. `extra_vary` adds header names (the edge country
    /// header when that detection path is active).
    pub fn new(store: Arc<dyn CacheStore>, throttle: Arc<LogThrottle>, extra_vary: &[&str]) -> Self {
        let vary = BASE_VARY
            .iter()
            .chain(extra_vary.iter())
            .copied()
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            store,
            throttle,
            vary,
        }
    }

    /// The `Vary` value forced onto stored responses.
    pub fn vary(&self) -> &str {
        &self.vary
    }

    /// Substrate in use (`local` or `redis`).
    pub fn mode(&self) -> &'static str {
        self.store.mode()
    }

    /// Serve `key` from the store, or run `handler` and store its result.
    ///
    /// Only 2xx results without `Set-Cookie` are stored. The handler and
    /// the store step run together on their own task, so the entry is
    /// written even if the caller is dropped mid-request.
    ///
    /// A handler error is a result that cannot be cached at all; it is
    /// handed back untouched.
    pub async fn serve<F, Fut, E>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        handler: F,
    ) -> Result<(CachedResponse, CacheOutcome), E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<CachedResponse, E>> + Send + 'static,
        E: Send + 'static,
    {
        if let Some(hit) = self.lookup(key).await {
            tracing::debug!(key = %key, "cache hit");
            return Ok((hit, CacheOutcome::Hit));
        }

        tracing::debug!(key = %key, "cache miss");
        let cache = self.clone();
        let key = key.clone();
        let task = tokio::spawn(async move {
            let mut response = match handler().await {
                Ok(response) => response,
                Err(passthrough) => return Err(passthrough),
            };

            if !response.is_success() || response.header("set-cookie").is_some() {
                return Ok((response, CacheOutcome::Bypass));
            }

            response.set_header("vary", &cache.vary);
            response.stamp(ttl);
            cache.store(&key, &response, ttl).await;

            Ok::<_, E>((response, CacheOutcome::Miss))
        });

        match task.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => {
                tracing::error!(error = %e, "cache fill task cancelled");
                Ok((
                    CachedResponse::new(500, Vec::new(), Vec::new()),
                    CacheOutcome::Bypass,
                ))
            }
        }
    }

    async fn lookup(&self, key: &CacheKey) -> Option<CachedResponse> {
        let raw = match self.store.get(key.as_str()).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                if let Some(suppressed) = self.throttle.permit("response-get") {
                    tracing::warn!(key = %key, error = %e, suppressed, "cache read failed, treating as miss");
                }
                return None;
            }
        };

        match decode(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "dropping undecodable cache entry");
                if let Err(e) = self.store.delete(key.as_str()).await {
                    if let Some(suppressed) = self.throttle.permit("response-delete") {
                        tracing::warn!(key = %key, error = %e, suppressed, "failed to evict undecodable entry");
                    }
                }
                None
            }
        }
    }

    async fn store(&self, key: &CacheKey, response: &CachedResponse, ttl: Duration) {
        let bytes = match encode(response) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(key = %key, error = %e, "failed to encode response for cache");
                return;
            }
        };

        match self.store.set(key.as_str(), bytes, ttl).await {
            Ok(()) => tracing::debug!(key = %key, ttl_secs = ttl.as_secs(), "cached"),
            Err(e) => {
                if let Some(suppressed) = self.throttle.permit("response-set") {
                    tracing::warn!(key = %key, error = %e, suppressed, "cache write failed");
                }
            }
        }
    }
}

fn encode(response: &CachedResponse) -> Result<Vec<u8>, CacheError> {
    bincode::serialize(response).map_err(|e| CacheError::Codec(e.to_string()))
}

fn decode(raw: &[u8]) -> Result<CachedResponse, CacheError> {
    bincode::deserialize(raw).map_err(|e| CacheError::Codec(e.to_string()))
}
