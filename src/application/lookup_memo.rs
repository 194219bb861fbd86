//! Lookup Memo
//!
//! Short-lived IP → country memoization on the shared cache substrate,
//! under its own `geoip:` namespace.

use crate::domain::ports::{CacheError, CacheStore};
use crate::domain::value_objects::CountryCode;
use crate::infrastructure::LogThrottle;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

/// Namespace for memo keys.
pub const MEMO_NAMESPACE: &str = "geoip";

/// Country assignment is not permanent; entries never outlive this.
pub const MAX_MEMO_TTL: Duration = Duration::from_secs(3600);

/// IP → country memo.
///
/// `UNKNOWN` results are memoized too, bounding the retry cost for
/// addresses that never resolve. Substrate failures read as misses.
#[derive(Clone)]
pub struct LookupMemo {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
    throttle: Arc<LogThrottle>,
}

impl LookupMemo {
    /// Create a memo; `ttl` is clamped to [`MAX_MEMO_TTL`].
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration, throttle: Arc<LogThrottle>) -> Self {
        Self {
            store,
            ttl: ttl.min(MAX_MEMO_TTL),
            throttle,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn key(ip: IpAddr) -> String {
        format!("{}:{}", MEMO_NAMESPACE, ip)
    }

    pub async fn get(&self, ip: IpAddr) -> Option<CountryCode> {
        match self.store.get(&Self::key(ip)).await {
            Ok(Some(raw)) => match std::str::from_utf8(&raw) {
                Ok(s) => Some(CountryCode::new(s)),
                Err(_) => None,
            },
            Ok(None) => None,
            Err(e) => {
                if let Some(suppressed) = self.throttle.permit("memo-get") {
                    tracing::warn!(ip = %ip, error = %e, suppressed, "geo memo read failed");
                }
                None
            }
        }
    }

    pub async fn put(&self, ip: IpAddr, country: &CountryCode) {
        let value = country.as_str().as_bytes().to_vec();
        if let Err(e) = self.store.set(&Self::key(ip), value, self.ttl).await {
            if let Some(suppressed) = self.throttle.permit("memo-set") {
                tracing::warn!(ip = %ip, error = %e, suppressed, "geo memo write failed");
            }
        }
    }

    /// Drop every memoized lookup.
    pub async fn flush(&self) -> Result<usize, CacheError> {
        let removed = self
            .store
            .scan_delete(&format!("{}:*", MEMO_NAMESPACE))
            .await?;
        tracing::info!("flushed {} memoized geo lookups", removed);
        Ok(removed)
    }
}
