//! Cache Invalidator
//!
//! Administrative bulk eviction by key pattern, segment, or logical name.

use crate::domain::ports::{CacheError, CacheStore};
use crate::domain::services::CacheKeyBuilder;
use crate::domain::value_objects::Segment;
use std::sync::Arc;

/// Cache invalidator.
///
/// Eviction is best-effort: keys written while a scan is running may
/// survive it.
#[derive(Clone)]
pub struct CacheInvalidator {
    store: Arc<dyn CacheStore>,
}

impl CacheInvalidator {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Delete every key matching a glob pattern. Returns the evicted count.
    pub async fn invalidate_by_pattern(&self, pattern: &str) -> Result<usize, CacheError> {
        match self.store.scan_delete(pattern).await {
            Ok(removed) => {
                tracing::info!(pattern, removed, "invalidated cache keys");
                Ok(removed)
            }
            Err(e) => {
                tracing::error!(pattern, error = %e, "cache invalidation failed");
                Err(e)
            }
        }
    }

    /// Evict every entry of one segment, leaving the other intact.
    pub async fn invalidate_segment(&self, segment: Segment) -> Result<usize, CacheError> {
        self.invalidate_by_pattern(&CacheKeyBuilder::segment_pattern(segment))
            .await
    }

    /// Evict every entry of one logical name across segments and locales.
    pub async fn invalidate_logical(&self, logical: &str) -> Result<usize, CacheError> {
        self.invalidate_by_pattern(&CacheKeyBuilder::logical_pattern(logical))
            .await
    }

    /// Evict everything in the substrate's namespace.
    pub async fn clear_all(&self) -> Result<usize, CacheError> {
        match self.store.flush().await {
            Ok(removed) => {
                tracing::info!(removed, mode = self.store.mode(), "cleared cache");
                Ok(removed)
            }
            Err(e) => {
                tracing::error!(error = %e, "cache clear failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::adapters::outbound::DashMapCacheStore;
    use crate::domain::value_objects::Locale;
    use std::time::Duration;

    const NO_PARAMS: [(&str, &str); 0] = [];

    async fn seeded() -> (Arc<DashMapCacheStore>, CacheInvalidator) {
        let store = Arc::new(DashMapCacheStore::new());
        let ttl = Duration::from_secs(300);
        for logical in ["page:home-tr", "page:home-en", "api:products"] {
            for segment in [Segment::Local, Segment::Global] {
                let key =
                    CacheKeyBuilder::build(logical, segment, Locale::for_segment(segment), NO_PARAMS);
                store.set(key.as_str(), b"body".to_vec(), ttl).await.unwrap();
            }
        }
        store.set("geoip:1.2.3.4", b"DE".to_vec(), ttl).await.unwrap();
        (store.clone(), CacheInvalidator::new(store))
    }

    // ===== Segment Tests =====

    #[tokio::test]
    async fn test_invalidate_segment_leaves_other_segment() {
        let (store, inv) = seeded().await;

        let removed = inv.invalidate_segment(Segment::Local).await.unwrap();

        assert_eq!(removed, 3);
        assert!(store.get("page:home-tr:LOCAL:tr").await.unwrap().is_none());
        assert!(store.get("page:home-tr:GLOBAL:en").await.unwrap().is_some());
        assert!(store.get("api:products:GLOBAL:en").await.unwrap().is_some());
        assert!(store.get("geoip:1.2.3.4").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_segment_named_param_value_stays_in_its_segment() {
        let store = Arc::new(DashMapCacheStore::new());
        let inv = CacheInvalidator::new(store.clone());
        let key = CacheKeyBuilder::build(
            "api:list",
            Segment::Global,
            Locale::En,
            [("a", "LOCAL"), ("b", "1")],
        );
        store
            .set(key.as_str(), b"body".to_vec(), Duration::from_secs(300))
            .await
            .unwrap();

        assert_eq!(inv.invalidate_segment(Segment::Local).await.unwrap(), 0);
        assert!(store.get(key.as_str()).await.unwrap().is_some());
        assert_eq!(inv.invalidate_segment(Segment::Global).await.unwrap(), 1);
    }

    // ===== Pattern Tests =====

    #[tokio::test]
    async fn test_invalidate_logical() {
        let (store, inv) = seeded().await;

        let removed = inv.invalidate_logical("api:products").await.unwrap();

        assert_eq!(removed, 2);
        assert!(store.get("page:home-en:GLOBAL:en").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_pattern_without_matches_is_zero() {
        let (_, inv) = seeded().await;
        assert_eq!(inv.invalidate_by_pattern("nothing:*").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_invalid_pattern_is_error() {
        let (_, inv) = seeded().await;
        assert!(inv.invalidate_by_pattern("[").await.is_err());
    }

    #[tokio::test]
    async fn test_clear_all() {
        let (store, inv) = seeded().await;

        assert_eq!(inv.clear_all().await.unwrap(), 7);
        assert!(store.is_empty());
    }
}
