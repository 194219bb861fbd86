//! Geo Classifier - per-request classification use case
//!
//! Orchestrates the classification pipeline:
//! address resolution → memo → country resolution → segment assignment.

use crate::application::country_resolver::{CountryResolver, CountrySource};
use crate::application::lookup_memo::LookupMemo;
use crate::domain::entities::{RequestGeoContext, RequestSignals};
use crate::domain::services::{ClientAddressResolver, SegmentResolver};
use crate::infrastructure::LogThrottle;
use std::sync::Arc;

/// Geo classifier.
///
/// Produces one [`RequestGeoContext`] per request. Never fails; every
/// degraded step falls back to a safe default.
pub struct GeoClassifier {
    countries: CountryResolver,
    memo: LookupMemo,
    throttle: Arc<LogThrottle>,
}

impl GeoClassifier {
    pub fn new(countries: CountryResolver, memo: LookupMemo, throttle: Arc<LogThrottle>) -> Self {
        Self {
            countries,
            memo,
            throttle,
        }
    }

    pub fn countries(&self) -> &CountryResolver {
        &self.countries
    }

    pub fn memo(&self) -> &LookupMemo {
        &self.memo
    }

    /// Classify a request.
    pub async fn classify(&self, signals: &RequestSignals) -> RequestGeoContext {
        let address = ClientAddressResolver::resolve(signals);
        if address.malformed_header {
            if let Some(suppressed) = self.throttle.permit("address-malformed") {
                tracing::warn!(
                    ip = %address.ip,
                    source = ?address.source,
                    suppressed,
                    "ignored malformed client address header"
                );
            }
        }

        let country = match self.memo.get(address.ip).await {
            Some(country) => country,
            None => {
                let (country, source) = self
                    .countries
                    .resolve(address.ip, signals.edge_country.as_deref());
                self.memo.put(address.ip, &country).await;
                if source != CountrySource::Unresolved {
                    tracing::debug!(ip = %address.ip, country = %country, ?source, "country resolved");
                }
                country
            }
        };

        let assignment = SegmentResolver::resolve(&country, signals.override_view.as_deref());

        RequestGeoContext {
            client_ip: address.ip,
            country_code: country,
            segment: assignment.segment,
            locale: assignment.locale,
            override_applied: assignment.override_applied,
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::adapters::outbound::DashMapCacheStore;
    use crate::domain::ports::{CacheStore, GeoResolver};
    use crate::domain::value_objects::{CountryCode, Locale, Segment};
    use std::collections::HashMap;
    use std::net::IpAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    // ===== Test Helpers =====

    struct CountingGeo {
        table: HashMap<IpAddr, &'static str>,
        lookups: AtomicUsize,
    }

    impl GeoResolver for CountingGeo {
        fn country(&self, ip: IpAddr) -> Option<CountryCode> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.table.get(&ip).map(|c| CountryCode::new(c))
        }
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn classifier(store: Arc<dyn CacheStore>, trust_edge: bool) -> (GeoClassifier, Arc<CountingGeo>) {
        let mut table = HashMap::new();
        table.insert(ip("1.2.3.4"), "DE");
        table.insert(ip("5.6.7.8"), "US");
        table.insert(ip("85.100.1.1"), "TR");
        let geo = Arc::new(CountingGeo {
            table,
            lookups: AtomicUsize::new(0),
        });

        let throttle = Arc::new(LogThrottle::default());
        let countries = CountryResolver::new(
            Some(geo.clone() as Arc<dyn GeoResolver>),
            trust_edge,
            throttle.clone(),
        );
        let memo = LookupMemo::new(store, Duration::from_secs(3600), throttle.clone());
        (GeoClassifier::new(countries, memo, throttle), geo)
    }

    fn from_peer(addr: &str) -> RequestSignals {
        RequestSignals::from_peer(ip(addr))
    }

    // ===== Scenario Tests =====

    #[tokio::test]
    async fn test_database_country_global() {
        let (c, _) = classifier(Arc::new(DashMapCacheStore::new()), true);

        let ctx = c.classify(&from_peer("1.2.3.4")).await;

        assert_eq!(ctx.client_ip, ip("1.2.3.4"));
        assert_eq!(ctx.country_code.as_str(), "DE");
        assert_eq!(ctx.segment, Segment::Global);
        assert_eq!(ctx.locale, Locale::En);
        assert!(!ctx.override_applied);
    }

    #[tokio::test]
    async fn test_edge_header_tr_is_local() {
        let (c, _) = classifier(Arc::new(DashMapCacheStore::new()), true);
        let signals = RequestSignals {
            edge_country: Some("TR".to_string()),
            ..from_peer("5.6.7.8")
        };

        let ctx = c.classify(&signals).await;

        assert_eq!(ctx.country_code.as_str(), "TR");
        assert_eq!(ctx.segment, Segment::Local);
        assert_eq!(ctx.locale, Locale::Tr);
    }

    #[tokio::test]
    async fn test_override_cookie_global_on_tr() {
        let (c, _) = classifier(Arc::new(DashMapCacheStore::new()), true);
        let signals = RequestSignals {
            override_view: Some("GLOBAL".to_string()),
            ..from_peer("85.100.1.1")
        };

        let ctx = c.classify(&signals).await;

        assert_eq!(ctx.country_code.as_str(), "TR");
        assert_eq!(ctx.segment, Segment::Global);
        assert_eq!(ctx.locale, Locale::En);
        assert!(ctx.override_applied);
    }

    #[tokio::test]
    async fn test_forwarded_for_address_is_classified() {
        let (c, _) = classifier(Arc::new(DashMapCacheStore::new()), true);
        let signals = RequestSignals {
            forwarded_for: Some("85.100.1.1, 10.0.0.1".to_string()),
            ..from_peer("10.0.0.2")
        };

        let ctx = c.classify(&signals).await;

        assert_eq!(ctx.client_ip, ip("85.100.1.1"));
        assert_eq!(ctx.segment, Segment::Local);
    }

    #[tokio::test]
    async fn test_unresolvable_ip_is_global_unknown() {
        let (c, _) = classifier(Arc::new(DashMapCacheStore::new()), true);

        let ctx = c.classify(&from_peer("127.0.0.1")).await;

        assert!(ctx.country_code.is_unknown());
        assert_eq!(ctx.segment, Segment::Global);
        assert_eq!(ctx.locale, Locale::En);
    }

    // ===== Memo Tests =====

    #[tokio::test]
    async fn test_memo_avoids_repeat_lookups() {
        let (c, geo) = classifier(Arc::new(DashMapCacheStore::new()), true);

        for _ in 0..5 {
            c.classify(&from_peer("1.2.3.4")).await;
        }

        assert_eq!(geo.lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_is_memoized_too() {
        let (c, geo) = classifier(Arc::new(DashMapCacheStore::new()), true);

        c.classify(&from_peer("192.168.0.10")).await;
        c.classify(&from_peer("192.168.0.10")).await;

        assert_eq!(geo.lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_memo_hit_still_applies_override() {
        let (c, _) = classifier(Arc::new(DashMapCacheStore::new()), true);

        let first = c.classify(&from_peer("85.100.1.1")).await;
        let second = c
            .classify(&RequestSignals {
                override_view: Some("GLOBAL".to_string()),
                ..from_peer("85.100.1.1")
            })
            .await;

        assert_eq!(first.segment, Segment::Local);
        assert_eq!(second.segment, Segment::Global);
        assert!(second.override_applied);
    }
}
