//! Country Resolver
//!
//! Turns a client IP into a country code. Prefers the edge network's
//! country header, falls back to the offline database, else `UNKNOWN`.

use crate::domain::ports::GeoResolver;
use crate::domain::value_objects::CountryCode;
use crate::infrastructure::LogThrottle;
use std::net::IpAddr;
use std::sync::Arc;

/// Edge country header.
pub const EDGE_COUNTRY_HEADER: &str = "CF-IPCountry";

/// Edge header values meaning "no usable country" (unknown, Tor).
pub const EDGE_COUNTRY_SENTINELS: [&str; 2] = ["XX", "T1"];

/// Which step produced the country.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountrySource {
    EdgeHeader,
    Database,
    Unresolved,
}

/// Country resolver.
///
/// Never fails: every error or miss resolves to `UNKNOWN`. Without a
/// database handle (failed open at startup) only the edge header step
/// remains.
pub struct CountryResolver {
    database: Option<Arc<dyn GeoResolver>>,
    trust_edge_country: bool,
    throttle: Arc<LogThrottle>,
}

impl CountryResolver {
    pub fn new(
        database: Option<Arc<dyn GeoResolver>>,
        trust_edge_country: bool,
        throttle: Arc<LogThrottle>,
    ) -> Self {
        Self {
            database,
            trust_edge_country,
            throttle,
        }
    }

    /// Whether the edge country header is part of detection.
    pub fn trusts_edge_country(&self) -> bool {
        self.trust_edge_country
    }

    pub fn has_database(&self) -> bool {
        self.database.is_some()
    }

    pub fn resolve(&self, ip: IpAddr, edge_country: Option<&str>) -> (CountryCode, CountrySource) {
        if self.trust_edge_country {
            if let Some(code) = edge_country.and_then(edge_code) {
                return (code, CountrySource::EdgeHeader);
            }
        }

        if let Some(db) = &self.database {
            if let Some(code) = db.country(ip) {
                return (code, CountrySource::Database);
            }
        }

        if let Some(suppressed) = self.throttle.permit("country-unresolved") {
            tracing::warn!(ip = %ip, suppressed, "country unresolved, using UNKNOWN");
        }
        (CountryCode::unknown(), CountrySource::Unresolved)
    }
}

fn edge_code(raw: &str) -> Option<CountryCode> {
    let upper = raw.trim().to_ascii_uppercase();
    if upper.is_empty() || EDGE_COUNTRY_SENTINELS.contains(&upper.as_str()) {
        return None;
    }
    let code = CountryCode::new(&upper);
    (!code.is_unknown()).then_some(code)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::collections::HashMap;

    // ===== Test Helpers =====

    struct FixedGeo(HashMap<IpAddr, &'static str>);

    impl GeoResolver for FixedGeo {
        fn country(&self, ip: IpAddr) -> Option<CountryCode> {
            self.0.get(&ip).map(|c| CountryCode::new(c))
        }
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn resolver(trust_edge: bool) -> CountryResolver {
        let mut table = HashMap::new();
        table.insert(ip("1.2.3.4"), "DE");
        table.insert(ip("5.6.7.8"), "US");
        CountryResolver::new(
            Some(Arc::new(FixedGeo(table))),
            trust_edge,
            Arc::new(LogThrottle::default()),
        )
    }

    // ===== Precedence Tests =====

    #[test]
    fn test_database_lookup() {
        let (code, source) = resolver(true).resolve(ip("1.2.3.4"), None);

        assert_eq!(code.as_str(), "DE");
        assert_eq!(source, CountrySource::Database);
    }

    #[test]
    fn test_edge_header_beats_database() {
        let (code, source) = resolver(true).resolve(ip("5.6.7.8"), Some("TR"));

        assert_eq!(code.as_str(), "TR");
        assert_eq!(source, CountrySource::EdgeHeader);
    }

    #[test]
    fn test_edge_header_is_uppercased() {
        let (code, _) = resolver(true).resolve(ip("5.6.7.8"), Some("tr"));
        assert_eq!(code.as_str(), "TR");
    }

    #[test]
    fn test_edge_header_ignored_when_not_trusted() {
        let (code, source) = resolver(false).resolve(ip("5.6.7.8"), Some("TR"));

        assert_eq!(code.as_str(), "US");
        assert_eq!(source, CountrySource::Database);
    }

    #[test]
    fn test_sentinel_edge_values_fall_back_to_database() {
        for sentinel in ["XX", "xx", "T1", "", "  "] {
            let (code, source) = resolver(true).resolve(ip("1.2.3.4"), Some(sentinel));
            assert_eq!(code.as_str(), "DE", "sentinel: {:?}", sentinel);
            assert_eq!(source, CountrySource::Database);
        }
    }

    // ===== Degradation Tests =====

    #[test]
    fn test_database_miss_is_unknown() {
        let (code, source) = resolver(true).resolve(ip("192.168.1.1"), None);

        assert!(code.is_unknown());
        assert_eq!(source, CountrySource::Unresolved);
    }

    #[test]
    fn test_without_database_uses_header_or_unknown() {
        let r = CountryResolver::new(None, true, Arc::new(LogThrottle::default()));
        assert!(!r.has_database());

        assert_eq!(r.resolve(ip("1.2.3.4"), Some("FR")).0.as_str(), "FR");
        assert!(r.resolve(ip("1.2.3.4"), None).0.is_unknown());
    }

    #[test]
    #[tracing_test::traced_test]
    fn test_unresolved_logs_warning() {
        let r = CountryResolver::new(None, false, Arc::new(LogThrottle::default()));
        r.resolve(ip("10.1.1.1"), None);

        assert!(logs_contain("country unresolved"));
    }
}
