//! GeoIP Resolver Port
//!
//! Defines the interface for resolving IP addresses to countries.

use crate::domain::value_objects::CountryCode;
use std::net::IpAddr;

/// Resolver for IP address to country.
///
/// This is an outbound port that abstracts the offline IP-geography
/// database. Implementations may use MaxMind GeoLite2, IP2Location, or
/// other databases.
pub trait GeoResolver: Send + Sync {
    /// Resolve an IP address to its country.
    ///
    /// Returns None if the IP is not in the database or the lookup
    /// fails. Implementations must not panic.
    fn country(&self, ip: IpAddr) -> Option<CountryCode>;
}
