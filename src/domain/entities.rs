//! Domain Entities - Core business objects
//!
//! These entities represent the core concepts of geo segmentation and
//! segment-aware caching. They have no external dependencies beyond serde.

use crate::domain::value_objects::{CountryCode, Locale, Segment};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Raw per-request inputs to geo classification.
///
/// Extracted by the inbound adapter from headers, cookies and the
/// connection itself. Values are untrusted and unvalidated.
#[derive(Debug, Clone)]
pub struct RequestSignals {
    /// Peer address of the TCP connection
    pub peer: IpAddr,
    /// Client IP set by the edge network (`CF-Connecting-IP`)
    pub edge_client_ip: Option<String>,
    /// Generic forwarded-for list (`X-Forwarded-For`)
    pub forwarded_for: Option<String>,
    /// Country set by the edge network (`CF-IPCountry`)
    pub edge_country: Option<String>,
    /// Sticky segment preference (`force_view` cookie)
    pub override_view: Option<String>,
}

impl RequestSignals {
    /// Signals for a bare connection with no headers or cookies.
    pub fn from_peer(peer: IpAddr) -> Self {
        Self {
            peer,
            edge_client_ip: None,
            forwarded_for: None,
            edge_country: None,
            override_view: None,
        }
    }
}

/// Geo classification attached to a request.
///
/// Produced once per request and read by every downstream handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestGeoContext {
    /// Validated client address
    pub client_ip: IpAddr,
    /// Detected country, or `UNKNOWN`
    pub country_code: CountryCode,
    /// Final segment after any override
    pub segment: Segment,
    /// Content language for the segment
    pub locale: Locale,
    /// True when a sticky preference replaced the detected segment
    pub override_applied: bool,
}

/// Deterministic identifier of a cached artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub(crate) fn new(key: String) -> Self {
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stored handler result.
///
/// Header values are kept as raw bytes since HTTP does not require them
/// to be UTF-8.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, Vec<u8>)>,
    pub body: Vec<u8>,
    /// Unix seconds when the entry was written (0 until stored)
    pub stored_at: u64,
    pub ttl_secs: u64,
}

impl CachedResponse {
    pub fn new(status: u16, headers: Vec<(String, Vec<u8>)>, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
            stored_at: 0,
            ttl_secs: 0,
        }
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First value of a header (case-insensitive name match).
    pub fn header(&self, name: &str) -> Option<&[u8]> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_slice())
    }

    /// Replace every value of a header with a single value.
    pub fn set_header(&mut self, name: &str, value: &str) {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self.headers
            .push((name.to_ascii_lowercase(), value.as_bytes().to_vec()));
    }

    /// Record storage time and lifetime.
    pub fn stamp(&mut self, ttl: Duration) {
        self.stored_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.ttl_secs = ttl.as_secs();
    }
}
