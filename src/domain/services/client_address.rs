//! Client Address Resolver
//!
//! Pure domain logic for picking the real client IP out of a chain of
//! proxy headers. No external dependencies.

use crate::domain::entities::RequestSignals;
use std::net::{IpAddr, SocketAddr};

/// Where the resolved client address came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressSource {
    /// Edge-network header, set only by a gateway the operator controls
    EdgeHeader,
    /// First entry of the forwarded-for list
    ForwardedFor,
    /// TCP peer address
    Peer,
}

/// Outcome of address resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedAddress {
    pub ip: IpAddr,
    pub source: AddressSource,
    /// A header was present but did not hold a usable address
    pub malformed_header: bool,
}

/// Client address resolver.
///
/// Precedence, first usable wins:
/// 1. Edge-network connecting-IP header
/// 2. First entry of the forwarded-for list
/// 3. Peer address
///
/// A present but unparsable header is skipped, never an error. The peer
/// address is the only wholly trustworthy fallback.
pub struct ClientAddressResolver;

impl ClientAddressResolver {
    pub fn resolve(signals: &RequestSignals) -> ResolvedAddress {
        let mut malformed_header = false;

        if let Some(raw) = signals.edge_client_ip.as_deref() {
            match parse_ip(raw) {
                Some(ip) => {
                    return ResolvedAddress {
                        ip,
                        source: AddressSource::EdgeHeader,
                        malformed_header,
                    }
                }
                None => malformed_header = true,
            }
        }

        if let Some(raw) = signals.forwarded_for.as_deref() {
            let first = raw.split(',').next().unwrap_or_default();
            match parse_ip(first) {
                Some(ip) => {
                    return ResolvedAddress {
                        ip,
                        source: AddressSource::ForwardedFor,
                        malformed_header,
                    }
                }
                None => malformed_header = true,
            }
        }

        ResolvedAddress {
            ip: signals.peer,
            source: AddressSource::Peer,
            malformed_header,
        }
    }
}

/// Parse a bare address, tolerating an attached port (`1.2.3.4:80`,
/// `[::1]:443`).
fn parse_ip(raw: &str) -> Option<IpAddr> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    raw.parse::<IpAddr>()
        .ok()
        .or_else(|| raw.parse::<SocketAddr>().ok().map(|s| s.ip()))
}
