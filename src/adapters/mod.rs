//! Adapters Layer
//!
//! Inbound adapters drive the application (HTTP); outbound adapters
//! implement the domain ports (GeoIP database, cache substrates).

pub mod inbound;
pub mod outbound;
