//! segment-cache Library
//!
//! Geo segmentation and segment-aware response caching for a dual-locale
//! site. Exposes the components for use in integration tests and as a
//! library.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used types
pub use application::{CacheInvalidator, CacheOutcome, GeoClassifier, LookupMemo, ResponseCache};
pub use config::load_config;
pub use domain::entities::{CacheKey, CachedResponse, RequestGeoContext, RequestSignals};
pub use domain::ports::{CacheError, CacheStore, GeoResolver};
pub use domain::services::{CacheKeyBuilder, ClientAddressResolver, SegmentResolver};
pub use domain::value_objects::{CountryCode, Locale, Segment};
