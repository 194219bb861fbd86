//! Application Layer
//!
//! Use cases orchestrating domain services and ports: per-request geo
//! classification, read-through response caching and invalidation.

pub mod country_resolver;
pub mod geo_classifier;
pub mod invalidator;
pub mod lookup_memo;
pub mod response_cache;

pub use country_resolver::{CountryResolver, CountrySource, EDGE_COUNTRY_HEADER};
pub use geo_classifier::GeoClassifier;
pub use invalidator::CacheInvalidator;
pub use lookup_memo::{LookupMemo, MAX_MEMO_TTL};
pub use response_cache::{CacheOutcome, ResponseCache};
