mod cache_store;
mod geo_resolver;

pub use cache_store::{CacheError, CacheStore};
pub use geo_resolver::GeoResolver;
