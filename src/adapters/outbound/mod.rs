mod dashmap_cache_store;
mod maxmind_geo_resolver;
mod redis_cache_store;

pub use dashmap_cache_store::DashMapCacheStore;
pub use maxmind_geo_resolver::MaxMindGeoResolver;
pub use redis_cache_store::RedisCacheStore;
