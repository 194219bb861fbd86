mod cache_layer;
mod geo_layer;
mod http_server;

pub use cache_layer::{from_cached, to_cached, wrap, CachedRoute, CACHE_STATUS_HEADER};
pub use geo_layer::{extract_signals, geo_middleware, merge_vary, FORCE_VIEW_COOKIE};
pub use http_server::{router, HttpServer, HttpSettings, HttpState, NO_CACHE};

// Re-export for external use (e.g., integration tests)
#[allow(unused_imports)]
pub use http_server::{GeoDetectResponse, HealthResponse};
