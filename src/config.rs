use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    // HTTP settings
    pub listen_addr: String,
    pub debug: bool,

    // Geo detection settings
    pub geoip_path: String,
    pub edge_geo: bool,
    pub geo_detection: bool,
    pub geo_memo_ttl_secs: u64,

    // Cache substrate settings
    pub redis_url: Option<String>,
    pub redis_prefix: String,
    pub redis_pool_size: usize,
    pub cache_timeout_ms: u64,
    pub invalidate_timeout_secs: u64,
    pub gc_interval_secs: u64,

    // Cache TTLs
    pub page_ttl_secs: u64,
    pub api_ttl_secs: u64,
}

impl Config {
    pub fn page_ttl(&self) -> Duration {
        Duration::from_secs(self.page_ttl_secs)
    }

    pub fn api_ttl(&self) -> Duration {
        Duration::from_secs(self.api_ttl_secs)
    }

    pub fn geo_memo_ttl(&self) -> Duration {
        Duration::from_secs(self.geo_memo_ttl_secs)
    }

    pub fn cache_timeout(&self) -> Duration {
        Duration::from_millis(self.cache_timeout_ms)
    }

    pub fn invalidate_timeout(&self) -> Duration {
        Duration::from_secs(self.invalidate_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            debug: false,
            geoip_path: "geoip/GeoLite2-Country.mmdb".to_string(),
            edge_geo: false,
            geo_detection: true,
            geo_memo_ttl_secs: 3600,
            redis_url: None,
            redis_prefix: "segcache".to_string(),
            redis_pool_size: 16,
            cache_timeout_ms: 250,
            invalidate_timeout_secs: 30,
            gc_interval_secs: 60,
            page_ttl_secs: 1800,
            api_ttl_secs: 900,
        }
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|v| v == "1" || v.to_lowercase() == "true")
        .unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Like [`env_parse`], but zero also falls back to the default.
fn env_parse_nonzero(name: &str, default: u64) -> u64 {
    match env_parse(name, default) {
        0 => default,
        value => value,
    }
}

pub fn load_config() -> anyhow::Result<Config> {
    let defaults = Config::default();

    let listen_addr = std::env::var("SEGCACHE_LISTEN_ADDR").unwrap_or(defaults.listen_addr);

    let debug = std::env::var("DEBUG").is_ok();

    // Geo detection settings
    let geoip_path = std::env::var("SEGCACHE_GEOIP_PATH").unwrap_or(defaults.geoip_path);

    let edge_geo = env_flag("SEGCACHE_EDGE_GEO", defaults.edge_geo);

    let geo_detection = env_flag("SEGCACHE_GEO_DETECTION", defaults.geo_detection);

    let geo_memo_ttl_secs = env_parse("SEGCACHE_GEO_MEMO_TTL_SECS", defaults.geo_memo_ttl_secs);

    // Cache substrate settings
    let redis_url = std::env::var("SEGCACHE_REDIS_URL")
        .ok()
        .filter(|v| !v.trim().is_empty());

    let redis_prefix = std::env::var("SEGCACHE_REDIS_PREFIX").unwrap_or(defaults.redis_prefix);

    let redis_pool_size = env_parse("SEGCACHE_REDIS_POOL_SIZE", defaults.redis_pool_size);

    let cache_timeout_ms = env_parse_nonzero("SEGCACHE_CACHE_TIMEOUT_MS", defaults.cache_timeout_ms);

    let invalidate_timeout_secs = env_parse_nonzero(
        "SEGCACHE_INVALIDATE_TIMEOUT_SECS",
        defaults.invalidate_timeout_secs,
    );

    let gc_interval_secs = env_parse_nonzero("SEGCACHE_GC_INTERVAL_SECS", defaults.gc_interval_secs);

    // Cache TTLs
    let page_ttl_secs = env_parse("SEGCACHE_PAGE_TTL_SECS", defaults.page_ttl_secs);

    let api_ttl_secs = env_parse("SEGCACHE_API_TTL_SECS", defaults.api_ttl_secs);

    Ok(Config {
        listen_addr,
        debug,
        geoip_path,
        edge_geo,
        geo_detection,
        geo_memo_ttl_secs,
        redis_url,
        redis_prefix,
        redis_pool_size,
        cache_timeout_ms,
        invalidate_timeout_secs,
        gc_interval_secs,
        page_ttl_secs,
        api_ttl_secs,
    })
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Tests below mutate process-wide environment variables.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.listen_addr, "0.0.0.0:8080");
        assert_eq!(cfg.geoip_path, "geoip/GeoLite2-Country.mmdb");
        assert!(!cfg.edge_geo);
        assert!(cfg.geo_detection);
        assert!(cfg.redis_url.is_none());
        assert_eq!(cfg.page_ttl(), Duration::from_secs(1800));
        assert_eq!(cfg.api_ttl(), Duration::from_secs(900));
        assert_eq!(cfg.cache_timeout(), Duration::from_millis(250));
        assert_eq!(cfg.invalidate_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_load_config_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("SEGCACHE_LISTEN_ADDR");
        std::env::remove_var("SEGCACHE_REDIS_URL");

        let cfg = load_config().unwrap();
        assert_eq!(cfg.listen_addr, "0.0.0.0:8080");
        assert!(cfg.redis_url.is_none());
        assert_eq!(cfg.geo_memo_ttl_secs, 3600);
    }

    #[test]
    fn test_config_debug() {
        let cfg = Config::default();
        let debug_str = format!("{:?}", cfg);
        assert!(debug_str.contains("listen_addr"));
        assert!(debug_str.contains("0.0.0.0:8080"));
    }

    #[test]
    fn test_load_config_with_edge_geo_true() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("SEGCACHE_EDGE_GEO", "true");
        let cfg = load_config().unwrap();
        assert!(cfg.edge_geo);
        std::env::remove_var("SEGCACHE_EDGE_GEO");
    }

    #[test]
    fn test_load_config_with_geo_detection_disabled() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("SEGCACHE_GEO_DETECTION", "0");
        let cfg = load_config().unwrap();
        assert!(!cfg.geo_detection);
        std::env::remove_var("SEGCACHE_GEO_DETECTION");
    }

    #[test]
    fn test_load_config_with_redis_settings() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("SEGCACHE_REDIS_URL", "redis://cache:6379/1");
        std::env::set_var("SEGCACHE_REDIS_PREFIX", "site");
        std::env::set_var("SEGCACHE_REDIS_POOL_SIZE", "4");
        let cfg = load_config().unwrap();
        assert_eq!(cfg.redis_url.as_deref(), Some("redis://cache:6379/1"));
        assert_eq!(cfg.redis_prefix, "site");
        assert_eq!(cfg.redis_pool_size, 4);
        std::env::remove_var("SEGCACHE_REDIS_URL");
        std::env::remove_var("SEGCACHE_REDIS_PREFIX");
        std::env::remove_var("SEGCACHE_REDIS_POOL_SIZE");
    }

    #[test]
    fn test_load_config_blank_redis_url_is_unset() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("SEGCACHE_REDIS_URL", "  ");
        let cfg = load_config().unwrap();
        assert!(cfg.redis_url.is_none());
        std::env::remove_var("SEGCACHE_REDIS_URL");
    }

    #[test]
    fn test_load_config_with_ttls() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("SEGCACHE_PAGE_TTL_SECS", "60");
        std::env::set_var("SEGCACHE_API_TTL_SECS", "30");
        let cfg = load_config().unwrap();
        assert_eq!(cfg.page_ttl_secs, 60);
        assert_eq!(cfg.api_ttl_secs, 30);
        std::env::remove_var("SEGCACHE_PAGE_TTL_SECS");
        std::env::remove_var("SEGCACHE_API_TTL_SECS");
    }

    #[test]
    fn test_load_config_with_debug() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("DEBUG", "1");
        let cfg = load_config().unwrap();
        assert!(cfg.debug);
        std::env::remove_var("DEBUG");
    }

    #[test]
    fn test_load_config_parse_error_uses_default() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("SEGCACHE_CACHE_TIMEOUT_MS", "not_a_number");
        let cfg = load_config().unwrap();
        assert_eq!(cfg.cache_timeout_ms, 250);
        std::env::remove_var("SEGCACHE_CACHE_TIMEOUT_MS");
    }

    #[test]
    fn test_load_config_zero_intervals_use_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("SEGCACHE_CACHE_TIMEOUT_MS", "0");
        std::env::set_var("SEGCACHE_INVALIDATE_TIMEOUT_SECS", "0");
        std::env::set_var("SEGCACHE_GC_INTERVAL_SECS", "0");

        let cfg = load_config().unwrap();

        assert_eq!(cfg.cache_timeout_ms, 250);
        assert_eq!(cfg.invalidate_timeout_secs, 30);
        assert_eq!(cfg.gc_interval_secs, 60);
        std::env::remove_var("SEGCACHE_CACHE_TIMEOUT_MS");
        std::env::remove_var("SEGCACHE_INVALIDATE_TIMEOUT_SECS");
        std::env::remove_var("SEGCACHE_GC_INTERVAL_SECS");
    }
}
