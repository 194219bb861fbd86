//! segment-cache - Geo-segmented site server with hexagonal architecture
//!
//! This is the composition root that wires together all the components.

mod cli;

use clap::Parser;
use cli::{ClearCacheArgs, Cli, Command};
use segment_cache::adapters::inbound::{HttpServer, HttpSettings, HttpState};
use segment_cache::adapters::outbound::{DashMapCacheStore, MaxMindGeoResolver, RedisCacheStore};
use segment_cache::application::{
    CacheInvalidator, CountryResolver, GeoClassifier, LookupMemo, ResponseCache,
    EDGE_COUNTRY_HEADER,
};
use segment_cache::config::{load_config, Config};
use segment_cache::domain::ports::{CacheStore, GeoResolver};
use segment_cache::infrastructure::{LogThrottle, StoreTimeouts, TimeoutCacheStore};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::fmt::format::FmtSpan;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration from environment
    let cfg = load_config()?;

    // Setup logging
    let log_level = if cfg.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(cfg).await,
        Command::ClearCache(args) => clear_cache(cfg, args).await,
    }
}

fn timeouts(cfg: &Config) -> StoreTimeouts {
    StoreTimeouts {
        op: cfg.cache_timeout(),
        bulk: cfg.invalidate_timeout(),
    }
}

async fn serve(cfg: Config) -> anyhow::Result<()> {
    tracing::info!(
        "starting segment-cache listen={} geo_detection={} edge_geo={}",
        cfg.listen_addr,
        cfg.geo_detection,
        cfg.edge_geo
    );

    // ===== COMPOSITION ROOT =====
    // Wire up all adapters and services

    // 1. Create outbound adapters

    // GeoIP resolver (MaxMind); a missing database degrades to UNKNOWN
    let geo_resolver: Option<Arc<dyn GeoResolver>> = match MaxMindGeoResolver::from_file(&cfg.geoip_path) {
        Ok(g) => {
            tracing::info!("GeoIP DB loaded from {} ({})", cfg.geoip_path, g.database_type());
            Some(Arc::new(g) as Arc<dyn GeoResolver>)
        }
        Err(e) => {
            tracing::error!("failed to load GeoIP DB from {}: {:?}", cfg.geoip_path, e);
            None
        }
    };

    // Cache substrate (Redis when configured, in-process otherwise)
    let substrate: Arc<dyn CacheStore> = match &cfg.redis_url {
        Some(url) => match RedisCacheStore::connect(
            url,
            &cfg.redis_prefix,
            cfg.redis_pool_size,
            cfg.cache_timeout(),
        )
        .await
        {
            Ok(store) => {
                tracing::info!("cache substrate: redis (prefix {})", cfg.redis_prefix);
                Arc::new(store)
            }
            Err(e) => {
                tracing::error!("redis unavailable, falling back to local cache: {:?}", e);
                local_store(&cfg)
            }
        },
        None => {
            tracing::info!("cache substrate: local");
            local_store(&cfg)
        }
    };
    let store: Arc<dyn CacheStore> = Arc::new(TimeoutCacheStore::new(substrate, timeouts(&cfg)));

    // 2. Create application services
    let throttle = Arc::new(LogThrottle::default());

    let countries = CountryResolver::new(geo_resolver, cfg.edge_geo, throttle.clone());
    let memo = LookupMemo::new(store.clone(), cfg.geo_memo_ttl(), throttle.clone());
    let classifier = Arc::new(GeoClassifier::new(countries, memo, throttle.clone()));

    let extra_vary: &[&str] = if cfg.edge_geo {
        &[EDGE_COUNTRY_HEADER]
    } else {
        &[]
    };
    let cache = ResponseCache::new(store, throttle, extra_vary);

    // 3. Create inbound adapter and run
    let settings = HttpSettings {
        geo_detection: cfg.geo_detection,
        secure_cookies: !cfg.debug,
        page_ttl: cfg.page_ttl(),
        api_ttl: cfg.api_ttl(),
    };
    let server = HttpServer::new(cfg.listen_addr.clone(), HttpState::new(classifier, cache, settings));

    server.run().await
}

fn local_store(cfg: &Config) -> Arc<dyn CacheStore> {
    let store = DashMapCacheStore::new();
    store.start_gc(Duration::from_secs(cfg.gc_interval_secs));
    Arc::new(store)
}

async fn clear_cache(cfg: Config, args: ClearCacheArgs) -> anyhow::Result<()> {
    let url = cfg
        .redis_url
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("SEGCACHE_REDIS_URL must be set to clear the shared cache"))?;

    let redis = RedisCacheStore::connect(url, &cfg.redis_prefix, 1, cfg.cache_timeout()).await?;
    let store: Arc<dyn CacheStore> = Arc::new(TimeoutCacheStore::new(Arc::new(redis), timeouts(&cfg)));

    let removed = if args.all {
        CacheInvalidator::new(store).clear_all().await?
    } else if let Some(pattern) = &args.pattern {
        CacheInvalidator::new(store).invalidate_by_pattern(pattern).await?
    } else if let Some(segment) = args.segment {
        CacheInvalidator::new(store).invalidate_segment(segment).await?
    } else if let Some(logical) = &args.logical {
        CacheInvalidator::new(store).invalidate_logical(logical).await?
    } else {
        let throttle = Arc::new(LogThrottle::default());
        LookupMemo::new(store, cfg.geo_memo_ttl(), throttle).flush().await?
    };

    println!("evicted {} keys", removed);
    Ok(())
}
