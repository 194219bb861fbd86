//! Redis Cache Store
//!
//! Implements CacheStore on a shared Redis instance so that memoized
//! lookups and cached responses are visible to every process.

use crate::domain::ports::{CacheError, CacheStore};
use async_trait::async_trait;
use deadpool_redis::{Connection, Pool};
use redis::AsyncCommands;
use std::time::Duration;

/// Keys requested per SCAN round trip.
const SCAN_BATCH: usize = 500;

/// Redis-backed cache store.
///
/// Every key is stored under `<prefix>:` so that pattern eviction and
/// flushes never touch data owned by other applications sharing the
/// instance.
#[derive(Clone)]
pub struct RedisCacheStore {
    pool: Pool,
    prefix: String,
}

impl RedisCacheStore {
    pub fn new(pool: Pool, prefix: impl Into<String>) -> Self {
        Self {
            pool,
            prefix: prefix.into(),
        }
    }

    /// Create a pool for `url` and verify one connection can be made.
    pub async fn connect(
        url: &str,
        prefix: &str,
        pool_size: usize,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let mut redis_config = deadpool_redis::Config::from_url(url);
        let mut pool_config = deadpool_redis::PoolConfig::new(pool_size);
        pool_config.timeouts.wait = Some(timeout);
        pool_config.timeouts.create = Some(timeout);
        pool_config.timeouts.recycle = Some(timeout);
        redis_config.pool = Some(pool_config);

        let pool = redis_config.create_pool(Some(deadpool_redis::Runtime::Tokio1))?;

        let mut conn = pool.get().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;

        Ok(Self::new(pool, prefix))
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }

    async fn conn(&self) -> Result<Connection, CacheError> {
        self.pool
            .get()
            .await
            .map_err(|e| CacheError::Backend(format!("connection pool: {}", e)))
    }
}

fn backend_error(e: redis::RedisError) -> CacheError {
    CacheError::Backend(e.to_string())
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut conn = self.conn().await?;
        conn.get::<_, Option<Vec<u8>>>(self.namespaced(key))
            .await
            .map_err(backend_error)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn().await?;
        // Redis rejects EX 0.
        let ttl_secs = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(self.namespaced(key), value, ttl_secs)
            .await
            .map_err(backend_error)
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.conn().await?;
        let removed: usize = conn
            .del(self.namespaced(key))
            .await
            .map_err(backend_error)?;
        Ok(removed > 0)
    }

    async fn scan_delete(&self, pattern: &str) -> Result<usize, CacheError> {
        let mut conn = self.conn().await?;
        let pattern = self.namespaced(pattern);

        let mut cursor: u64 = 0;
        let mut deleted = 0usize;
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(backend_error)?;

            // SCAN may repeat keys; DEL only counts the ones it removed.
            if !keys.is_empty() {
                let removed: usize = conn.del(&keys).await.map_err(backend_error)?;
                deleted += removed;
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        tracing::debug!(pattern = %pattern, deleted, "redis scan-delete finished");
        Ok(deleted)
    }

    async fn flush(&self) -> Result<usize, CacheError> {
        self.scan_delete("*").await
    }

    fn mode(&self) -> &'static str {
        "redis"
    }
}
