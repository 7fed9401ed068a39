//! Redis-backed cache.
//!
//! One string value per owner key, written with `SET key value PX ttl` so the
//! whole entry is replaced atomically and expires on the server. A `GET` that
//! returns nil is a miss.

use std::time::Duration;

use async_trait::async_trait;
use dataserve_core::{CacheError, Record, RequestContext};
use deadpool_redis::{Config, Pool, Runtime};

use super::codec::{decode_entry, encode_entry};
use super::key::CacheKey;
use super::traits::CacheBackend;

pub struct RedisCacheBackend {
    pool: Pool,
    ttl: Duration,
}

impl RedisCacheBackend {
    pub fn new(pool: Pool, ttl: Duration) -> Self {
        Self { pool, ttl }
    }

    /// Build a pool for `url` (`redis://[user:pass@]host:port/db`).
    ///
    /// No connection is opened until the first command.
    pub fn from_url(url: &str, ttl: Duration) -> Result<Self, CacheError> {
        let pool = Config::from_url(url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| CacheError::unavailable(format!("failed to create redis pool: {e}")))?;
        Ok(Self::new(pool, ttl))
    }

    /// TTL in milliseconds, never below 1 (`PX 0` is rejected by Redis).
    pub fn ttl_millis(&self) -> u64 {
        u64::try_from(self.ttl.as_millis()).unwrap_or(u64::MAX).max(1)
    }

    async fn connection(
        &self,
        ctx: &RequestContext,
    ) -> Result<deadpool_redis::Connection, CacheError> {
        ctx.run(self.pool.get())
            .await?
            .map_err(|e| CacheError::unavailable(e.to_string()))
    }
}

#[async_trait]
impl CacheBackend for RedisCacheBackend {
    async fn get(&self, ctx: &RequestContext, key: &CacheKey) -> Result<Vec<Record>, CacheError> {
        let mut conn = self.connection(ctx).await?;

        let raw: Option<Vec<u8>> = ctx
            .run(
                redis::cmd("GET")
                    .arg(key.as_str())
                    .query_async::<Option<Vec<u8>>>(&mut conn),
            )
            .await?
            .map_err(|e| CacheError::unavailable(e.to_string()))?;

        match raw {
            Some(bytes) => decode_entry(&bytes),
            None => Ok(Vec::new()),
        }
    }

    async fn set(
        &self,
        ctx: &RequestContext,
        key: &CacheKey,
        records: &[Record],
    ) -> Result<(), CacheError> {
        let payload = encode_entry(records)?;
        let mut conn = self.connection(ctx).await?;

        ctx.run(
            redis::cmd("SET")
                .arg(key.as_str())
                .arg(payload)
                .arg("PX")
                .arg(self.ttl_millis())
                .query_async::<()>(&mut conn),
        )
        .await?
        .map_err(|e| CacheError::unavailable(e.to_string()))
    }

    async fn ping(&self, ctx: &RequestContext) -> Result<(), CacheError> {
        let mut conn = self.connection(ctx).await?;
        ctx.run(redis::cmd("PING").query_async::<String>(&mut conn))
            .await?
            .map(|_| ())
            .map_err(|e| CacheError::unavailable(e.to_string()))
    }

    fn ttl(&self) -> Duration {
        self.ttl
    }
}
