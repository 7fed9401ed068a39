//! In-process cache backend.
//!
//! Entries are stored encoded, exactly as they would be in Redis, and expire
//! after the configured TTL. There is no capacity bound: an entry leaves the
//! map when it is read after expiring, or on the next `purge_expired` pass
//! (run periodically by [`MemoryCacheBackend::spawn_purger`]).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use dataserve_core::{CacheError, Record, RequestContext};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::codec::{decode_entry, encode_entry};
use super::key::CacheKey;
use super::traits::{CacheBackend, CacheStats};

struct MemoryEntry {
    payload: Vec<u8>,
    expires_at: Instant,
}

impl MemoryEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

pub struct MemoryCacheBackend {
    entries: RwLock<HashMap<String, MemoryEntry>>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    expirations: AtomicU64,
}

impl MemoryCacheBackend {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        }
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> Result<u64, CacheError> {
        let now = Instant::now();
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let removed = (before - entries.len()) as u64;
        self.expirations.fetch_add(removed, Ordering::Relaxed);
        Ok(removed)
    }

    /// Run `purge_expired` every `every` until `shutdown` is cancelled.
    pub fn spawn_purger(
        cache: Arc<Self>,
        every: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let every = every.max(Duration::from_millis(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + every, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => match cache.purge_expired() {
                        Ok(0) => {}
                        Ok(removed) => tracing::debug!(removed, "Purged expired cache entries"),
                        Err(error) => tracing::warn!(error = %error, "Cache purge failed"),
                    },
                }
            }
            tracing::debug!("Memory cache purger stopped");
        })
    }

    pub fn stats(&self) -> CacheStats {
        let entry_count = self
            .entries
            .read()
            .map(|entries| entries.len() as u64)
            .unwrap_or(0);

        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count,
            expirations: self.expirations.load(Ordering::Relaxed),
        }
    }

    fn read_live(&self, key: &CacheKey, now: Instant) -> Result<Option<Vec<u8>>, CacheError> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(entries
            .get(key.as_str())
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.payload.clone()))
    }

    fn evict_if_expired(&self, key: &CacheKey, now: Instant) -> Result<(), CacheError> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        if entries
            .get(key.as_str())
            .is_some_and(|entry| entry.is_expired(now))
        {
            entries.remove(key.as_str());
            self.expirations.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }
}

fn poisoned() -> CacheError {
    CacheError::unavailable("memory cache lock poisoned")
}

#[async_trait]
impl CacheBackend for MemoryCacheBackend {
    async fn get(&self, ctx: &RequestContext, key: &CacheKey) -> Result<Vec<Record>, CacheError> {
        if ctx.is_cancelled() {
            return Err(CacheError::Cancelled);
        }

        let now = Instant::now();
        match self.read_live(key, now)? {
            Some(payload) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                decode_entry(&payload)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                self.evict_if_expired(key, now)?;
                Ok(Vec::new())
            }
        }
    }

    async fn set(
        &self,
        ctx: &RequestContext,
        key: &CacheKey,
        records: &[Record],
    ) -> Result<(), CacheError> {
        if ctx.is_cancelled() {
            return Err(CacheError::Cancelled);
        }

        let payload = encode_entry(records)?;
        let entry = MemoryEntry {
            payload,
            expires_at: Instant::now() + self.ttl,
        };

        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        entries.insert(key.as_str().to_string(), entry);
        Ok(())
    }

    fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::KeyPrefix;

    fn records() -> Vec<Record> {
        vec![Record::new(1, 4, "a"), Record::new(2, 4, "b")]
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let cache = MemoryCacheBackend::new(Duration::from_secs(60));
        let ctx = RequestContext::background();
        let key = KeyPrefix::new("cache").key(4);

        cache.set(&ctx, &key, &records()).await.unwrap();
        assert_eq!(cache.get(&ctx, &key).await.unwrap(), records());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.entry_count, 1);
    }

    #[tokio::test]
    async fn test_missing_key_is_empty_not_error() {
        let cache = MemoryCacheBackend::new(Duration::from_secs(60));
        let key = KeyPrefix::new("cache").key(9);

        let got = cache.get(&RequestContext::background(), &key).await.unwrap();
        assert!(got.is_empty());
        assert_eq!(cache.stats().misses, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_after_ttl() {
        let cache = MemoryCacheBackend::new(Duration::from_millis(500));
        let ctx = RequestContext::background();
        let key = KeyPrefix::new("cache").key(4);

        cache.set(&ctx, &key, &records()).await.unwrap();
        tokio::time::advance(Duration::from_millis(499)).await;
        assert_eq!(cache.get(&ctx, &key).await.unwrap().len(), 2);

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(cache.get(&ctx, &key).await.unwrap().is_empty());
        assert_eq!(cache.stats().entry_count, 0);
        assert_eq!(cache.stats().expirations, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_resets_ttl() {
        let cache = MemoryCacheBackend::new(Duration::from_millis(500));
        let ctx = RequestContext::background();
        let key = KeyPrefix::new("cache").key(4);

        cache.set(&ctx, &key, &records()).await.unwrap();
        tokio::time::advance(Duration::from_millis(400)).await;
        cache.set(&ctx, &key, &records()[..1]).await.unwrap();
        tokio::time::advance(Duration::from_millis(400)).await;

        assert_eq!(cache.get(&ctx, &key).await.unwrap(), records()[..1].to_vec());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let cache = MemoryCacheBackend::new(Duration::from_millis(10));
        let ctx = RequestContext::background();
        let prefix = KeyPrefix::new("cache");

        for owner in 1..=3 {
            cache.set(&ctx, &prefix.key(owner), &records()).await.unwrap();
        }
        tokio::time::advance(Duration::from_millis(20)).await;

        assert_eq!(cache.purge_expired().unwrap(), 3);
        assert_eq!(cache.stats().entry_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purger_drops_fanned_out_entries_after_ttl() {
        use crate::mock::MockDataSource;
        use crate::repository::CachedRepository;

        let rows: Vec<Record> = (1..=1000).map(|owner| Record::new(owner, owner, "x")).collect();
        let cache = Arc::new(MemoryCacheBackend::new(Duration::from_millis(10)));
        let repository = CachedRepository::new(
            Arc::new(MockDataSource::new(rows)),
            Arc::clone(&cache),
            KeyPrefix::new("cache"),
        );

        repository
            .fetch_by_admin(&RequestContext::background())
            .await
            .unwrap();
        assert_eq!(cache.stats().entry_count, 1000);

        let shutdown = CancellationToken::new();
        let purger = MemoryCacheBackend::spawn_purger(
            Arc::clone(&cache),
            Duration::from_secs(1),
            shutdown.clone(),
        );
        tokio::time::sleep(Duration::from_secs(3600)).await;

        let stats = cache.stats();
        assert_eq!(stats.entry_count, 0);
        assert_eq!(stats.expirations, 1000);

        shutdown.cancel();
        purger.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_purger_keeps_live_entries() {
        let cache = Arc::new(MemoryCacheBackend::new(Duration::from_secs(30)));
        let ctx = RequestContext::background();
        let key = KeyPrefix::new("cache").key(4);
        cache.set(&ctx, &key, &records()).await.unwrap();

        let shutdown = CancellationToken::new();
        let purger = MemoryCacheBackend::spawn_purger(
            Arc::clone(&cache),
            Duration::from_secs(1),
            shutdown.clone(),
        );
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(cache.get(&ctx, &key).await.unwrap(), records());
        shutdown.cancel();
        purger.await.unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_context() {
        let cache = MemoryCacheBackend::new(Duration::from_secs(1));
        let ctx = RequestContext::background();
        ctx.cancel();

        let key = KeyPrefix::new("cache").key(1);
        assert_eq!(cache.get(&ctx, &key).await, Err(CacheError::Cancelled));
        assert_eq!(cache.set(&ctx, &key, &[]).await, Err(CacheError::Cancelled));
    }
}
