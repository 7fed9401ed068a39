//! Cache-aside repository.
//!
//! Composes a [`DataSource`] with a [`CacheBackend`] behind the same read
//! contract as the source:
//!
//! - `fetch_by_owner`: cache first; on a miss or a cache error, read the source,
//!   populate the owner's entry, return what the source returned.
//! - `fetch_by_admin`: read the whole table, write every owner's group to its
//!   own entry, return the unpartitioned result.
//!
//! Cache failures never leave this module. Source failures always do, and
//! stop the cache from being touched.

use std::sync::Arc;

use async_trait::async_trait;
use dataserve_core::{group_by_owner, CacheError, DataError, OwnerId, Record, RequestContext};

use crate::cache::{
    CacheBackend, CacheKey, CacheObserver, KeyPrefix, LookupOutcome, NoopObserver, WriteKind,
};
use crate::fanout::{FanOutReport, FanOutWriter};
use crate::source::DataSource;

/// What a cache read produced, before the fallback decision.
///
/// Both `Miss` and `Failed` lead to a source read; keeping them apart lets
/// callers count cache outages separately from cold keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    Hit(Vec<Record>),
    Miss,
    Failed(CacheError),
}

impl CacheLookup {
    pub fn outcome(&self) -> LookupOutcome {
        match self {
            CacheLookup::Hit(_) => LookupOutcome::Hit,
            CacheLookup::Miss => LookupOutcome::Miss,
            CacheLookup::Failed(_) => LookupOutcome::Error,
        }
    }
}

pub struct CachedRepository<S, C>
where
    S: DataSource,
    C: CacheBackend + ?Sized,
{
    source: Arc<S>,
    cache: Arc<C>,
    prefix: KeyPrefix,
    fanout: FanOutWriter,
    observer: Arc<dyn CacheObserver>,
}

impl<S, C> CachedRepository<S, C>
where
    S: DataSource,
    C: CacheBackend + ?Sized + 'static,
{
    pub fn new(source: Arc<S>, cache: Arc<C>, prefix: KeyPrefix) -> Self {
        Self {
            source,
            cache,
            prefix,
            fanout: FanOutWriter::default(),
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_fanout_concurrency(mut self, concurrency: usize) -> Self {
        self.fanout = FanOutWriter::new(concurrency);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn CacheObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn key(&self, owner_id: OwnerId) -> CacheKey {
        self.prefix.key(owner_id)
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Classify a cache read for `owner_id`.
    pub async fn lookup(&self, ctx: &RequestContext, owner_id: OwnerId) -> CacheLookup {
        let key = self.key(owner_id);
        let lookup = match self.cache.get(ctx, &key).await {
            Ok(records) if records.is_empty() => CacheLookup::Miss,
            Ok(records) => CacheLookup::Hit(records),
            Err(error) => CacheLookup::Failed(error),
        };
        self.observer.on_lookup(lookup.outcome());
        lookup
    }

    /// Records owned by `owner_id`, served from the cache when possible.
    pub async fn fetch_by_owner(
        &self,
        ctx: &RequestContext,
        owner_id: OwnerId,
    ) -> Result<Vec<Record>, DataError> {
        match self.lookup(ctx, owner_id).await {
            CacheLookup::Hit(records) => {
                tracing::debug!(owner_id, count = records.len(), "Cache hit");
                return Ok(records);
            }
            CacheLookup::Miss => {
                tracing::debug!(owner_id, "Cache miss");
            }
            CacheLookup::Failed(error) => {
                tracing::warn!(
                    owner_id,
                    error = %error,
                    "Cache read failed, falling back to data source"
                );
            }
        }

        let records = self.source.fetch_by_owner(ctx, owner_id).await?;

        let key = self.key(owner_id);
        let written = self.cache.set(ctx, &key, &records).await;
        if let Err(error) = &written {
            tracing::warn!(key = %key, error = %error, "Cache population failed");
        }
        self.observer.on_write(WriteKind::Populate, written.is_ok());

        Ok(records)
    }

    /// Every record; each owner's group is written to that owner's entry
    /// before returning.
    pub async fn fetch_by_admin(&self, ctx: &RequestContext) -> Result<Vec<Record>, DataError> {
        let records = self.source.fetch_all(ctx).await?;
        let report = self.populate_owners(ctx, &records).await;

        if report.is_complete() {
            tracing::debug!(owners = report.attempted, "Admin fan-out complete");
        } else {
            tracing::warn!(
                owners = report.attempted,
                succeeded = report.succeeded,
                failed = report.failed,
                "Admin fan-out partially failed"
            );
        }

        Ok(records)
    }

    async fn populate_owners(&self, ctx: &RequestContext, records: &[Record]) -> FanOutReport {
        let entries: Vec<(CacheKey, Vec<Record>)> = group_by_owner(records)
            .into_iter()
            .map(|(owner_id, group)| (self.key(owner_id), group))
            .collect();

        self.fanout
            .write_all(ctx, &self.cache, &self.observer, entries)
            .await
    }
}

/// A repository reads like its source; `fetch_all` is the admin path.
#[async_trait]
impl<S, C> DataSource for CachedRepository<S, C>
where
    S: DataSource,
    C: CacheBackend + ?Sized + 'static,
{
    async fn fetch_by_owner(
        &self,
        ctx: &RequestContext,
        owner_id: OwnerId,
    ) -> Result<Vec<Record>, DataError> {
        CachedRepository::fetch_by_owner(self, ctx, owner_id).await
    }

    async fn fetch_all(&self, ctx: &RequestContext) -> Result<Vec<Record>, DataError> {
        self.fetch_by_admin(ctx).await
    }
}
