//! In-memory test doubles for the cache, data source and access resolver.
//!
//! Exported (not `cfg(test)`) so integration tests in other crates can drive
//! the repository and router without Postgres or Redis.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use dataserve_core::{
    AccessLevel, AccessResolutionError, CacheError, DataError, OwnerId, Record, RequestContext,
};

use crate::access::AccessResolver;
use crate::cache::{CacheBackend, CacheKey, CacheObserver, LookupOutcome, WriteKind};
use crate::source::DataSource;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// CACHE
// ============================================================================

/// Cache double with failure injection and call recording. Entries never expire.
#[derive(Default)]
pub struct MockCacheBackend {
    entries: Mutex<HashMap<String, Vec<Record>>>,
    set_calls: Mutex<Vec<(String, Vec<Record>)>>,
    get_calls: AtomicUsize,
    fail_gets: AtomicBool,
    fail_sets: AtomicBool,
    fail_set_keys: Mutex<HashSet<String>>,
    set_delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockCacheBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `set` sleep for `delay` before storing.
    pub fn with_set_delay(mut self, delay: Duration) -> Self {
        self.set_delay = Some(delay);
        self
    }

    pub fn seed(&self, key: &CacheKey, records: Vec<Record>) {
        lock(&self.entries).insert(key.as_str().to_string(), records);
    }

    /// Every subsequent `get` fails with `CacheError::Unavailable`.
    pub fn fail_gets(&self) {
        self.fail_gets.store(true, Ordering::SeqCst);
    }

    /// Every subsequent `set` fails with `CacheError::Unavailable`.
    pub fn fail_sets(&self) {
        self.fail_sets.store(true, Ordering::SeqCst);
    }

    pub fn fail_set_for(&self, key: &CacheKey) {
        lock(&self.fail_set_keys).insert(key.as_str().to_string());
    }

    pub fn stored(&self, key: &CacheKey) -> Option<Vec<Record>> {
        lock(&self.entries).get(key.as_str()).cloned()
    }

    /// Every `set` call in arrival order, failed ones included.
    pub fn set_calls(&self) -> Vec<(String, Vec<Record>)> {
        lock(&self.set_calls).clone()
    }

    /// Keys currently holding an entry, sorted.
    pub fn written_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = lock(&self.entries).keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    /// Highest number of `set` calls observed running at once.
    pub fn max_concurrent_sets(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn store(
        &self,
        ctx: &RequestContext,
        key: &CacheKey,
        records: &[Record],
    ) -> Result<(), CacheError> {
        if let Some(delay) = self.set_delay {
            ctx.run(tokio::time::sleep(delay)).await?;
        }
        if ctx.is_cancelled() {
            return Err(CacheError::Cancelled);
        }
        if self.fail_sets.load(Ordering::SeqCst)
            || lock(&self.fail_set_keys).contains(key.as_str())
        {
            return Err(CacheError::unavailable("injected set failure"));
        }
        lock(&self.entries).insert(key.as_str().to_string(), records.to_vec());
        Ok(())
    }
}

#[async_trait]
impl CacheBackend for MockCacheBackend {
    async fn get(&self, ctx: &RequestContext, key: &CacheKey) -> Result<Vec<Record>, CacheError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if ctx.is_cancelled() {
            return Err(CacheError::Cancelled);
        }
        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(CacheError::unavailable("injected get failure"));
        }
        Ok(lock(&self.entries)
            .get(key.as_str())
            .cloned()
            .unwrap_or_default())
    }

    async fn set(
        &self,
        ctx: &RequestContext,
        key: &CacheKey,
        records: &[Record],
    ) -> Result<(), CacheError> {
        lock(&self.set_calls).push((key.as_str().to_string(), records.to_vec()));

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        let result = self.store(ctx, key, records).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn ttl(&self) -> Duration {
        Duration::from_secs(60)
    }
}

// ============================================================================
// DATA SOURCE
// ============================================================================

/// Data source double. Rows are returned in seeded order.
#[derive(Default)]
pub struct MockDataSource {
    rows: Mutex<Vec<Record>>,
    failure: Mutex<Option<DataError>>,
    owner_calls: Mutex<Vec<OwnerId>>,
    all_calls: AtomicUsize,
}

impl MockDataSource {
    pub fn new(rows: Vec<Record>) -> Self {
        Self {
            rows: Mutex::new(rows),
            ..Default::default()
        }
    }

    pub fn push(&self, record: Record) {
        lock(&self.rows).push(record);
    }

    /// Every subsequent fetch fails with `error`.
    pub fn fail_with(&self, error: DataError) {
        *lock(&self.failure) = Some(error);
    }

    /// Owners passed to `fetch_by_owner`, in call order.
    pub fn owner_calls(&self) -> Vec<OwnerId> {
        lock(&self.owner_calls).clone()
    }

    pub fn all_calls(&self) -> usize {
        self.all_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        lock(&self.owner_calls).len() + self.all_calls()
    }

    fn check(&self, ctx: &RequestContext) -> Result<(), DataError> {
        if ctx.is_cancelled() {
            return Err(DataError::Cancelled);
        }
        match lock(&self.failure).as_ref() {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DataSource for MockDataSource {
    async fn fetch_by_owner(
        &self,
        ctx: &RequestContext,
        owner_id: OwnerId,
    ) -> Result<Vec<Record>, DataError> {
        lock(&self.owner_calls).push(owner_id);
        self.check(ctx)?;
        Ok(lock(&self.rows)
            .iter()
            .filter(|record| record.owner_id() == owner_id)
            .cloned()
            .collect())
    }

    async fn fetch_all(&self, ctx: &RequestContext) -> Result<Vec<Record>, DataError> {
        self.all_calls.fetch_add(1, Ordering::SeqCst);
        self.check(ctx)?;
        Ok(lock(&self.rows).clone())
    }
}

// ============================================================================
// ACCESS RESOLVER
// ============================================================================

/// Resolver double. Unknown users resolve to `NotFound`.
#[derive(Default)]
pub struct MockAccessResolver {
    levels: Mutex<HashMap<OwnerId, AccessLevel>>,
    failure: Mutex<Option<AccessResolutionError>>,
    lookups: AtomicUsize,
}

impl MockAccessResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(self, user_id: OwnerId, level: AccessLevel) -> Self {
        lock(&self.levels).insert(user_id, level);
        self
    }

    pub fn with_admin(self, user_id: OwnerId) -> Self {
        self.with_level(user_id, AccessLevel::Admin)
    }

    pub fn with_user(self, user_id: OwnerId) -> Self {
        self.with_level(user_id, AccessLevel::parse("user"))
    }

    /// Every subsequent lookup fails with `error`.
    pub fn fail_with(&self, error: AccessResolutionError) {
        *lock(&self.failure) = Some(error);
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccessResolver for MockAccessResolver {
    async fn lookup(
        &self,
        ctx: &RequestContext,
        user_id: OwnerId,
    ) -> Result<AccessLevel, AccessResolutionError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if ctx.is_cancelled() {
            return Err(AccessResolutionError::Cancelled);
        }
        if let Some(error) = lock(&self.failure).as_ref() {
            return Err(error.clone());
        }
        lock(&self.levels)
            .get(&user_id)
            .cloned()
            .ok_or(AccessResolutionError::NotFound { user_id })
    }
}

// ============================================================================
// OBSERVER
// ============================================================================

/// Observer that records every notification.
#[derive(Default)]
pub struct RecordingObserver {
    lookups: Mutex<Vec<LookupOutcome>>,
    writes: Mutex<Vec<(WriteKind, bool)>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookups(&self) -> Vec<LookupOutcome> {
        lock(&self.lookups).clone()
    }

    pub fn writes(&self) -> Vec<(WriteKind, bool)> {
        lock(&self.writes).clone()
    }
}

impl CacheObserver for RecordingObserver {
    fn on_lookup(&self, outcome: LookupOutcome) {
        lock(&self.lookups).push(outcome);
    }

    fn on_write(&self, kind: WriteKind, succeeded: bool) {
        lock(&self.writes).push((kind, succeeded));
    }
}
