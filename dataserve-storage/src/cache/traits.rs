//! Cache port and cache observation hooks.

use std::time::Duration;

use async_trait::async_trait;
use dataserve_core::{CacheError, Record, RequestContext};

use super::key::CacheKey;

/// Key-value cache holding one owner's record list per key.
///
/// Implementations must be thread-safe; the repository shares one backend
/// across every request and every fan-out task.
///
/// # Miss semantics
///
/// A missing or expired entry is NOT an error: `get` succeeds with an empty
/// list. Errors are reserved for an unreachable store, a corrupt entry, or an
/// interrupted call.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Read the record list stored under `key`.
    async fn get(&self, ctx: &RequestContext, key: &CacheKey) -> Result<Vec<Record>, CacheError>;

    /// Overwrite the entry under `key`. The entry expires after [`ttl`](Self::ttl).
    async fn set(
        &self,
        ctx: &RequestContext,
        key: &CacheKey,
        records: &[Record],
    ) -> Result<(), CacheError>;

    /// Liveness probe used by readiness checks.
    async fn ping(&self, _ctx: &RequestContext) -> Result<(), CacheError> {
        Ok(())
    }

    /// Time-to-live applied to every write.
    fn ttl(&self) -> Duration;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Entries currently stored, expired ones included until next touched.
    pub entry_count: u64,
    pub expirations: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// ============================================================================
// OBSERVATION
// ============================================================================

/// Result of a single repository cache read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupOutcome {
    Hit,
    Miss,
    Error,
}

impl LookupOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            LookupOutcome::Hit => "hit",
            LookupOutcome::Miss => "miss",
            LookupOutcome::Error => "error",
        }
    }
}

/// Which repository path issued a cache write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    /// Population after a per-owner database read.
    Populate,
    /// One entry of an admin fan-out.
    FanOut,
}

impl WriteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteKind::Populate => "populate",
            WriteKind::FanOut => "fanout",
        }
    }
}

/// Hook notified of cache reads and writes performed by the repository.
///
/// Lets the HTTP layer export hit/miss/error counters without the storage
/// crate depending on a metrics registry.
pub trait CacheObserver: Send + Sync + 'static {
    fn on_lookup(&self, _outcome: LookupOutcome) {}

    fn on_write(&self, _kind: WriteKind, _succeeded: bool) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl CacheObserver for NoopObserver {}
