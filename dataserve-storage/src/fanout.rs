//! Bounded concurrent cache population for admin reads.
//!
//! Each owner's group is written by its own task, at most `concurrency` tasks
//! in flight across every admin read sharing the writer. `write_all` joins
//! all of its tasks before returning; if the calling future is dropped the
//! `JoinSet` aborts whatever is still running, so no write outlives its request.

use std::sync::Arc;

use dataserve_core::{Record, RequestContext};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};

use crate::cache::{CacheBackend, CacheKey, CacheObserver, WriteKind};

/// Default cap on simultaneous fan-out writes.
pub const DEFAULT_FANOUT_CONCURRENCY: usize = 8;

/// Outcome of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOutReport {
    /// Entries handed to a write task or abandoned before one was started.
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl FanOutReport {
    fn absorb(&mut self, joined: Result<bool, JoinError>) {
        match joined {
            Ok(true) => self.succeeded += 1,
            Ok(false) => self.failed += 1,
            Err(error) => {
                tracing::warn!(error = %error, "Fan-out write task did not complete");
                self.failed += 1;
            }
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failed == 0 && self.succeeded == self.attempted
    }
}

#[derive(Debug, Clone)]
pub struct FanOutWriter {
    permits: Arc<Semaphore>,
    concurrency: usize,
}

impl Default for FanOutWriter {
    fn default() -> Self {
        Self::new(DEFAULT_FANOUT_CONCURRENCY)
    }
}

impl FanOutWriter {
    /// A zero cap is raised to one.
    pub fn new(concurrency: usize) -> Self {
        let concurrency = concurrency.max(1);
        Self {
            permits: Arc::new(Semaphore::new(concurrency)),
            concurrency,
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Write every `(key, records)` entry. Individual failures are logged and
    /// counted, never returned.
    pub async fn write_all<C>(
        &self,
        ctx: &RequestContext,
        cache: &Arc<C>,
        observer: &Arc<dyn CacheObserver>,
        entries: Vec<(CacheKey, Vec<Record>)>,
    ) -> FanOutReport
    where
        C: CacheBackend + ?Sized + 'static,
    {
        let total = entries.len();
        let mut report = FanOutReport::default();
        let mut tasks = JoinSet::new();

        for (key, records) in entries {
            let permit = match ctx.run(Arc::clone(&self.permits).acquire_owned()).await {
                Ok(Ok(permit)) => permit,
                Ok(Err(_closed)) => break,
                Err(interrupted) => {
                    tracing::warn!(
                        reason = %interrupted,
                        pending = total - report.attempted,
                        "Fan-out interrupted before all writes were started"
                    );
                    break;
                }
            };

            while let Some(joined) = tasks.try_join_next() {
                report.absorb(joined);
            }

            report.attempted += 1;
            let cache = Arc::clone(cache);
            let observer = Arc::clone(observer);
            let ctx = ctx.child();

            tasks.spawn(async move {
                let _permit = permit;
                let result = cache.set(&ctx, &key, &records).await;
                if let Err(error) = &result {
                    tracing::warn!(
                        key = %key,
                        owner_id = key.owner_id(),
                        error = %error,
                        "Fan-out cache write failed"
                    );
                }
                observer.on_write(WriteKind::FanOut, result.is_ok());
                result.is_ok()
            });
        }

        while let Some(joined) = tasks.join_next().await {
            report.absorb(joined);
        }

        // Entries never started count as attempted and failed.
        let skipped = total - report.attempted;
        report.attempted += skipped;
        report.failed += skipped;
        report
    }
}
