//! Per-request deadline and cancellation.
//!
//! Every data source and cache call takes a `RequestContext`. Wrapping the
//! underlying I/O in [`RequestContext::run`] drops the in-flight future as soon
//! as the token is cancelled or the deadline passes, which releases whatever
//! it held (a pooled connection goes back to its pool on drop).

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a wrapped operation stopped early.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum Interrupted {
    #[error("operation cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,
}

#[derive(Debug, Clone)]
pub struct RequestContext {
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::background()
    }
}

impl RequestContext {
    /// No deadline, fresh cancellation token.
    pub fn background() -> Self {
        Self {
            deadline: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Context bound to an externally owned token (e.g. process shutdown).
    pub fn with_token(cancel: CancellationToken) -> Self {
        Self {
            deadline: None,
            cancel,
        }
    }

    /// Tighten the deadline to at most `timeout` from now.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        self.deadline = Some(match self.deadline {
            Some(existing) if existing < candidate => existing,
            _ => candidate,
        });
        self
    }

    /// Derived context: same deadline, cancelled whenever the parent is.
    pub fn child(&self) -> Self {
        Self {
            deadline: self.deadline,
            cancel: self.cancel.child_token(),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` when unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Drive `future` until it completes, the token fires, or the deadline
    /// passes, whichever comes first.
    pub async fn run<F>(&self, future: F) -> Result<F::Output, Interrupted>
    where
        F: Future,
    {
        if self.cancel.is_cancelled() {
            return Err(Interrupted::Cancelled);
        }

        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => Err(Interrupted::Cancelled),
                    _ = tokio::time::sleep_until(deadline) => Err(Interrupted::DeadlineExceeded),
                    output = future => Ok(output),
                }
            }
            None => {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => Err(Interrupted::Cancelled),
                    output = future => Ok(output),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_completes() {
        let ctx = RequestContext::background().with_timeout(Duration::from_secs(5));
        let result = ctx.run(async { 7 }).await;
        assert_eq!(result, Ok(7));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let ctx = RequestContext::background();
        ctx.cancel();
        let result = ctx.run(async { 1 }).await;
        assert_eq!(result, Err(Interrupted::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_exceeded() {
        let ctx = RequestContext::background().with_timeout(Duration::from_millis(50));
        let result = ctx
            .run(tokio::time::sleep(Duration::from_secs(10)))
            .await;
        assert_eq!(result, Err(Interrupted::DeadlineExceeded));
    }

    #[tokio::test(start_paused = true)]
    async fn test_parent_cancellation_reaches_child() {
        let parent = RequestContext::background();
        let child = parent.child();

        let waiter = tokio::spawn(async move {
            child
                .run(tokio::time::sleep(Duration::from_secs(60)))
                .await
        });

        tokio::task::yield_now().await;
        parent.cancel();

        let result = waiter.await.map_err(|e| e.to_string());
        assert_eq!(result, Ok(Err(Interrupted::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_only_tightens() {
        let ctx = RequestContext::background().with_timeout(Duration::from_millis(100));
        let first = ctx.deadline();
        let ctx = ctx.with_timeout(Duration::from_secs(30));
        assert_eq!(ctx.deadline(), first);
        assert!(ctx.remaining().is_some_and(|left| left <= Duration::from_millis(100)));
    }
}
