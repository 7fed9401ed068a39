//! Access-level router: the single access-control decision of a read.

use std::sync::Arc;

use dataserve_core::{DataError, OwnerId, Record, RequestContext};

use crate::access::AccessResolver;
use crate::source::DataSource;

/// Picks the query shape for a caller and forwards it to the repository.
///
/// Privileged callers get `fetch_all`, everyone else gets `fetch_by_owner`
/// with their own id. With a [`CachedRepository`](crate::CachedRepository) as
/// `R`, `fetch_all` is the admin fan-out.
pub struct AccessLevelRouter<A: ?Sized, R: ?Sized> {
    resolver: Arc<A>,
    repository: Arc<R>,
}

impl<A: ?Sized, R: ?Sized> Clone for AccessLevelRouter<A, R> {
    fn clone(&self) -> Self {
        Self {
            resolver: Arc::clone(&self.resolver),
            repository: Arc::clone(&self.repository),
        }
    }
}

impl<A, R> AccessLevelRouter<A, R>
where
    A: AccessResolver + ?Sized,
    R: DataSource + ?Sized,
{
    pub fn new(resolver: Arc<A>, repository: Arc<R>) -> Self {
        Self {
            resolver,
            repository,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub async fn resolve_and_fetch(
        &self,
        ctx: &RequestContext,
        user_id: OwnerId,
    ) -> Result<Vec<Record>, DataError> {
        let decision = self.resolver.resolve(ctx, user_id).await;

        if decision.is_privileged {
            tracing::debug!(user_id, "Serving privileged read");
            self.repository.fetch_all(ctx).await
        } else {
            if decision.resolution_failed {
                tracing::debug!(user_id, "Serving degraded owner read");
            }
            self.repository.fetch_by_owner(ctx, user_id).await
        }
    }
}
