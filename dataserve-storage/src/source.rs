//! Source-of-truth port.

use async_trait::async_trait;
use dataserve_core::{DataError, OwnerId, Record, RequestContext};

/// Authoritative record store.
///
/// Both operations return records ordered by id; an owner without records
/// yields an empty list, not an error.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Records belonging to `owner_id`.
    async fn fetch_by_owner(
        &self,
        ctx: &RequestContext,
        owner_id: OwnerId,
    ) -> Result<Vec<Record>, DataError>;

    /// Every record, regardless of owner.
    async fn fetch_all(&self, ctx: &RequestContext) -> Result<Vec<Record>, DataError>;
}
