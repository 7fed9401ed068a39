//! Identity access-level resolution.

use async_trait::async_trait;
use dataserve_core::{AccessDecision, AccessLevel, AccessResolutionError, OwnerId, RequestContext};

/// Looks up the stored access level of an identity.
#[async_trait]
pub trait AccessResolver: Send + Sync {
    async fn lookup(
        &self,
        ctx: &RequestContext,
        user_id: OwnerId,
    ) -> Result<AccessLevel, AccessResolutionError>;

    /// Privilege decision for `user_id`. Never fails: a lookup error is logged
    /// and the caller is treated as non-privileged.
    async fn resolve(&self, ctx: &RequestContext, user_id: OwnerId) -> AccessDecision {
        let lookup = self.lookup(ctx, user_id).await;
        if let Err(error) = &lookup {
            tracing::error!(
                user_id,
                error = %error,
                "Access level lookup failed, serving caller as non-privileged"
            );
        }
        AccessDecision::from_lookup(&lookup)
    }
}
