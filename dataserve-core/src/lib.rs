//! dataserve Core - Records, Access Levels and Errors
//!
//! Pure types shared by every other crate in the workspace. Nothing in here
//! performs I/O; the request context only wraps futures supplied by callers.

pub mod access;
pub mod context;
pub mod error;
pub mod record;

pub use access::{AccessDecision, AccessLevel, ADMIN_ACCESS_LEVEL};
pub use context::{Interrupted, RequestContext};
pub use error::{AccessResolutionError, CacheError, DataError};
pub use record::{group_by_owner, CachedRecord, OwnerId, Record, RecordId};
