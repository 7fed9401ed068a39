//! Error types for dataserve operations
//!
//! Three concerns, three enums: the cache (always absorbed by the cached
//! repository), the source of truth (always propagated), and access
//! resolution (always degraded to a non-privileged decision). Each carries
//! its own `Cancelled` / `DeadlineExceeded` variants so an interrupted call is
//! never mistaken for a generic failure.

use crate::context::Interrupted;
use crate::record::OwnerId;
use thiserror::Error;

/// Cache port errors.
///
/// A genuine miss is not an error: `get` succeeds with an empty result.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Cache entry could not be (de)serialized: {reason}")]
    Serialization { reason: String },

    #[error("Cache operation cancelled")]
    Cancelled,

    #[error("Cache operation exceeded its deadline")]
    DeadlineExceeded,
}

impl CacheError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn serialization(reason: impl Into<String>) -> Self {
        Self::Serialization {
            reason: reason.into(),
        }
    }

    /// True for the two interruption variants.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }
}

impl From<Interrupted> for CacheError {
    fn from(interrupted: Interrupted) -> Self {
        match interrupted {
            Interrupted::Cancelled => Self::Cancelled,
            Interrupted::DeadlineExceeded => Self::DeadlineExceeded,
        }
    }
}

/// Source-of-truth errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DataError {
    #[error("Data source connection failed: {reason}")]
    Connection { reason: String },

    #[error("Query failed: {reason}")]
    Query { reason: String },

    #[error("Malformed row: {reason}")]
    Decode { reason: String },

    #[error("Data source operation cancelled")]
    Cancelled,

    #[error("Data source operation exceeded its deadline")]
    DeadlineExceeded,
}

impl DataError {
    pub fn connection(reason: impl Into<String>) -> Self {
        Self::Connection {
            reason: reason.into(),
        }
    }

    pub fn query(reason: impl Into<String>) -> Self {
        Self::Query {
            reason: reason.into(),
        }
    }

    pub fn decode(reason: impl Into<String>) -> Self {
        Self::Decode {
            reason: reason.into(),
        }
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }
}

impl From<Interrupted> for DataError {
    fn from(interrupted: Interrupted) -> Self {
        match interrupted {
            Interrupted::Cancelled => Self::Cancelled,
            Interrupted::DeadlineExceeded => Self::DeadlineExceeded,
        }
    }
}

/// Identity lookup errors. Never surfaced to callers of the router.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AccessResolutionError {
    #[error("User {user_id} not found")]
    NotFound { user_id: OwnerId },

    #[error("Access level lookup failed: {reason}")]
    Lookup { reason: String },

    #[error("Access level lookup cancelled")]
    Cancelled,

    #[error("Access level lookup exceeded its deadline")]
    DeadlineExceeded,
}

impl AccessResolutionError {
    pub fn lookup(reason: impl Into<String>) -> Self {
        Self::Lookup {
            reason: reason.into(),
        }
    }
}

impl From<Interrupted> for AccessResolutionError {
    fn from(interrupted: Interrupted) -> Self {
        match interrupted {
            Interrupted::Cancelled => Self::Cancelled,
            Interrupted::DeadlineExceeded => Self::DeadlineExceeded,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
