//! Access levels and the privilege decision.

use crate::error::AccessResolutionError;

/// Sentinel stored in `users.access_level` for privileged identities.
pub const ADMIN_ACCESS_LEVEL: &str = "admin";

/// Access level attribute of an identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessLevel {
    Admin,
    /// Any other stored value, kept verbatim.
    User(String),
}

impl AccessLevel {
    pub fn parse(raw: &str) -> Self {
        if raw == ADMIN_ACCESS_LEVEL {
            AccessLevel::Admin
        } else {
            AccessLevel::User(raw.to_string())
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, AccessLevel::Admin)
    }
}

/// Outcome of resolving an identity's privilege.
///
/// `resolution_failed` records that the lookup itself failed and the caller
/// was demoted to the non-privileged path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessDecision {
    pub is_privileged: bool,
    pub resolution_failed: bool,
}

impl AccessDecision {
    pub fn granted() -> Self {
        Self {
            is_privileged: true,
            resolution_failed: false,
        }
    }

    pub fn standard() -> Self {
        Self {
            is_privileged: false,
            resolution_failed: false,
        }
    }

    /// Fail-closed decision after a lookup failure.
    pub fn degraded() -> Self {
        Self {
            is_privileged: false,
            resolution_failed: true,
        }
    }

    pub fn from_lookup(lookup: &Result<AccessLevel, AccessResolutionError>) -> Self {
        match lookup {
            Ok(level) if level.is_admin() => Self::granted(),
            Ok(_) => Self::standard(),
            Err(_) => Self::degraded(),
        }
    }
}
