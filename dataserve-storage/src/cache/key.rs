//! Owner-scoped cache keys.
//!
//! A `CacheKey` can only be built from a prefix and a single owner id, so an
//! entry addressed by it never holds another owner's records.

use std::fmt;

use dataserve_core::OwnerId;

/// Separator between the deployment prefix and the owner id.
const SEPARATOR: char = '_';

/// Fixed per-deployment key prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPrefix(String);

impl KeyPrefix {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self(prefix.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key for one owner's entry.
    pub fn key(&self, owner_id: OwnerId) -> CacheKey {
        CacheKey::new(self, owner_id)
    }
}

impl fmt::Display for KeyPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key of a cache entry: `"{prefix}_{owner_id}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    inner: CacheKeyInner,
}

/// Private inner struct - prevents external construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKeyInner {
    owner_id: OwnerId,
    encoded: String,
}

impl CacheKey {
    pub fn new(prefix: &KeyPrefix, owner_id: OwnerId) -> Self {
        Self {
            inner: CacheKeyInner {
                owner_id,
                encoded: format!("{}{}{}", prefix.as_str(), SEPARATOR, owner_id),
            },
        }
    }

    pub fn owner_id(&self) -> OwnerId {
        self.inner.owner_id
    }

    pub fn as_str(&self) -> &str {
        &self.inner.encoded
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner.encoded)
    }
}
