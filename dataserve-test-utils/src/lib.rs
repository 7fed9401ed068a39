//! dataserve Test Utilities
//!
//! Shared test infrastructure for the dataserve workspace:
//! - Mock collaborators (re-exported from `dataserve-storage`)
//! - Fixtures for the common read scenarios
//! - Proptest generators for records and keys

// Re-export mocks from their source crate
pub use dataserve_storage::{
    KeyPrefix, MockAccessResolver, MockCacheBackend, MockDataSource, RecordingObserver,
};

// Re-export core types for convenience
pub use dataserve_core::{
    AccessLevel, AccessResolutionError, CacheError, DataError, OwnerId, Record, RecordId,
    RequestContext,
};

use std::sync::Arc;

use dataserve_storage::CachedRepository;

// ============================================================================
// FIXTURES
// ============================================================================

/// Key prefix used by fixtures.
pub const TEST_PREFIX: &str = "cache";

pub fn record_fixture(id: RecordId, owner_id: OwnerId, payload: &str) -> Record {
    Record::new(id, owner_id, payload)
}

/// Three rows over two owners: owner 1 has two, owner 2 has one.
pub fn two_owner_rows() -> Vec<Record> {
    vec![
        record_fixture(1, 1, "a"),
        record_fixture(2, 1, "b"),
        record_fixture(3, 2, "c"),
    ]
}

pub fn test_prefix() -> KeyPrefix {
    KeyPrefix::new(TEST_PREFIX)
}

/// Repository over mocks, with handles on both collaborators.
pub struct MockRepository {
    pub source: Arc<MockDataSource>,
    pub cache: Arc<MockCacheBackend>,
    pub repository: Arc<CachedRepository<MockDataSource, MockCacheBackend>>,
}

impl MockRepository {
    pub fn new(rows: Vec<Record>) -> Self {
        Self::with_prefix(rows, test_prefix())
    }

    pub fn with_prefix(rows: Vec<Record>, prefix: KeyPrefix) -> Self {
        let source = Arc::new(MockDataSource::new(rows));
        let cache = Arc::new(MockCacheBackend::new());
        let repository = Arc::new(CachedRepository::new(
            Arc::clone(&source),
            Arc::clone(&cache),
            prefix,
        ));
        Self {
            source,
            cache,
            repository,
        }
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for dataserve types.

    use super::*;
    use proptest::prelude::*;

    /// Owner ids as stored by Postgres (`BIGSERIAL`, so positive).
    pub fn arb_owner_id() -> impl Strategy<Value = OwnerId> {
        1..=i64::MAX
    }

    /// Lowercase, non-empty key prefix.
    pub fn arb_key_prefix() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_]{0,15}"
    }

    pub fn arb_payload() -> impl Strategy<Value = String> {
        ".{0,64}"
    }

    /// Rows with unique ascending ids over a small owner pool, so groups of
    /// several records per owner are common.
    pub fn arb_rows(max_len: usize) -> impl Strategy<Value = Vec<Record>> {
        prop::collection::vec((1i64..=8, arb_payload()), 0..=max_len).prop_map(|rows| {
            rows.into_iter()
                .enumerate()
                .map(|(i, (owner_id, payload))| Record::new(i as RecordId + 1, owner_id, payload))
                .collect()
        })
    }
}
