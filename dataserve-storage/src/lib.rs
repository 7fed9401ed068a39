//! dataserve Storage - Cache-Aside Repository
//!
//! Ports for the source of truth ([`DataSource`]), identity resolution
//! ([`AccessResolver`]) and the cache ([`CacheBackend`]), plus the pieces
//! composed from them:
//!
//! - [`CachedRepository`]: cache-aside reads with admin fan-out population
//! - [`AccessLevelRouter`]: chooses the owner or the admin read per caller
//! - [`MemoryCacheBackend`] / [`RedisCacheBackend`]: cache implementations
//!
//! The Postgres implementations of the two source ports live with the HTTP
//! service, next to the connection pool.

pub mod access;
pub mod cache;
pub mod fanout;
pub mod mock;
pub mod repository;
pub mod router;
pub mod source;

pub use access::AccessResolver;
pub use cache::{
    CacheBackend, CacheKey, CacheObserver, CacheStats, KeyPrefix, LookupOutcome,
    MemoryCacheBackend, NoopObserver, RedisCacheBackend, WriteKind,
};
pub use fanout::{FanOutReport, FanOutWriter, DEFAULT_FANOUT_CONCURRENCY};
pub use mock::{MockAccessResolver, MockCacheBackend, MockDataSource, RecordingObserver};
pub use repository::{CacheLookup, CachedRepository};
pub use router::AccessLevelRouter;
pub use source::DataSource;
