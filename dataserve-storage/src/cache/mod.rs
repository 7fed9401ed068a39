//! Cache layer: owner-scoped keys, the backend port and its implementations.
//!
//! # Owner Isolation
//!
//! The [`CacheKey`] type can only be built from a [`KeyPrefix`] and a single
//! owner id. Every entry therefore holds exactly one owner's records, and the
//! key of an owner is the same no matter which request path wrote it.
//!
//! # Backends
//!
//! - [`RedisCacheBackend`]: shared cache for multi-instance deployments.
//! - [`MemoryCacheBackend`]: single-process cache, also used in tests.

pub mod codec;
pub mod key;
pub mod memory;
pub mod redis_backend;
pub mod traits;

pub use key::{CacheKey, KeyPrefix};
pub use memory::MemoryCacheBackend;
pub use redis_backend::RedisCacheBackend;
pub use traits::{CacheBackend, CacheObserver, CacheStats, LookupOutcome, NoopObserver, WriteKind};
