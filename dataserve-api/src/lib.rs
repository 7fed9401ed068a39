//! dataserve API - HTTP service over the cached record repository
//!
//! Serves `GET /data` behind JWT bearer auth. Reads go through the
//! access-level router: admins get the full table (and fan it out into
//! per-owner cache entries), everyone else gets their own records,
//! cache-aside. Postgres is the source of truth, Redis or process memory
//! the cache.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod telemetry;

// Re-export commonly used types
pub use auth::{
    authenticate, generate_jwt_token, parse_bearer, validate_jwt_token, AuthConfig, AuthContext,
    Claims, FixedClock, JwtClock, JwtSecret, SystemClock,
};
pub use config::{ConfigError, ServiceConfig};
pub use db::{DbClient, DbConfig};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use middleware::{auth_middleware, AuthExtractor, AuthMiddlewareState};
pub use routes::create_router;
pub use state::{build_state, AppState, CacheProbe, DataRouter, ReadinessProbe};
