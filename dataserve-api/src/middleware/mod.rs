//! Middleware modules for the dataserve API
//!
//! - `auth`: bearer-token authentication for the data routes
//!
//! Request observability lives in [`crate::telemetry::middleware`].

mod auth;

pub use auth::{
    auth_middleware, extract_auth_context, AuthExtractor, AuthMiddlewareError,
    AuthMiddlewareState,
};
