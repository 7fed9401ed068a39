//! REST API Routes Module
//!
//! - `GET /data` (bearer auth)
//! - `GET /health/ping`, `GET /health/ready`
//! - `GET /metrics`

pub mod data;
pub mod health;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::get,
    Router,
};
use tower::limit::ConcurrencyLimitLayer;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::middleware::{auth_middleware, AuthMiddlewareState};
use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware};

pub use data::create_router as data_router;
pub use health::create_router as health_router;

/// Build the complete application router.
///
/// Layers, outermost first: HTTP trace, observability (span + metrics),
/// concurrency limit. Auth wraps only the data routes.
pub fn create_router(state: AppState, server: &ServerConfig) -> Router {
    let auth_state = AuthMiddlewareState::new(state.auth.clone());

    let data = data_router(state.clone()).layer(from_fn_with_state(auth_state, auth_middleware));

    Router::new()
        .merge(data)
        .nest("/health", health_router(state))
        .route("/metrics", get(metrics_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(from_fn(observability_middleware))
                .layer(ConcurrencyLimitLayer::new(server.max_concurrent_requests.max(1))),
        )
}
