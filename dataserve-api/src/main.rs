//! dataserve API Server Entry Point
//!
//! Loads configuration, wires the repository and starts the Axum server.

use dataserve_api::telemetry::{init_tracing, TelemetryConfig};
use dataserve_api::{build_state, create_router, ApiError, ApiResult, ServiceConfig};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracing(&telemetry_config)?;

    let config = ServiceConfig::load()?;
    let state = build_state(&config)?;
    let shutdown = state.shutdown.clone();

    let app = create_router(state, &config.server);

    let addr = config.server.bind_addr()?;
    tracing::info!(%addr, "Starting dataserve API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutdown signal received");
            shutdown.cancel();
        })
        .await
        .map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;

    tracing::info!("Server stopped");
    Ok(())
}
