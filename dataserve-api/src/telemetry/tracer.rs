//! Tracing Subscriber Initialization
//!
//! One JSON fmt layer behind an `EnvFilter`. `RUST_LOG` wins when set,
//! otherwise the configured default directives apply.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{ApiError, ApiResult};

/// Directives used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "dataserve_api=debug,dataserve_storage=debug,tower_http=info,info";

/// Telemetry configuration from environment variables.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to the startup log line
    pub service_name: String,
    /// Service version
    pub service_version: String,
    /// Environment (production, staging, development)
    pub environment: String,
    /// Fallback filter directives
    pub default_filter: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: std::env::var("DATASERVE_SERVICE_NAME")
                .unwrap_or_else(|_| "dataserve-api".to_string()),
            service_version: std::env::var("DATASERVE_SERVICE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            environment: std::env::var("DATASERVE_ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),
            default_filter: std::env::var("DATASERVE_LOG_FILTER")
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string()),
        }
    }
}

/// Install the global tracing subscriber.
///
/// Call once at startup, before anything logs. A second call fails because
/// a global subscriber is already set.
pub fn init_tracing(config: &TelemetryConfig) -> ApiResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().json())
        .try_init()
        .map_err(|e| ApiError::internal_error(format!("Failed to init subscriber: {}", e)))?;

    tracing::info!(
        service_name = config.service_name,
        service_version = config.service_version,
        environment = config.environment,
        "Telemetry initialized"
    );

    Ok(())
}
