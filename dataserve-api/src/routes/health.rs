//! Health Check Endpoints
//!
//! - /health/ping - Simple liveness check
//! - /health/ready - Database and cache connectivity check
//!
//! No authentication required for health endpoints.

use std::collections::BTreeMap;
use std::time::Instant;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};

use crate::state::{AppState, ReadinessProbe};
use dataserve_core::RequestContext;

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HealthDetails>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthDetails {
    /// Per-dependency results keyed by probe name (`database`, `cache`).
    pub components: BTreeMap<String, ComponentHealth>,
    pub version: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// HANDLERS
// ============================================================================

pub async fn ping() -> impl IntoResponse {
    (StatusCode::OK, "pong")
}

pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let ctx = state.request_context();

    let mut components = BTreeMap::new();
    for probe in &state.probes {
        let health = check_component(probe.as_ref(), &ctx).await;
        components.insert(probe.name().to_string(), health);
    }

    let overall_status = if components
        .values()
        .all(|component| component.status == HealthStatus::Healthy)
    {
        HealthStatus::Healthy
    } else {
        HealthStatus::Unhealthy
    };

    let response = HealthResponse {
        status: overall_status,
        message: None,
        details: Some(HealthDetails {
            components,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: state.start_time.elapsed().as_secs(),
        }),
    };

    let status_code = if overall_status == HealthStatus::Healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response))
}

async fn check_component(probe: &dyn ReadinessProbe, ctx: &RequestContext) -> ComponentHealth {
    let start = Instant::now();

    match probe.check(ctx).await {
        Ok(()) => ComponentHealth {
            status: HealthStatus::Healthy,
            latency_ms: Some(start.elapsed().as_millis() as u64),
            error: None,
        },
        Err(e) => {
            tracing::warn!(component = probe.name(), error = %e, "Readiness check failed");
            ComponentHealth {
                status: HealthStatus::Unhealthy,
                latency_ms: None,
                error: Some(format!("{} check failed: {}", probe.name(), e)),
            }
        }
    }
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/ready", get(readiness))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthConfig, JwtSecret};
    use async_trait::async_trait;
    use axum::{body::Body, extract::Request};
    use dataserve_storage::{
        AccessLevelRouter, AccessResolver, DataSource, MockAccessResolver, MockDataSource,
    };
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    struct StaticProbe {
        name: &'static str,
        healthy: bool,
    }

    #[async_trait]
    impl ReadinessProbe for StaticProbe {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn check(&self, _ctx: &RequestContext) -> Result<(), String> {
            if self.healthy {
                Ok(())
            } else {
                Err("connection refused".to_string())
            }
        }
    }

    fn state(cache_healthy: bool) -> Result<AppState, String> {
        let resolver: Arc<dyn AccessResolver> = Arc::new(MockAccessResolver::new());
        let source: Arc<dyn DataSource> = Arc::new(MockDataSource::new(Vec::new()));
        let secret = JwtSecret::new("phrase".to_string()).map_err(|e| e.to_string())?;
        Ok(AppState::new(
            AccessLevelRouter::new(resolver, source),
            Arc::new(AuthConfig::new(secret)),
            Duration::from_secs(5),
        )
        .with_probe(Arc::new(StaticProbe { name: "database", healthy: true }))
        .with_probe(Arc::new(StaticProbe { name: "cache", healthy: cache_healthy })))
    }

    async fn ready(state: AppState) -> Result<(StatusCode, serde_json::Value), String> {
        let request = Request::builder()
            .uri("/ready")
            .body(Body::empty())
            .map_err(|e| e.to_string())?;
        let response = create_router(state)
            .oneshot(request)
            .await
            .map_err(|e| e.to_string())?;
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .map_err(|e| e.to_string())?;
        let json = serde_json::from_slice(&body).map_err(|e| e.to_string())?;
        Ok((status, json))
    }

    #[tokio::test]
    async fn test_ready_when_all_probes_pass() -> Result<(), String> {
        let (status, json) = ready(state(true)?).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["details"]["components"]["cache"]["status"], "healthy");
        Ok(())
    }

    #[tokio::test]
    async fn test_not_ready_when_cache_fails() -> Result<(), String> {
        let (status, json) = ready(state(false)?).await?;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["status"], "unhealthy");
        assert_eq!(json["details"]["components"]["database"]["status"], "healthy");
        assert_eq!(json["details"]["components"]["cache"]["status"], "unhealthy");
        Ok(())
    }

    #[test]
    fn test_component_health_with_error() -> Result<(), serde_json::Error> {
        let component = ComponentHealth {
            status: HealthStatus::Unhealthy,
            latency_ms: None,
            error: Some("Connection refused".to_string()),
        };

        let json = serde_json::to_string(&component)?;
        assert!(json.contains("\"status\":\"unhealthy\""));
        assert!(!json.contains("latency_ms"));
        Ok(())
    }
}
