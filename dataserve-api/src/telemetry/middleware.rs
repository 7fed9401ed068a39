//! Axum Middleware for HTTP Request Tracing and Metrics
//!
//! Wraps every request in an `http_request` span, records the Prometheus
//! request histogram and logs completion.

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::{info_span, Instrument};

use super::metrics::METRICS;

/// Path excluded from request metrics so scrapes do not count themselves.
pub const METRICS_PATH: &str = "/metrics";

/// Metric route label: `"METHOD /path"`.
///
/// Uses the matched route template when routing already ran, otherwise the
/// raw request path.
fn route_label(request: &Request) -> String {
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    format!("{} {}", request.method(), path)
}

/// Observability middleware for Axum.
///
/// 1. Tracing span around the downstream service
/// 2. Prometheus request metrics (skipped for `/metrics`)
/// 3. Request completion log line
pub async fn observability_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let route = route_label(&request);

    let span = info_span!(
        "http_request",
        http.method = %method,
        http.target = %path,
        http.route = %route,
    );

    let response = next.run(request).instrument(span).await;

    let duration = start.elapsed();
    let status = response.status();

    if path != METRICS_PATH {
        if let Ok(metrics) = METRICS.as_ref() {
            metrics.record_http_request(&route, status.as_u16(), duration.as_secs_f64());
        }
    }

    tracing::info!(
        method = %method,
        path = %path,
        status = status.as_u16(),
        duration_ms = duration.as_millis(),
        "Request completed"
    );

    response
}
