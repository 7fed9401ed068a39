//! Prometheus Metrics Definitions
//!
//! Defines every dataserve metric with its labels and types, and exposes the
//! `/metrics` endpoint for Prometheus scraping.

use axum::{http::StatusCode, response::IntoResponse};
use dataserve_storage::{CacheObserver, LookupOutcome, WriteKind};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

use crate::error::{ApiError, ApiResult};

/// HTTP request latency buckets (seconds), 1ms to 10s.
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.002, 0.005, 0.010, 0.020, 0.050, 0.100, 0.200, 0.500, 1.0, 2.0, 5.0, 10.0,
];

/// Database operation latency buckets (seconds)
const DB_LATENCY_BUCKETS: &[f64] =
    &[0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0];

/// Global metrics instance - initialized on first use
pub static METRICS: Lazy<ApiResult<ServiceMetrics>> = Lazy::new(ServiceMetrics::new);

/// Container for all dataserve metrics.
#[derive(Clone)]
pub struct ServiceMetrics {
    /// HTTP request counter - labels: route, status_code
    pub http_requests_total: CounterVec,

    /// HTTP request duration histogram - labels: route, status_code
    pub http_request_duration_seconds: HistogramVec,

    /// Cache read counter - labels: operation, outcome (hit/miss/error)
    pub cache_lookups_total: CounterVec,

    /// Cache write counter - labels: operation (populate/fanout), outcome
    pub cache_writes_total: CounterVec,

    /// Database operation counter - labels: operation, status
    pub db_operations_total: CounterVec,

    /// Database operation duration histogram - labels: operation
    pub db_operation_duration_seconds: HistogramVec,
}

impl ServiceMetrics {
    /// Create and register all metrics with the default Prometheus registry.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "dataserve_http_requests_total",
                "Total number of HTTP requests",
                &["route", "status_code"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register http_requests_total: {}", e)))?,

            http_request_duration_seconds: register_histogram_vec!(
                "dataserve_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["route", "status_code"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register http_request_duration_seconds: {}", e)))?,

            cache_lookups_total: register_counter_vec!(
                "dataserve_cache_lookups_total",
                "Cache reads performed by the repository",
                &["operation", "outcome"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register cache_lookups_total: {}", e)))?,

            cache_writes_total: register_counter_vec!(
                "dataserve_cache_writes_total",
                "Cache writes performed by the repository",
                &["operation", "outcome"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register cache_writes_total: {}", e)))?,

            db_operations_total: register_counter_vec!(
                "dataserve_db_operations_total",
                "Total number of database operations",
                &["operation", "status"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register db_operations_total: {}", e)))?,

            db_operation_duration_seconds: register_histogram_vec!(
                "dataserve_db_operation_duration_seconds",
                "Database operation duration in seconds",
                &["operation"],
                DB_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register db_operation_duration_seconds: {}", e)))?,
        })
    }

    /// Record an HTTP request. `route` is `"METHOD /path"`.
    pub fn record_http_request(&self, route: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[route, &status_str])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[route, &status_str])
            .observe(duration_secs);
    }

    /// Record a database operation.
    pub fn record_db_operation(&self, operation: &str, success: bool, duration_secs: f64) {
        let status = if success { "success" } else { "error" };
        self.db_operations_total
            .with_label_values(&[operation, status])
            .inc();
        self.db_operation_duration_seconds
            .with_label_values(&[operation])
            .observe(duration_secs);
    }

    /// Record one repository cache read.
    pub fn record_cache_lookup(&self, outcome: LookupOutcome) {
        self.cache_lookups_total
            .with_label_values(&["fetch_by_owner", outcome.as_str()])
            .inc();
    }

    /// Record one repository cache write.
    pub fn record_cache_write(&self, kind: WriteKind, succeeded: bool) {
        let outcome = if succeeded { "success" } else { "error" };
        self.cache_writes_total
            .with_label_values(&[kind.as_str(), outcome])
            .inc();
    }
}

// ============================================================================
// CACHE OBSERVER
// ============================================================================

/// Feeds repository cache events into the global [`METRICS`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsObserver;

impl CacheObserver for MetricsObserver {
    fn on_lookup(&self, outcome: LookupOutcome) {
        if let Ok(metrics) = METRICS.as_ref() {
            metrics.record_cache_lookup(outcome);
        }
    }

    fn on_write(&self, kind: WriteKind, succeeded: bool) {
        if let Ok(metrics) = METRICS.as_ref() {
            metrics.record_cache_write(kind, succeeded);
        }
    }
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}
