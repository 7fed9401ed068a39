//! dataserve Telemetry - Observability Infrastructure
//!
//! Provides structured logging and Prometheus metrics for the API layer.
//! Nothing here needs an external collector: logs go to stdout as JSON and
//! metrics are pulled from `/metrics`.

pub mod metrics;
pub mod middleware;
pub mod tracer;

pub use metrics::{metrics_handler, MetricsObserver, ServiceMetrics, METRICS};
pub use middleware::observability_middleware;
pub use tracer::{init_tracing, TelemetryConfig};
