//! Prometheus Metrics Definitions
//!
//! Defines the gateway metrics and the /metrics endpoint for scraping.

use axum::{http::StatusCode, response::IntoResponse};
use evcrest_core::{CacheOperation, WriteOutcome};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, CounterVec, Encoder, Gauge,
    HistogramVec, TextEncoder,
};

use crate::error::{ApiError, ApiResult};

/// HTTP request latency buckets (seconds)
/// Covers: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s
///
/// 2.5s is the quorum wait, so writes that time out land in that bucket.
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0,
];

/// Global metrics instance - initialized once at startup
pub static METRICS: Lazy<ApiResult<GatewayMetrics>> = Lazy::new(GatewayMetrics::new);

/// The registered metrics, or `None` if registration failed.
pub fn metrics() -> Option<&'static GatewayMetrics> {
    METRICS.as_ref().ok()
}

/// Container for all gateway metrics.
#[derive(Clone)]
pub struct GatewayMetrics {
    /// HTTP request counter - labels: method, route, status
    pub http_requests_total: CounterVec,

    /// HTTP request duration histogram - labels: method, route
    pub http_request_duration_seconds: HistogramVec,

    /// Quorum write outcomes - labels: outcome
    pub write_outcomes_total: CounterVec,

    /// Cache operations submitted - labels: operation, status
    pub cache_operations_total: CounterVec,

    /// Tenants with a built cache client
    pub registered_tenants: Gauge,
}

impl GatewayMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "evcrest_http_requests_total",
                "Total number of HTTP requests",
                &["method", "route", "status"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register http_requests_total: {}", e)))?,

            http_request_duration_seconds: register_histogram_vec!(
                "evcrest_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "route"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register http_request_duration_seconds: {}", e)))?,

            write_outcomes_total: register_counter_vec!(
                "evcrest_write_outcomes_total",
                "Quorum write outcomes",
                &["outcome"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register write_outcomes_total: {}", e)))?,

            cache_operations_total: register_counter_vec!(
                "evcrest_cache_operations_total",
                "Cache operations submitted to the cluster",
                &["operation", "status"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register cache_operations_total: {}", e)))?,

            registered_tenants: register_gauge!(
                "evcrest_registered_tenants",
                "Tenants with a built cache client"
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register registered_tenants: {}", e)))?,
        })
    }

    /// Record an HTTP request.
    pub fn record_http_request(&self, method: &str, route: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, route, &status_str])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, route])
            .observe(duration_secs);
    }

    pub fn record_write_outcome(&self, outcome: WriteOutcome) {
        self.write_outcomes_total
            .with_label_values(&[outcome.label()])
            .inc();
    }

    /// Record whether a cache operation was submitted without error.
    pub fn record_cache_operation(&self, operation: CacheOperation, success: bool) {
        let status = if success { "success" } else { "error" };
        self.cache_operations_total
            .with_label_values(&[operation.as_str(), status])
            .inc();
    }

    pub fn set_registered_tenants(&self, count: usize) {
        self.registered_tenants.set(count as f64);
    }
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
#[utoipa::path(
    get,
    path = "/metrics",
    tag = "Observability",
    responses(
        (status = 200, description = "Prometheus metrics in text format", content_type = "text/plain"),
        (status = 500, description = "Failed to encode metrics"),
    ),
)]
pub async fn metrics_handler() -> impl IntoResponse {
    // Touch the global so the gateway's families are registered before gathering.
    let _ = metrics();

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
                Vec::new(),
            )
        }
    }
}
