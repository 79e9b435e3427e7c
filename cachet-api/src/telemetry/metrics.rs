//! Prometheus Metrics Definitions
//!
//! Defines all Cachet metrics with appropriate labels and types.
//! Exposes a /metrics endpoint for Prometheus scraping.

use axum::{http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, CounterVec, Encoder, Gauge,
    HistogramVec, TextEncoder,
};

use crate::error::{ApiError, ApiResult};

/// HTTP request latency buckets (seconds)
/// Covers: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

/// Cache operation latency buckets (seconds)
const CACHE_LATENCY_BUCKETS: &[f64] =
    &[0.0001, 0.0005, 0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 5.0];

/// Cache start latency buckets (seconds)
const START_LATENCY_BUCKETS: &[f64] = &[0.001, 0.010, 0.100, 0.500, 1.0, 5.0, 15.0, 30.0, 60.0];

/// Global metrics instance - initialized once at startup
pub static METRICS: Lazy<ApiResult<CachetMetrics>> = Lazy::new(CachetMetrics::new);

/// Container for all Cachet metrics.
#[derive(Clone)]
pub struct CachetMetrics {
    /// HTTP request counter - labels: method, path, status
    pub http_requests_total: CounterVec,

    /// HTTP request duration histogram - labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// Cache operation counter - labels: operation, cache, status
    pub cache_operations_total: CounterVec,

    /// Cache operation duration histogram - labels: operation, cache
    pub cache_operation_duration_seconds: HistogramVec,

    /// Cache start counter - labels: cache, status
    pub cache_starts_total: CounterVec,

    /// Cache start duration histogram - labels: cache
    pub cache_start_duration_seconds: HistogramVec,

    /// Number of caches started in this process
    pub started_caches: Gauge,
}

fn registration_error(name: &str, e: prometheus::Error) -> ApiError {
    ApiError::internal_error(format!("Failed to register {}: {}", name, e))
}

impl CachetMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "cachet_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| registration_error("http_requests_total", e))?,

            http_request_duration_seconds: register_histogram_vec!(
                "cachet_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| registration_error("http_request_duration_seconds", e))?,

            cache_operations_total: register_counter_vec!(
                "cachet_cache_operations_total",
                "Total number of dispatched cache operations",
                &["operation", "cache", "status"]
            )
            .map_err(|e| registration_error("cache_operations_total", e))?,

            cache_operation_duration_seconds: register_histogram_vec!(
                "cachet_cache_operation_duration_seconds",
                "Cache operation duration in seconds",
                &["operation", "cache"],
                CACHE_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| registration_error("cache_operation_duration_seconds", e))?,

            cache_starts_total: register_counter_vec!(
                "cachet_cache_starts_total",
                "Total number of cache start attempts",
                &["cache", "status"]
            )
            .map_err(|e| registration_error("cache_starts_total", e))?,

            cache_start_duration_seconds: register_histogram_vec!(
                "cachet_cache_start_duration_seconds",
                "Cache start duration in seconds",
                &["cache"],
                START_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| registration_error("cache_start_duration_seconds", e))?,

            started_caches: register_gauge!(
                "cachet_started_caches",
                "Current number of started caches"
            )
            .map_err(|e| registration_error("started_caches", e))?,
        })
    }

    /// Record an HTTP request.
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    /// Record a dispatched cache operation.
    pub fn record_cache_operation(
        &self,
        operation: &str,
        cache: &str,
        success: bool,
        duration_secs: f64,
    ) {
        let status = if success { "success" } else { "error" };
        self.cache_operations_total
            .with_label_values(&[operation, cache, status])
            .inc();
        self.cache_operation_duration_seconds
            .with_label_values(&[operation, cache])
            .observe(duration_secs);
    }

    /// Record a cache start attempt.
    pub fn record_cache_start(&self, cache: &str, success: bool, duration_secs: f64) {
        let status = if success { "success" } else { "error" };
        self.cache_starts_total
            .with_label_values(&[cache, status])
            .inc();
        self.cache_start_duration_seconds
            .with_label_values(&[cache])
            .observe(duration_secs);
        if success {
            self.started_caches.inc();
        }
    }
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/metrics",
    tag = "Observability",
    responses(
        (status = 200, description = "Prometheus metrics in text format", content_type = "text/plain"),
        (status = 500, description = "Failed to encode metrics"),
    ),
))]
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

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::core::Collector;

    fn metrics() -> Result<&'static CachetMetrics, String> {
        METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e.message))
    }

    #[test]
    fn test_metrics_creation() -> Result<(), String> {
        let metrics = metrics()?;
        assert!(!metrics.http_requests_total.desc().is_empty());
        Ok(())
    }

    #[test]
    fn test_record_cache_operation() -> Result<(), String> {
        let metrics = metrics()?;
        metrics.record_cache_operation("get", "books", true, 0.0002);
        metrics.record_cache_operation("put", "books", false, 0.001);

        let ok = metrics
            .cache_operations_total
            .with_label_values(&["get", "books", "success"])
            .get();
        assert!(ok >= 1.0);
        Ok(())
    }

    #[test]
    fn test_record_cache_start() -> Result<(), String> {
        let metrics = metrics()?;
        let before = metrics.started_caches.get();
        metrics.record_cache_start("metrics_test_cache", true, 0.01);
        metrics.record_cache_start("metrics_test_cache", false, 0.01);
        assert!(metrics.started_caches.get() >= before + 1.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_metrics_handler_renders_text() -> Result<(), String> {
        metrics()?.record_http_request("GET", "/health/ping", 200, 0.001);
        let response = metrics_handler().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .map_err(|e| e.to_string())?;
        let text = String::from_utf8(body.to_vec()).map_err(|e| e.to_string())?;
        assert!(text.contains("cachet_http_requests_total"));
        Ok(())
    }
}
