//! Observability for the Cachet API
//!
//! - Prometheus metrics for HTTP requests, cache operations and cache starts
//! - Structured logging through `tracing-subscriber`
//! - Request span middleware

pub mod instrumented;
pub mod metrics;
pub mod middleware;
pub mod tracer;

pub use instrumented::InstrumentedCacheManager;
pub use metrics::{metrics_handler, CachetMetrics, METRICS};
pub use middleware::observability_middleware;
pub use tracer::{init_tracing, LogFormat, TelemetryConfig, DEFAULT_LOG_FILTER};
