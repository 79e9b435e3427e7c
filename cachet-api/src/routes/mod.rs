//! REST API Routes Module
//!
//! - Service document, `$metadata` and operations under the service root
//! - Health check endpoints (Kubernetes-compatible)
//! - Prometheus metrics and the OpenAPI document
//! - CORS support for browser-based clients

pub mod health;
pub mod metadata;
pub mod operations;

use std::time::Duration;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn,
    routing::{any, get},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult, ErrorCode};
use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware};

pub use health::create_router as health_router;

/// Top-level paths a service root may not shadow.
const RESERVED_ROOTS: &[&str] = &["/health", "/metrics", "/openapi.json"];

// ============================================================================
// OPENAPI ENDPOINT
// ============================================================================

/// Handler for /openapi.json endpoint.
#[cfg(feature = "openapi")]
async fn openapi_json() -> impl axum::response::IntoResponse {
    use utoipa::OpenApi;
    axum::Json(crate::openapi::ApiDoc::openapi())
}

// ============================================================================
// SERVICE ROUTER
// ============================================================================

/// Routes relative to the service root.
///
/// `/$metadata` is a static segment and wins over `/:operation`.
pub fn service_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(metadata::service_document))
        .route("/$metadata", get(metadata::schema_document))
        .route("/:operation", any(operations::invoke_operation))
        .with_state(state)
}

fn validate_service_root(root: &str) -> ApiResult<()> {
    let malformed = !root.starts_with('/') || (root.len() > 1 && root.ends_with('/'));
    if malformed || root.contains(':') || root.contains('*') {
        return Err(ApiError::new(
            ErrorCode::InvalidInput,
            format!("Invalid service root '{}'", root),
        ));
    }
    if RESERVED_ROOTS
        .iter()
        .any(|reserved| root == *reserved || root.starts_with(&format!("{}/", reserved)))
    {
        return Err(ApiError::new(
            ErrorCode::InvalidInput,
            format!("Service root '{}' collides with a built-in endpoint", root),
        ));
    }
    Ok(())
}

// ============================================================================
// CORS LAYER
// ============================================================================

/// Build the CORS layer from ApiConfig.
///
/// In development mode (empty origins), allows all origins.
/// In production mode, only allows configured origins.
fn build_cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if config.cors_origins.is_empty() {
        tracing::info!("CORS: Development mode - allowing all origins");
        cors.allow_origin(Any).allow_headers(Any)
    } else {
        tracing::info!(
            "CORS: Production mode - allowing origins: {:?}",
            config.cors_origins
        );
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();

        if config.cors_allow_credentials {
            cors.allow_origin(origins).allow_credentials(true)
        } else {
            cors.allow_origin(origins)
        }
    }
}

// ============================================================================
// API ROUTER
// ============================================================================

/// Create the complete API router.
///
/// - Service document, `$metadata` and operations under `service_root`
/// - Health checks at /health/*
/// - Metrics at /metrics
/// - OpenAPI spec at /openapi.json (openapi feature)
///
/// # Middleware Order (outer to inner)
/// 1. CORS - handles preflight requests
/// 2. Trace - tower-http request spans
/// 3. Observability - metrics and completion logs
/// 4. Timeout - whole-request deadline
pub fn create_api_router(state: AppState, config: &ApiConfig) -> ApiResult<Router> {
    validate_service_root(&config.service_root)?;

    let health = health::create_router(state.registry.clone(), state.start_time);
    let service = service_router(state);

    let mut router = Router::new()
        .nest("/health", health)
        .route("/metrics", get(metrics_handler));

    #[cfg(feature = "openapi")]
    {
        router = router.route("/openapi.json", get(openapi_json));
    }

    // Nesting at "/" is rejected by axum; a root service is merged instead.
    router = if config.service_root == "/" {
        router.merge(service)
    } else {
        router.nest(&config.service_root, service)
    };

    tracing::info!(service_root = %config.service_root, "Service routes mounted");

    Ok(router
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(from_fn(observability_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(config)))
}
