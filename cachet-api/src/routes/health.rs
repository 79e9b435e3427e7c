//! Health Check Endpoints
//!
//! Provides Kubernetes-compatible health check endpoints:
//! - /health/ping - Simple liveness check
//! - /health/live - Process alive check
//! - /health/ready - Registry check with per-cache status
//!
//! Readiness never starts a cache; caches that have not been touched yet are
//! reported as not started.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use cachet_storage::CacheRegistry;

// ============================================================================
// TYPES
// ============================================================================

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct HealthResponse {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HealthDetails>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    Degraded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct HealthDetails {
    pub caches: Vec<CacheHealth>,
    pub version: String,
    pub uptime_seconds: u64,
}

/// One registered cache as seen by the readiness probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CacheHealth {
    pub name: String,
    pub started: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hit_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persistent: Option<bool>,
}

// ============================================================================
// STATE
// ============================================================================

#[derive(Debug, Clone)]
pub struct HealthState {
    pub registry: Arc<CacheRegistry>,
    pub start_time: Instant,
}

impl HealthState {
    pub fn new(registry: Arc<CacheRegistry>, start_time: Instant) -> Self {
        Self {
            registry,
            start_time,
        }
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /health/ping - Simple pong response
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/health/ping",
    tag = "Health",
    responses(
        (status = 200, description = "Service is responding", body = String),
    ),
))]
pub async fn ping() -> impl IntoResponse {
    (StatusCode::OK, "pong")
}

/// GET /health/live - Process liveness check
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/health/live",
    tag = "Health",
    responses(
        (status = 200, description = "Process is alive", body = HealthResponse),
    ),
))]
pub async fn liveness() -> impl IntoResponse {
    let response = HealthResponse {
        status: HealthStatus::Healthy,
        message: Some("Process is alive".to_string()),
        details: None,
    };
    (StatusCode::OK, Json(response))
}

/// GET /health/ready - Readiness check (registry state)
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/health/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Service is ready", body = HealthResponse),
        (status = 503, description = "Service is not ready", body = HealthResponse),
    ),
))]
pub async fn readiness(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let (status, message, caches) = match cache_health(&state.registry) {
        Ok(caches) => (HealthStatus::Healthy, None, caches),
        Err(e) => (HealthStatus::Unhealthy, Some(e), Vec::new()),
    };

    let response = HealthResponse {
        status,
        message,
        details: Some(HealthDetails {
            caches,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: state.start_time.elapsed().as_secs(),
        }),
    };

    let status_code = if status == HealthStatus::Healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response))
}

fn cache_health(registry: &CacheRegistry) -> Result<Vec<CacheHealth>, String> {
    let stats = registry
        .all_stats()
        .map_err(|e| format!("Registry check failed: {}", e))?;

    Ok(registry
        .names()
        .iter()
        .map(|name| match stats.get(name) {
            Some(s) => CacheHealth {
                name: name.clone(),
                started: true,
                entry_count: Some(s.entry_count),
                hit_rate: Some(s.hit_rate()),
                persistent: Some(s.persistent),
            },
            None => CacheHealth {
                name: name.clone(),
                started: false,
                entry_count: None,
                hit_rate: None,
                persistent: None,
            },
        })
        .collect())
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create health check router
pub fn create_router(registry: Arc<CacheRegistry>, start_time: Instant) -> Router {
    let state = Arc::new(HealthState::new(registry, start_time));

    Router::new()
        .route("/ping", get(ping))
        .route("/live", get(liveness))
        .route("/ready", get(readiness))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cachet_storage::{CacheManager, LocalCacheManager};
    use std::time::Duration;

    fn registry() -> Arc<CacheRegistry> {
        let manager: Arc<dyn CacheManager> =
            Arc::new(LocalCacheManager::in_memory(["books", "movies"]));
        Arc::new(CacheRegistry::new(manager, Duration::from_secs(1)))
    }

    #[test]
    fn test_health_response_serialization() -> Result<(), serde_json::Error> {
        let response = HealthResponse {
            status: HealthStatus::Healthy,
            message: Some("All systems operational".to_string()),
            details: None,
        };

        let json = serde_json::to_string(&response)?;
        assert!(json.contains("\"status\":\"healthy\""));
        assert!(!json.contains("details"));
        Ok(())
    }

    #[test]
    fn test_unstarted_caches_reported() -> Result<(), String> {
        let caches = cache_health(&registry())?;
        assert_eq!(caches.len(), 2);
        assert!(caches.iter().all(|c| !c.started && c.entry_count.is_none()));
        assert_eq!(caches[0].name, "books");
        Ok(())
    }

    #[tokio::test]
    async fn test_started_cache_has_stats() -> Result<(), String> {
        let registry = registry();
        let handle = registry.resolve("books").await.map_err(|e| e.to_string())?;
        handle
            .put("b1", r#"{"title":"Dune"}"#)
            .map_err(|e| e.to_string())?;

        let caches = cache_health(&registry)?;
        let books = caches
            .iter()
            .find(|c| c.name == "books")
            .ok_or("books missing")?;
        assert!(books.started);
        assert_eq!(books.entry_count, Some(1));
        assert_eq!(books.persistent, Some(false));

        let movies = caches
            .iter()
            .find(|c| c.name == "movies")
            .ok_or("movies missing")?;
        assert!(!movies.started);
        Ok(())
    }

    #[test]
    fn test_cache_health_skips_absent_stats() -> Result<(), serde_json::Error> {
        let health = CacheHealth {
            name: "books".to_string(),
            started: false,
            entry_count: None,
            hit_rate: None,
            persistent: None,
        };
        let json = serde_json::to_string(&health)?;
        assert_eq!(json, r#"{"name":"books","started":false}"#);
        Ok(())
    }
}
