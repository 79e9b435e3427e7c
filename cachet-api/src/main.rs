//! CACHET API Server Entry Point
//!
//! Loads the cache configuration, wires the registry and dispatcher, and
//! starts the Axum HTTP server.

use std::sync::Arc;

use axum::Router;
use cachet_api::telemetry::{init_tracing, InstrumentedCacheManager, TelemetryConfig};
use cachet_api::{create_api_router, ApiConfig, ApiError, ApiResult, AppState, ErrorCode};
use cachet_core::CachetConfig;
use cachet_storage::{CacheManager, LocalCacheManager};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracing(&telemetry_config)?;

    let cachet_config = CachetConfig::load().map_err(|e| {
        ApiError::new(
            ErrorCode::InvalidInput,
            format!("Failed to load configuration: {}", e),
        )
    })?;
    let api_config = ApiConfig::from_env()?;

    let manager: Arc<dyn CacheManager> = Arc::new(InstrumentedCacheManager::new(Arc::new(
        LocalCacheManager::new(&cachet_config),
    )));
    let state = AppState::from_config(&cachet_config, manager);
    tracing::info!(
        caches = ?cachet_config.cache_names(),
        namespace = %cachet_config.namespace,
        "Caches registered"
    );

    let app: Router = create_api_router(state, &api_config)?;

    let addr = api_config.bind_addr()?;
    tracing::info!(%addr, service_root = %api_config.service_root, "Starting Cachet API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
