//! CACHET API - HTTP Service Layer
//!
//! Exposes every configured cache as an entity set with four generated
//! operations (`<cache>_get`, `_put`, `_remove`, `_replace`), a service
//! document and a `$metadata` schema, plus health, metrics and OpenAPI
//! endpoints.

pub mod config;
pub mod error;
pub mod macros;
#[cfg(feature = "openapi")]
pub mod openapi;
pub mod routes;
pub mod services;
pub mod state;
pub mod telemetry;

// Re-export commonly used types
pub use config::{ApiConfig, DEFAULT_SERVICE_ROOT};
pub use error::{ApiError, ApiResult, ErrorCode};
#[cfg(feature = "openapi")]
pub use openapi::ApiDoc;
pub use routes::{create_api_router, service_router};
pub use services::{
    MetadataSynthesizer, OperationDispatcher, OperationOutcome, OperationRequest, QueryOptions,
};
pub use state::AppState;
