//! OpenAPI Specification for the Cachet API
//!
//! Generated with utoipa from route annotations and schema derives. Service
//! paths are documented under the default service root.

use utoipa::OpenApi;

use cachet_core::{
    EntitySetDescriptor, EntityTypeDescriptor, HttpVerb, OperationDescriptor, OperationSuffix,
    ParameterDescriptor, ParameterLocation, PropertyDescriptor, SchemaDocument,
};

use crate::error::{ApiError, ErrorCode};
use crate::routes::health::{CacheHealth, HealthDetails, HealthResponse, HealthStatus};
use crate::routes::metadata::ServiceDocument;
use crate::routes::operations::ValueResponse;
use crate::routes::{health, metadata, operations};

/// OpenAPI document for the Cachet API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Cachet API",
        version = "0.1.0",
        description = "Named key/value caches exposed as entity sets with generated get, put, remove and replace operations",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:3000", description = "Local Development")
    ),
    tags(
        (name = "Operations", description = "Generated per-cache operations"),
        (name = "Schema", description = "Service document and schema"),
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Observability", description = "Prometheus metrics")
    ),
    paths(
        operations::invoke_operation,
        metadata::service_document,
        metadata::schema_document,
        health::ping,
        health::liveness,
        health::readiness,
        crate::telemetry::metrics::metrics_handler,
    ),
    components(
        schemas(
            ApiError, ErrorCode, ValueResponse, ServiceDocument,
            SchemaDocument, EntityTypeDescriptor, EntitySetDescriptor, PropertyDescriptor,
            OperationDescriptor, ParameterDescriptor, ParameterLocation, HttpVerb, OperationSuffix,
            HealthResponse, HealthStatus, HealthDetails, CacheHealth
        )
    )
)]
pub struct ApiDoc;

impl ApiDoc {
    /// Generate OpenAPI spec as JSON string.
    pub fn to_json() -> Result<String, serde_json::Error> {
        let openapi = Self::openapi();
        serde_json::to_string_pretty(&openapi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_generation() -> Result<(), String> {
        let openapi = ApiDoc::openapi();
        assert_eq!(openapi.info.title, "Cachet API");

        let tags = openapi
            .tags
            .as_ref()
            .ok_or_else(|| "OpenAPI tags missing".to_string())?;
        assert_eq!(tags.len(), 4);

        let components = openapi
            .components
            .as_ref()
            .ok_or_else(|| "OpenAPI components missing".to_string())?;
        assert!(components.schemas.contains_key("SchemaDocument"));
        assert!(components.schemas.contains_key("ApiError"));
        Ok(())
    }

    #[test]
    fn test_openapi_paths_exist() {
        let openapi = ApiDoc::openapi();
        assert!(openapi.paths.paths.contains_key("/cachet.svc"));
        assert!(openapi.paths.paths.contains_key("/cachet.svc/$metadata"));
        assert!(openapi.paths.paths.contains_key("/cachet.svc/{operation}"));
        assert!(openapi.paths.paths.contains_key("/health/ready"));
        assert!(openapi.paths.paths.contains_key("/metrics"));
    }

    #[test]
    fn test_openapi_json_serialization() -> Result<(), String> {
        let json = ApiDoc::to_json().map_err(|e| format!("Failed to serialize OpenAPI: {}", e))?;
        serde_json::from_str::<serde_json::Value>(&json)
            .map_err(|e| format!("Generated JSON invalid: {}", e))?;
        assert!(json.contains("Cachet API"));
        Ok(())
    }
}
