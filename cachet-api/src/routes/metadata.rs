//! Service Document and Schema Routes
//!
//! - `GET /` lists the entity sets
//! - `GET /$metadata` returns the synthesized schema document

use axum::{extract::State, Json};
use cachet_core::SchemaDocument;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::ApiResult;
use crate::services::MetadataSynthesizer;

/// Entry point listing every entity set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ServiceDocument {
    pub namespace: String,
    pub container_name: String,
    pub entity_sets: Vec<String>,
}

impl From<&SchemaDocument> for ServiceDocument {
    fn from(schema: &SchemaDocument) -> Self {
        Self {
            namespace: schema.namespace.clone(),
            container_name: schema.container_name.clone(),
            entity_sets: schema.entity_set_names().map(str::to_string).collect(),
        }
    }
}

/// GET / - Service document
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/cachet.svc",
    tag = "Schema",
    responses(
        (status = 200, description = "Entity sets exposed by the service", body = ServiceDocument),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    ),
))]
pub async fn service_document(
    State(metadata): State<Arc<MetadataSynthesizer>>,
) -> ApiResult<Json<ServiceDocument>> {
    let schema = metadata.schema()?;
    Ok(Json(ServiceDocument::from(schema.as_ref())))
}

/// GET /$metadata - Schema document
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/cachet.svc/$metadata",
    tag = "Schema",
    responses(
        (status = 200, description = "Entity type, entity sets and operations", body = SchemaDocument),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    ),
))]
pub async fn schema_document(
    State(metadata): State<Arc<MetadataSynthesizer>>,
) -> ApiResult<Json<SchemaDocument>> {
    let schema = metadata.schema()?;
    Ok(Json(schema.as_ref().clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_document_from_schema() {
        let schema = SchemaDocument::synthesize("Library", "Shelf", ["movies", "books"]);
        let doc = ServiceDocument::from(&schema);
        assert_eq!(doc.namespace, "Library");
        assert_eq!(doc.container_name, "Shelf");
        assert_eq!(doc.entity_sets, vec!["books", "movies"]);
    }
}
