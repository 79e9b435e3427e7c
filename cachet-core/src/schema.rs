//! Schema document synthesis.
//!
//! The schema is derived purely from the set of registered cache names. All
//! entity sets share one opaque entity type: a string key and a string
//! `jsonValue`. No per-cache reflection happens.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::operation::{strip_call_parens, OperationDescriptor, EDM_STRING};
use crate::value::JSON_VALUE_FIELD;

/// Container name used when none is configured.
pub const DEFAULT_CONTAINER_NAME: &str = "Container";

/// Name of the shared entity type.
pub const ENTITY_TYPE_NAME: &str = "CacheEntry";

/// Name of the entity key property.
pub const KEY_PROPERTY: &str = "key";

/// One structural property of the entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PropertyDescriptor {
    pub name: String,
    pub edm_type: String,
    pub nullable: bool,
}

/// The single opaque entity type every entity set exposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EntityTypeDescriptor {
    pub namespace: String,
    pub name: String,
    pub keys: Vec<String>,
    pub properties: Vec<PropertyDescriptor>,
}

impl EntityTypeDescriptor {
    fn opaque(namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: ENTITY_TYPE_NAME.to_string(),
            keys: vec![KEY_PROPERTY.to_string()],
            properties: vec![
                PropertyDescriptor {
                    name: KEY_PROPERTY.to_string(),
                    edm_type: EDM_STRING.to_string(),
                    nullable: false,
                },
                PropertyDescriptor {
                    name: JSON_VALUE_FIELD.to_string(),
                    edm_type: EDM_STRING.to_string(),
                    nullable: true,
                },
            ],
        }
    }

    /// `<namespace>.<name>`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }
}

/// One entity set, i.e. one cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EntitySetDescriptor {
    pub name: String,
    pub entity_type: String,
}

/// The full schema: one entity set and four operations per cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SchemaDocument {
    pub namespace: String,
    pub container_name: String,
    pub entity_type: EntityTypeDescriptor,
    pub entity_sets: Vec<EntitySetDescriptor>,
    pub operations: Vec<OperationDescriptor>,
}

impl SchemaDocument {
    /// Build the schema for a set of cache names. Pure; duplicates collapse
    /// and entity sets come out sorted by name.
    pub fn synthesize<I, S>(namespace: &str, container_name: &str, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: BTreeSet<String> = names
            .into_iter()
            .map(|n| n.as_ref().to_string())
            .collect();

        let container_name = if container_name.trim().is_empty() {
            DEFAULT_CONTAINER_NAME
        } else {
            container_name
        };

        let entity_type = EntityTypeDescriptor::opaque(namespace);
        let qualified = entity_type.qualified_name();

        let entity_sets = names
            .iter()
            .map(|name| EntitySetDescriptor {
                name: name.clone(),
                entity_type: qualified.clone(),
            })
            .collect();

        let operations = names
            .iter()
            .flat_map(|name| OperationDescriptor::for_cache(name))
            .collect();

        Self {
            namespace: namespace.to_string(),
            container_name: container_name.to_string(),
            entity_type,
            entity_sets,
            operations,
        }
    }

    /// Look up an operation by name; a trailing `()` is tolerated.
    pub fn find_operation(&self, name: &str) -> Option<&OperationDescriptor> {
        let name = strip_call_parens(name);
        self.operations.iter().find(|op| op.name == name)
    }

    /// Whether an entity set of this name exists.
    pub fn has_entity_set(&self, name: &str) -> bool {
        self.entity_sets.iter().any(|set| set.name == name)
    }

    /// Entity set names in schema order.
    pub fn entity_set_names(&self) -> impl Iterator<Item = &str> {
        self.entity_sets.iter().map(|set| set.name.as_str())
    }
}
