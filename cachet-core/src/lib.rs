//! CACHET Core - Data Model
//!
//! Pure data structures shared by every other crate: cached values and their
//! indexed form, the `$filter` predicate tree and parser, generated operation
//! descriptors, schema synthesis, configuration and errors.
//! No I/O beyond reading the configuration file.

pub mod config;
pub mod error;
pub mod filter;
pub mod operation;
pub mod schema;
pub mod value;

pub use config::{CacheDefinition, CacheStorage, CachetConfig, CONFIG_ENV_VAR, DEFAULT_MAX_RESULTS};
pub use error::{
    CachetError, CachetResult, ConfigError, DispatchError, ErrorKind, FilterError, StorageError,
    StorageResult,
};
pub use filter::{parse_filter, FilterNode, FilterOperator, Literal, MAX_FILTER_DEPTH};
pub use operation::{
    strip_call_parens, HttpVerb, OperationDescriptor, OperationName, OperationSuffix,
    ParameterDescriptor, ParameterLocation, EDM_STRING, KEY_PARAMETER, PAYLOAD_PARAMETER,
};
pub use schema::{
    EntitySetDescriptor, EntityTypeDescriptor, PropertyDescriptor, SchemaDocument,
    DEFAULT_CONTAINER_NAME, ENTITY_TYPE_NAME, KEY_PROPERTY,
};
pub use value::{CachedValue, IndexedDocument, IndexedTerm, JSON_VALUE_FIELD, MEMBER_SEPARATOR};
