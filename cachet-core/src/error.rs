//! Error types for Cachet operations

use thiserror::Error;

/// Cache engine and registry errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Cache '{name}' is not registered")]
    UnknownCache { name: String },

    #[error("Cache '{name}' failed to start: {reason}")]
    StartFailed { name: String, reason: String },

    #[error("Cache '{name}' did not start within {timeout_ms}ms")]
    StartTimedOut { name: String, timeout_ms: u64 },

    #[error("Operation '{operation}' on cache '{cache}' did not complete within {timeout_ms}ms")]
    OperationTimedOut {
        cache: String,
        operation: String,
        timeout_ms: u64,
    },

    #[error("Persistence failure on cache '{cache}': {reason}")]
    Persistence { cache: String, reason: String },

    #[error("Cache registry lock poisoned")]
    LockPoisoned,
}

/// Filter parsing and translation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("Invalid $filter expression at position {position}: {reason}")]
    InvalidSyntax { position: usize, reason: String },

    #[error("Field '{field}' is not an indexed attribute")]
    UnsupportedField { field: String },

    #[error("Operator '{operator}' has no native query equivalent")]
    UnsupportedOperator { operator: String },

    #[error("Operator '{operator}' on field '{field}' expects {expected}, got {got}")]
    LiteralKindMismatch {
        field: String,
        operator: String,
        expected: String,
        got: String,
    },

    #[error("$filter nests deeper than {max_depth} levels")]
    TooDeep { max_depth: usize },
}

/// Request validation errors raised by the operation dispatcher.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Parameter 'key' or $filter needs to be specified (operation {operation}, HTTP {verb})")]
    MissingSelector { operation: String, verb: String },

    #[error("Operation {operation} with HTTP {verb} requires parameter 'key'")]
    KeyRequired { operation: String, verb: String },

    #[error(
        "Unsupported operation {operation} with HTTP {verb}: expected GET with _get, \
         POST with _put, DELETE with _remove or PUT with _replace on a registered cache"
    )]
    UnsupportedOperation { operation: String, verb: String },

    #[error("Problems with extracting jsonValue from payload of {operation}: {reason}")]
    InvalidPayload { operation: String, reason: String },

    #[error("Query option {option} is not implemented")]
    NotImplemented { option: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing configuration file path (use --config or CACHET_CONFIG)")]
    MissingConfigPath,

    #[error("Failed to read config file {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Failed to parse config TOML: {0}")]
    Parse(String),

    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Coarse classification of every failure a caller can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MissingSelector,
    UnsupportedOperation,
    InvalidPayload,
    UnsupportedFilter,
    CacheUnavailable,
    Timeout,
    NotImplemented,
    Internal,
}

/// Master error type for all Cachet errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CachetError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Filter error: {0}")]
    Filter(#[from] FilterError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl CachetError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CachetError::Storage(err) => match err {
                StorageError::UnknownCache { .. } | StorageError::StartFailed { .. } => {
                    ErrorKind::CacheUnavailable
                }
                StorageError::StartTimedOut { .. } | StorageError::OperationTimedOut { .. } => {
                    ErrorKind::Timeout
                }
                StorageError::Persistence { .. } | StorageError::LockPoisoned => {
                    ErrorKind::Internal
                }
            },
            CachetError::Filter(_) => ErrorKind::UnsupportedFilter,
            CachetError::Dispatch(err) => match err {
                DispatchError::MissingSelector { .. } | DispatchError::KeyRequired { .. } => {
                    ErrorKind::MissingSelector
                }
                DispatchError::UnsupportedOperation { .. } => ErrorKind::UnsupportedOperation,
                DispatchError::InvalidPayload { .. } => ErrorKind::InvalidPayload,
                DispatchError::NotImplemented { .. } => ErrorKind::NotImplemented,
            },
            CachetError::Config(_) => ErrorKind::Internal,
        }
    }
}

/// Result type alias for Cachet operations.
pub type CachetResult<T> = Result<T, CachetError>;

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_selector_message_names_operation_and_verb() {
        let err = DispatchError::MissingSelector {
            operation: "books_get".to_string(),
            verb: "GET".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("books_get"));
        assert!(msg.contains("GET"));
        assert!(msg.contains("key"));
    }

    #[test]
    fn test_invalid_payload_keeps_cause() {
        let err = DispatchError::InvalidPayload {
            operation: "books_put".to_string(),
            reason: "expected value at line 1 column 1".to_string(),
        };
        assert!(err.to_string().contains("line 1 column 1"));
    }

    #[test]
    fn test_kind_classification() {
        let cases: Vec<(CachetError, ErrorKind)> = vec![
            (
                StorageError::StartFailed {
                    name: "a".into(),
                    reason: "boom".into(),
                }
                .into(),
                ErrorKind::CacheUnavailable,
            ),
            (
                StorageError::StartTimedOut {
                    name: "a".into(),
                    timeout_ms: 10,
                }
                .into(),
                ErrorKind::Timeout,
            ),
            (
                FilterError::UnsupportedField {
                    field: "nonexistent".into(),
                }
                .into(),
                ErrorKind::UnsupportedFilter,
            ),
            (
                DispatchError::KeyRequired {
                    operation: "a_put".into(),
                    verb: "POST".into(),
                }
                .into(),
                ErrorKind::MissingSelector,
            ),
            (
                DispatchError::NotImplemented {
                    option: "$orderby".into(),
                }
                .into(),
                ErrorKind::NotImplemented,
            ),
            (StorageError::LockPoisoned.into(), ErrorKind::Internal),
        ];

        for (err, kind) in cases {
            assert_eq!(err.kind(), kind, "{}", err);
        }
    }
}
