//! Error Types for Cachet API
//!
//! This module defines error handling for the API layer, including:
//! - ApiError struct for structured error responses
//! - ErrorCode enum for categorizing errors
//! - IntoResponse implementation for Axum HTTP responses
//!
//! All errors are serialized as JSON with appropriate HTTP status codes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use cachet_core::{CachetError, DispatchError, ErrorKind, FilterError, StorageError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
///
/// Each error code maps to a specific HTTP status code and represents
/// a category of error that can occur while serving a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Request Errors (400)
    // ========================================================================
    /// Neither `key` nor `$filter` was given, or the verb needs a key
    MissingSelector,

    /// Put/replace payload is absent or has the wrong shape
    InvalidPayload,

    /// `$filter` cannot be parsed or translated
    UnsupportedFilter,

    /// A query option has an invalid value
    InvalidInput,

    // ========================================================================
    // Routing Errors (405, 501)
    // ========================================================================
    /// Unknown operation, or operation invoked with the wrong verb
    UnsupportedOperation,

    /// Query option recognised but not supported
    NotImplemented,

    // ========================================================================
    // Server Errors (500, 503, 504)
    // ========================================================================
    /// Cache could not be started
    CacheUnavailable,

    /// Cache start or cache operation exceeded its deadline
    Timeout,

    /// Internal server error
    InternalError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::MissingSelector
            | ErrorCode::InvalidPayload
            | ErrorCode::UnsupportedFilter
            | ErrorCode::InvalidInput => StatusCode::BAD_REQUEST,

            ErrorCode::UnsupportedOperation => StatusCode::METHOD_NOT_ALLOWED,
            ErrorCode::NotImplemented => StatusCode::NOT_IMPLEMENTED,

            ErrorCode::CacheUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::MissingSelector => "Parameter 'key' or $filter needs to be specified",
            ErrorCode::InvalidPayload => "Invalid payload",
            ErrorCode::UnsupportedFilter => "Unsupported filter expression",
            ErrorCode::InvalidInput => "Invalid input data",
            ErrorCode::UnsupportedOperation => "Unsupported operation",
            ErrorCode::NotImplemented => "Not implemented",
            ErrorCode::CacheUnavailable => "Cache unavailable",
            ErrorCode::Timeout => "Operation timed out",
            ErrorCode::InternalError => "Internal server error",
        }
    }
}

impl From<ErrorKind> for ErrorCode {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::MissingSelector => ErrorCode::MissingSelector,
            ErrorKind::UnsupportedOperation => ErrorCode::UnsupportedOperation,
            ErrorKind::InvalidPayload => ErrorCode::InvalidPayload,
            ErrorKind::UnsupportedFilter => ErrorCode::UnsupportedFilter,
            ErrorKind::CacheUnavailable => ErrorCode::CacheUnavailable,
            ErrorKind::Timeout => ErrorCode::Timeout,
            ErrorKind::NotImplemented => ErrorCode::NotImplemented,
            ErrorKind::Internal => ErrorCode::InternalError,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response for API operations.
///
/// This type is returned by all API endpoints when an error occurs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details (operation, verb, offending element)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Create a new API error with the given code, using the default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self {
            code,
            message: code.default_message().to_string(),
            details: None,
        }
    }

    /// Add additional details to the error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // ========================================================================
    // Convenience constructors for common errors
    // ========================================================================

    /// Create an InvalidInput error for a bad query option value.
    pub fn invalid_query_option(option: &str, value: &str, expected: &str) -> Self {
        Self::new(
            ErrorCode::InvalidInput,
            format!("Query option {} has invalid value '{}', expected {}", option, value, expected),
        )
        .with_details(json!({ "option": option, "value": value }))
    }

    /// Create an UnsupportedOperation error for a verb outside the HTTP set.
    pub fn unsupported_method(operation: &str, method: &str) -> Self {
        Self::new(
            ErrorCode::UnsupportedOperation,
            format!("Unsupported operation {} with HTTP {}", operation, method),
        )
        .with_details(json!({ "operation": operation, "verb": method }))
    }

    /// Create an InternalError.
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

/// Implement IntoResponse for ApiError to enable automatic error handling in Axum.
///
/// ```ignore
/// async fn handler() -> Result<Json<Response>, ApiError> {
///     Err(ApiError::from_code(ErrorCode::CacheUnavailable))
/// }
/// ```
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self);
        (status, body).into_response()
    }
}

// ============================================================================
// CONVERSIONS FROM DOMAIN ERRORS
// ============================================================================

/// Element-level details for a domain error.
fn details_for(err: &CachetError) -> Option<serde_json::Value> {
    match err {
        CachetError::Dispatch(DispatchError::MissingSelector { operation, verb })
        | CachetError::Dispatch(DispatchError::KeyRequired { operation, verb })
        | CachetError::Dispatch(DispatchError::UnsupportedOperation { operation, verb }) => {
            Some(json!({ "operation": operation, "verb": verb }))
        }
        CachetError::Dispatch(DispatchError::InvalidPayload { operation, reason }) => {
            Some(json!({ "operation": operation, "cause": reason }))
        }
        CachetError::Dispatch(DispatchError::NotImplemented { option }) => {
            Some(json!({ "option": option }))
        }
        CachetError::Filter(FilterError::InvalidSyntax { position, .. }) => {
            Some(json!({ "position": position }))
        }
        CachetError::Filter(FilterError::UnsupportedField { field }) => {
            Some(json!({ "field": field }))
        }
        CachetError::Filter(FilterError::UnsupportedOperator { operator }) => {
            Some(json!({ "operator": operator }))
        }
        CachetError::Filter(FilterError::TooDeep { max_depth }) => {
            Some(json!({ "max_depth": max_depth }))
        }
        CachetError::Filter(FilterError::LiteralKindMismatch {
            field,
            operator,
            expected,
            got,
        }) => Some(json!({
            "field": field,
            "operator": operator,
            "expected": expected,
            "got": got,
        })),
        CachetError::Storage(StorageError::UnknownCache { name })
        | CachetError::Storage(StorageError::StartFailed { name, .. })
        | CachetError::Storage(StorageError::StartTimedOut { name, .. }) => {
            Some(json!({ "cache": name }))
        }
        CachetError::Storage(StorageError::OperationTimedOut {
            cache, operation, ..
        }) => Some(json!({ "cache": cache, "operation": operation })),
        CachetError::Storage(StorageError::Persistence { .. })
        | CachetError::Storage(StorageError::LockPoisoned)
        | CachetError::Config(_) => None,
    }
}

impl From<CachetError> for ApiError {
    fn from(err: CachetError) -> Self {
        let code = ErrorCode::from(err.kind());
        if code == ErrorCode::InternalError {
            // Log the full error, return a generic message
            tracing::error!(error = %err, "Internal error");
            return ApiError::from_code(code);
        }

        let message = match &err {
            CachetError::Storage(e) => e.to_string(),
            CachetError::Filter(e) => e.to_string(),
            CachetError::Dispatch(e) => e.to_string(),
            CachetError::Config(e) => e.to_string(),
        };
        let api_error = ApiError::new(code, message);
        match details_for(&err) {
            Some(details) => api_error.with_details(details),
            None => api_error,
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        CachetError::from(err).into()
    }
}

impl From<FilterError> for ApiError {
    fn from(err: FilterError) -> Self {
        CachetError::from(err).into()
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        CachetError::from(err).into()
    }
}

/// Convert from serde_json::Error to ApiError.
impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON serialization error: {:?}", err);
        ApiError::internal_error(format!("JSON serialization failed: {}", err))
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;
