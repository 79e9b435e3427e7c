//! Operation Routes
//!
//! `ANY /{operation}`: every generated `<cache>_<suffix>` operation is
//! reached through one route. The handler only turns the HTTP request into an
//! `OperationRequest`; validation and execution belong to the dispatcher.

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Path, Query, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use cachet_core::{DispatchError, HttpVerb};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{ApiError, ApiResult, ErrorCode};
use crate::services::{
    decode_key, OperationDispatcher, OperationOutcome, OperationRequest, QueryOptions,
};

// ============================================================================
// TYPES
// ============================================================================

/// Query parameters accepted by every operation.
#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
pub struct OperationQuery {
    /// Entity key; `'quoted'` literals use `''` for a single quote
    pub key: Option<String>,
    /// Filter expression over `jsonValue` and its member paths
    #[serde(rename = "$filter")]
    pub filter: Option<String>,
    /// Maximum number of filtered results
    #[serde(rename = "$top")]
    pub top: Option<String>,
    /// Number of filtered results to skip
    #[serde(rename = "$skip")]
    pub skip: Option<String>,
    /// Not supported
    #[serde(rename = "$orderby")]
    pub order_by: Option<String>,
}

/// Body of a successful operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ValueResponse {
    /// The stored value(s), serialized; filtered gets join values with `\n`
    #[serde(rename = "jsonValue")]
    pub json_value: String,
}

// ============================================================================
// REQUEST MAPPING
// ============================================================================

fn parse_count(option: &str, raw: Option<&str>) -> ApiResult<Option<usize>> {
    raw.map(|value| {
        value
            .trim()
            .parse::<usize>()
            .map_err(|_| ApiError::invalid_query_option(option, value, "a non-negative integer"))
    })
    .transpose()
}

impl OperationQuery {
    fn options(&self) -> ApiResult<QueryOptions> {
        Ok(QueryOptions {
            top: parse_count("$top", self.top.as_deref())?,
            skip: parse_count("$skip", self.skip.as_deref())?,
            order_by: self.order_by.clone(),
        })
    }
}

/// Build the dispatcher request for one HTTP call.
///
/// A request without `key` and `$filter` fails with the missing-selector
/// error before its method or query options are looked at, matching the
/// order the dispatcher validates in.
pub fn operation_request(
    operation: String,
    method: &Method,
    query: OperationQuery,
    body: Bytes,
) -> ApiResult<OperationRequest> {
    if query.key.is_none() && query.filter.is_none() {
        return Err(DispatchError::MissingSelector {
            operation,
            verb: method.to_string(),
        }
        .into());
    }

    let verb: HttpVerb = method
        .as_str()
        .parse()
        .map_err(|_| ApiError::unsupported_method(&operation, method.as_str()))?;

    let options = query.options()?;
    let mut request = OperationRequest::new(operation, verb).with_options(options);
    if let Some(key) = query.key.as_deref() {
        request = request.with_key(decode_key(key));
    }
    if let Some(filter) = query.filter {
        request = request.with_filter(filter);
    }
    if !body.is_empty() {
        request = request.with_payload(body.to_vec());
    }
    Ok(request)
}

// ============================================================================
// HANDLERS
// ============================================================================

/// ANY /{operation} - Invoke a generated cache operation
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/cachet.svc/{operation}",
    tag = "Operations",
    params(
        ("operation" = String, Path, description = "Operation name, `<cache>_<get|put|remove|replace>`"),
        OperationQuery,
    ),
    request_body(content = String, description = "Envelope `{ <wrapper>: { \"jsonValue\": ... } }` for put/replace", content_type = "application/json"),
    responses(
        (status = 200, description = "Stored value", body = ValueResponse),
        (status = 204, description = "No value stored under the key, or nothing matched"),
        (status = 400, description = "Missing selector, bad payload or unsupported filter", body = ApiError),
        (status = 405, description = "Unknown operation or wrong verb", body = ApiError),
        (status = 501, description = "Query option not implemented", body = ApiError),
        (status = 503, description = "Cache could not be started", body = ApiError),
        (status = 504, description = "Cache start or operation timed out", body = ApiError),
    ),
))]
pub async fn invoke_operation(
    State(dispatcher): State<Arc<OperationDispatcher>>,
    method: Method,
    Path(operation): Path<String>,
    query: Result<Query<OperationQuery>, QueryRejection>,
    body: Bytes,
) -> ApiResult<Response> {
    let Query(query) = query.map_err(|e| {
        ApiError::new(ErrorCode::InvalidInput, format!("Invalid query string: {}", e))
    })?;

    let request = operation_request(operation, &method, query, body)?;
    match dispatcher.dispatch(request).await? {
        OperationOutcome::Value(json_value) => {
            Ok((StatusCode::OK, Json(ValueResponse { json_value })).into_response())
        }
        OperationOutcome::NoContent => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::FilterSource;
    use cachet_core::JSON_VALUE_FIELD;

    #[test]
    fn test_value_response_member_name() -> Result<(), serde_json::Error> {
        let body = serde_json::to_value(ValueResponse {
            json_value: r#"{"title":"Dune"}"#.to_string(),
        })?;
        assert_eq!(body[JSON_VALUE_FIELD], r#"{"title":"Dune"}"#);
        Ok(())
    }

    #[test]
    fn test_request_from_query() -> ApiResult<()> {
        let query = OperationQuery {
            key: Some("'it''s'".to_string()),
            filter: Some("jsonValue eq 'x'".to_string()),
            top: Some("5".to_string()),
            skip: Some(" 2 ".to_string()),
            order_by: None,
        };
        let request = operation_request(
            "books_get".to_string(),
            &Method::GET,
            query,
            Bytes::new(),
        )?;

        assert_eq!(request.verb, HttpVerb::Get);
        assert_eq!(request.key.as_deref(), Some("it's"));
        assert_eq!(
            request.filter,
            Some(FilterSource::Expression("jsonValue eq 'x'".to_string()))
        );
        assert_eq!(request.options.top, Some(5));
        assert_eq!(request.options.skip, Some(2));
        assert!(request.payload.is_none());
        Ok(())
    }

    #[test]
    fn test_body_becomes_payload() -> ApiResult<()> {
        let request = operation_request(
            "books_put".to_string(),
            &Method::PUT,
            OperationQuery {
                key: Some("b1".to_string()),
                ..Default::default()
            },
            Bytes::from_static(br#"{"entity":{"jsonValue":"{}"}}"#),
        )?;
        assert_eq!(request.verb, HttpVerb::Put);
        assert!(request.payload.is_some());
        Ok(())
    }

    #[test]
    fn test_invalid_top_rejected() {
        let query = OperationQuery {
            key: Some("b1".to_string()),
            top: Some("-1".to_string()),
            ..Default::default()
        };
        let err = operation_request("books_get".to_string(), &Method::GET, query, Bytes::new());
        assert!(matches!(err, Err(ref e) if e.code == ErrorCode::InvalidInput));
    }

    #[test]
    fn test_unknown_method_is_unsupported_operation() {
        let err = operation_request(
            "books_get".to_string(),
            &Method::TRACE,
            OperationQuery {
                key: Some("b1".to_string()),
                ..Default::default()
            },
            Bytes::new(),
        );
        assert!(matches!(err, Err(ref e) if e.code == ErrorCode::UnsupportedOperation));
    }

    #[test]
    fn test_missing_selector_checked_first() {
        let unknown_method = operation_request(
            "books_get".to_string(),
            &Method::TRACE,
            OperationQuery::default(),
            Bytes::new(),
        );
        assert!(matches!(unknown_method, Err(ref e) if e.code == ErrorCode::MissingSelector));

        let bad_top = operation_request(
            "books_get".to_string(),
            &Method::GET,
            OperationQuery {
                top: Some("x".to_string()),
                ..Default::default()
            },
            Bytes::new(),
        );
        match bad_top {
            Err(e) => {
                assert_eq!(e.code, ErrorCode::MissingSelector);
                assert_eq!(e.details, Some(serde_json::json!({"operation": "books_get", "verb": "GET"})));
            }
            Ok(request) => panic!("expected MissingSelector, got {:?}", request),
        }
    }
}
