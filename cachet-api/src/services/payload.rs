//! Payload Service
//!
//! Envelope handling for put/replace bodies and key literal decoding.
//!
//! Clients wrap the stored value twice: `{"<wrapper>": {"jsonValue": <value>}}`.
//! Only the innermost `jsonValue` is kept; the wrapper name and any sibling
//! members are ignored.

use cachet_core::{DispatchError, JSON_VALUE_FIELD};
use serde_json::Value;

/// Extract the raw value from a request envelope.
///
/// A string `jsonValue` is returned verbatim; any other JSON value is
/// returned serialized.
pub fn extract_json_value(operation: &str, payload: &[u8]) -> Result<String, DispatchError> {
    let invalid = |reason: String| DispatchError::InvalidPayload {
        operation: operation.to_string(),
        reason,
    };

    if payload.iter().all(u8::is_ascii_whitespace) {
        return Err(invalid("payload is missing".to_string()));
    }

    let document: Value =
        serde_json::from_slice(payload).map_err(|e| invalid(format!("malformed JSON: {}", e)))?;

    let outer = match document {
        Value::Object(map) => map,
        other => {
            return Err(invalid(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            )))
        }
    };

    if outer.len() != 1 {
        return Err(invalid(format!(
            "expected exactly one wrapper member, found {}",
            outer.len()
        )));
    }

    let (wrapper, inner) = outer
        .into_iter()
        .next()
        .ok_or_else(|| invalid("expected exactly one wrapper member, found 0".to_string()))?;

    let mut inner = match inner {
        Value::Object(map) => map,
        other => {
            return Err(invalid(format!(
                "wrapper member '{}' must be an object, got {}",
                wrapper,
                json_kind(&other)
            )))
        }
    };

    match inner.remove(JSON_VALUE_FIELD) {
        Some(Value::String(raw)) => Ok(raw),
        Some(value) => Ok(value.to_string()),
        None => Err(invalid(format!(
            "wrapper member '{}' has no '{}' member",
            wrapper, JSON_VALUE_FIELD
        ))),
    }
}

/// Decode the `key` query parameter.
///
/// A quoted OData string literal (`'k1'`, with `''` for a quote) is
/// unquoted; anything else is taken as-is.
pub fn decode_key(raw: &str) -> String {
    match raw
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
    {
        Some(inner) => inner.replace("''", "'"),
        _ => raw.to_string(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn reason(result: Result<String, DispatchError>) -> String {
        match result {
            Err(DispatchError::InvalidPayload { reason, .. }) => reason,
            other => panic!("expected InvalidPayload, got {:?}", other),
        }
    }

    #[test]
    fn test_extracts_object_value_serialized() {
        let body = br#"{"entity": {"jsonValue": {"title": "Dune"}, "key": "ignored"}}"#;
        assert_eq!(
            extract_json_value("books_put", body),
            Ok(r#"{"title":"Dune"}"#.to_string())
        );
    }

    #[test]
    fn test_string_value_is_verbatim() {
        let body = br#"{"w": {"jsonValue": "{\"a\": 1}"}}"#;
        assert_eq!(
            extract_json_value("books_put", body),
            Ok(r#"{"a": 1}"#.to_string())
        );
    }

    #[test]
    fn test_rejections_name_the_cause() {
        assert!(reason(extract_json_value("books_put", b"")).contains("missing"));
        assert!(reason(extract_json_value("books_put", b"{nope")).contains("malformed"));
        assert!(reason(extract_json_value("books_put", b"[1]")).contains("array"));
        assert!(reason(extract_json_value("books_put", b"{}")).contains("found 0"));
        assert!(reason(extract_json_value("books_put", br#"{"a":{},"b":{}}"#)).contains("found 2"));
        assert!(reason(extract_json_value("books_put", br#"{"a":"x"}"#)).contains("string"));
        assert!(reason(extract_json_value("books_put", br#"{"a":{"value":1}}"#)).contains("jsonValue"));
    }

    #[test]
    fn test_operation_is_reported() {
        match extract_json_value("movies_replace()", b"") {
            Err(DispatchError::InvalidPayload { operation, .. }) => {
                assert_eq!(operation, "movies_replace()")
            }
            other => panic!("expected InvalidPayload, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_key() {
        assert_eq!(decode_key("k1"), "k1");
        assert_eq!(decode_key("'k1'"), "k1");
        assert_eq!(decode_key("'it''s'"), "it's");
        assert_eq!(decode_key("''"), "");
        assert_eq!(decode_key("'"), "'");
        assert_eq!(decode_key("'open"), "'open");
    }

    proptest! {
        #[test]
        fn prop_quoted_keys_decode(key in "[ -~]{0,24}") {
            let quoted = format!("'{}'", key.replace('\'', "''"));
            prop_assert_eq!(decode_key(&quoted), key);
        }

        #[test]
        fn prop_wrapper_name_is_irrelevant(wrapper in "[a-zA-Z]{1,10}", n in any::<i64>()) {
            let body = format!(r#"{{"{}": {{"jsonValue": {}}}}}"#, wrapper, n);
            prop_assert_eq!(extract_json_value("c_put", body.as_bytes()), Ok(n.to_string()));
        }
    }
}
