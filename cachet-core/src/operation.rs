//! Generated operation descriptors.
//!
//! Every registered cache gets four operations, `<cache>_put`, `<cache>_get`,
//! `<cache>_remove` and `<cache>_replace`, each bound to exactly one HTTP verb.
//! Descriptors are derived from the cache name and never persisted.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// EDM type name used for every parameter and return value.
pub const EDM_STRING: &str = "Edm.String";

/// Name of the key selector parameter.
pub const KEY_PARAMETER: &str = "key";

/// Name of the request body parameter of put/replace.
pub const PAYLOAD_PARAMETER: &str = "payload";

// ============================================================================
// HTTP VERB
// ============================================================================

/// HTTP verb an operation is invoked with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpVerb {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl HttpVerb {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpVerb::Get => "GET",
            HttpVerb::Post => "POST",
            HttpVerb::Put => "PUT",
            HttpVerb::Delete => "DELETE",
            HttpVerb::Patch => "PATCH",
            HttpVerb::Head => "HEAD",
            HttpVerb::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpVerb {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpVerb::Get),
            "POST" => Ok(HttpVerb::Post),
            "PUT" => Ok(HttpVerb::Put),
            "DELETE" => Ok(HttpVerb::Delete),
            "PATCH" => Ok(HttpVerb::Patch),
            "HEAD" => Ok(HttpVerb::Head),
            "OPTIONS" => Ok(HttpVerb::Options),
            _ => Err(format!("Unknown HTTP verb: {}", s)),
        }
    }
}

// ============================================================================
// OPERATION SUFFIX
// ============================================================================

/// The cache primitive an operation maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum OperationSuffix {
    Put,
    Get,
    Remove,
    Replace,
}

impl OperationSuffix {
    /// All suffixes in schema order.
    pub const ALL: [OperationSuffix; 4] = [
        OperationSuffix::Put,
        OperationSuffix::Get,
        OperationSuffix::Remove,
        OperationSuffix::Replace,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationSuffix::Put => "put",
            OperationSuffix::Get => "get",
            OperationSuffix::Remove => "remove",
            OperationSuffix::Replace => "replace",
        }
    }

    /// The only verb this operation accepts.
    pub fn verb(&self) -> HttpVerb {
        match self {
            OperationSuffix::Put => HttpVerb::Post,
            OperationSuffix::Get => HttpVerb::Get,
            OperationSuffix::Remove => HttpVerb::Delete,
            OperationSuffix::Replace => HttpVerb::Put,
        }
    }

    /// Whether a request body carrying the value envelope is required.
    pub fn requires_payload(&self) -> bool {
        matches!(self, OperationSuffix::Put | OperationSuffix::Replace)
    }

    /// Whether the operation can only address a single key (no `$filter`).
    pub fn requires_key(&self) -> bool {
        !matches!(self, OperationSuffix::Get)
    }
}

impl fmt::Display for OperationSuffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationSuffix {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "put" => Ok(OperationSuffix::Put),
            "get" => Ok(OperationSuffix::Get),
            "remove" => Ok(OperationSuffix::Remove),
            "replace" => Ok(OperationSuffix::Replace),
            _ => Err(format!("Unknown operation suffix: {}", s)),
        }
    }
}

// ============================================================================
// OPERATION NAME
// ============================================================================

/// A parsed `<cache>_<suffix>` operation name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationName {
    pub cache: String,
    pub suffix: OperationSuffix,
}

impl OperationName {
    pub fn new(cache: impl Into<String>, suffix: OperationSuffix) -> Self {
        Self {
            cache: cache.into(),
            suffix,
        }
    }

    /// Split an operation name on its last underscore. A trailing `()` is
    /// tolerated. Cache names may themselves contain underscores.
    pub fn parse(raw: &str) -> Option<Self> {
        let name = strip_call_parens(raw);
        let (cache, suffix) = name.rsplit_once('_')?;
        if cache.is_empty() {
            return None;
        }
        let suffix = suffix.parse().ok()?;
        Some(Self::new(cache, suffix))
    }
}

impl fmt::Display for OperationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.cache, self.suffix)
    }
}

/// Drop a trailing `()` from an operation name.
pub fn strip_call_parens(raw: &str) -> &str {
    raw.strip_suffix("()").unwrap_or(raw)
}

// ============================================================================
// DESCRIPTORS
// ============================================================================

/// Where a parameter is carried in the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Query,
    Body,
}

/// One operation parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ParameterDescriptor {
    pub name: String,
    pub edm_type: String,
    pub nullable: bool,
    pub location: ParameterLocation,
}

/// Metadata entry for one generated operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct OperationDescriptor {
    /// `<cache>_<suffix>`
    pub name: String,
    /// Entity set (cache) the operation is bound to.
    pub entity_set: String,
    pub suffix: OperationSuffix,
    pub verb: HttpVerb,
    pub parameters: Vec<ParameterDescriptor>,
    pub return_type: String,
}

impl OperationDescriptor {
    pub fn new(cache: &str, suffix: OperationSuffix) -> Self {
        let mut parameters = vec![ParameterDescriptor {
            name: KEY_PARAMETER.to_string(),
            edm_type: EDM_STRING.to_string(),
            nullable: true,
            location: ParameterLocation::Query,
        }];
        if suffix.requires_payload() {
            parameters.push(ParameterDescriptor {
                name: PAYLOAD_PARAMETER.to_string(),
                edm_type: EDM_STRING.to_string(),
                nullable: false,
                location: ParameterLocation::Body,
            });
        }

        Self {
            name: OperationName::new(cache, suffix).to_string(),
            entity_set: cache.to_string(),
            suffix,
            verb: suffix.verb(),
            parameters,
            return_type: EDM_STRING.to_string(),
        }
    }

    /// The four operations of one cache, in put, get, remove, replace order.
    pub fn for_cache(cache: &str) -> Vec<OperationDescriptor> {
        OperationSuffix::ALL
            .iter()
            .map(|suffix| OperationDescriptor::new(cache, *suffix))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_splits_on_last_underscore() {
        let name = OperationName::parse("user_sessions_get").unwrap();
        assert_eq!(name.cache, "user_sessions");
        assert_eq!(name.suffix, OperationSuffix::Get);
    }

    #[test]
    fn test_parse_tolerates_call_parens() {
        assert_eq!(
            OperationName::parse("books_replace()"),
            Some(OperationName::new("books", OperationSuffix::Replace))
        );
    }

    #[test]
    fn test_parse_rejects_unknown_shapes() {
        assert_eq!(OperationName::parse("books"), None);
        assert_eq!(OperationName::parse("books_clear"), None);
        assert_eq!(OperationName::parse("_get"), None);
        assert_eq!(OperationName::parse("books_GET"), None);
    }

    #[test]
    fn test_verb_table() {
        let pairs: Vec<(OperationSuffix, HttpVerb)> = OperationSuffix::ALL
            .iter()
            .map(|s| (*s, s.verb()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                (OperationSuffix::Put, HttpVerb::Post),
                (OperationSuffix::Get, HttpVerb::Get),
                (OperationSuffix::Remove, HttpVerb::Delete),
                (OperationSuffix::Replace, HttpVerb::Put),
            ]
        );
    }

    #[test]
    fn test_descriptors_for_cache() {
        let ops = OperationDescriptor::for_cache("books");
        let names: Vec<&str> = ops.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["books_put", "books_get", "books_remove", "books_replace"]);

        for op in &ops {
            assert_eq!(op.return_type, EDM_STRING);
            assert_eq!(op.entity_set, "books");
            let key = &op.parameters[0];
            assert_eq!(key.name, KEY_PARAMETER);
            assert!(key.nullable);
            assert_eq!(
                op.parameters.iter().any(|p| p.name == PAYLOAD_PARAMETER),
                op.suffix.requires_payload()
            );
        }
    }

    #[test]
    fn test_verb_from_str_is_case_insensitive() {
        assert_eq!("delete".parse::<HttpVerb>(), Ok(HttpVerb::Delete));
        assert!("TRACE".parse::<HttpVerb>().is_err());
    }
}
