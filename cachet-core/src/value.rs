//! Cached value envelope and its indexable form.
//!
//! A [`CachedValue`] pairs the opaque serialized value stored under a cache
//! key with an [`IndexedDocument`] derived from it. The document is rebuilt
//! whenever a value is constructed or deserialized, so the two can never drift.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Name of the single attribute every entity exposes.
pub const JSON_VALUE_FIELD: &str = "jsonValue";

/// Separator between the root attribute and nested member names.
pub const MEMBER_SEPARATOR: char = '/';

// ============================================================================
// INDEXED TERMS
// ============================================================================

/// A scalar as seen by the search index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum IndexedTerm {
    Text(String),
    Number(f64),
    Boolean(bool),
    Null,
}

impl IndexedTerm {
    /// Human-readable kind name, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            IndexedTerm::Text(_) => "string",
            IndexedTerm::Number(_) => "number",
            IndexedTerm::Boolean(_) => "boolean",
            IndexedTerm::Null => "null",
        }
    }

    /// Compare two terms of the same kind. Terms of different kinds are
    /// incomparable and yield `None`.
    pub fn compare(&self, other: &IndexedTerm) -> Option<Ordering> {
        match (self, other) {
            (IndexedTerm::Text(a), IndexedTerm::Text(b)) => Some(a.cmp(b)),
            (IndexedTerm::Number(a), IndexedTerm::Number(b)) => a.partial_cmp(b),
            (IndexedTerm::Boolean(a), IndexedTerm::Boolean(b)) => Some(a.cmp(b)),
            (IndexedTerm::Null, IndexedTerm::Null) => Some(Ordering::Equal),
            _ => None,
        }
    }

    /// Borrow the text if this is a text term.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            IndexedTerm::Text(s) => Some(s),
            _ => None,
        }
    }
}

// ============================================================================
// INDEXED DOCUMENT
// ============================================================================

/// Attribute path → terms. Multi-valued attributes come from JSON arrays.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IndexedDocument {
    fields: BTreeMap<String, Vec<IndexedTerm>>,
}

impl IndexedDocument {
    /// Derive the indexable form of a serialized value.
    ///
    /// `jsonValue` always carries the raw text. If the text is a JSON
    /// document, each scalar is also indexed under `jsonValue/<member>/...`.
    pub fn derive(serialized: &str) -> Self {
        let mut doc = IndexedDocument::default();
        doc.push(JSON_VALUE_FIELD.to_string(), IndexedTerm::Text(serialized.to_string()));

        if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(serialized) {
            if parsed.is_object() || parsed.is_array() {
                doc.flatten(JSON_VALUE_FIELD, &parsed);
            }
        }
        doc
    }

    fn flatten(&mut self, path: &str, value: &serde_json::Value) {
        match value {
            serde_json::Value::Object(map) => {
                for (member, child) in map {
                    let child_path = format!("{}{}{}", path, MEMBER_SEPARATOR, member);
                    self.flatten(&child_path, child);
                }
            }
            serde_json::Value::Array(items) => {
                for item in items {
                    self.flatten(path, item);
                }
            }
            serde_json::Value::String(s) => self.push(path.to_string(), IndexedTerm::Text(s.clone())),
            serde_json::Value::Number(n) => {
                if let Some(f) = n.as_f64() {
                    self.push(path.to_string(), IndexedTerm::Number(f));
                }
            }
            serde_json::Value::Bool(b) => self.push(path.to_string(), IndexedTerm::Boolean(*b)),
            serde_json::Value::Null => self.push(path.to_string(), IndexedTerm::Null),
        }
    }

    fn push(&mut self, path: String, term: IndexedTerm) {
        self.fields.entry(path).or_default().push(term);
    }

    /// Terms indexed under `attribute`; empty if the attribute is absent.
    pub fn terms(&self, attribute: &str) -> &[IndexedTerm] {
        self.fields
            .get(attribute)
            .map(|terms| terms.as_slice())
            .unwrap_or(&[])
    }

    /// Iterate over indexed attribute names.
    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(|k| k.as_str())
    }
}

// ============================================================================
// CACHED VALUE
// ============================================================================

/// One cache entry value: the serialized form plus its derived index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct CachedValue {
    json: String,
    document: IndexedDocument,
}

impl CachedValue {
    /// Wrap a serialized value, deriving its index.
    pub fn new(json: impl Into<String>) -> Self {
        let json = json.into();
        let document = IndexedDocument::derive(&json);
        Self { json, document }
    }

    /// The serialized value exactly as stored.
    pub fn json(&self) -> &str {
        &self.json
    }

    /// The derived indexable form.
    pub fn document(&self) -> &IndexedDocument {
        &self.document
    }
}

impl From<String> for CachedValue {
    fn from(json: String) -> Self {
        CachedValue::new(json)
    }
}

impl From<CachedValue> for String {
    fn from(value: CachedValue) -> Self {
        value.json
    }
}
