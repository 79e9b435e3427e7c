//! Filter translation: [`FilterNode`] to [`NativeQuery`].
//!
//! Translation is pure. Every node kind maps to exactly one query shape, and
//! anything without a native equivalent is an error rather than being dropped.

use cachet_core::{
    FilterError, FilterNode, FilterOperator, IndexedTerm, Literal, JSON_VALUE_FIELD,
    MAX_FILTER_DEPTH, MEMBER_SEPARATOR,
};
use std::collections::BTreeMap;

use crate::query::{Bound, NativeQuery, Occur, WildcardPattern};

/// Declared type of an indexed attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Always text; only string literals compare against it.
    Text,
    /// Type is whatever the stored JSON holds.
    Dynamic,
}

/// The index layout of a target cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSchema {
    declared: BTreeMap<String, FieldKind>,
    /// Root under which `root/<member>/...` paths are dynamic attributes.
    member_root: Option<String>,
}

impl IndexSchema {
    /// The layout every cache entry is indexed with: `jsonValue` as text,
    /// and any `jsonValue/<member>` path as dynamic.
    pub fn cache_entry() -> Self {
        let mut declared = BTreeMap::new();
        declared.insert(JSON_VALUE_FIELD.to_string(), FieldKind::Text);
        Self {
            declared,
            member_root: Some(JSON_VALUE_FIELD.to_string()),
        }
    }

    /// Kind of `field`, or `None` if it is not an indexed attribute.
    pub fn field_kind(&self, field: &str) -> Option<FieldKind> {
        if let Some(kind) = self.declared.get(field) {
            return Some(*kind);
        }
        let root = self.member_root.as_deref()?;
        let rest = field.strip_prefix(root)?.strip_prefix(MEMBER_SEPARATOR)?;
        if !rest.is_empty() && rest.split(MEMBER_SEPARATOR).all(|segment| !segment.is_empty()) {
            Some(FieldKind::Dynamic)
        } else {
            None
        }
    }
}

impl Default for IndexSchema {
    fn default() -> Self {
        Self::cache_entry()
    }
}

/// Stateless predicate translator.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterTranslator;

impl FilterTranslator {
    /// Translate a predicate into a query against `target`.
    ///
    /// Trees deeper than [`MAX_FILTER_DEPTH`] are rejected before any
    /// recursion, whether they came from the parser or were built directly.
    pub fn translate(predicate: &FilterNode, target: &IndexSchema) -> Result<NativeQuery, FilterError> {
        predicate.check_depth()?;
        Self::node(predicate, target)
    }

    fn node(predicate: &FilterNode, target: &IndexSchema) -> Result<NativeQuery, FilterError> {
        match predicate {
            FilterNode::Comparison {
                field,
                operator,
                literal,
            } => Self::comparison(field, *operator, literal, target),
            FilterNode::And { left, right } => Ok(NativeQuery::Boolean {
                clauses: vec![
                    (Occur::Must, Self::node(left, target)?),
                    (Occur::Must, Self::node(right, target)?),
                ],
            }),
            FilterNode::Or { left, right } => Ok(NativeQuery::Boolean {
                clauses: vec![
                    (Occur::Should, Self::node(left, target)?),
                    (Occur::Should, Self::node(right, target)?),
                ],
            }),
            FilterNode::Not { inner } => Ok(NativeQuery::exclude(Self::node(inner, target)?)),
        }
    }

    fn comparison(
        field: &str,
        operator: FilterOperator,
        literal: &Literal,
        target: &IndexSchema,
    ) -> Result<NativeQuery, FilterError> {
        let kind = target
            .field_kind(field)
            .ok_or_else(|| FilterError::UnsupportedField {
                field: field.to_string(),
            })?;

        if operator == FilterOperator::Has {
            return Err(FilterError::UnsupportedOperator {
                operator: operator.to_string(),
            });
        }

        check_literal(field, operator, literal, kind)?;
        let term = to_term(literal);

        let query = match (operator, term) {
            (FilterOperator::Eq, term) => NativeQuery::term(field, term),
            (FilterOperator::Ne, term) => NativeQuery::exclude(NativeQuery::term(field, term)),
            (FilterOperator::Gt, term) => range(field, Some(Bound::exclusive(term)), None),
            (FilterOperator::Gte, term) => range(field, Some(Bound::inclusive(term)), None),
            (FilterOperator::Lt, term) => range(field, None, Some(Bound::exclusive(term))),
            (FilterOperator::Lte, term) => range(field, None, Some(Bound::inclusive(term))),
            (FilterOperator::Contains, IndexedTerm::Text(text)) => {
                wildcard(field, WildcardPattern::Contains(text))
            }
            (FilterOperator::StartsWith, IndexedTerm::Text(text)) => {
                wildcard(field, WildcardPattern::Prefix(text))
            }
            (FilterOperator::EndsWith, IndexedTerm::Text(text)) => {
                wildcard(field, WildcardPattern::Suffix(text))
            }
            (FilterOperator::Has, _)
            | (FilterOperator::Contains, _)
            | (FilterOperator::StartsWith, _)
            | (FilterOperator::EndsWith, _) => {
                return Err(FilterError::UnsupportedOperator {
                    operator: operator.to_string(),
                })
            }
        };
        Ok(query)
    }
}

fn check_literal(
    field: &str,
    operator: FilterOperator,
    literal: &Literal,
    kind: FieldKind,
) -> Result<(), FilterError> {
    let is_string = matches!(literal, Literal::String(_));
    let is_number = matches!(literal, Literal::Integer(_) | Literal::Float(_));

    let expected = match kind {
        FieldKind::Text if !is_string => Some("string"),
        FieldKind::Text => None,
        FieldKind::Dynamic if operator.is_pattern() && !is_string => Some("string"),
        FieldKind::Dynamic if operator.is_range() && !(is_string || is_number) => {
            Some("string or number")
        }
        FieldKind::Dynamic => None,
    };

    match expected {
        Some(expected) => Err(FilterError::LiteralKindMismatch {
            field: field.to_string(),
            operator: operator.to_string(),
            expected: expected.to_string(),
            got: literal.kind_name().to_string(),
        }),
        None => Ok(()),
    }
}

fn to_term(literal: &Literal) -> IndexedTerm {
    match literal {
        Literal::String(s) => IndexedTerm::Text(s.clone()),
        Literal::Integer(i) => IndexedTerm::Number(*i as f64),
        Literal::Float(x) => IndexedTerm::Number(*x),
        Literal::Boolean(b) => IndexedTerm::Boolean(*b),
        Literal::Null => IndexedTerm::Null,
    }
}

fn range(field: &str, lower: Option<Bound>, upper: Option<Bound>) -> NativeQuery {
    NativeQuery::Range {
        field: field.to_string(),
        lower,
        upper,
    }
}

fn wildcard(field: &str, pattern: WildcardPattern) -> NativeQuery {
    NativeQuery::Wildcard {
        field: field.to_string(),
        pattern,
    }
}
