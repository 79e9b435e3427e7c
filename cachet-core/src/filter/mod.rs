//! Filter predicates over cache entries.
//!
//! [`FilterNode`] is the structured boolean predicate clients send as
//! `$filter`. It is a closed tree: comparisons of one indexed attribute with a
//! literal, combined with `and`, `or` and `not`. Translation into an engine
//! query lives in `cachet-storage`.

mod lexer;
mod parser;

pub use lexer::{Lexer, Token, TokenKind};
pub use parser::parse_filter;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::FilterError;

/// Deepest predicate tree a filter may build. Parsing and translation both
/// recurse over the tree, so anything deeper is rejected up front.
pub const MAX_FILTER_DEPTH: usize = 64;

/// Comparison operator of a [`FilterNode::Comparison`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    /// Equal to
    Eq,
    /// Not equal to
    Ne,
    /// Greater than
    Gt,
    /// Greater than or equal
    Gte,
    /// Less than
    Lt,
    /// Less than or equal
    Lte,
    /// Contains substring
    Contains,
    /// Starts with prefix
    StartsWith,
    /// Ends with suffix
    EndsWith,
    /// Enumeration flag test
    Has,
}

impl FilterOperator {
    /// OData spelling of the operator.
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "eq",
            FilterOperator::Ne => "ne",
            FilterOperator::Gt => "gt",
            FilterOperator::Gte => "ge",
            FilterOperator::Lt => "lt",
            FilterOperator::Lte => "le",
            FilterOperator::Contains => "contains",
            FilterOperator::StartsWith => "startswith",
            FilterOperator::EndsWith => "endswith",
            FilterOperator::Has => "has",
        }
    }

    /// Whether this is an ordering comparison.
    pub fn is_range(&self) -> bool {
        matches!(
            self,
            FilterOperator::Gt | FilterOperator::Gte | FilterOperator::Lt | FilterOperator::Lte
        )
    }

    /// Whether this is a substring/prefix/suffix match.
    pub fn is_pattern(&self) -> bool {
        matches!(
            self,
            FilterOperator::Contains | FilterOperator::StartsWith | FilterOperator::EndsWith
        )
    }

    /// The operator that keeps the meaning when operands are swapped
    /// (`'a' lt x` is `x gt 'a'`). Only defined for binary comparisons.
    pub fn mirrored(&self) -> Option<FilterOperator> {
        match self {
            FilterOperator::Eq => Some(FilterOperator::Eq),
            FilterOperator::Ne => Some(FilterOperator::Ne),
            FilterOperator::Gt => Some(FilterOperator::Lt),
            FilterOperator::Gte => Some(FilterOperator::Lte),
            FilterOperator::Lt => Some(FilterOperator::Gt),
            FilterOperator::Lte => Some(FilterOperator::Gte),
            _ => None,
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Literal operand of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Null,
}

impl Literal {
    /// Human-readable kind name, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Literal::String(_) => "string",
            Literal::Integer(_) | Literal::Float(_) => "number",
            Literal::Boolean(_) => "boolean",
            Literal::Null => "null",
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Literal::Integer(i) => write!(f, "{}", i),
            Literal::Float(x) => write!(f, "{:?}", x),
            Literal::Boolean(b) => write!(f, "{}", b),
            Literal::Null => f.write_str("null"),
        }
    }
}

/// A boolean predicate over one cache entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterNode {
    Comparison {
        field: String,
        operator: FilterOperator,
        literal: Literal,
    },
    And {
        left: Box<FilterNode>,
        right: Box<FilterNode>,
    },
    Or {
        left: Box<FilterNode>,
        right: Box<FilterNode>,
    },
    Not {
        inner: Box<FilterNode>,
    },
}

impl FilterNode {
    /// Parse an OData `$filter` expression.
    pub fn parse(source: &str) -> Result<Self, FilterError> {
        parse_filter(source)
    }

    /// Build a comparison leaf.
    pub fn comparison(field: impl Into<String>, operator: FilterOperator, literal: Literal) -> Self {
        FilterNode::Comparison {
            field: field.into(),
            operator,
            literal,
        }
    }

    /// Build an equality comparison.
    pub fn eq(field: impl Into<String>, literal: Literal) -> Self {
        Self::comparison(field, FilterOperator::Eq, literal)
    }

    /// Combine with `and`.
    pub fn and(self, right: FilterNode) -> Self {
        FilterNode::And {
            left: Box::new(self),
            right: Box::new(right),
        }
    }

    /// Combine with `or`.
    pub fn or(self, right: FilterNode) -> Self {
        FilterNode::Or {
            left: Box::new(self),
            right: Box::new(right),
        }
    }

    /// Negate.
    pub fn negate(self) -> Self {
        FilterNode::Not {
            inner: Box::new(self),
        }
    }

    /// Height of the tree; a single comparison has depth 1.
    ///
    /// Walks with an explicit stack, so it is safe on trees of any depth.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut pending = vec![(self, 1)];
        while let Some((node, level)) = pending.pop() {
            deepest = deepest.max(level);
            match node {
                FilterNode::Comparison { .. } => {}
                FilterNode::And { left, right } | FilterNode::Or { left, right } => {
                    pending.push((left, level + 1));
                    pending.push((right, level + 1));
                }
                FilterNode::Not { inner } => pending.push((inner, level + 1)),
            }
        }
        deepest
    }

    /// Fail with [`FilterError::TooDeep`] past [`MAX_FILTER_DEPTH`].
    pub fn check_depth(&self) -> Result<(), FilterError> {
        if self.depth() > MAX_FILTER_DEPTH {
            return Err(FilterError::TooDeep {
                max_depth: MAX_FILTER_DEPTH,
            });
        }
        Ok(())
    }

    /// Number of comparison leaves.
    pub fn leaf_count(&self) -> usize {
        match self {
            FilterNode::Comparison { .. } => 1,
            FilterNode::And { left, right } | FilterNode::Or { left, right } => {
                left.leaf_count() + right.leaf_count()
            }
            FilterNode::Not { inner } => inner.leaf_count(),
        }
    }
}

impl fmt::Display for FilterNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterNode::Comparison {
                field,
                operator,
                literal,
            } => {
                if operator.is_pattern() {
                    write!(f, "{}({}, {})", operator, field, literal)
                } else {
                    write!(f, "{} {} {}", field, operator, literal)
                }
            }
            FilterNode::And { left, right } => write!(f, "({} and {})", left, right),
            FilterNode::Or { left, right } => write!(f, "({} or {})", left, right),
            FilterNode::Not { inner } => write!(f, "not ({})", inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_reparses_to_same_tree() -> Result<(), FilterError> {
        let node = FilterNode::eq("jsonValue", Literal::String("it's".into()))
            .or(FilterNode::comparison(
                "jsonValue/pages",
                FilterOperator::Gte,
                Literal::Integer(100),
            ))
            .and(
                FilterNode::comparison(
                    "jsonValue/title",
                    FilterOperator::StartsWith,
                    Literal::String("Du".into()),
                )
                .negate(),
            );

        let printed = node.to_string();
        assert_eq!(FilterNode::parse(&printed)?, node);
        Ok(())
    }

    #[test]
    fn test_leaf_count() {
        let node = FilterNode::eq("a", Literal::Null)
            .and(FilterNode::eq("b", Literal::Boolean(true)).negate());
        assert_eq!(node.leaf_count(), 2);
    }

    #[test]
    fn test_depth_counts_levels() {
        let leaf = FilterNode::eq("a", Literal::Null);
        assert_eq!(leaf.depth(), 1);
        assert_eq!(leaf.clone().negate().and(leaf.clone()).depth(), 3);

        let mut deep = leaf;
        for _ in 0..MAX_FILTER_DEPTH {
            deep = deep.negate();
        }
        assert_eq!(deep.depth(), MAX_FILTER_DEPTH + 1);
        assert_eq!(
            deep.check_depth(),
            Err(FilterError::TooDeep {
                max_depth: MAX_FILTER_DEPTH
            })
        );
    }

    #[test]
    fn test_mirrored_operators() {
        assert_eq!(FilterOperator::Lt.mirrored(), Some(FilterOperator::Gt));
        assert_eq!(FilterOperator::Gte.mirrored(), Some(FilterOperator::Lte));
        assert_eq!(FilterOperator::Contains.mirrored(), None);
    }
}
