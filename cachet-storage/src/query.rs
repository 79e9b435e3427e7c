//! Native query model of the indexed container.
//!
//! Queries follow the shape of a Lucene boolean query: leaf queries over one
//! attribute, combined with `Must`, `Should` and `MustNot` clauses. Matching is
//! evaluated directly against an [`IndexedDocument`].

use cachet_core::{IndexedDocument, IndexedTerm};
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

/// How a clause takes part in a boolean query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Occur {
    Must,
    Should,
    MustNot,
}

/// One end of a range query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bound {
    pub value: IndexedTerm,
    pub inclusive: bool,
}

impl Bound {
    pub fn inclusive(value: IndexedTerm) -> Self {
        Self {
            value,
            inclusive: true,
        }
    }

    pub fn exclusive(value: IndexedTerm) -> Self {
        Self {
            value,
            inclusive: false,
        }
    }
}

/// Text pattern of a wildcard query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum WildcardPattern {
    Contains(String),
    Prefix(String),
    Suffix(String),
}

impl WildcardPattern {
    fn matches(&self, text: &str) -> bool {
        match self {
            WildcardPattern::Contains(p) => text.contains(p.as_str()),
            WildcardPattern::Prefix(p) => text.starts_with(p.as_str()),
            WildcardPattern::Suffix(p) => text.ends_with(p.as_str()),
        }
    }
}

/// A query against the indexed view of one cache.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NativeQuery {
    MatchAll,
    Term {
        field: String,
        value: IndexedTerm,
    },
    Range {
        field: String,
        lower: Option<Bound>,
        upper: Option<Bound>,
    },
    Wildcard {
        field: String,
        pattern: WildcardPattern,
    },
    Boolean {
        clauses: Vec<(Occur, NativeQuery)>,
    },
}

impl NativeQuery {
    pub fn term(field: impl Into<String>, value: IndexedTerm) -> Self {
        NativeQuery::Term {
            field: field.into(),
            value,
        }
    }

    /// `MatchAll` minus `inner`.
    pub fn exclude(inner: NativeQuery) -> Self {
        NativeQuery::Boolean {
            clauses: vec![(Occur::Must, NativeQuery::MatchAll), (Occur::MustNot, inner)],
        }
    }

    /// Whether the document satisfies this query.
    ///
    /// A boolean query matches when every `Must` clause matches, no `MustNot`
    /// clause matches, and, if it has no `Must` clauses, at least one `Should`
    /// clause matches. A boolean query with neither `Must` nor `Should`
    /// clauses matches nothing.
    pub fn matches(&self, doc: &IndexedDocument) -> bool {
        match self {
            NativeQuery::MatchAll => true,
            NativeQuery::Term { field, value } => doc
                .terms(field)
                .iter()
                .any(|term| term.compare(value) == Some(Ordering::Equal)),
            NativeQuery::Range {
                field,
                lower,
                upper,
            } => doc.terms(field).iter().any(|term| {
                within(term, lower.as_ref(), Ordering::Greater)
                    && within(term, upper.as_ref(), Ordering::Less)
            }),
            NativeQuery::Wildcard { field, pattern } => doc
                .terms(field)
                .iter()
                .filter_map(IndexedTerm::as_text)
                .any(|text| pattern.matches(text)),
            NativeQuery::Boolean { clauses } => {
                let mut has_must = false;
                let mut has_should = false;
                let mut any_should = false;

                for (occur, clause) in clauses {
                    match occur {
                        Occur::Must => {
                            has_must = true;
                            if !clause.matches(doc) {
                                return false;
                            }
                        }
                        Occur::MustNot => {
                            if clause.matches(doc) {
                                return false;
                            }
                        }
                        Occur::Should => {
                            has_should = true;
                            if !any_should && clause.matches(doc) {
                                any_should = true;
                            }
                        }
                    }
                }

                if has_must {
                    true
                } else {
                    has_should && any_should
                }
            }
        }
    }
}

/// `term` lies on the `wanted` side of `bound` (or on it, if inclusive).
/// Terms of a different kind than the bound never match.
fn within(term: &IndexedTerm, bound: Option<&Bound>, wanted: Ordering) -> bool {
    match bound {
        None => true,
        Some(bound) => match term.compare(&bound.value) {
            Some(Ordering::Equal) => bound.inclusive,
            Some(ordering) => ordering == wanted,
            None => false,
        },
    }
}

// ============================================================================
// DISPLAY (Lucene query syntax, for logs)
// ============================================================================

struct TermText<'a>(&'a IndexedTerm);

impl fmt::Display for TermText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            IndexedTerm::Text(s) => write!(f, "\"{}\"", s.replace('"', "\\\"")),
            IndexedTerm::Number(n) => write!(f, "{}", n),
            IndexedTerm::Boolean(b) => write!(f, "{}", b),
            IndexedTerm::Null => f.write_str("null"),
        }
    }
}

impl fmt::Display for NativeQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeQuery::MatchAll => f.write_str("*:*"),
            NativeQuery::Term { field, value } => write!(f, "{}:{}", field, TermText(value)),
            NativeQuery::Range {
                field,
                lower,
                upper,
            } => {
                write!(f, "{}:", field)?;
                match lower {
                    Some(b) => write!(f, "{}{}", if b.inclusive { '[' } else { '{' }, TermText(&b.value))?,
                    None => f.write_str("{*")?,
                }
                f.write_str(" TO ")?;
                match upper {
                    Some(b) => write!(f, "{}{}", TermText(&b.value), if b.inclusive { ']' } else { '}' }),
                    None => f.write_str("*}"),
                }
            }
            NativeQuery::Wildcard { field, pattern } => match pattern {
                WildcardPattern::Contains(p) => write!(f, "{}:*{}*", field, p),
                WildcardPattern::Prefix(p) => write!(f, "{}:{}*", field, p),
                WildcardPattern::Suffix(p) => write!(f, "{}:*{}", field, p),
            },
            NativeQuery::Boolean { clauses } => {
                f.write_str("(")?;
                for (idx, (occur, clause)) in clauses.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(" ")?;
                    }
                    match occur {
                        Occur::Must => write!(f, "+{}", clause)?,
                        Occur::Should => write!(f, "{}", clause)?,
                        Occur::MustNot => write!(f, "-{}", clause)?,
                    }
                }
                f.write_str(")")
            }
        }
    }
}
