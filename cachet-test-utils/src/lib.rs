//! CACHET Test Utilities
//!
//! Centralized test infrastructure for the Cachet workspace:
//! - Proptest generators for keys, values, envelopes and filter predicates
//! - A counting cache manager for start-up concurrency tests
//! - Test fixtures for common scenarios
//! - Custom assertions for error classification

// Re-export core types for convenience
pub use cachet_core::{
    CacheDefinition, CacheStorage, CachedValue, CachetConfig, CachetError, CachetResult,
    DispatchError, ErrorKind, FilterError, FilterNode, FilterOperator, HttpVerb, Literal,
    OperationSuffix, StorageError, StorageResult,
};
pub use cachet_storage::{CacheHandle, CacheManager, CacheRegistry, LocalCacheManager};

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

// ============================================================================
// MOCK CACHE MANAGER
// ============================================================================

/// Cache manager that counts start attempts.
///
/// Starts can be slowed down with a delay and the first `fail_first` starts
/// can be made to fail, so tests can observe single-flight behaviour.
#[derive(Debug)]
pub struct CountingCacheManager {
    names: BTreeSet<String>,
    starts: AtomicUsize,
    started: Mutex<Vec<String>>,
    delay: Duration,
    fail_first: usize,
}

impl CountingCacheManager {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            starts: AtomicUsize::new(0),
            started: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
            fail_first: 0,
        }
    }

    /// Sleep this long inside every start.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail the first `n` start attempts.
    pub fn failing_first(mut self, n: usize) -> Self {
        self.fail_first = n;
        self
    }

    /// Total start attempts so far.
    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    /// Start attempts for one cache name.
    pub fn start_count_for(&self, name: &str) -> usize {
        self.started
            .lock()
            .map(|started| started.iter().filter(|n| n.as_str() == name).count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl CacheManager for CountingCacheManager {
    fn cache_names(&self) -> BTreeSet<String> {
        self.names.clone()
    }

    async fn start_cache(&self, name: &str) -> StorageResult<CacheHandle> {
        let attempt = self.starts.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut started) = self.started.lock() {
            started.push(name.to_string());
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if !self.names.contains(name) {
            return Err(StorageError::UnknownCache {
                name: name.to_string(),
            });
        }
        if attempt < self.fail_first {
            return Err(StorageError::StartFailed {
                name: name.to_string(),
                reason: format!("injected failure #{}", attempt + 1),
            });
        }
        Ok(CacheHandle::in_memory(name))
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for Cachet inputs.

    use super::*;
    use proptest::prelude::*;
    use serde_json::Value;

    /// Member paths every generated predicate draws from.
    pub const MEMBER_FIELDS: [&str; 3] = ["jsonValue/title", "jsonValue/pages", "jsonValue/tags"];

    /// A valid cache name.
    pub fn arb_cache_name() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_]{0,11}"
    }

    /// A cache key; may contain quotes, spaces and unicode.
    pub fn arb_key() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9 '_é-]{1,16}"
    }

    /// An arbitrary JSON document (finite numbers only).
    pub fn arb_json() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i32>().prop_map(Value::from),
            "[ -~]{0,12}".prop_map(Value::String),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    /// A JSON object value, as stored by most clients.
    pub fn arb_json_object() -> impl Strategy<Value = Value> {
        prop::collection::btree_map("[a-z]{1,6}", arb_json(), 0..4)
            .prop_map(|m| Value::Object(m.into_iter().collect()))
    }

    /// A wrapper member name for the request envelope.
    pub fn arb_wrapper_name() -> impl Strategy<Value = String> {
        "[a-zA-Z][a-zA-Z0-9]{0,9}"
    }

    pub fn arb_operation_suffix() -> impl Strategy<Value = OperationSuffix> {
        prop_oneof![
            Just(OperationSuffix::Put),
            Just(OperationSuffix::Get),
            Just(OperationSuffix::Remove),
            Just(OperationSuffix::Replace),
        ]
    }

    pub fn arb_http_verb() -> impl Strategy<Value = HttpVerb> {
        prop_oneof![
            Just(HttpVerb::Get),
            Just(HttpVerb::Post),
            Just(HttpVerb::Put),
            Just(HttpVerb::Delete),
            Just(HttpVerb::Patch),
        ]
    }

    fn arb_string_literal() -> impl Strategy<Value = Literal> {
        "[ -~]{0,12}".prop_map(Literal::String)
    }

    fn arb_comparable_literal() -> impl Strategy<Value = Literal> {
        prop_oneof![
            arb_string_literal(),
            any::<i32>().prop_map(|n| Literal::Integer(n as i64)),
        ]
    }

    fn arb_any_literal() -> impl Strategy<Value = Literal> {
        prop_oneof![
            arb_comparable_literal(),
            any::<bool>().prop_map(Literal::Boolean),
            Just(Literal::Null),
        ]
    }

    /// A comparison leaf the translator accepts.
    pub fn arb_translatable_comparison() -> impl Strategy<Value = FilterNode> {
        let on_raw = (
            prop_oneof![
                Just(FilterOperator::Eq),
                Just(FilterOperator::Ne),
                Just(FilterOperator::Gt),
                Just(FilterOperator::Lte),
                Just(FilterOperator::Contains),
                Just(FilterOperator::StartsWith),
                Just(FilterOperator::EndsWith),
            ],
            arb_string_literal(),
        )
            .prop_map(|(op, lit)| FilterNode::comparison("jsonValue", op, lit));

        let member = prop::sample::select(MEMBER_FIELDS.to_vec());
        let equality = (
            member.clone(),
            prop_oneof![Just(FilterOperator::Eq), Just(FilterOperator::Ne)],
            arb_any_literal(),
        )
            .prop_map(|(f, op, lit)| FilterNode::comparison(f, op, lit));
        let ranges = (
            member.clone(),
            prop_oneof![
                Just(FilterOperator::Gt),
                Just(FilterOperator::Gte),
                Just(FilterOperator::Lt),
                Just(FilterOperator::Lte),
            ],
            arb_comparable_literal(),
        )
            .prop_map(|(f, op, lit)| FilterNode::comparison(f, op, lit));
        let patterns = (
            member,
            prop_oneof![
                Just(FilterOperator::Contains),
                Just(FilterOperator::StartsWith),
                Just(FilterOperator::EndsWith),
            ],
            arb_string_literal(),
        )
            .prop_map(|(f, op, lit)| FilterNode::comparison(f, op, lit));

        prop_oneof![on_raw, equality, ranges, patterns]
    }

    /// A whole predicate tree the translator accepts.
    pub fn arb_translatable_filter() -> impl Strategy<Value = FilterNode> {
        arb_translatable_comparison().prop_recursive(4, 16, 2, |inner| {
            prop_oneof![
                (inner.clone(), inner.clone()).prop_map(|(l, r)| l.and(r)),
                (inner.clone(), inner.clone()).prop_map(|(l, r)| l.or(r)),
                inner.prop_map(FilterNode::negate),
            ]
        })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built values for common test scenarios.

    use super::*;
    use serde_json::json;

    /// A config with two in-memory caches, `books` and `movies`.
    pub fn library_config() -> CachetConfig {
        CachetConfig::in_memory(["books", "movies"])
    }

    /// Sample book documents keyed by id.
    pub fn sample_books() -> Vec<(String, serde_json::Value)> {
        vec![
            (
                "b1".to_string(),
                json!({"title": "Dune", "pages": 412, "tags": ["scifi", "classic"]}),
            ),
            (
                "b2".to_string(),
                json!({"title": "Dune Messiah", "pages": 256, "tags": ["scifi"]}),
            ),
            (
                "b3".to_string(),
                json!({"title": "The Hobbit", "pages": 310, "tags": ["fantasy", "classic"]}),
            ),
        ]
    }

    /// The request body clients send for put/replace:
    /// `{"<wrapper>": {"jsonValue": <value>}}`.
    pub fn envelope(wrapper: &str, value: serde_json::Value) -> Vec<u8> {
        let mut inner = serde_json::Map::new();
        inner.insert(cachet_core::JSON_VALUE_FIELD.to_string(), value);
        let mut outer = serde_json::Map::new();
        outer.insert(wrapper.to_string(), serde_json::Value::Object(inner));
        serde_json::Value::Object(outer).to_string().into_bytes()
    }

    /// Envelope with the conventional `entity` wrapper.
    pub fn entity_envelope(value: serde_json::Value) -> Vec<u8> {
        envelope("entity", value)
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertion helpers for Cachet error classification.

    use super::*;

    /// Assert that a result failed with the given error kind.
    #[track_caller]
    pub fn assert_kind<T: std::fmt::Debug>(result: &CachetResult<T>, kind: ErrorKind) {
        match result {
            Err(err) => assert_eq!(err.kind(), kind, "Wrong error kind for {:?}", err),
            Ok(value) => panic!("Expected {:?} error, got Ok({:?})", kind, value),
        }
    }

    /// Assert that a result is a filter error.
    #[track_caller]
    pub fn assert_filter_error<T: std::fmt::Debug>(result: &CachetResult<T>) {
        match result {
            Err(CachetError::Filter(_)) => {}
            other => panic!("Expected Filter error, got: {:?}", other),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
