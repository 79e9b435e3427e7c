//! Property-Based Tests for Operation Dispatch
//!
//! Round trip, idempotent replace, miss handling and the rule that
//! rejected requests never start a cache.

use std::sync::Arc;
use std::time::Duration;

use cachet_api::{MetadataSynthesizer, OperationDispatcher, OperationOutcome, OperationRequest};
use cachet_core::{CachetResult, ErrorKind, HttpVerb, OperationSuffix};
use cachet_storage::{CacheManager, CacheRegistry, LocalCacheManager};
use cachet_test_utils::fixtures::envelope;
use cachet_test_utils::generators::{
    arb_cache_name, arb_http_verb, arb_json, arb_json_object, arb_key, arb_operation_suffix,
    arb_translatable_filter, arb_wrapper_name,
};
use cachet_test_utils::CountingCacheManager;
use proptest::prelude::*;
use serde_json::Value;
use tokio::runtime::Runtime;

// ============================================================================
// TEST CONFIGURATION
// ============================================================================

const MAX_RESULTS: usize = 100;

fn test_runtime() -> Result<Runtime, TestCaseError> {
    Runtime::new().map_err(|e| TestCaseError::fail(format!("Failed to create runtime: {}", e)))
}

fn dispatcher_over(manager: Arc<dyn CacheManager>) -> OperationDispatcher {
    let registry = Arc::new(CacheRegistry::new(manager, Duration::from_secs(5)));
    let metadata = Arc::new(MetadataSynthesizer::new(
        Arc::clone(&registry),
        "Cachet",
        "Container",
    ));
    OperationDispatcher::new(registry, metadata, Duration::from_secs(5), MAX_RESULTS)
}

fn dispatcher() -> OperationDispatcher {
    dispatcher_over(Arc::new(LocalCacheManager::in_memory(["books"])))
}

fn fail(e: impl std::fmt::Display) -> TestCaseError {
    TestCaseError::fail(e.to_string())
}

async fn put(
    d: &OperationDispatcher,
    key: &str,
    wrapper: &str,
    value: &Value,
) -> CachetResult<OperationOutcome> {
    d.dispatch(
        OperationRequest::new("books_put", HttpVerb::Post)
            .with_key(key)
            .with_payload(envelope(wrapper, value.clone())),
    )
    .await
}

async fn get(d: &OperationDispatcher, key: &str) -> CachetResult<OperationOutcome> {
    d.dispatch(OperationRequest::new("books_get", HttpVerb::Get).with_key(key))
        .await
}

/// A stored value as a JSON value: strings are kept verbatim, so they only
/// compare equal as text.
fn stored_matches(stored: &str, expected: &Value) -> bool {
    match expected {
        Value::String(text) => stored == text,
        other => serde_json::from_str::<Value>(stored).ok().as_ref() == Some(other),
    }
}

// ============================================================================
// PROPERTY TESTS
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Put then get returns the value that was put, whatever the wrapper name.
    #[test]
    fn prop_put_get_round_trip(
        key in arb_key(),
        wrapper in arb_wrapper_name(),
        value in arb_json(),
    ) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let d = dispatcher();
            let put_outcome = put(&d, &key, &wrapper, &value).await.map_err(fail)?;
            let fetched = get(&d, &key).await.map_err(fail)?;

            prop_assert_eq!(&put_outcome, &fetched);
            match fetched {
                OperationOutcome::Value(stored) => {
                    prop_assert!(stored_matches(&stored, &value), "stored {} for {}", stored, value);
                }
                OperationOutcome::NoContent => {
                    return Err(TestCaseError::fail("value missing after put"));
                }
            }
            Ok::<(), TestCaseError>(())
        })?;
    }

    /// Every registered cache name gets working operations, underscores
    /// included.
    #[test]
    fn prop_any_cache_name_round_trips(
        name in arb_cache_name(),
        key in arb_key(),
        value in arb_json_object(),
    ) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let d = dispatcher_over(Arc::new(LocalCacheManager::in_memory([name.clone()])));
            let stored = d
                .dispatch(
                    OperationRequest::new(format!("{}_put", name), HttpVerb::Post)
                        .with_key(key.clone())
                        .with_payload(envelope("entity", value.clone())),
                )
                .await
                .map_err(fail)?;
            let fetched = d
                .dispatch(OperationRequest::new(format!("{}_get", name), HttpVerb::Get).with_key(key))
                .await
                .map_err(fail)?;

            prop_assert_eq!(&stored, &fetched);
            match fetched {
                OperationOutcome::Value(text) => prop_assert!(stored_matches(&text, &value)),
                OperationOutcome::NoContent => {
                    return Err(TestCaseError::fail("value missing after put"));
                }
            }
            Ok::<(), TestCaseError>(())
        })?;
    }

    /// Replacing twice with the same value is the same as replacing once.
    #[test]
    fn prop_replace_idempotent(
        key in arb_key(),
        first in arb_json(),
        second in arb_json(),
    ) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let d = dispatcher();
            put(&d, &key, "entity", &first).await.map_err(fail)?;

            let replace = OperationRequest::new("books_replace", HttpVerb::Put)
                .with_key(key.clone())
                .with_payload(envelope("entity", second.clone()));
            let once = d.dispatch(replace.clone()).await.map_err(fail)?;
            let twice = d.dispatch(replace).await.map_err(fail)?;

            prop_assert_eq!(&once, &twice);
            prop_assert_eq!(get(&d, &key).await.map_err(fail)?, twice);
            Ok::<(), TestCaseError>(())
        })?;
    }

    /// Get and remove of a key never written succeed with no content, and a
    /// replace does not create it.
    #[test]
    fn prop_miss_is_not_an_error(key in arb_key(), value in arb_json()) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let d = dispatcher();
            prop_assert_eq!(get(&d, &key).await.map_err(fail)?, OperationOutcome::NoContent);

            let removed = d
                .dispatch(OperationRequest::new("books_remove", HttpVerb::Delete).with_key(key.clone()))
                .await
                .map_err(fail)?;
            prop_assert_eq!(removed, OperationOutcome::NoContent);

            let replaced = d
                .dispatch(
                    OperationRequest::new("books_replace", HttpVerb::Put)
                        .with_key(key.clone())
                        .with_payload(envelope("entity", value)),
                )
                .await
                .map_err(fail)?;
            prop_assert_eq!(replaced, OperationOutcome::NoContent);
            prop_assert_eq!(get(&d, &key).await.map_err(fail)?, OperationOutcome::NoContent);
            Ok::<(), TestCaseError>(())
        })?;
    }

    /// Remove returns the stored value; a following get misses.
    #[test]
    fn prop_remove_then_get(key in arb_key(), value in arb_json()) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let d = dispatcher();
            let stored = put(&d, &key, "entity", &value).await.map_err(fail)?;

            let removed = d
                .dispatch(OperationRequest::new("books_remove", HttpVerb::Delete).with_key(key.clone()))
                .await
                .map_err(fail)?;
            prop_assert_eq!(removed, stored);
            prop_assert_eq!(get(&d, &key).await.map_err(fail)?, OperationOutcome::NoContent);
            Ok::<(), TestCaseError>(())
        })?;
    }

    /// Without key and filter every operation fails with MissingSelector and
    /// no cache is started.
    #[test]
    fn prop_missing_selector_starts_nothing(
        suffix in arb_operation_suffix(),
        verb in arb_http_verb(),
    ) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let manager = Arc::new(CountingCacheManager::new(["books"]));
            let d = dispatcher_over(Arc::clone(&manager) as Arc<dyn CacheManager>);

            let operation = format!("books_{}", suffix);
            let result = d.dispatch(OperationRequest::new(operation, verb)).await;
            prop_assert_eq!(result.map_err(|e| e.kind()), Err(ErrorKind::MissingSelector));
            prop_assert_eq!(manager.start_count(), 0);
            Ok::<(), TestCaseError>(())
        })?;
    }

    /// A verb other than the operation's own is rejected before any cache
    /// access.
    #[test]
    fn prop_wrong_verb_starts_nothing(
        suffix in arb_operation_suffix(),
        verb in arb_http_verb(),
        key in arb_key(),
    ) {
        prop_assume!(verb != suffix.verb());
        let rt = test_runtime()?;
        rt.block_on(async {
            let manager = Arc::new(CountingCacheManager::new(["books"]));
            let d = dispatcher_over(Arc::clone(&manager) as Arc<dyn CacheManager>);

            let operation = format!("books_{}", suffix);
            let result = d
                .dispatch(OperationRequest::new(operation, verb).with_key(key))
                .await;
            prop_assert_eq!(result.map_err(|e| e.kind()), Err(ErrorKind::UnsupportedOperation));
            prop_assert_eq!(manager.start_count(), 0);
            Ok::<(), TestCaseError>(())
        })?;
    }

    /// Translatable filters always execute and never return more values than
    /// are stored.
    #[test]
    fn prop_translatable_filters_execute(filter in arb_translatable_filter()) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let d = dispatcher();
            let books = cachet_test_utils::fixtures::sample_books();
            for (key, value) in &books {
                put(&d, key, "entity", value).await.map_err(fail)?;
            }

            let outcome = d
                .dispatch(OperationRequest::new("books_get", HttpVerb::Get).with_filter(filter))
                .await
                .map_err(fail)?;
            if let OperationOutcome::Value(joined) = outcome {
                prop_assert!(joined.split('\n').count() <= books.len());
            }
            Ok::<(), TestCaseError>(())
        })?;
    }
}

#[test]
fn suffix_verbs_are_distinct() {
    let verbs: std::collections::BTreeSet<&str> = OperationSuffix::ALL
        .iter()
        .map(|suffix| suffix.verb().as_str())
        .collect();
    assert_eq!(verbs.len(), OperationSuffix::ALL.len());
}
