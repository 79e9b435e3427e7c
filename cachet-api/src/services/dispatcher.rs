//! Operation Dispatcher
//!
//! Routes a (verb, operation name) pair to the matching cache primitive.
//!
//! Validation happens in a fixed order, each step before any cache access
//! that depends on it:
//! 1. a `key` or a filter must be present
//! 2. the operation must be a generated one and be invoked with its verb
//! 3. put/replace need a well-formed envelope payload
//! 4. put/remove/replace need a `key`
//!
//! Cache work runs on the blocking pool under the operation deadline.

use std::sync::Arc;
use std::time::{Duration, Instant};

use cachet_core::{
    parse_filter, CachedValue, CachetConfig, CachetError, CachetResult, DispatchError, FilterError,
    FilterNode, HttpVerb, OperationName, OperationSuffix, StorageError, StorageResult,
};
use cachet_storage::{CacheRegistry, FilterTranslator, IndexSchema};
use tracing::{debug, warn};

use crate::services::metadata::MetadataSynthesizer;
use crate::services::payload::extract_json_value;
use crate::telemetry::METRICS;

// ============================================================================
// REQUEST / OUTCOME
// ============================================================================

/// Where a request's predicate comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterSource {
    /// Raw `$filter` text, parsed only on the filter path.
    Expression(String),
    /// An already built predicate.
    Predicate(FilterNode),
}

impl FilterSource {
    pub fn into_predicate(self) -> Result<FilterNode, FilterError> {
        match self {
            FilterSource::Expression(source) => parse_filter(&source),
            FilterSource::Predicate(node) => Ok(node),
        }
    }
}

impl From<FilterNode> for FilterSource {
    fn from(node: FilterNode) -> Self {
        FilterSource::Predicate(node)
    }
}

impl From<String> for FilterSource {
    fn from(source: String) -> Self {
        FilterSource::Expression(source)
    }
}

impl From<&str> for FilterSource {
    fn from(source: &str) -> Self {
        FilterSource::Expression(source.to_string())
    }
}

/// Post-filter query options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// `$top`
    pub top: Option<usize>,
    /// `$skip`
    pub skip: Option<usize>,
    /// `$orderby`; rejected.
    pub order_by: Option<String>,
}

/// One operation invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationRequest {
    pub operation: String,
    pub verb: HttpVerb,
    pub key: Option<String>,
    pub payload: Option<Vec<u8>>,
    pub filter: Option<FilterSource>,
    pub options: QueryOptions,
}

impl OperationRequest {
    pub fn new(operation: impl Into<String>, verb: HttpVerb) -> Self {
        Self {
            operation: operation.into(),
            verb,
            key: None,
            payload: None,
            filter: None,
            options: QueryOptions::default(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    pub fn with_filter(mut self, filter: impl Into<FilterSource>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }
}

/// Result of a successful dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    /// Serialized value(s); filtered gets join values with `\n`.
    Value(String),
    /// Nothing stored under the key, or nothing matched.
    NoContent,
}

impl OperationOutcome {
    fn from_stored(value: Option<Arc<CachedValue>>) -> Self {
        match value {
            Some(value) => OperationOutcome::Value(value.json().to_string()),
            None => OperationOutcome::NoContent,
        }
    }
}

// ============================================================================
// DISPATCHER
// ============================================================================

/// Validates requests and runs them against the registry.
#[derive(Debug)]
pub struct OperationDispatcher {
    registry: Arc<CacheRegistry>,
    metadata: Arc<MetadataSynthesizer>,
    index_schema: IndexSchema,
    operation_timeout: Duration,
    max_results: usize,
}

impl OperationDispatcher {
    pub fn new(
        registry: Arc<CacheRegistry>,
        metadata: Arc<MetadataSynthesizer>,
        operation_timeout: Duration,
        max_results: usize,
    ) -> Self {
        Self {
            registry,
            metadata,
            index_schema: IndexSchema::cache_entry(),
            operation_timeout,
            max_results,
        }
    }

    pub fn from_config(
        registry: Arc<CacheRegistry>,
        metadata: Arc<MetadataSynthesizer>,
        config: &CachetConfig,
    ) -> Self {
        Self::new(
            registry,
            metadata,
            Duration::from_millis(config.operation_timeout_ms),
            config.max_results,
        )
    }

    /// Run one operation.
    pub async fn dispatch(&self, request: OperationRequest) -> CachetResult<OperationOutcome> {
        let start = Instant::now();
        let (cache_label, operation_label) = self.metric_labels(&request.operation);

        debug!(
            operation = %request.operation,
            verb = %request.verb,
            has_key = request.key.is_some(),
            has_filter = request.filter.is_some(),
            "Dispatching operation"
        );

        let result = self.dispatch_validated(request).await;

        if let Ok(metrics) = METRICS.as_ref() {
            metrics.record_cache_operation(
                operation_label,
                &cache_label,
                result.is_ok(),
                start.elapsed().as_secs_f64(),
            );
        }
        if let Err(e) = &result {
            debug!(error = %e, kind = ?e.kind(), "Operation rejected");
        }
        result
    }

    async fn dispatch_validated(&self, request: OperationRequest) -> CachetResult<OperationOutcome> {
        let OperationRequest {
            operation,
            verb,
            key,
            payload,
            filter,
            options,
        } = request;

        if key.is_none() && filter.is_none() {
            return Err(DispatchError::MissingSelector {
                operation,
                verb: verb.to_string(),
            }
            .into());
        }

        let schema = self.metadata.schema()?;
        let descriptor = match schema.find_operation(&operation) {
            Some(descriptor) if descriptor.verb == verb => descriptor,
            _ => {
                return Err(DispatchError::UnsupportedOperation {
                    operation,
                    verb: verb.to_string(),
                }
                .into())
            }
        };
        let cache = descriptor.entity_set.as_str();
        let suffix = descriptor.suffix;

        if options.order_by.is_some() {
            return Err(DispatchError::NotImplemented {
                option: "$orderby".to_string(),
            }
            .into());
        }

        let value = if suffix.requires_payload() {
            Some(extract_json_value(
                &operation,
                payload.as_deref().unwrap_or_default(),
            )?)
        } else {
            None
        };

        let key = match key {
            Some(key) => key,
            None if suffix.requires_key() => {
                return Err(DispatchError::KeyRequired {
                    operation,
                    verb: verb.to_string(),
                }
                .into())
            }
            None => {
                let filter = filter.ok_or_else(|| DispatchError::MissingSelector {
                    operation: operation.clone(),
                    verb: verb.to_string(),
                })?;
                return self.get_by_filter(cache, filter, &options).await;
            }
        };

        let handle = self.registry.resolve(cache).await?;
        let stored = match (suffix, value) {
            (OperationSuffix::Get, _) => {
                self.run_blocking(cache, suffix, move || handle.get(&key))
                    .await?
            }
            (OperationSuffix::Remove, _) => {
                self.run_blocking(cache, suffix, move || handle.remove(&key))
                    .await?
            }
            (OperationSuffix::Put, Some(value)) => {
                self.run_blocking(cache, suffix, move || {
                    handle.put(&key, value)?;
                    handle.get(&key)
                })
                .await?
            }
            (OperationSuffix::Replace, Some(value)) => {
                self.run_blocking(cache, suffix, move || {
                    handle.replace(&key, value)?;
                    handle.get(&key)
                })
                .await?
            }
            (OperationSuffix::Put | OperationSuffix::Replace, None) => {
                return Err(DispatchError::InvalidPayload {
                    operation,
                    reason: "payload is missing".to_string(),
                }
                .into())
            }
        };

        Ok(OperationOutcome::from_stored(stored))
    }

    async fn get_by_filter(
        &self,
        cache: &str,
        filter: FilterSource,
        options: &QueryOptions,
    ) -> CachetResult<OperationOutcome> {
        // Translate before touching the cache so rejected filters never start it.
        let predicate = filter.into_predicate()?;
        let query = FilterTranslator::translate(&predicate, &self.index_schema)?;
        debug!(cache = %cache, query = %query, "Translated filter");

        let handle = self.registry.resolve(cache).await?;
        let matches = self
            .run_blocking(cache, OperationSuffix::Get, move || handle.query(&query))
            .await?;

        let skip = options.skip.unwrap_or(0);
        let take = options
            .top
            .map_or(self.max_results, |top| top.min(self.max_results));

        let selected: Vec<&str> = matches
            .iter()
            .skip(skip)
            .take(take)
            .map(|value| value.json())
            .collect();

        let requested = options.top.unwrap_or(usize::MAX);
        if requested > self.max_results && matches.len().saturating_sub(skip) > self.max_results {
            warn!(
                cache = %cache,
                matched = matches.len(),
                skip,
                max_results = self.max_results,
                "Filtered get truncated at max_results"
            );
        }
        debug!(
            cache = %cache,
            matched = matches.len(),
            returned = selected.len(),
            "Filtered get"
        );

        if selected.is_empty() {
            Ok(OperationOutcome::NoContent)
        } else {
            Ok(OperationOutcome::Value(selected.join("\n")))
        }
    }

    async fn run_blocking<T, F>(
        &self,
        cache: &str,
        suffix: OperationSuffix,
        work: F,
    ) -> CachetResult<T>
    where
        F: FnOnce() -> StorageResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let task = tokio::task::spawn_blocking(work);
        match tokio::time::timeout(self.operation_timeout, task).await {
            Ok(Ok(result)) => result.map_err(CachetError::from),
            Ok(Err(e)) => Err(StorageError::Persistence {
                cache: cache.to_string(),
                reason: format!("cache task failed: {}", e),
            }
            .into()),
            Err(_) => {
                let timeout_ms = self.operation_timeout.as_millis() as u64;
                warn!(cache = %cache, operation = %suffix, timeout_ms, "Cache operation timed out");
                Err(StorageError::OperationTimedOut {
                    cache: cache.to_string(),
                    operation: suffix.to_string(),
                    timeout_ms,
                }
                .into())
            }
        }
    }

    /// Bounded metric labels: unknown caches and suffixes collapse.
    fn metric_labels(&self, operation: &str) -> (String, &'static str) {
        match OperationName::parse(operation) {
            Some(name) if self.registry.contains(&name.cache) => (name.cache, name.suffix.as_str()),
            Some(name) => ("unknown".to_string(), name.suffix.as_str()),
            None => ("unknown".to_string(), "unknown"),
        }
    }
}
