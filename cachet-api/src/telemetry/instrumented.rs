//! Cache manager decorator that records start attempts as metrics.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use cachet_core::StorageResult;
use cachet_storage::{CacheHandle, CacheManager};

use super::metrics::METRICS;

/// Wraps another manager; every `start_cache` call is timed and counted.
pub struct InstrumentedCacheManager {
    inner: Arc<dyn CacheManager>,
}

impl InstrumentedCacheManager {
    pub fn new(inner: Arc<dyn CacheManager>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl CacheManager for InstrumentedCacheManager {
    fn cache_names(&self) -> BTreeSet<String> {
        self.inner.cache_names()
    }

    async fn start_cache(&self, name: &str) -> StorageResult<CacheHandle> {
        let start = Instant::now();
        let result = self.inner.start_cache(name).await;

        if let Ok(metrics) = METRICS.as_ref() {
            metrics.record_cache_start(name, result.is_ok(), start.elapsed().as_secs_f64());
        }
        if let Err(e) = &result {
            tracing::warn!(cache = %name, error = %e, "Cache start failed");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cachet_core::{StorageError, StorageResult};
    use cachet_storage::LocalCacheManager;

    #[tokio::test]
    async fn test_delegates_to_inner() -> StorageResult<()> {
        let manager =
            InstrumentedCacheManager::new(Arc::new(LocalCacheManager::in_memory(["instrumented_books"])));
        assert!(manager.cache_names().contains("instrumented_books"));

        let handle = manager.start_cache("instrumented_books").await?;
        assert_eq!(handle.name(), "instrumented_books");

        let failures_before = METRICS
            .as_ref()
            .map(|m| {
                m.cache_starts_total
                    .with_label_values(&["instrumented_missing", "error"])
                    .get()
            })
            .unwrap_or(0.0);
        let missing = manager.start_cache("instrumented_missing").await;
        assert!(matches!(missing, Err(StorageError::UnknownCache { .. })));

        if let Ok(metrics) = METRICS.as_ref() {
            let failures = metrics
                .cache_starts_total
                .with_label_values(&["instrumented_missing", "error"])
                .get();
            assert!(failures >= failures_before + 1.0);
        }
        Ok(())
    }
}
