//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use cachet_core::CachetConfig;
use cachet_storage::{CacheManager, CacheRegistry};

use crate::services::{MetadataSynthesizer, OperationDispatcher};

/// Application-wide state shared across all routes.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Cache names and lazily started handles.
    pub registry: Arc<CacheRegistry>,
    /// Cached schema document over the registry's names.
    pub metadata: Arc<MetadataSynthesizer>,
    /// Operation validation and execution.
    pub dispatcher: Arc<OperationDispatcher>,
    pub start_time: Instant,
}

impl AppState {
    /// Wire the registry, schema service and dispatcher over a manager.
    pub fn from_config(config: &CachetConfig, manager: Arc<dyn CacheManager>) -> Self {
        let registry = Arc::new(CacheRegistry::new(
            manager,
            Duration::from_millis(config.start_timeout_ms),
        ));
        let metadata = Arc::new(MetadataSynthesizer::new(
            Arc::clone(&registry),
            config.namespace.clone(),
            config.container_name.clone(),
        ));
        let dispatcher = Arc::new(OperationDispatcher::from_config(
            Arc::clone(&registry),
            Arc::clone(&metadata),
            config,
        ));

        Self {
            registry,
            metadata,
            dispatcher,
            start_time: Instant::now(),
        }
    }
}

crate::impl_from_ref!(Arc<CacheRegistry>, registry);
crate::impl_from_ref!(Arc<MetadataSynthesizer>, metadata);
crate::impl_from_ref!(Arc<OperationDispatcher>, dispatcher);
crate::impl_from_ref!(Instant, start_time);

#[cfg(test)]
mod tests {
    use super::*;
    use cachet_storage::LocalCacheManager;

    #[test]
    fn test_from_config_shares_registry() -> Result<(), String> {
        let config = CachetConfig::in_memory(["books", "movies"]);
        let state = AppState::from_config(&config, Arc::new(LocalCacheManager::new(&config)));

        assert!(state.registry.contains("books"));
        let schema = state.metadata.schema().map_err(|e| e.to_string())?;
        assert!(schema.has_entity_set("movies"));
        Ok(())
    }
}
