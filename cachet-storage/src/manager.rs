//! Cache managers: the component that knows which caches exist and how to
//! start them.

use async_trait::async_trait;
use cachet_core::{CacheStorage, CachetConfig, StorageError, StorageResult};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

use crate::handle::CacheHandle;
use crate::persistence::LmdbStore;

/// Source of cache names and cache handles.
///
/// `start_cache` may perform slow I/O. It is called at most once per name at
/// a time; the registry takes care of that.
#[async_trait]
pub trait CacheManager: Send + Sync + 'static {
    /// Names of every configured cache.
    fn cache_names(&self) -> BTreeSet<String>;

    /// Create and start the named cache.
    async fn start_cache(&self, name: &str) -> StorageResult<CacheHandle>;
}

/// Manager for caches hosted in this process.
#[derive(Debug, Clone)]
pub struct LocalCacheManager {
    definitions: BTreeMap<String, CacheStorage>,
}

impl LocalCacheManager {
    pub fn new(config: &CachetConfig) -> Self {
        Self {
            definitions: config
                .caches
                .iter()
                .map(|c| (c.name.clone(), c.storage.clone()))
                .collect(),
        }
    }

    /// A manager for memory-only caches with the given names.
    pub fn in_memory<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(&CachetConfig::in_memory(names))
    }
}

#[async_trait]
impl CacheManager for LocalCacheManager {
    fn cache_names(&self) -> BTreeSet<String> {
        self.definitions.keys().cloned().collect()
    }

    async fn start_cache(&self, name: &str) -> StorageResult<CacheHandle> {
        let storage = self
            .definitions
            .get(name)
            .ok_or_else(|| StorageError::UnknownCache {
                name: name.to_string(),
            })?;

        match storage {
            CacheStorage::Memory => {
                debug!(cache = %name, "Creating in-memory cache");
                Ok(CacheHandle::in_memory(name))
            }
            CacheStorage::Lmdb { path, max_size_mb } => {
                let owned = name.to_string();
                let path = path.clone();
                let max_size_mb = *max_size_mb;

                let handle = tokio::task::spawn_blocking(move || {
                    let store = LmdbStore::open(&owned, &path, max_size_mb).map_err(|e| {
                        StorageError::StartFailed {
                            name: owned.clone(),
                            reason: e.to_string(),
                        }
                    })?;
                    CacheHandle::with_persistence(owned.clone(), Box::new(store))
                })
                .await
                .map_err(|e| StorageError::StartFailed {
                    name: name.to_string(),
                    reason: e.to_string(),
                })??;

                info!(
                    cache = %name,
                    entries = handle.len().unwrap_or(0),
                    "Reloaded persistent cache"
                );
                Ok(handle)
            }
        }
    }
}
