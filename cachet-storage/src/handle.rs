//! Running cache handles.

use cachet_core::{CachedValue, StorageError, StorageResult};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::container::IndexedContainer;
use crate::persistence::PersistenceStore;
use crate::query::NativeQuery;

/// Statistics about one cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of key lookups that found a value.
    pub hits: u64,
    /// Number of key lookups that found nothing.
    pub misses: u64,
    /// Number of entries currently in the cache.
    pub entry_count: u64,
    /// Whether entries are written through to durable storage.
    pub persistent: bool,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// An opened, running cache.
///
/// All operations are synchronous and may block on persistence I/O; async
/// callers run them on the blocking pool. Mutations are serialized so the
/// durable store and the container see writes in the same order.
#[derive(Debug)]
pub struct CacheHandle {
    name: String,
    container: IndexedContainer,
    persistence: Option<Box<dyn PersistenceStore>>,
    writes: Mutex<()>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheHandle {
    /// A cache held only in memory.
    pub fn in_memory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            container: IndexedContainer::new(),
            persistence: None,
            writes: Mutex::new(()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// A cache written through to `store`, preloaded with its entries.
    pub fn with_persistence(
        name: impl Into<String>,
        store: Box<dyn PersistenceStore>,
    ) -> StorageResult<Self> {
        let mut handle = Self::in_memory(name);
        let stored = store.load_all()?;
        handle
            .container
            .load(stored.into_iter().map(|(key, json)| (key, CachedValue::new(json))))?;
        handle.persistence = Some(store);
        Ok(handle)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_persistent(&self) -> bool {
        self.persistence.is_some()
    }

    /// Fetch one value.
    pub fn get(&self, key: &str) -> StorageResult<Option<Arc<CachedValue>>> {
        let value = self.container.get(key)?;
        let counter = if value.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        Ok(value)
    }

    /// Store a serialized value under `key`, overwriting any previous one.
    pub fn put(&self, key: &str, json: impl Into<String>) -> StorageResult<()> {
        let value = Arc::new(CachedValue::new(json));
        let _guard = self.writes.lock().map_err(|_| StorageError::LockPoisoned)?;
        if let Some(store) = &self.persistence {
            store.write(key, value.json())?;
        }
        self.container.put(key, value)?;
        Ok(())
    }

    /// Remove `key`; returns the removed value, if any.
    pub fn remove(&self, key: &str) -> StorageResult<Option<Arc<CachedValue>>> {
        let _guard = self.writes.lock().map_err(|_| StorageError::LockPoisoned)?;
        if !self.container.contains(key)? {
            return Ok(None);
        }
        if let Some(store) = &self.persistence {
            store.delete(key)?;
        }
        self.container.remove(key)
    }

    /// Overwrite `key` only if it is present; returns whether it was.
    pub fn replace(&self, key: &str, json: impl Into<String>) -> StorageResult<bool> {
        let value = Arc::new(CachedValue::new(json));
        let _guard = self.writes.lock().map_err(|_| StorageError::LockPoisoned)?;
        if !self.container.contains(key)? {
            return Ok(false);
        }
        if let Some(store) = &self.persistence {
            store.write(key, value.json())?;
        }
        Ok(self.container.replace(key, value)?.is_some())
    }

    /// All values matching `query`, in native (key) order.
    pub fn query(&self, query: &NativeQuery) -> StorageResult<Vec<Arc<CachedValue>>> {
        Ok(self
            .container
            .search(query)?
            .into_iter()
            .map(|(_, value)| value)
            .collect())
    }

    pub fn len(&self) -> StorageResult<usize> {
        self.container.len()
    }

    pub fn is_empty(&self) -> StorageResult<bool> {
        self.container.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: self.container.len().unwrap_or(0) as u64,
            persistent: self.is_persistent(),
        }
    }
}
