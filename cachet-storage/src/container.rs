//! In-memory indexed container.

use cachet_core::{CachedValue, StorageError, StorageResult};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::query::NativeQuery;

/// Key → value map with an indexed view. Iteration and search results come
/// back in key order, which is the native result order.
#[derive(Debug, Default)]
pub struct IndexedContainer {
    entries: RwLock<BTreeMap<String, Arc<CachedValue>>>,
}

impl IndexedContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> StorageResult<Option<Arc<CachedValue>>> {
        let entries = self.entries.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(entries.get(key).cloned())
    }

    /// Insert or overwrite; returns the previous value.
    pub fn put(&self, key: &str, value: Arc<CachedValue>) -> StorageResult<Option<Arc<CachedValue>>> {
        let mut entries = self.entries.write().map_err(|_| StorageError::LockPoisoned)?;
        Ok(entries.insert(key.to_string(), value))
    }

    pub fn remove(&self, key: &str) -> StorageResult<Option<Arc<CachedValue>>> {
        let mut entries = self.entries.write().map_err(|_| StorageError::LockPoisoned)?;
        Ok(entries.remove(key))
    }

    /// Overwrite only if the key is present; returns the previous value.
    pub fn replace(
        &self,
        key: &str,
        value: Arc<CachedValue>,
    ) -> StorageResult<Option<Arc<CachedValue>>> {
        let mut entries = self.entries.write().map_err(|_| StorageError::LockPoisoned)?;
        match entries.get_mut(key) {
            Some(slot) => Ok(Some(std::mem::replace(slot, value))),
            None => Ok(None),
        }
    }

    pub fn contains(&self, key: &str) -> StorageResult<bool> {
        let entries = self.entries.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(entries.contains_key(key))
    }

    /// All entries matching `query`, in key order.
    pub fn search(&self, query: &NativeQuery) -> StorageResult<Vec<(String, Arc<CachedValue>)>> {
        let entries = self.entries.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(entries
            .iter()
            .filter(|(_, value)| query.matches(value.document()))
            .map(|(key, value)| (key.clone(), Arc::clone(value)))
            .collect())
    }

    /// Bulk insert, used when reloading persisted entries.
    pub fn load<I>(&self, items: I) -> StorageResult<usize>
    where
        I: IntoIterator<Item = (String, CachedValue)>,
    {
        let mut entries = self.entries.write().map_err(|_| StorageError::LockPoisoned)?;
        let mut loaded = 0;
        for (key, value) in items {
            entries.insert(key, Arc::new(value));
            loaded += 1;
        }
        Ok(loaded)
    }

    pub fn len(&self) -> StorageResult<usize> {
        let entries = self.entries.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(entries.len())
    }

    pub fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }
}
