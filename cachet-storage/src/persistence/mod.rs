//! Write-through persistence for cache containers.
//!
//! A cache may be backed by a [`PersistenceStore`]. Every mutation is written
//! to the store before the in-memory container changes, and starting the cache
//! reloads all stored entries.

pub mod lmdb;

pub use lmdb::{LmdbStore, LmdbStoreError};

use cachet_core::StorageResult;
use std::fmt;

/// Durable key → serialized value storage.
pub trait PersistenceStore: Send + Sync + fmt::Debug {
    /// All stored entries, in key order.
    fn load_all(&self) -> StorageResult<Vec<(String, String)>>;

    /// Insert or overwrite one entry.
    fn write(&self, key: &str, json: &str) -> StorageResult<()>;

    /// Delete one entry; returns whether it existed.
    fn delete(&self, key: &str) -> StorageResult<bool>;

    /// Human-readable location, for logs.
    fn location(&self) -> String;
}
