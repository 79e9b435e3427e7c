//! LMDB-backed persistence store.
//!
//! Uses the heed crate (Rust bindings for LMDB). Each cache gets its own
//! environment directory holding a single unnamed database of
//! `key → serialized value` strings.
//!
//! LMDB provides ACID transactions: read transactions for loading, one write
//! transaction per mutation.

use std::fmt;
use std::path::{Path, PathBuf};

use cachet_core::{StorageError, StorageResult};
use heed::types::Str;
use heed::{Database, Env, EnvOpenOptions};

/// Error type for LMDB store operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbStoreError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// LMDB store for one cache.
pub struct LmdbStore {
    cache: String,
    path: PathBuf,
    env: Env,
    db: Database<Str, Str>,
}

impl fmt::Debug for LmdbStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LmdbStore")
            .field("cache", &self.cache)
            .field("path", &self.path)
            .finish()
    }
}

impl LmdbStore {
    /// Open (or create) the store for `cache` under `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory cannot be created
    /// - LMDB environment cannot be opened
    /// - Database cannot be created
    pub fn open<P: AsRef<Path>>(
        cache: &str,
        path: P,
        max_size_mb: usize,
    ) -> Result<Self, LmdbStoreError> {
        std::fs::create_dir_all(&path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbStoreError::EnvOpen(e.to_string()))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        let db: Database<Str, Str> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbStoreError::DbOpen(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        Ok(Self {
            cache: cache.to_string(),
            path: path.as_ref().to_path_buf(),
            env,
            db,
        })
    }

    fn storage_error(&self, e: LmdbStoreError) -> StorageError {
        StorageError::Persistence {
            cache: self.cache.clone(),
            reason: e.to_string(),
        }
    }

    fn txn_error(&self, e: heed::Error) -> StorageError {
        self.storage_error(LmdbStoreError::Transaction(e.to_string()))
    }
}

impl super::PersistenceStore for LmdbStore {
    fn load_all(&self) -> StorageResult<Vec<(String, String)>> {
        let rtxn = self.env.read_txn().map_err(|e| self.txn_error(e))?;
        let iter = self.db.iter(&rtxn).map_err(|e| self.txn_error(e))?;

        let mut entries = Vec::new();
        for result in iter {
            let (key, value) = result.map_err(|e| self.txn_error(e))?;
            entries.push((key.to_string(), value.to_string()));
        }
        Ok(entries)
    }

    fn write(&self, key: &str, json: &str) -> StorageResult<()> {
        let mut wtxn = self.env.write_txn().map_err(|e| self.txn_error(e))?;
        self.db
            .put(&mut wtxn, key, json)
            .map_err(|e| self.txn_error(e))?;
        wtxn.commit().map_err(|e| self.txn_error(e))
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        let mut wtxn = self.env.write_txn().map_err(|e| self.txn_error(e))?;
        let deleted = self
            .db
            .delete(&mut wtxn, key)
            .map_err(|e| self.txn_error(e))?;
        wtxn.commit().map_err(|e| self.txn_error(e))?;
        Ok(deleted)
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::super::PersistenceStore;
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (LmdbStore, TempDir) {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        let store =
            LmdbStore::open("books", temp_dir.path(), 10).expect("store creation should succeed");
        (store, temp_dir)
    }

    #[test]
    fn test_write_load_delete() {
        let (store, _temp_dir) = create_test_store();

        store.write("b", r#"{"n":2}"#).expect("write should succeed");
        store.write("a", r#"{"n":1}"#).expect("write should succeed");
        store.write("a", r#"{"n":3}"#).expect("overwrite should succeed");

        let entries = store.load_all().expect("load should succeed");
        assert_eq!(
            entries,
            vec![
                ("a".to_string(), r#"{"n":3}"#.to_string()),
                ("b".to_string(), r#"{"n":2}"#.to_string()),
            ]
        );

        assert!(store.delete("a").expect("delete should succeed"));
        assert!(!store.delete("a").expect("delete should succeed"));
        assert_eq!(store.load_all().expect("load should succeed").len(), 1);
    }

    #[test]
    fn test_entries_survive_reopen() {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        {
            let store = LmdbStore::open("books", temp_dir.path(), 10).expect("open should succeed");
            store.write("k", "v").expect("write should succeed");
        }

        let store = LmdbStore::open("books", temp_dir.path(), 10).expect("reopen should succeed");
        assert_eq!(
            store.load_all().expect("load should succeed"),
            vec![("k".to_string(), "v".to_string())]
        );
    }

    #[test]
    fn test_location_is_path() {
        let (store, temp_dir) = create_test_store();
        assert_eq!(store.location(), temp_dir.path().display().to_string());
    }
}
