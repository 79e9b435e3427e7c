//! Metadata Service
//!
//! Lazily built, cached schema document. The cache is keyed by the set of
//! registered cache names it was built from and rebuilt only when that set
//! changes.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use cachet_core::{SchemaDocument, StorageError, StorageResult};
use cachet_storage::CacheRegistry;
use tracing::debug;

#[derive(Debug)]
struct CachedSchema {
    names: BTreeSet<String>,
    document: Arc<SchemaDocument>,
}

/// Builds and caches the schema document for the registry's caches.
#[derive(Debug)]
pub struct MetadataSynthesizer {
    registry: Arc<CacheRegistry>,
    namespace: String,
    container_name: String,
    cached: RwLock<Option<CachedSchema>>,
    builds: AtomicU64,
}

impl MetadataSynthesizer {
    pub fn new(
        registry: Arc<CacheRegistry>,
        namespace: impl Into<String>,
        container_name: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            namespace: namespace.into(),
            container_name: container_name.into(),
            cached: RwLock::new(None),
            builds: AtomicU64::new(0),
        }
    }

    /// The current schema document.
    pub fn schema(&self) -> StorageResult<Arc<SchemaDocument>> {
        let names = self.registry.names();

        {
            let cached = self.cached.read().map_err(|_| StorageError::LockPoisoned)?;
            if let Some(cached) = cached.as_ref().filter(|c| &c.names == names) {
                return Ok(Arc::clone(&cached.document));
            }
        }

        let mut cached = self.cached.write().map_err(|_| StorageError::LockPoisoned)?;
        // Another caller may have rebuilt while we waited for the write lock.
        if let Some(current) = cached.as_ref().filter(|c| &c.names == names) {
            return Ok(Arc::clone(&current.document));
        }

        let document = Arc::new(SchemaDocument::synthesize(
            &self.namespace,
            &self.container_name,
            names,
        ));
        self.builds.fetch_add(1, Ordering::Relaxed);
        debug!(
            entity_sets = document.entity_sets.len(),
            operations = document.operations.len(),
            "Synthesized schema document"
        );

        *cached = Some(CachedSchema {
            names: names.clone(),
            document: Arc::clone(&document),
        });
        Ok(document)
    }

    /// Drop the cached document; the next `schema` call rebuilds it.
    pub fn invalidate(&self) -> StorageResult<()> {
        let mut cached = self.cached.write().map_err(|_| StorageError::LockPoisoned)?;
        *cached = None;
        Ok(())
    }

    /// Number of times the document has been built.
    pub fn build_count(&self) -> u64 {
        self.builds.load(Ordering::Relaxed)
    }
}
