//! CACHET Storage - Cache Engine
//!
//! Indexed in-memory containers with optional LMDB write-through, the native
//! query model and the filter translator that targets it, and the registry
//! that starts caches lazily and at most once at a time.

pub mod container;
pub mod handle;
pub mod manager;
pub mod persistence;
pub mod query;
pub mod registry;
pub mod translate;

pub use container::IndexedContainer;
pub use handle::{CacheHandle, CacheStats};
pub use manager::{CacheManager, LocalCacheManager};
pub use persistence::{LmdbStore, LmdbStoreError, PersistenceStore};
pub use query::{Bound, NativeQuery, Occur, WildcardPattern};
pub use registry::CacheRegistry;
pub use translate::{FieldKind, FilterTranslator, IndexSchema};
