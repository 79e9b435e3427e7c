//! Cache registry with single-flight start.
//!
//! The registry owns the fixed set of cache names and the lazily started
//! handles. Each name maps to a slot that is either a ready handle or one
//! in-flight start shared by every concurrent caller, so a cache is started
//! at most once at a time no matter how many requests race for it.

use cachet_core::{StorageError, StorageResult};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};

use crate::handle::{CacheHandle, CacheStats};
use crate::manager::CacheManager;

type StartFuture = Shared<BoxFuture<'static, Result<Arc<CacheHandle>, StorageError>>>;

enum Slot {
    Ready(Arc<CacheHandle>),
    Starting { attempt: u64, future: StartFuture },
}

/// Name → handle registry.
pub struct CacheRegistry {
    manager: Arc<dyn CacheManager>,
    names: BTreeSet<String>,
    slots: Mutex<HashMap<String, Slot>>,
    start_timeout: Duration,
    attempts: AtomicU64,
}

impl std::fmt::Debug for CacheRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheRegistry")
            .field("names", &self.names)
            .field("start_timeout", &self.start_timeout)
            .finish()
    }
}

impl CacheRegistry {
    /// Build a registry over the manager's configured caches. The name set is
    /// fixed from here on.
    pub fn new(manager: Arc<dyn CacheManager>, start_timeout: Duration) -> Self {
        let names = manager.cache_names();
        Self {
            manager,
            names,
            slots: Mutex::new(HashMap::new()),
            start_timeout,
            attempts: AtomicU64::new(0),
        }
    }

    /// All registered cache names.
    pub fn names(&self) -> &BTreeSet<String> {
        &self.names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Resolve a cache, starting it on first access.
    ///
    /// Concurrent callers for the same name share one start attempt and all
    /// observe its handle or its failure. A failed start leaves no trace; the
    /// next call tries again.
    pub async fn resolve(&self, name: &str) -> StorageResult<Arc<CacheHandle>> {
        if !self.names.contains(name) {
            return Err(StorageError::UnknownCache {
                name: name.to_string(),
            });
        }

        let (attempt, future) = {
            let mut slots = self.slots.lock().map_err(|_| StorageError::LockPoisoned)?;
            match slots.get(name) {
                Some(Slot::Ready(handle)) => return Ok(Arc::clone(handle)),
                Some(Slot::Starting { attempt, future }) => (*attempt, future.clone()),
                None => {
                    let attempt = self.attempts.fetch_add(1, Ordering::Relaxed);
                    let future = self.start_future(name);
                    slots.insert(
                        name.to_string(),
                        Slot::Starting {
                            attempt,
                            future: future.clone(),
                        },
                    );
                    (attempt, future)
                }
            }
        };

        let result = future.await;

        let mut slots = self.slots.lock().map_err(|_| StorageError::LockPoisoned)?;
        let owns_slot = matches!(
            slots.get(name),
            Some(Slot::Starting { attempt: current, .. }) if *current == attempt
        );
        if owns_slot {
            match &result {
                Ok(handle) => {
                    slots.insert(name.to_string(), Slot::Ready(Arc::clone(handle)));
                }
                Err(_) => {
                    slots.remove(name);
                }
            }
        }

        result
    }

    fn start_future(&self, name: &str) -> StartFuture {
        let manager = Arc::clone(&self.manager);
        let name = name.to_string();
        let timeout = self.start_timeout;

        async move {
            info!(cache = %name, "Starting cache");
            match tokio::time::timeout(timeout, manager.start_cache(&name)).await {
                Ok(Ok(handle)) => {
                    info!(cache = %name, "Cache started");
                    Ok(Arc::new(handle))
                }
                Ok(Err(e)) => {
                    warn!(cache = %name, error = %e, "Cache failed to start");
                    Err(e)
                }
                Err(_) => {
                    let timeout_ms = timeout.as_millis() as u64;
                    warn!(cache = %name, timeout_ms, "Cache start timed out");
                    Err(StorageError::StartTimedOut { name, timeout_ms })
                }
            }
        }
        .boxed()
        .shared()
    }

    /// Names of caches that are started, without starting any.
    pub fn started_names(&self) -> StorageResult<BTreeSet<String>> {
        let slots = self.slots.lock().map_err(|_| StorageError::LockPoisoned)?;
        Ok(slots
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Ready(_)))
            .map(|(name, _)| name.clone())
            .collect())
    }

    /// Statistics of a started cache; `None` if it has not started.
    pub fn stats(&self, name: &str) -> StorageResult<Option<CacheStats>> {
        let slots = self.slots.lock().map_err(|_| StorageError::LockPoisoned)?;
        Ok(match slots.get(name) {
            Some(Slot::Ready(handle)) => Some(handle.stats()),
            _ => None,
        })
    }

    /// Statistics of every started cache.
    pub fn all_stats(&self) -> StorageResult<BTreeMap<String, CacheStats>> {
        let slots = self.slots.lock().map_err(|_| StorageError::LockPoisoned)?;
        Ok(slots
            .iter()
            .filter_map(|(name, slot)| match slot {
                Slot::Ready(handle) => Some((name.clone(), handle.stats())),
                Slot::Starting { .. } => None,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    /// Counts starts; optionally slow, optionally failing the first N starts.
    struct CountingManager {
        names: BTreeSet<String>,
        starts: AtomicUsize,
        delay: Duration,
        fail_first: usize,
    }

    impl CountingManager {
        fn new(delay: Duration, fail_first: usize) -> Self {
            Self {
                names: ["books".to_string()].into_iter().collect(),
                starts: AtomicUsize::new(0),
                delay,
                fail_first,
            }
        }

        fn starts(&self) -> usize {
            self.starts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CacheManager for CountingManager {
        fn cache_names(&self) -> BTreeSet<String> {
            self.names.clone()
        }

        async fn start_cache(&self, name: &str) -> StorageResult<CacheHandle> {
            let n = self.starts.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if n < self.fail_first {
                return Err(StorageError::StartFailed {
                    name: name.to_string(),
                    reason: "injected".to_string(),
                });
            }
            Ok(CacheHandle::in_memory(name))
        }
    }

    fn registry(manager: &Arc<CountingManager>, timeout: Duration) -> CacheRegistry {
        CacheRegistry::new(Arc::clone(manager) as Arc<dyn CacheManager>, timeout)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_resolve_starts_once() {
        let manager = Arc::new(CountingManager::new(Duration::from_millis(50), 0));
        let registry = Arc::new(registry(&manager, Duration::from_secs(5)));

        let mut tasks = Vec::new();
        for _ in 0..32 {
            let registry = Arc::clone(&registry);
            tasks.push(tokio::spawn(async move { registry.resolve("books").await }));
        }

        let mut handles = Vec::new();
        for task in tasks {
            handles.push(task.await.expect("task should not panic").expect("resolve should succeed"));
        }

        assert_eq!(manager.starts(), 1);
        assert!(handles.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(
            registry.started_names().expect("lock should be healthy"),
            ["books".to_string()].into_iter().collect()
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_share_failure_then_retry() {
        let manager = Arc::new(CountingManager::new(Duration::from_millis(200), 1));
        let registry = Arc::new(registry(&manager, Duration::from_secs(5)));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let registry = Arc::clone(&registry);
            tasks.push(tokio::spawn(async move { registry.resolve("books").await }));
        }
        for task in tasks {
            let result = task.await.expect("task should not panic");
            assert!(matches!(result, Err(StorageError::StartFailed { .. })));
        }
        assert_eq!(manager.starts(), 1);
        assert!(registry.started_names().expect("lock should be healthy").is_empty());

        registry.resolve("books").await.expect("retry should succeed");
        assert_eq!(manager.starts(), 2);
    }

    #[tokio::test]
    async fn test_start_timeout() {
        let manager = Arc::new(CountingManager::new(Duration::from_millis(500), 0));
        let registry = registry(&manager, Duration::from_millis(20));

        let result = registry.resolve("books").await;
        assert_eq!(
            result.err(),
            Some(StorageError::StartTimedOut {
                name: "books".to_string(),
                timeout_ms: 20
            })
        );
        assert!(registry.stats("books").expect("lock should be healthy").is_none());
    }

    #[tokio::test]
    async fn test_unknown_name_never_starts() {
        let manager = Arc::new(CountingManager::new(Duration::ZERO, 0));
        let registry = registry(&manager, Duration::from_secs(1));

        assert!(matches!(
            registry.resolve("movies").await,
            Err(StorageError::UnknownCache { .. })
        ));
        assert_eq!(manager.starts(), 0);
    }

    #[tokio::test]
    async fn test_ready_handle_is_reused() {
        let manager = Arc::new(CountingManager::new(Duration::ZERO, 0));
        let registry = registry(&manager, Duration::from_secs(1));

        let a = registry.resolve("books").await.expect("resolve should succeed");
        let b = registry.resolve("books").await.expect("resolve should succeed");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(manager.starts(), 1);
        assert!(registry.stats("books").expect("lock should be healthy").is_some());
        assert_eq!(registry.all_stats().expect("lock should be healthy").len(), 1);
    }
}
