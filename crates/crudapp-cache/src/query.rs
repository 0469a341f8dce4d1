use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, warn};

/// Counters describing how a [`QueryCache`] has been used.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub fetch_errors: u64,
    pub invalidations: u64,
}

struct Slot<V> {
    value: Option<V>,
    /// Bumped on every invalidation of this key.
    generation: u64,
    stale: bool,
}

struct Slots<K, V> {
    by_key: HashMap<K, Slot<V>>,
    /// Bumped whenever a key with no slot is invalidated, or on `clear`.
    untracked_invalidations: u64,
}

/// What a fetch saw when it started; its result is stored only if this still holds.
#[derive(Clone, Copy, Debug)]
enum FetchGuard {
    Tracked(u64),
    Untracked(u64),
}

/// Keyed read-through cache.
///
/// A fresh cached value is returned without calling the fetcher. A miss or
/// an invalidated key runs the fetcher; a successful result is stored only
/// if the key was not invalidated while the fetch was in flight, so a fetch
/// that started before a write cannot overwrite the post-write refetch.
/// A failed fetch stores nothing and keeps any earlier value readable via
/// [`QueryCache::get_cached`].
///
/// Concurrent misses on the same key each run their own fetch.
pub struct QueryCache<K, V> {
    slots: RwLock<Slots<K, V>>,
    hits: AtomicU64,
    misses: AtomicU64,
    fetch_errors: AtomicU64,
    invalidations: AtomicU64,
}

impl<K, V> QueryCache<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(Slots { by_key: HashMap::new(), untracked_invalidations: 0 }),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            fetch_errors: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
        }
    }

    // A panic while holding the lock cannot leave a slot half-written, so a
    // poisoned map is still consistent.
    fn read(&self) -> RwLockReadGuard<'_, Slots<K, V>> {
        self.slots.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Slots<K, V>> {
        self.slots.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the fresh cached value for `key`, or run `fetch` and cache its result.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: &K, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: fmt::Display,
    {
        let guard = {
            let slots = self.read();
            match slots.by_key.get(key) {
                Some(Slot { value: Some(value), stale: false, .. }) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(?key, "cache hit");
                    return Ok(value.clone());
                }
                Some(slot) => FetchGuard::Tracked(slot.generation),
                None => FetchGuard::Untracked(slots.untracked_invalidations),
            }
        };
        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(?key, ?guard, "cache miss, fetching");

        match fetch().await {
            Ok(value) => {
                let mut slots = self.write();
                let untracked = slots.untracked_invalidations;
                let current = slots.by_key.get(key).map(|slot| slot.generation);
                let unchanged = match (guard, current) {
                    (FetchGuard::Tracked(started), Some(now)) => started == now,
                    (FetchGuard::Tracked(_), None) => false,
                    // A slot created by a concurrent fetch and never invalidated is at 0.
                    (FetchGuard::Untracked(started), now) => started == untracked && now.unwrap_or(0) == 0,
                };
                if unchanged {
                    let slot = slots.by_key.entry(key.clone()).or_insert(Slot {
                        value: None,
                        generation: 0,
                        stale: true,
                    });
                    slot.value = Some(value.clone());
                    slot.stale = false;
                } else {
                    debug!(?key, "key invalidated during fetch, result not cached");
                }
                Ok(value)
            }
            Err(e) => {
                self.fetch_errors.fetch_add(1, Ordering::Relaxed);
                warn!(?key, error = %e, "fetch failed, cached value left untouched");
                Err(e)
            }
        }
    }

    /// Last successfully fetched value, fresh or not.
    pub fn get_cached(&self, key: &K) -> Option<V> {
        self.read().by_key.get(key).and_then(|slot| slot.value.clone())
    }

    /// Whether the next [`get_or_fetch`](Self::get_or_fetch) for `key` will hit.
    pub fn is_fresh(&self, key: &K) -> bool {
        matches!(self.read().by_key.get(key), Some(Slot { value: Some(_), stale: false, .. }))
    }

    /// Force the next read of `key` to refetch.
    ///
    /// A key that was never cached gets no slot; fetches already in flight
    /// for such keys are still kept from storing their result.
    pub fn invalidate(&self, key: &K) {
        let mut guard = self.write();
        let slots = &mut *guard;
        self.invalidations.fetch_add(1, Ordering::Relaxed);
        match slots.by_key.get_mut(key) {
            Some(slot) => {
                slot.generation += 1;
                slot.stale = true;
                debug!(?key, generation = slot.generation, "cache key invalidated");
            }
            None => {
                slots.untracked_invalidations += 1;
                debug!(?key, "uncached key invalidated");
            }
        }
    }

    /// Invalidate every key matching `predicate`. Returns how many were marked.
    pub fn invalidate_where(&self, mut predicate: impl FnMut(&K) -> bool) -> usize {
        let mut slots = self.write();
        let mut count = 0;
        for (key, slot) in slots.by_key.iter_mut().filter(|(k, _)| predicate(k)) {
            slot.generation += 1;
            slot.stale = true;
            count += 1;
            debug!(?key, "cache key invalidated");
        }
        self.invalidations.fetch_add(count as u64, Ordering::Relaxed);
        count
    }

    /// Drop every cached value. In-flight fetches will not repopulate.
    pub fn clear(&self) {
        let mut slots = self.write();
        let n = slots.by_key.len();
        slots.by_key.clear();
        slots.untracked_invalidations += 1;
        self.invalidations.fetch_add(n as u64, Ordering::Relaxed);
        debug!(keys = n, "cache cleared");
    }

    /// Number of keys holding a value.
    pub fn len(&self) -> usize {
        self.read().by_key.values().filter(|s| s.value.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            fetch_errors: self.fetch_errors.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }
}

impl<K, V> Default for QueryCache<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for QueryCache<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug,
    V: Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCache")
            .field("len", &self.len())
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    use super::*;

    type Cache = QueryCache<&'static str, u32>;

    async fn ok(v: u32) -> Result<u32, String> {
        Ok(v)
    }

    async fn fail() -> Result<u32, String> {
        Err("boom".into())
    }

    #[tokio::test]
    async fn second_read_hits_cache() {
        let cache = Cache::new();
        let calls = AtomicUsize::new(0);
        for _ in 0..3 {
            let v = cache
                .get_or_fetch(&"list", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(7)
                })
                .await
                .unwrap();
            assert_eq!(v, 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().hits, 2);
        assert_eq!(cache.stats().misses, 1);
    }

    #[tokio::test]
    async fn invalidate_forces_refetch() {
        let cache = Cache::new();
        cache.get_or_fetch(&"list", || ok(1)).await.unwrap();
        cache.invalidate(&"list");
        assert!(!cache.is_fresh(&"list"));
        assert_eq!(cache.get_or_fetch(&"list", || ok(2)).await.unwrap(), 2);
        assert_eq!(cache.get_cached(&"list"), Some(2));
        assert!(cache.is_fresh(&"list"));
    }

    #[tokio::test]
    async fn failed_fetch_keeps_previous_value() {
        let cache = Cache::new();
        cache.get_or_fetch(&"list", || ok(1)).await.unwrap();
        cache.invalidate(&"list");
        assert_eq!(cache.get_or_fetch(&"list", fail).await.unwrap_err(), "boom");
        assert_eq!(cache.get_cached(&"list"), Some(1));
        assert_eq!(cache.stats().fetch_errors, 1);
    }

    #[tokio::test]
    async fn failed_first_fetch_caches_nothing() {
        let cache = Cache::new();
        assert!(cache.get_or_fetch(&"one", fail).await.is_err());
        assert_eq!(cache.get_cached(&"one"), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let cache = Cache::new();
        cache.get_or_fetch(&"a", || ok(1)).await.unwrap();
        cache.get_or_fetch(&"b", || ok(2)).await.unwrap();
        cache.invalidate(&"a");
        assert!(cache.is_fresh(&"b"));
        assert!(!cache.is_fresh(&"a"));
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn invalidation_during_fetch_discards_result() {
        let cache = Arc::new(Cache::new());
        let (started_tx, started_rx) = tokio::sync::oneshot::channel::<()>();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        let slow = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .get_or_fetch(&"list", || async move {
                        let _ = started_tx.send(());
                        let _ = release_rx.await;
                        Ok::<_, String>(1)
                    })
                    .await
            })
        };
        started_rx.await.unwrap();
        cache.invalidate(&"list");
        release_tx.send(()).unwrap();

        // The caller still gets its value, but it is not cached.
        assert_eq!(slow.await.unwrap().unwrap(), 1);
        assert_eq!(cache.get_cached(&"list"), None);
        assert_eq!(cache.get_or_fetch(&"list", || ok(2)).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn invalidate_where_matches_subset() {
        let cache: QueryCache<(u8, Option<u8>), u32> = QueryCache::new();
        cache.get_or_fetch(&(1, None), || ok(1)).await.unwrap();
        cache.get_or_fetch(&(1, Some(9)), || ok(2)).await.unwrap();
        cache.get_or_fetch(&(2, None), || ok(3)).await.unwrap();
        assert_eq!(cache.invalidate_where(|(cluster, _)| *cluster == 1), 2);
        assert!(cache.is_fresh(&(2, None)));
        assert!(!cache.is_fresh(&(1, Some(9))));
    }

    #[tokio::test]
    async fn invalidating_uncached_keys_adds_no_slots() {
        let cache = Cache::new();
        for key in ["a", "b", "c"] {
            cache.invalidate(&key);
        }
        assert_eq!(cache.read().by_key.len(), 0);
        assert_eq!(cache.stats().invalidations, 3);
        assert_eq!(cache.get_or_fetch(&"a", || ok(1)).await.unwrap(), 1);
        assert!(cache.is_fresh(&"a"));
    }

    #[tokio::test]
    async fn clear_during_fetch_discards_result() {
        let cache = Arc::new(Cache::new());
        cache.get_or_fetch(&"list", || ok(1)).await.unwrap();
        cache.invalidate(&"list");
        let (started_tx, started_rx) = tokio::sync::oneshot::channel::<()>();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        let slow = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .get_or_fetch(&"list", || async move {
                        let _ = started_tx.send(());
                        let _ = release_rx.await;
                        Ok::<_, String>(2)
                    })
                    .await
            })
        };
        started_rx.await.unwrap();
        cache.clear();
        release_tx.send(()).unwrap();

        assert_eq!(slow.await.unwrap().unwrap(), 2);
        assert_eq!(cache.get_cached(&"list"), None);
    }

    #[tokio::test]
    async fn clear_drops_values() {
        let cache = Cache::new();
        cache.get_or_fetch(&"a", || ok(1)).await.unwrap();
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get_cached(&"a"), None);
    }
}
