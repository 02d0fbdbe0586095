//! Existence Cache
//!
//! Short-lived memoization of "does this entity exist". Entries are created
//! lazily on the first probe, answered from memory until they expire, and
//! then re-read from the source. Write paths may store a `true` hint after a
//! write that proves the entity was alive.
//!
//! Nothing invalidates an entry when its entity is deleted: a deleted entity
//! can keep reading as present for up to one TTL. The key space follows the
//! live entity set, so the map is bounded by time-based eviction only.

pub mod clock;

pub use clock::{Clock, ManualClock, SystemClock};

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Default time an answer is trusted.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    exists: bool,
    expires_at: Instant,
}

struct Inner<K> {
    entries: HashMap<K, CacheEntry>,
    /// Expiry instant -> keys stored with that deadline. A key may appear
    /// under an old deadline after being refreshed; eviction re-checks the
    /// live entry before removing it.
    expiry_index: BTreeMap<Instant, Vec<K>>,
}

pub struct ExistenceCache<K> {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    inner: RwLock<Inner<K>>,
}

impl<K> ExistenceCache<K>
where
    K: Eq + Hash + Clone + Display + Send + Sync + 'static,
{
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            inner: RwLock::new(Inner {
                entries: HashMap::new(),
                expiry_index: BTreeMap::new(),
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Unexpired cached answer for `key`, without touching the source.
    pub fn get(&self, key: &K) -> Option<bool> {
        let now = self.clock.now();
        self.inner
            .read()
            .entries
            .get(key)
            .filter(|e| now < e.expires_at)
            .map(|e| e.exists)
    }

    /// Answer from cache, or run `load` and memoize its answer for one TTL.
    ///
    /// Concurrent misses on the same key may each run `load`; the last
    /// answer stored wins. Loader errors are returned and nothing is cached.
    pub async fn probe<F, Fut, E>(&self, key: &K, load: F) -> Result<bool, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<bool, E>>,
    {
        if let Some(exists) = self.get(key) {
            return Ok(exists);
        }

        debug!("[Cache] Miss for {}", key);
        let exists = load().await?;
        self.store(key.clone(), exists);
        Ok(exists)
    }

    /// Record that `key` is known to exist right now.
    pub fn mark_present(&self, key: K) {
        self.store(key, true);
    }

    fn store(&self, key: K, exists: bool) {
        let now = self.clock.now();
        let expires_at = now + self.ttl;
        let mut inner = self.inner.write();
        inner
            .expiry_index
            .entry(expires_at)
            .or_default()
            .push(key.clone());
        inner.entries.insert(key, CacheEntry { exists, expires_at });
        Self::evict_locked(&mut inner, now);
    }

    /// Drop every entry whose deadline has passed. Returns how many went.
    pub fn evict_expired(&self) -> usize {
        let now = self.clock.now();
        Self::evict_locked(&mut self.inner.write(), now)
    }

    fn evict_locked(inner: &mut Inner<K>, now: Instant) -> usize {
        let mut evicted = 0;
        while let Some(slot) = inner.expiry_index.first_entry() {
            if *slot.key() > now {
                break;
            }
            for key in slot.remove() {
                let expired = inner
                    .entries
                    .get(&key)
                    .is_some_and(|e| e.expires_at <= now);
                if expired {
                    inner.entries.remove(&key);
                    evicted += 1;
                }
            }
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Periodically evict expired entries until the cache is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(cache) = weak.upgrade() else {
                    break;
                };
                let evicted = cache.evict_expired();
                if evicted > 0 {
                    debug!("[Cache] Evicted {} expired entries", evicted);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn cache(clock: &Arc<ManualClock>) -> ExistenceCache<String> {
        ExistenceCache::with_clock(Duration::from_secs(300), clock.clone())
    }

    async fn probe_counting(cache: &ExistenceCache<String>, key: &str, loads: &AtomicUsize) -> bool {
        cache
            .probe(&key.to_string(), move || async move {
                loads.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Infallible>(true)
            })
            .await
            .unwrap()
    }

    async fn probe_flag(cache: &ExistenceCache<String>, key: &str, alive: &AtomicBool) -> bool {
        cache
            .probe(&key.to_string(), move || async move {
                Ok::<_, Infallible>(alive.load(Ordering::SeqCst))
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_probe_memoizes_until_ttl() {
        let clock = Arc::new(ManualClock::new());
        let cache = cache(&clock);
        let loads = AtomicUsize::new(0);

        for _ in 0..3 {
            assert!(probe_counting(&cache, "post-1", &loads).await);
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);

        clock.advance(Duration::from_secs(300));
        assert!(probe_counting(&cache, "post-1", &loads).await);
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_deleted_entity_reads_present_until_ttl_elapses() {
        let clock = Arc::new(ManualClock::new());
        let cache = cache(&clock);
        let alive = AtomicBool::new(true);

        assert!(probe_flag(&cache, "post-1", &alive).await);
        alive.store(false, Ordering::SeqCst);

        clock.advance(Duration::from_secs(299));
        assert!(
            probe_flag(&cache, "post-1", &alive).await,
            "stale answer is served inside the TTL"
        );

        clock.advance(Duration::from_secs(1));
        assert!(
            !probe_flag(&cache, "post-1", &alive).await,
            "re-probe after TTL sees the deletion"
        );
    }

    #[tokio::test]
    async fn test_mark_present_is_served_without_loading() {
        let clock = Arc::new(ManualClock::new());
        let cache = cache(&clock);
        let loads = AtomicUsize::new(0);
        cache.mark_present("user-9".to_string());

        assert!(probe_counting(&cache, "user-9", &loads).await);
        assert_eq!(loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_negative_answer_is_memoized() {
        let clock = Arc::new(ManualClock::new());
        let cache = cache(&clock);
        let alive = AtomicBool::new(false);

        assert!(!probe_flag(&cache, "post-3", &alive).await);
        alive.store(true, Ordering::SeqCst);
        assert!(!probe_flag(&cache, "post-3", &alive).await);

        clock.advance(Duration::from_secs(300));
        assert!(probe_flag(&cache, "post-3", &alive).await);
    }

    #[tokio::test]
    async fn test_loader_error_is_not_cached() {
        let clock = Arc::new(ManualClock::new());
        let cache = cache(&clock);
        let key = "post-2".to_string();

        let err = cache
            .probe(&key, || async { Err::<bool, &str>("store down") })
            .await;
        assert_eq!(err, Err("store down"));
        assert_eq!(cache.get(&key), None);
    }

    #[test]
    fn test_eviction_index_drops_only_expired() {
        let clock = Arc::new(ManualClock::new());
        let cache = cache(&clock);

        cache.mark_present("a".to_string());
        clock.advance(Duration::from_secs(200));
        cache.mark_present("b".to_string());
        // Refreshing "a" moves its deadline; the old index slot must not evict it.
        clock.advance(Duration::from_secs(50));
        cache.mark_present("a".to_string());
        assert_eq!(cache.len(), 2);

        // t=310: the first "a" deadline (300) has passed, the refreshed one (550) has not.
        clock.advance(Duration::from_secs(60));
        assert_eq!(cache.evict_expired(), 0);
        assert_eq!(cache.get(&"a".to_string()), Some(true));

        // t=510: "b" expired at 500.
        clock.advance(Duration::from_secs(200));
        assert_eq!(cache.evict_expired(), 1);
        assert_eq!(cache.get(&"b".to_string()), None);

        clock.advance(Duration::from_secs(40));
        assert_eq!(cache.evict_expired(), 1);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_sweeper_stops_when_cache_dropped() {
        let cache = Arc::new(ExistenceCache::<String>::new(Duration::from_millis(10)));
        cache.mark_present("x".to_string());
        let handle = cache.spawn_sweeper(Duration::from_millis(5));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(cache.is_empty());

        drop(cache);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper exits after the cache is gone")
            .unwrap();
    }
}
