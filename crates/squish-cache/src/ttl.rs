//! TTL cache implementation

use crate::CacheConfig;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, trace};

/// Deadline used when `now + ttl` does not fit in an `Instant`
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// A full cache evicts at least `max_entries / EVICTION_BATCH_DIVISOR` entries at once
const EVICTION_BATCH_DIVISOR: usize = 16;

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> Entry<V> {
    fn new(value: V, ttl: Duration) -> Self {
        let now = Instant::now();
        let expires_at = now
            .checked_add(ttl)
            .unwrap_or_else(|| now + FAR_FUTURE);
        Self { value, expires_at }
    }

    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Concurrent key/value cache with per-entry expiration
///
/// Entries become unreachable the moment their TTL elapses. Reads never
/// extend an entry's lifetime. Physical removal happens on the read that
/// notices the expiry, on [`TtlCache::cleanup`], or in the background
/// sweep started by [`TtlCache::with_cleanup`].
#[derive(Clone)]
pub struct TtlCache<V> {
    store: Arc<DashMap<String, Entry<V>>>,
    max_entries: Option<usize>,
}

impl<V> TtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create an unbounded cache without background sweeping
    pub fn new() -> Self {
        Self {
            store: Arc::new(DashMap::new()),
            max_entries: None,
        }
    }

    /// Create a cache holding at most `max_entries` entries
    pub fn bounded(max_entries: usize) -> Self {
        Self {
            store: Arc::new(DashMap::new()),
            max_entries: Some(max_entries),
        }
    }

    /// Build a cache from configuration.
    ///
    /// The background sweep is only started when called inside a tokio
    /// runtime.
    pub fn from_config(config: &CacheConfig) -> Self {
        let cache = Self {
            store: Arc::new(DashMap::new()),
            max_entries: config.max_entries,
        };

        match config.cleanup_interval {
            Some(every) if tokio::runtime::Handle::try_current().is_ok() => {
                cache.with_cleanup(every)
            }
            Some(_) => {
                debug!("No tokio runtime, expired entries are only removed on access");
                cache
            }
            None => cache,
        }
    }

    /// Spawn a tokio task that sweeps expired entries every `every`.
    ///
    /// The task holds a weak reference and exits once every handle to the
    /// cache has been dropped.
    pub fn with_cleanup(self, every: Duration) -> Self {
        if every.is_zero() {
            return self;
        }

        let store = Arc::downgrade(&self.store);
        tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    break;
                };
                Self::sweep(&store);
            }
            trace!("Cache sweeper stopped");
        });

        self
    }

    /// Store `value` under `key` for `ttl`, replacing any previous entry
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        trace!(key_len = key.len(), ttl_secs = ttl.as_secs(), "Cache SET");

        if let Some(max) = self.max_entries {
            self.make_room(&key, max);
        }

        self.store.insert(key, Entry::new(value, ttl));
    }

    /// Get the value stored under `key` if it has not expired
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let entry = self.store.get(key)?;

        if entry.is_expired(now) {
            drop(entry); // release the shard read lock
            self.store.remove_if(key, |_, e| e.is_expired(now));
            return None;
        }

        Some(entry.value.clone())
    }

    /// Whether a live entry exists under `key`
    pub fn has(&self, key: &str) -> bool {
        let now = Instant::now();
        match self.store.get(key) {
            Some(entry) if entry.is_expired(now) => {
                drop(entry);
                self.store.remove_if(key, |_, e| e.is_expired(now));
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    /// Remove an entry, returning its value if it was still live
    pub fn remove(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        self.store
            .remove(key)
            .filter(|(_, entry)| !entry.is_expired(now))
            .map(|(_, entry)| entry.value)
    }

    /// Remove every entry
    pub fn clear(&self) {
        debug!(entries = self.store.len(), "Cache CLEAR");
        self.store.clear();
    }

    /// Remove expired entries now, returning how many were dropped
    pub fn cleanup(&self) -> usize {
        Self::sweep(&self.store)
    }

    /// Number of stored entries, including expired ones not yet swept
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Whether the store holds no entries
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Configured capacity bound
    pub fn max_entries(&self) -> Option<usize> {
        self.max_entries
    }

    fn sweep(store: &DashMap<String, Entry<V>>) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        store.retain(|_, entry| {
            if entry.is_expired(now) {
                removed += 1;
                false
            } else {
                true
            }
        });

        if removed > 0 {
            debug!(removed, "Cleaned up expired cache entries");
        }
        removed
    }

    /// Evict until a new `key` fits under `max`. Replacing an existing key
    /// never evicts.
    ///
    /// Expired entries go first. If that is not enough, the live entries
    /// closest to expiry are evicted in one batch of at least
    /// `max / EVICTION_BATCH_DIVISOR`.
    fn make_room(&self, key: &str, max: usize) {
        if self.store.contains_key(key) || self.store.len() < max {
            return;
        }

        Self::sweep(&self.store);

        let len = self.store.len();
        if len < max {
            return;
        }

        let mut deadlines: Vec<Instant> =
            self.store.iter().map(|entry| entry.value().expires_at).collect();
        let batch = (len + 1 - max)
            .max(max / EVICTION_BATCH_DIVISOR)
            .min(deadlines.len());
        if batch == 0 {
            return;
        }

        let (_, &mut cutoff, _) = deadlines.select_nth_unstable(batch - 1);
        let mut evicted = 0;
        self.store.retain(|_, entry| {
            if evicted < batch && entry.expires_at <= cutoff {
                evicted += 1;
                false
            } else {
                true
            }
        });

        trace!(evicted, "Cache full, evicted entries closest to expiry");
    }
}

impl<V> Default for TtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for TtlCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TtlCache")
            .field("entries", &self.store.len())
            .field("max_entries", &self.max_entries)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tokio::time::{advance, sleep};

    #[tokio::test(start_paused = true)]
    async fn test_get_set_has() {
        let cache = TtlCache::new();

        cache.set("gzip-6-hello", Bytes::from_static(b"compressed"), Duration::from_secs(60));

        assert!(cache.has("gzip-6-hello"));
        assert_eq!(
            cache.get("gzip-6-hello"),
            Some(Bytes::from_static(b"compressed"))
        );
        assert!(!cache.has("gzip-6-other"));
        assert_eq!(cache.get("gzip-6-other"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiration() {
        let cache = TtlCache::new();
        cache.set("key", 1u32, Duration::from_secs(10));

        advance(Duration::from_secs(9)).await;
        assert!(cache.has("key"));

        advance(Duration::from_secs(1)).await;
        assert!(!cache.has("key"));
        assert_eq!(cache.get("key"), None);
        // the read removed it physically
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reads_do_not_extend_lifetime() {
        let cache = TtlCache::new();
        cache.set("key", 1u32, Duration::from_secs(10));

        for _ in 0..4 {
            advance(Duration::from_secs(2)).await;
            assert_eq!(cache.get("key"), Some(1));
        }

        advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get("key"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_ttl_is_never_visible() {
        let cache = TtlCache::new();
        cache.set("key", 1u32, Duration::ZERO);
        assert!(!cache.has("key"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_resets_deadline() {
        let cache = TtlCache::new();
        cache.set("key", 1u32, Duration::from_secs(5));
        advance(Duration::from_secs(4)).await;
        cache.set("key", 2u32, Duration::from_secs(5));
        advance(Duration::from_secs(4)).await;
        assert_eq!(cache.get("key"), Some(2));
    }

    #[tokio::test]
    async fn test_huge_ttl_does_not_overflow() {
        let cache = TtlCache::new();
        cache.set("key", 1u32, Duration::MAX);
        assert!(cache.has("key"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_and_clear() {
        let cache = TtlCache::new();
        cache.set("a", 1u32, Duration::from_secs(60));
        cache.set("b", 2u32, Duration::from_secs(60));

        assert_eq!(cache.remove("a"), Some(1));
        assert_eq!(cache.remove("a"), None);
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
        assert!(!cache.has("b"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup() {
        let cache = TtlCache::new();
        cache.set("short", 1u32, Duration::from_secs(1));
        cache.set("long", 2u32, Duration::from_secs(60));
        assert_eq!(cache.len(), 2);

        advance(Duration::from_secs(2)).await;
        assert_eq!(cache.cleanup(), 1);

        assert_eq!(cache.len(), 1);
        assert!(cache.has("long"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_sweep() {
        let cache = TtlCache::new().with_cleanup(Duration::from_secs(1));
        cache.set("short", 1u32, Duration::from_secs(1));
        cache.set("long", 2u32, Duration::from_secs(60));

        sleep(Duration::from_secs(3)).await;

        // swept without any read touching the key
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_bound_evicts_closest_to_expiry() {
        let cache = TtlCache::bounded(2);
        cache.set("a", 1u32, Duration::from_secs(10));
        cache.set("b", 2u32, Duration::from_secs(60));
        cache.set("c", 3u32, Duration::from_secs(30));

        assert_eq!(cache.len(), 2);
        assert!(!cache.has("a"));
        assert!(cache.has("b"));
        assert!(cache.has("c"));

        // replacing an existing key never evicts
        cache.set("b", 4u32, Duration::from_secs(60));
        assert!(cache.has("c"));
        assert_eq!(cache.get("b"), Some(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_bound_prefers_expired_entries() {
        let cache = TtlCache::bounded(2);
        cache.set("a", 1u32, Duration::from_secs(1));
        cache.set("b", 2u32, Duration::from_secs(1));
        advance(Duration::from_secs(2)).await;

        cache.set("c", 3u32, Duration::from_secs(60));
        assert_eq!(cache.len(), 1);
        assert!(cache.has("c"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_cache_evicts_in_batches() {
        let cache = TtlCache::bounded(32);
        for i in 0..32u64 {
            cache.set(format!("key-{i}"), i, Duration::from_secs(100 + i));
        }

        cache.set("fresh", 99, Duration::from_secs(1000));

        // 32 / 16 = 2 evicted, the two closest to expiry
        assert_eq!(cache.len(), 31);
        assert!(!cache.has("key-0"));
        assert!(!cache.has("key-1"));
        assert!(cache.has("key-2"));
        assert!(cache.has("fresh"));

        // the freed slot absorbs the next insert without evicting
        cache.set("another", 100, Duration::from_secs(1000));
        assert_eq!(cache.len(), 32);
        assert!(cache.has("key-2"));
    }

    #[tokio::test]
    async fn test_clones_share_and_instances_are_isolated() {
        let first = TtlCache::new();
        let shared = first.clone();
        let other: TtlCache<u32> = TtlCache::new();

        first.set("key", 1u32, Duration::from_secs(60));
        assert!(shared.has("key"));
        assert!(!other.has("key"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers_same_key() {
        let cache = TtlCache::new();
        let value = Bytes::from_static(b"identical");

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let cache = cache.clone();
                let value = value.clone();
                tokio::spawn(async move {
                    cache.set("key", value.clone(), Duration::from_secs(60));
                    assert_eq!(cache.get("key"), Some(value));
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_from_config() {
        let cache: TtlCache<u32> = TtlCache::from_config(&CacheConfig {
            max_entries: Some(10),
            cleanup_interval: Some(Duration::from_secs(30)),
        });
        assert_eq!(cache.max_entries(), Some(10));
    }
}
