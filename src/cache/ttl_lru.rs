//! Bounded LRU cache with per-entry time-to-live.

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use lru::LruCache;
use thiserror::Error;
use tokio::time::Instant;

use crate::config::CacheConfig;
use crate::observability::metrics;

/// Errors raised when building a cache.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// The underlying LRU store needs room for at least one entry.
    #[error("cache capacity must be greater than zero, got {0}")]
    InvalidCapacity(usize),
}

struct Entry<V> {
    value: V,
    last_touch: Instant,
}

/// A thread-safe LRU cache whose entries also expire after `ttl` without a read.
///
/// LRU eviction and TTL expiry are independent: an entry leaves the cache either
/// because it went stale or because it was least recently used when a new key
/// arrived at capacity.
pub struct TtlLruCache<K, V> {
    name: String,
    ttl: Duration,
    entries: Mutex<LruCache<K, Entry<V>>>,
}

impl<K: Hash + Eq, V: Clone> TtlLruCache<K, V> {
    /// Create a cache holding at most `capacity` entries.
    pub fn new(capacity: usize, ttl: Duration) -> Result<Self, CacheError> {
        Self::with_name("default", capacity, ttl)
    }

    /// Create a named cache. The name labels this cache's metrics.
    pub fn with_name(
        name: impl Into<String>,
        capacity: usize,
        ttl: Duration,
    ) -> Result<Self, CacheError> {
        let capacity = NonZeroUsize::new(capacity).ok_or(CacheError::InvalidCapacity(capacity))?;
        Ok(Self {
            name: name.into(),
            ttl,
            entries: Mutex::new(LruCache::new(capacity)),
        })
    }

    pub fn from_config(config: &CacheConfig) -> Result<Self, CacheError> {
        Self::with_name(
            config.name.clone(),
            config.capacity,
            Duration::from_secs(config.ttl_secs),
        )
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<K, Entry<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_fresh(&self, entry: &Entry<V>, now: Instant) -> bool {
        now.saturating_duration_since(entry.last_touch) <= self.ttl
    }

    /// Look up `key`, refreshing its expiry and recency on a hit.
    ///
    /// A stale entry is removed and reported as absent.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let mut entries = self.lock();

        let fresh = entries.peek(key).map(|entry| self.is_fresh(entry, now));
        match fresh {
            None => {
                metrics::record_cache_lookup(&self.name, "miss");
                None
            }
            Some(false) => {
                entries.pop(key);
                metrics::record_cache_lookup(&self.name, "expired");
                metrics::record_cache_size(&self.name, entries.len());
                tracing::trace!(cache = %self.name, "Dropped expired cache entry");
                None
            }
            Some(true) => {
                let entry = entries.get_mut(key)?;
                entry.last_touch = now;
                metrics::record_cache_lookup(&self.name, "hit");
                Some(entry.value.clone())
            }
        }
    }

    /// Insert or overwrite `key`. Returns `true` if another entry was evicted
    /// to make room.
    pub fn add(&self, key: K, value: V) -> bool {
        let entry = Entry {
            value,
            last_touch: Instant::now(),
        };
        let mut entries = self.lock();

        let evicted = !entries.contains(&key) && entries.len() == entries.cap().get();
        entries.put(key, entry);

        if evicted {
            metrics::record_cache_eviction(&self.name);
            tracing::debug!(cache = %self.name, capacity = entries.cap().get(), "Evicted least recently used entry");
        }
        metrics::record_cache_size(&self.name, entries.len());
        evicted
    }

    /// Read `key` without touching its expiry or recency.
    ///
    /// Returns the value together with the instant it will expire at.
    pub fn peek(&self, key: &K) -> Option<(V, Instant)> {
        let now = Instant::now();
        let entries = self.lock();
        let entry = entries.peek(key)?;
        if !self.is_fresh(entry, now) {
            return None;
        }
        Some((entry.value.clone(), entry.last_touch + self.ttl))
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        let mut entries = self.lock();
        let removed = entries.pop(key).map(|entry| entry.value);
        metrics::record_cache_size(&self.name, entries.len());
        removed
    }

    /// Number of stored entries, stale ones included until they are touched.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<K: Hash + Eq + Clone, V: Clone> TtlLruCache<K, V> {
    /// Drop every stale entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.lock();

        let stale: Vec<K> = entries
            .iter()
            .filter(|(_, entry)| !self.is_fresh(entry, now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale {
            entries.pop(key);
        }

        if !stale.is_empty() {
            tracing::debug!(cache = %self.name, purged = stale.len(), "Purged expired entries");
            metrics::record_cache_size(&self.name, entries.len());
        }
        stale.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::time::advance;

    const TTL: Duration = Duration::from_millis(100);

    #[test]
    fn test_zero_capacity_rejected() {
        let result = TtlLruCache::<&str, i32>::new(0, TTL);
        assert_eq!(result.err(), Some(CacheError::InvalidCapacity(0)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_within_ttl() {
        let cache = TtlLruCache::new(4, TTL).unwrap();
        assert!(!cache.add("a", 1));
        advance(Duration::from_millis(50)).await;
        assert_eq!(cache.get(&"a"), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_removed_on_get() {
        let cache = TtlLruCache::new(4, TTL).unwrap();
        cache.add("a", 1);
        advance(TTL + Duration::from_millis(1)).await;

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"a"), None);
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_slides_expiry() {
        let cache = TtlLruCache::new(4, TTL).unwrap();
        cache.add("a", 1);

        let almost = TTL - Duration::from_millis(10);
        advance(almost).await;
        assert_eq!(cache.get(&"a"), Some(1));
        advance(almost).await;
        assert_eq!(cache.get(&"a"), Some(1));
        advance(TTL + Duration::from_millis(1)).await;
        assert_eq!(cache.get(&"a"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_peek_does_not_extend_life() {
        let cache = TtlLruCache::new(4, TTL).unwrap();
        let start = Instant::now();
        cache.add("a", 1);

        advance(Duration::from_millis(90)).await;
        let (value, expires_at) = cache.peek(&"a").unwrap();
        assert_eq!(value, 1);
        assert_eq!(expires_at, start + TTL);

        advance(Duration::from_millis(20)).await;
        assert_eq!(cache.peek(&"a"), None);
        assert_eq!(cache.get(&"a"), None);
    }

    #[test]
    fn test_lru_eviction_scenario() {
        let cache = TtlLruCache::new(2, TTL).unwrap();
        assert!(!cache.add("a", 1));
        assert!(!cache.add("b", 2));
        assert!(cache.add("c", 3));

        assert_eq!(cache.get(&"a"), None);
        assert_eq!(cache.get(&"b"), Some(2));
        assert_eq!(cache.get(&"c"), Some(3));
    }

    #[test]
    fn test_get_updates_recency() {
        let cache = TtlLruCache::new(2, TTL).unwrap();
        cache.add("a", 1);
        cache.add("b", 2);
        cache.get(&"a");
        assert!(cache.add("c", 3));

        assert_eq!(cache.get(&"a"), Some(1));
        assert_eq!(cache.get(&"b"), None);
    }

    #[test]
    fn test_peek_keeps_recency() {
        let cache = TtlLruCache::new(2, TTL).unwrap();
        cache.add("a", 1);
        cache.add("b", 2);
        cache.peek(&"a");
        cache.add("c", 3);

        assert_eq!(cache.get(&"a"), None);
    }

    #[test]
    fn test_overwrite_does_not_evict() {
        let cache = TtlLruCache::new(2, TTL).unwrap();
        cache.add("a", 1);
        cache.add("b", 2);
        assert!(!cache.add("a", 10));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"a"), Some(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let cache = TtlLruCache::new(4, TTL).unwrap();
        cache.add("a", 1);
        advance(Duration::from_millis(60)).await;
        cache.add("b", 2);
        advance(Duration::from_millis(60)).await;

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.remove(&"b"), Some(2));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_from_config() {
        let config = CacheConfig {
            name: "identity".to_string(),
            capacity: 3,
            ttl_secs: 60,
        };
        let cache = TtlLruCache::<String, String>::from_config(&config).unwrap();
        assert_eq!(cache.name(), "identity");
        assert_eq!(cache.capacity(), 3);
        assert_eq!(cache.ttl(), Duration::from_secs(60));
    }

    #[test]
    fn test_concurrent_adds_respect_capacity() {
        let cache = Arc::new(TtlLruCache::new(16, Duration::from_secs(60)).unwrap());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        cache.add(t * 1000 + i, i);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len(), 16);
    }
}
