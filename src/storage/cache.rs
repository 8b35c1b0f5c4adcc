//! L1 in-process LRU cache.
//!
//! Fixed-capacity cache in front of the record store. It is strictly a
//! performance overlay: the store keeps the authoritative copy, so losing
//! any entry is always recoverable.
//!
//! # Eviction
//!
//! Inserting a new key into a full cache evicts the entry with the oldest
//! last access. A `get` hit refreshes the entry's last access and bumps its
//! access count, which protects it from the next eviction round.
//!
//! # Lock Poisoning
//!
//! Fail-open: a poisoned lock turns `get` into a miss and `set` into a no-op.

use crate::observability::metrics::{CACHE_EVICTIONS, CACHE_HITS, CACHE_MISSES, CACHE_SIZE};
use crate::{Error, Result};
use lru::LruCache;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::debug;

/// A cached value with its bookkeeping.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    last_access: Instant,
    access_count: u64,
}

impl<V> CacheEntry<V> {
    fn new(value: V) -> Self {
        Self {
            value,
            last_access: Instant::now(),
            access_count: 0,
        }
    }

    fn touch(&mut self) {
        self.last_access = Instant::now();
        self.access_count = self.access_count.saturating_add(1);
    }
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// `get` calls that found the key.
    pub hits: u64,
    /// `get` calls that did not.
    pub misses: u64,
    /// Entries evicted to make room.
    pub evictions: u64,
    /// Current number of entries.
    pub size: usize,
    /// Maximum number of entries.
    pub capacity: usize,
}

impl CacheStats {
    /// Fraction of `get` calls that hit, 0.0 before any lookup.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Fixed-capacity LRU cache.
///
/// The mutex guards eviction bookkeeping (recency order, timestamps, size),
/// so one cache may be shared between engine threads.
pub struct L1Cache<K, V>
where
    K: Hash + Eq,
{
    entries: Mutex<LruCache<K, CacheEntry<V>>>,
    capacity: NonZeroUsize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<K, V> std::fmt::Debug for L1Cache<K, V>
where
    K: Hash + Eq,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("L1Cache")
            .field("capacity", &self.capacity)
            .field("size", &self.entries.lock().map(|e| e.len()).unwrap_or(0))
            .finish_non_exhaustive()
    }
}

impl<K, V> L1Cache<K, V>
where
    K: Hash + Eq + Clone + std::fmt::Debug,
    V: Clone,
{
    /// Creates a cache holding at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            capacity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Creates a cache from a plain capacity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `capacity` is zero.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        NonZeroUsize::new(capacity)
            .map(Self::new)
            .ok_or_else(|| Error::InvalidInput("cache capacity must be > 0".to_string()))
    }

    /// Returns a clone of the cached value, refreshing its recency.
    ///
    /// A miss has no side effects beyond the miss counter.
    pub fn get(&self, key: &K) -> Option<V> {
        let found = self.entries.lock().ok().and_then(|mut entries| {
            entries.get_mut(key).map(|entry| {
                entry.touch();
                entry.value.clone()
            })
        });

        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            metrics::counter!(CACHE_HITS).increment(1);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            metrics::counter!(CACHE_MISSES).increment(1);
        }
        found
    }

    /// Inserts or replaces a value.
    ///
    /// Replacing an existing key counts as an access of that key. Inserting a
    /// new key into a full cache evicts the least recently accessed entry first.
    #[allow(clippy::cast_precision_loss)]
    pub fn set(&self, key: K, value: V) {
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };

        if let Some(entry) = entries.get_mut(&key) {
            entry.value = value;
            entry.touch();
            return;
        }

        if let Some((evicted, entry)) = entries.push(key, CacheEntry::new(value)) {
            self.evictions.fetch_add(1, Ordering::Relaxed);
            metrics::counter!(CACHE_EVICTIONS).increment(1);
            debug!(
                key = ?evicted,
                access_count = entry.access_count,
                idle_ms = entry.last_access.elapsed().as_millis(),
                "evicted cache entry"
            );
        }
        metrics::gauge!(CACHE_SIZE).set(entries.len() as f64);
    }

    /// Edits a cached value in place without refreshing its recency.
    ///
    /// Returns `false` if the key is not cached.
    pub fn update(&self, key: &K, f: impl FnOnce(&mut V)) -> bool {
        self.entries
            .lock()
            .ok()
            .and_then(|mut entries| entries.peek_mut(key).map(|entry| f(&mut entry.value)))
            .is_some()
    }

    /// Removes a key. Returns `true` if it was cached.
    pub fn delete(&self, key: &K) -> bool {
        self.entries
            .lock()
            .map(|mut entries| entries.pop(key).is_some())
            .unwrap_or(false)
    }

    /// Removes every entry.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
            metrics::gauge!(CACHE_SIZE).set(0.0);
        }
    }

    /// Returns the number of cached entries.
    #[must_use]
    pub fn size(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    /// Returns the maximum number of entries.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// Returns true if `key` is cached, without refreshing it.
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.entries
            .lock()
            .map(|e| e.contains(key))
            .unwrap_or(false)
    }

    /// Returns how many hits the entry for `key` has served.
    #[must_use]
    pub fn access_count(&self, key: &K) -> Option<u64> {
        self.entries
            .lock()
            .ok()
            .and_then(|e| e.peek(key).map(|entry| entry.access_count))
    }

    /// Returns a statistics snapshot.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            size: self.size(),
            capacity: self.capacity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(capacity: usize) -> L1Cache<String, u32> {
        L1Cache::with_capacity(capacity).unwrap()
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            L1Cache::<String, u32>::with_capacity(0),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_evicts_oldest_without_access() {
        let c = cache(3);
        for i in 0..4 {
            c.set(format!("k{i}"), i);
        }
        assert_eq!(c.size(), 3);
        assert!(!c.contains(&"k0".to_string()));
        assert_eq!(c.stats().evictions, 1);
    }

    #[test]
    fn test_get_protects_from_eviction() {
        let c = cache(3);
        for i in 0..3 {
            c.set(format!("k{i}"), i);
        }
        assert_eq!(c.get(&"k0".to_string()), Some(0));
        c.set("k3".to_string(), 3);

        assert!(c.contains(&"k0".to_string()));
        assert!(!c.contains(&"k1".to_string()));
        assert_eq!(c.access_count(&"k0".to_string()), Some(1));
    }

    #[test]
    fn test_overwrite_does_not_evict() {
        let c = cache(2);
        c.set("a".to_string(), 1);
        c.set("b".to_string(), 2);
        c.set("a".to_string(), 10);

        assert_eq!(c.size(), 2);
        assert_eq!(c.stats().evictions, 0);
        assert_eq!(c.get(&"a".to_string()), Some(10));
    }

    #[test]
    fn test_miss_has_no_side_effects() {
        let c = cache(2);
        c.set("a".to_string(), 1);
        assert_eq!(c.get(&"zzz".to_string()), None);
        assert_eq!(c.size(), 1);
        let stats = c.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 0);
        assert!(stats.hit_rate().abs() < f64::EPSILON);
    }

    #[test]
    fn test_update_edits_in_place() {
        let c = cache(2);
        c.set("a".to_string(), 1);
        c.set("b".to_string(), 2);
        assert!(c.update(&"a".to_string(), |v| *v += 10));
        assert!(!c.update(&"zzz".to_string(), |v| *v += 10));

        // Not an access: "a" is still the eviction candidate.
        c.set("c".to_string(), 3);
        assert!(!c.contains(&"a".to_string()));
        assert_eq!(c.stats().hits, 0);

        assert!(c.update(&"b".to_string(), |v| *v *= 2));
        assert_eq!(c.get(&"b".to_string()), Some(4));
    }

    #[test]
    fn test_delete_and_clear() {
        let c = cache(4);
        c.set("a".to_string(), 1);
        c.set("b".to_string(), 2);
        assert!(c.delete(&"a".to_string()));
        assert!(!c.delete(&"a".to_string()));
        c.clear();
        assert_eq!(c.size(), 0);
    }
}
