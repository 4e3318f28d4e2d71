//! # Result Cache
//!
//! Bounded LRU cache with TTL over finished search responses. Keys are a
//! deterministic hash of (query text, filters, pagination); two queries
//! differing only in filters never share an entry. Eviction is synchronous
//! under the single cache lock.

use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Deterministic cache key over the full request shape.
pub fn cache_key(query: &str, filters_canonical: &str, page: usize, per_page: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(query.as_bytes());
    hasher.update([0u8]);
    hasher.update(filters_canonical.as_bytes());
    hasher.update([0u8]);
    hasher.update(page.to_le_bytes());
    hasher.update(per_page.to_le_bytes());
    hex::encode(hasher.finalize())
}

struct CacheEntry<T> {
    value: T,
    inserted: Instant,
}

struct CacheInner<T> {
    entries: HashMap<String, CacheEntry<T>>,
    /// Recency order, least recently used at the front.
    order: VecDeque<String>,
}

/// LRU + TTL cache, safe for concurrent use behind one lock.
pub struct ResultCache<T> {
    inner: Mutex<CacheInner<T>>,
    capacity: usize,
    ttl: Duration,
}

impl<T: Clone> ResultCache<T> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
            capacity: capacity.max(1),
            ttl,
        }
    }

    /// Fetch a live entry, refreshing its recency. Expired entries are
    /// removed on access.
    pub fn get(&self, key: &str) -> Option<T> {
        let mut inner = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let expired = match inner.entries.get(key) {
            Some(entry) => entry.inserted.elapsed() > self.ttl,
            None => return None,
        };

        if expired {
            inner.entries.remove(key);
            inner.order.retain(|k| k != key);
            metrics::counter!("search_cache_expired_total").increment(1);
            return None;
        }

        inner.order.retain(|k| k != key);
        inner.order.push_back(key.to_string());
        metrics::counter!("search_cache_hits_total").increment(1);
        inner.entries.get(key).map(|entry| entry.value.clone())
    }

    /// Insert an entry, evicting the least recently used one when full.
    pub fn put(&self, key: String, value: T) {
        let mut inner = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        if inner.entries.contains_key(&key) {
            inner.order.retain(|k| k != &key);
        } else if inner.entries.len() >= self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.entries.remove(&oldest);
                metrics::counter!("search_cache_evictions_total").increment(1);
            }
        }

        inner.entries.insert(key.clone(), CacheEntry { value, inserted: Instant::now() });
        inner.order.push_back(key);
    }

    /// Drop every entry; used when the index is rebuilt.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        inner.entries.clear();
        inner.order.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_varies_by_every_component() {
        let base = cache_key("users", "{}", 1, 20);
        assert_ne!(base, cache_key("orders", "{}", 1, 20));
        assert_ne!(base, cache_key("users", "{\"methods\":[\"GET\"]}", 1, 20));
        assert_ne!(base, cache_key("users", "{}", 2, 20));
        assert_ne!(base, cache_key("users", "{}", 1, 10));
        assert_eq!(base, cache_key("users", "{}", 1, 20));
    }

    #[test]
    fn test_lru_eviction() {
        let cache: ResultCache<i32> = ResultCache::new(2, Duration::from_secs(60));
        cache.put("a".to_string(), 1);
        cache.put("b".to_string(), 2);
        // Touch "a" so "b" becomes the eviction candidate.
        assert_eq!(cache.get("a"), Some(1));
        cache.put("c".to_string(), 3);

        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("c"), Some(3));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_ttl_expiry() {
        let cache: ResultCache<i32> = ResultCache::new(4, Duration::from_millis(0));
        cache.put("a".to_string(), 1);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get("a"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_overwrite_same_key_keeps_size() {
        let cache: ResultCache<i32> = ResultCache::new(2, Duration::from_secs(60));
        cache.put("a".to_string(), 1);
        cache.put("a".to_string(), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a"), Some(2));
    }

    #[test]
    fn test_clear() {
        let cache: ResultCache<i32> = ResultCache::new(2, Duration::from_secs(60));
        cache.put("a".to_string(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }
}
