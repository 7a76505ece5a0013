//! Rendered image cache.
//!
//! Bounded by both size and age: entries expire after a TTL, and an insert
//! into a full cache first evicts the least recently used fifth.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// Default maximum number of cached images.
pub const DEFAULT_CAPACITY: usize = 50;

/// Default TTL for cached images (10 minutes).
pub const DEFAULT_TTL: Duration = Duration::from_secs(600);

/// Share of the capacity evicted when the cache is full.
const EVICTION_RATIO: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub capacity: usize,
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            ttl: DEFAULT_TTL,
        }
    }
}

/// Identity of a rendered image: source, live flag and serialized overlay.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub reference: String,
    pub live: bool,
    pub overlay: String,
}

#[derive(Clone)]
struct CacheEntry {
    value: Arc<str>,
    expires_at: Instant,
    last_access: u64,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

pub struct ImageCache {
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
    config: CacheConfig,
    /// Monotonic access clock; higher means more recently used.
    clock: AtomicU64,
}

impl ImageCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            config,
            clock: AtomicU64::new(0),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Cached value for `key`, if present and not expired.
    ///
    /// A hit replaces the entry with a copy carrying a fresh access stamp; the
    /// stored value itself is shared, never modified.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<str>> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let entry = entries.get(key)?;

        if entry.is_expired(now) {
            entries.remove(key);
            return None;
        }

        let touched = CacheEntry {
            last_access: self.tick(),
            ..entry.clone()
        };
        let value = touched.value.clone();
        entries.insert(key.clone(), touched);
        Some(value)
    }

    pub fn insert(&self, key: CacheKey, value: Arc<str>) {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + self.config.ttl,
            last_access: self.tick(),
        };

        let mut entries = self.entries.lock();
        if !entries.contains_key(&key) && entries.len() >= self.config.capacity {
            Self::evict_lru(&mut entries, self.eviction_count());
        }
        entries.insert(key, entry);
    }

    fn eviction_count(&self) -> usize {
        ((self.config.capacity as f64 * EVICTION_RATIO).ceil() as usize).max(1)
    }

    fn evict_lru(entries: &mut HashMap<CacheKey, CacheEntry>, count: usize) {
        let mut by_age: Vec<(u64, CacheKey)> = entries
            .iter()
            .map(|(key, entry)| (entry.last_access, key.clone()))
            .collect();
        by_age.sort_unstable_by_key(|(last_access, _)| *last_access);

        for (_, key) in by_age.into_iter().take(count) {
            entries.remove(&key);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.lock().contains_key(key)
    }
}

impl Default for ImageCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: usize) -> CacheKey {
        CacheKey {
            reference: format!("img-{n}"),
            live: n % 2 == 0,
            overlay: String::new(),
        }
    }

    fn value(n: usize) -> Arc<str> {
        Arc::from(format!("data-{n}"))
    }

    #[test]
    fn test_hit_returns_same_value_without_growing() {
        let cache = ImageCache::default();
        cache.insert(key(1), value(1));

        let first = cache.get(&key(1)).unwrap();
        let second = cache.get(&key(1)).unwrap();
        assert_eq!(first, second);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_full_cache_evicts_least_recently_used_fifth() {
        let cache = ImageCache::default();
        for n in 0..DEFAULT_CAPACITY {
            cache.insert(key(n), value(n));
        }
        // Touch the oldest five so they survive eviction.
        for n in 0..5 {
            cache.get(&key(n)).unwrap();
        }

        cache.insert(key(100), value(100));

        assert_eq!(cache.len(), DEFAULT_CAPACITY - 10 + 1);
        for n in 0..5 {
            assert!(cache.contains(&key(n)), "touched entry {n} evicted");
        }
        for n in 5..15 {
            assert!(!cache.contains(&key(n)), "entry {n} should be evicted");
        }
        for n in 15..DEFAULT_CAPACITY {
            assert!(cache.contains(&key(n)));
        }
        assert!(cache.contains(&key(100)));
    }

    #[test]
    fn test_size_never_exceeds_capacity() {
        let cache = ImageCache::new(CacheConfig {
            capacity: 7,
            ttl: DEFAULT_TTL,
        });
        for n in 0..100 {
            cache.insert(key(n), value(n));
            assert!(cache.len() <= 7);
        }
    }

    #[test]
    fn test_overwriting_existing_key_does_not_evict() {
        let cache = ImageCache::new(CacheConfig {
            capacity: 2,
            ttl: DEFAULT_TTL,
        });
        cache.insert(key(1), value(1));
        cache.insert(key(2), value(2));
        cache.insert(key(2), value(3));

        assert_eq!(cache.len(), 2);
        assert_eq!(&*cache.get(&key(2)).unwrap(), "data-3");
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entries_are_dropped_on_read() {
        let cache = ImageCache::default();
        cache.insert(key(1), value(1));

        tokio::time::advance(DEFAULT_TTL - Duration::from_secs(1)).await;
        assert!(cache.get(&key(1)).is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.get(&key(1)).is_none());
        assert!(cache.is_empty());
    }
}
