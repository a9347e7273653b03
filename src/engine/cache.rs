//! Bounded LRU cache with optional TTL expiry.
//!
//! All caches in the engine (compiled patterns, match verdicts, variable
//! resolutions, parsed templates) share this one discipline:
//!
//! - **Capacity**: fixed at construction; when full, the least recently used
//!   entry is evicted *before* the new one is inserted.
//! - **TTL**: an entry older than the TTL is treated as absent even if it was
//!   recently read. Expiry is checked lazily on lookup and is independent of
//!   LRU order.
//! - **Tags**: entries may carry a context tag (for example the name of the
//!   knowledge base they were computed against) so that a whole context can be
//!   invalidated at once.
//!
//! Each cache owns its own lock, so activity on one cache never blocks another.
//! A lookup updates recency under the same lock as the read; insert and evict
//! happen under one lock acquisition.

use crate::config::CacheOptions;
use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::trace;

#[derive(Debug)]
struct Entry<V> {
    value: V,
    inserted_at: Instant,
    last_access: Instant,
    tag: Option<Arc<str>>,
}

/// Point-in-time counters for one cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub name: &'static str,
    pub hits: u64,
    pub misses: u64,
    /// Entries dropped because the cache was full.
    pub evictions: u64,
    /// Entries dropped on lookup because their TTL had passed.
    pub expirations: u64,
    pub size: usize,
    pub capacity: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 { 0.0 } else { self.hits as f64 / total as f64 }
    }
}

/// Thread-safe LRU cache with TTL expiry and tag-based invalidation.
#[derive(Debug)]
pub struct TtlLruCache<K: Hash + Eq, V> {
    name: &'static str,
    inner: Mutex<LruCache<K, Entry<V>>>,
    ttl: Option<Duration>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl<K, V> TtlLruCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    pub fn new(name: &'static str, capacity: NonZeroUsize, ttl: Option<Duration>) -> Self {
        Self {
            name,
            inner: Mutex::new(LruCache::new(capacity)),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        }
    }

    pub fn from_options(name: &'static str, options: &CacheOptions) -> Self {
        Self::new(name, options.capacity(), options.ttl())
    }

    fn is_expired(&self, entry: &Entry<V>, now: Instant) -> bool {
        match self.ttl {
            Some(ttl) => now.saturating_duration_since(entry.inserted_at) >= ttl,
            None => false,
        }
    }

    /// Look up `key`, refreshing its recency. Expired entries are removed and
    /// reported as misses.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let mut cache = self.inner.lock();

        let expired = match cache.peek(key) {
            Some(entry) => self.is_expired(entry, now),
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        if expired {
            cache.pop(key);
            self.expirations.fetch_add(1, Ordering::Relaxed);
            self.misses.fetch_add(1, Ordering::Relaxed);
            trace!(cache = self.name, "entry expired");
            return None;
        }

        let entry = cache.get_mut(key)?;
        entry.last_access = now;
        self.hits.fetch_add(1, Ordering::Relaxed);
        Some(entry.value.clone())
    }

    /// True when `key` is present and not expired. Does not touch recency or
    /// the hit/miss counters.
    pub fn contains(&self, key: &K) -> bool {
        let now = Instant::now();
        let cache = self.inner.lock();
        cache.peek(key).is_some_and(|entry| !self.is_expired(entry, now))
    }

    pub fn insert(&self, key: K, value: V) {
        self.insert_entry(key, value, None);
    }

    /// Insert an entry that belongs to the context identified by `tag`.
    pub fn insert_tagged(&self, key: K, value: V, tag: &Arc<str>) {
        self.insert_entry(key, value, Some(Arc::clone(tag)));
    }

    fn insert_entry(&self, key: K, value: V, tag: Option<Arc<str>>) {
        let now = Instant::now();
        let mut cache = self.inner.lock();

        if !cache.contains(&key) && cache.len() >= cache.cap().get() {
            if let Some((_, evicted)) = cache.pop_lru() {
                self.evictions.fetch_add(1, Ordering::Relaxed);
                let idle_ms = now.saturating_duration_since(evicted.last_access).as_millis() as u64;
                trace!(cache = self.name, idle_ms, "evicted least recently used entry");
            }
        }

        cache.put(key, Entry { value, inserted_at: now, last_access: now, tag });
    }

    /// Return the cached value for `key`, computing and inserting it on a miss.
    ///
    /// `compute` runs without the lock held, so two callers racing on the same
    /// key may both compute; the later insert wins.
    pub fn get_or_insert_with(&self, key: K, tag: Option<&Arc<str>>, compute: impl FnOnce() -> V) -> V {
        if let Some(value) = self.get(&key) {
            return value;
        }
        let value = compute();
        self.insert_entry(key, value.clone(), tag.cloned());
        value
    }

    /// Drop every entry tagged with `tag`. Returns how many were removed.
    pub fn invalidate_tag(&self, tag: &str) -> usize {
        let mut cache = self.inner.lock();
        let doomed: Vec<K> = cache
            .iter()
            .filter(|(_, entry)| entry.tag.as_deref() == Some(tag))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            cache.pop(key);
        }
        trace!(cache = self.name, tag, removed = doomed.len(), "invalidated context");
        doomed.len()
    }

    /// Remove all entries. Counters are kept.
    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let cache = self.inner.lock();
        CacheStats {
            name: self.name,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            size: cache.len(),
            capacity: cache.cap().get(),
        }
    }
}
