//! Module: cache::cache
//! Responsibility: the mutex-guarded preload cache (spec.md §4.10) —
//! bounded by entries and estimated memory, pluggable eviction, TTL
//! checked on `get`.
//! Does not own: eviction policy semantics (`cache::policy`) or the
//! loader a `get_or_fetch` caller supplies.
//! Boundary: every field lives behind one `Mutex<Inner<V>>`; no method
//! holds the lock across a caller-supplied closure other than the loader
//! itself, which runs with the lock released.

use crate::cache::policy::EvictionPolicy;
use icydb_error::InternalError;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Clone, Debug, Default)]
pub struct Statistics {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
}

#[derive(Clone, Copy, Debug)]
pub struct CacheOptions {
    pub max_entries: usize,
    pub max_memory_bytes: usize,
    pub ttl: Option<Duration>,
    pub policy: EvictionPolicy,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            max_entries: 1024,
            max_memory_bytes: 64 * 1024 * 1024,
            ttl: None,
            policy: EvictionPolicy::Lru,
        }
    }
}

struct Entry<V> {
    item: V,
    inserted_at: Instant,
    last_accessed_at: Instant,
    access_count: u64,
    approximate_size: usize,
}

struct Inner<V> {
    entries: HashMap<String, Entry<V>>,
    /// Monotonic sequence driving LRU/FIFO ordering: a `BTreeMap` keyed by
    /// sequence number gives ordered oldest-first iteration without an
    /// intrusive list; `get` on an `Lru` cache rewrites a key's sequence
    /// entry to the current tail.
    order: BTreeMap<u64, String>,
    order_seq_of: HashMap<String, u64>,
    next_seq: u64,
    memory_bytes: usize,
    stats: Statistics,
}

///
/// PreloadCache
///

pub struct PreloadCache<V: Clone + Serialize> {
    options: CacheOptions,
    inner: Mutex<Inner<V>>,
}

impl<V: Clone + Serialize> PreloadCache<V> {
    #[must_use]
    pub fn new(options: CacheOptions) -> Self {
        Self {
            options,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: BTreeMap::new(),
                order_seq_of: HashMap::new(),
                next_seq: 0,
                memory_bytes: 0,
                stats: Statistics::default(),
            }),
        }
    }

    fn estimate_size(item: &V) -> usize {
        serde_cbor::to_vec(item).map(|bytes| bytes.len()).unwrap_or(0)
    }

    /// `get` piggybacks the TTL check (spec.md §4.10): an expired entry is
    /// removed and counted as both a miss and an expiration.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<V> {
        let mut inner = self.inner.lock().unwrap();
        let now = Instant::now();

        if let Some(ttl) = self.options.ttl {
            if let Some(entry) = inner.entries.get(key) {
                if now.duration_since(entry.inserted_at) > ttl {
                    remove_entry(&mut inner, key);
                    inner.stats.misses += 1;
                    inner.stats.expirations += 1;
                    return None;
                }
            }
        }

        let Some(entry) = inner.entries.get_mut(key) else {
            inner.stats.misses += 1;
            return None;
        };
        entry.access_count += 1;
        entry.last_accessed_at = now;
        let item = entry.item.clone();

        if self.options.policy == EvictionPolicy::Lru {
            touch_order(&mut inner, key);
        }
        inner.stats.hits += 1;
        Some(item)
    }

    pub fn put(&self, key: impl Into<String>, item: V) {
        let key = key.into();
        let size = Self::estimate_size(&item);
        let mut inner = self.inner.lock().unwrap();
        self.insert_locked(&mut inner, key, item, size);
        self.evict_over_capacity(&mut inner);
    }

    fn insert_locked(&self, inner: &mut Inner<V>, key: String, item: V, size: usize) {
        if let Some(old) = inner.entries.remove(&key) {
            inner.memory_bytes -= old.approximate_size;
            if let Some(seq) = inner.order_seq_of.remove(&key) {
                inner.order.remove(&seq);
            }
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.order.insert(seq, key.clone());
        inner.order_seq_of.insert(key.clone(), seq);

        let now = Instant::now();
        inner.memory_bytes += size;
        inner.entries.insert(
            key,
            Entry {
                item,
                inserted_at: now,
                last_accessed_at: now,
                access_count: 0,
                approximate_size: size,
            },
        );
    }

    fn evict_over_capacity(&self, inner: &mut Inner<V>) {
        while inner.entries.len() > self.options.max_entries || inner.memory_bytes > self.options.max_memory_bytes {
            let Some(victim) = self.pick_eviction_victim(inner) else {
                break;
            };
            remove_entry(inner, &victim);
            inner.stats.evictions += 1;
        }
    }

    fn pick_eviction_victim(&self, inner: &Inner<V>) -> Option<String> {
        match self.options.policy {
            EvictionPolicy::Lru | EvictionPolicy::Fifo | EvictionPolicy::Ttl => {
                inner.order.values().next().cloned()
            }
            EvictionPolicy::Lfu => inner
                .entries
                .iter()
                .min_by(|(ak, a), (bk, b)| {
                    a.access_count
                        .cmp(&b.access_count)
                        .then_with(|| inner.order_seq_of[*ak].cmp(&inner.order_seq_of[*bk]))
                })
                // `ak`/`bk` are `&&String` here (iterator item refs borrowed
                // again by `min_by`'s closure params); `*ak` is the `&String`
                // `order_seq_of`'s `Index<&Q>` impl expects.
                .map(|(key, _)| key.clone()),
        }
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.inner.lock().unwrap().entries.contains_key(key)
    }

    pub fn remove(&self, key: &str) {
        let mut inner = self.inner.lock().unwrap();
        remove_entry(&mut inner, key);
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.entries.clear();
        inner.order.clear();
        inner.order_seq_of.clear();
        inner.memory_bytes = 0;
    }

    pub fn preload(&self, items: impl IntoIterator<Item = (String, V)>) {
        let mut inner = self.inner.lock().unwrap();
        for (key, item) in items {
            let size = Self::estimate_size(&item);
            self.insert_locked(&mut inner, key, item, size);
        }
        self.evict_over_capacity(&mut inner);
    }

    /// Read-through fetch (spec.md §4.10 `getOrFetch`): a cache hit never
    /// calls `loader`; a miss calls it with the lock released so the
    /// loader can itself touch the cache (e.g. via a nested `get`).
    pub fn get_or_fetch(
        &self,
        key: &str,
        loader: impl FnOnce() -> Result<V, InternalError>,
    ) -> Result<V, InternalError> {
        if let Some(item) = self.get(key) {
            return Ok(item);
        }
        let item = loader()?;
        self.put(key.to_string(), item.clone());
        Ok(item)
    }

    #[must_use]
    pub fn statistics(&self) -> Statistics {
        self.inner.lock().unwrap().stats.clone()
    }

    pub fn reset_statistics(&self) {
        self.inner.lock().unwrap().stats = Statistics::default();
    }
}

fn touch_order<V>(inner: &mut Inner<V>, key: &str) {
    if let Some(seq) = inner.order_seq_of.remove(key) {
        inner.order.remove(&seq);
    }
    let seq = inner.next_seq;
    inner.next_seq += 1;
    inner.order.insert(seq, key.to_string());
    inner.order_seq_of.insert(key.to_string(), seq);
}

fn remove_entry<V>(inner: &mut Inner<V>, key: &str) {
    if let Some(entry) = inner.entries.remove(key) {
        inner.memory_bytes -= entry.approximate_size;
    }
    if let Some(seq) = inner.order_seq_of.remove(key) {
        inner.order.remove(&seq);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(policy: EvictionPolicy, max_entries: usize) -> CacheOptions {
        CacheOptions {
            max_entries,
            max_memory_bytes: usize::MAX,
            ttl: None,
            policy,
        }
    }

    #[test]
    fn put_then_get_round_trips() {
        let cache: PreloadCache<String> = PreloadCache::new(CacheOptions::default());
        cache.put("a", "hello".to_string());
        assert_eq!(cache.get("a"), Some("hello".to_string()));
        assert_eq!(cache.statistics().hits, 1);
    }

    #[test]
    fn miss_on_absent_key_is_counted() {
        let cache: PreloadCache<String> = PreloadCache::new(CacheOptions::default());
        assert_eq!(cache.get("missing"), None);
        assert_eq!(cache.statistics().misses, 1);
    }

    #[test]
    fn lru_evicts_the_least_recently_used_entry() {
        let cache: PreloadCache<i64> = PreloadCache::new(options(EvictionPolicy::Lru, 2));
        cache.put("a", 1);
        cache.put("b", 2);
        cache.get("a"); // touch a, making b the LRU victim
        cache.put("c", 3);
        assert!(cache.contains("a"));
        assert!(!cache.contains("b"));
        assert!(cache.contains("c"));
        assert_eq!(cache.statistics().evictions, 1);
    }

    #[test]
    fn fifo_evicts_the_oldest_insert_regardless_of_access() {
        let cache: PreloadCache<i64> = PreloadCache::new(options(EvictionPolicy::Fifo, 2));
        cache.put("a", 1);
        cache.put("b", 2);
        cache.get("a"); // fifo ignores access order
        cache.put("c", 3);
        assert!(!cache.contains("a"));
        assert!(cache.contains("b"));
        assert!(cache.contains("c"));
    }

    #[test]
    fn lfu_evicts_the_least_frequently_used_entry() {
        let cache: PreloadCache<i64> = PreloadCache::new(options(EvictionPolicy::Lfu, 2));
        cache.put("a", 1);
        cache.put("b", 2);
        cache.get("a");
        cache.get("a");
        cache.put("c", 3);
        assert!(cache.contains("a"));
        assert!(!cache.contains("b"));
    }

    #[test]
    fn ttl_expiry_on_get_counts_as_miss_and_expiration() {
        let cache: PreloadCache<i64> = PreloadCache::new(CacheOptions {
            ttl: Some(Duration::from_nanos(1)),
            ..CacheOptions::default()
        });
        cache.put("a", 1);
        std::thread::sleep(Duration::from_millis(1));
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.statistics().expirations, 1);
    }

    #[test]
    fn get_or_fetch_only_calls_the_loader_on_a_miss() {
        let cache: PreloadCache<i64> = PreloadCache::new(CacheOptions::default());
        let mut calls = 0;
        let value = cache
            .get_or_fetch("a", || {
                calls += 1;
                Ok(7)
            })
            .unwrap();
        assert_eq!(value, 7);
        let again = cache.get_or_fetch("a", || unreachable!("loader should not run on hit")).unwrap();
        assert_eq!(again, 7);
        assert_eq!(calls, 1);
    }

    #[test]
    fn reset_statistics_zeroes_every_counter() {
        let cache: PreloadCache<i64> = PreloadCache::new(CacheOptions::default());
        cache.put("a", 1);
        cache.get("a");
        cache.get("missing");
        cache.reset_statistics();
        let stats = cache.statistics();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
    }
}
