//! Module: cache::policy
//! Responsibility: the four eviction policies spec.md §4.10 names.
//! Does not own: eviction mechanics (`cache::cache` picks which entry a
//! policy names and removes it).
//! Boundary: `EvictionPolicy` is a plain enum; all behavior lives in
//! `PreloadCache`'s eviction loop, dispatched on this value.

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EvictionPolicy {
    /// Evict the least-recently-accessed entry.
    Lru,
    /// Evict the least-frequently-accessed entry; ties broken toward the
    /// oldest insertion. Scans every entry on eviction (spec.md §4.10:
    /// "acceptable for small caches").
    Lfu,
    /// Evict the oldest-inserted entry, ignoring access history.
    Fifo,
    /// No capacity-driven eviction ordering of its own; entries are only
    /// ever removed by TTL expiry on `get`. When capacity is still
    /// exceeded after an insert (no expired entries to reclaim), the
    /// oldest-inserted entry is evicted as a fallback, matching `Fifo`.
    Ttl,
}
