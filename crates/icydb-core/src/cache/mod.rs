//! Module: cache
//! Responsibility: the in-memory preload cache (spec.md §4.10) — bounded
//! LRU/LFU/FIFO/TTL eviction over a mutex-guarded map.
//! Does not own: what gets cached or how a miss is resolved (`get_or_fetch`
//! callers own the loader); this module only owns eviction and statistics.
//! Boundary: `PreloadCache` is the only public type; `EvictionPolicy`
//! configures but never drives eviction directly.

pub mod cache;
pub mod policy;

pub use cache::{CacheOptions, PreloadCache, Statistics};
pub use policy::EvictionPolicy;
