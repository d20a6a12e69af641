//! Module: rank
//! Responsibility: rank-index structures (spec.md §4.3, §4.5) — the
//! skip list with span counters, and the bounded top-K heap it falls
//! back to before its invariants are established.
//! Does not own: the rank maintainer that drives these from item
//! writes (see `index::maintainers::rank_simple`).
//! Boundary: both structures operate purely in terms of `(score, pk)`
//! pairs; they know nothing about entities or items.

mod skiplist;
mod topk_heap;

pub use skiplist::SkipList;
pub use topk_heap::{ScoredPk, TopKHeap};
