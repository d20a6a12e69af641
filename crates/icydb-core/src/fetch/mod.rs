//! Module: fetch
//! Responsibility: the remote/bulk primary-key fetcher (spec.md §4.11) —
//! batched in-transaction fetch with locality reordering, a streaming
//! variant, and a parallel multi-transaction coordinator.
//! Does not own: the item key convention itself (shared with
//! `query::executor`) or any caching of fetched items (`cache`).
//! Boundary: `bulk::BulkFetcher` is the transactional entry point;
//! `parallel::fetch_parallel` is the non-transactional one.

pub mod bulk;
pub mod parallel;

pub use bulk::{BulkFetcher, FetchOptions};
pub use parallel::fetch_parallel;
