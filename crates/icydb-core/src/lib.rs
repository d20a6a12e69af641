//! Multi-model indexing core: subspace/directory algebra, schema catalog
//! storage, index maintainers, the online builder, rank skip lists, query
//! execution (including the SPARQL front end), graph algorithms, the
//! synchronized session, preload cache, and the remote fetcher.
//!
//! Everything here is written against the [`kv`] trait boundary; no module
//! outside `kv` knows whether it's talking to the in-memory reference store
//! or a real transactional ordered key-value store.

pub mod builder;
pub mod cache;
pub mod catalog;
pub mod fetch;
pub mod graph;
pub mod index;
pub mod kv;
pub mod query;
pub mod rank;
pub mod session;
pub mod sparql;
pub mod subspace;
