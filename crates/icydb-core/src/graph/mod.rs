//! Module: graph
//! Responsibility: bounded, resumable graph algorithms over an
//! `Adjacency`-strategy graph index (spec.md §4.7) — shortest path,
//! PageRank, and community detection.
//! Does not own: the graph index key layout (`index::maintainers::graph`)
//! or BGP join execution over triple-store/hexastore permutations
//! (`sparql`). Both read the same underlying maintainer family but serve
//! different access patterns.
//! Boundary: every algorithm here takes an `EdgeIndex` and a transaction;
//! none of them write to the index.

pub mod community;
pub mod pagerank;
pub mod shortest_path;
pub mod traversal;

pub use community::{CommunityOptions, CommunityResult, detect_communities};
pub use pagerank::{PageRankOptions, PageRankResult, pagerank};
pub use shortest_path::{LimitReason, ShortestPathOptions, ShortestPathResult, shortest_path};
pub use traversal::EdgeIndex;
