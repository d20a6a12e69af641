//! Module: index::maintainers
//! Responsibility: concrete key layouts for every index kind spec.md §4.3
//! names, each implementing `index::contracts::IndexMaintainer`.
//! Does not own: the maintainer contract itself (`index::contracts`) or
//! index selection/dispatch (the query planner picks which maintainer to
//! consult; that lives under the query-execution modules).
//! Boundary: opaque-kind maintainers (bitmap, leaderboard, vector,
//! fulltext, spatial, relationship) are represented by `opaque` — spec.md
//! §4.3 specifies only their tests and query entry points, not their key
//! layout, so `opaque` stores an arbitrary caller-supplied payload per
//! marker key and leaves interpretation to the query layer.

mod aggregation;
mod graph;
mod opaque;
mod permuted;
mod rank_simple;
mod rank_skiplist;
mod scalar;
mod version;

pub use aggregation::AggregationMaintainer;
pub use graph::GraphMaintainer;
pub use opaque::OpaqueMaintainer;
pub use permuted::PermutedMaintainer;
pub use rank_simple::SimpleRankMaintainer;
pub use rank_skiplist::SkiplistRankMaintainer;
pub use scalar::ScalarMaintainer;
pub use version::{VersionEntry, VersionMaintainer};
