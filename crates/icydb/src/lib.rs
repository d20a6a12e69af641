//! # icydb
//!
//! Public facade over the indexing core. Downstream crates depend on
//! `icydb`, not on `icydb-core`/`icydb-schema`/`icydb-primitives`/
//! `icydb-error` directly — those stay free to reshape their internals as
//! long as this crate's re-exports keep their shape.
//!
//! Low-level execution, storage, and maintainer internals live in
//! `icydb-core` and are re-exported here as `icydb::core` for tests and
//! advanced callers; the stable entry points are `query`, `sparql`,
//! `graph`, `session`, `cache`, and `fetch`.

pub mod error;

pub use error::Error;
pub use icydb_primitives::{FieldValue, PrimitiveType};
pub use icydb_schema as schema;

/// Full engine internals, for tests and generated code. Not covered by
/// semver guarantees beyond what the other re-exports promise.
#[doc(hidden)]
pub mod core {
    pub use icydb_core::*;
}

pub mod query {
    pub use icydb_core::query::{
        CachePolicy, CompareOp, ComparePredicate, Executor, PlanNode, Planner, Predicate, Query,
        QueryBuilder, RowSource, SortDirection,
    };
}

pub mod sparql {
    pub use icydb_core::sparql::{
        Binding, ExecutionNode, GraphPattern, GraphPatternConverter, PathLength, PropertyPath,
        Triple, TripleIndex, execute,
    };
}

pub mod graph {
    pub use icydb_core::graph::{CommunityOptions, CommunityResult, EdgeIndex, LimitReason, PageRankOptions, PageRankResult, ShortestPathOptions, ShortestPathResult, detect_communities, pagerank, shortest_path};
}

pub mod session {
    pub use icydb_core::session::{LockHolder, LockOptions, Session};
}

pub mod cache {
    pub use icydb_core::cache::{CacheOptions, EvictionPolicy, PreloadCache, Statistics};
}

pub mod fetch {
    pub use icydb_core::fetch::{BulkFetcher, FetchOptions, fetch_parallel};
}

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
