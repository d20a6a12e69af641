//! Module: query
//! Responsibility: the entity query subsystem (spec.md §4.6) — predicate
//! algebra, the fluent query builder, the cost-based planner, and the
//! executor that runs a plan against the KV store.
//! Does not own: SPARQL's graph-pattern algebra (`sparql`) or graph
//! traversal algorithms (`graph`), which both build on this module's
//! predicate and execution primitives but operate over edges, not rows.
//! Boundary: `builder::QueryBuilder` is the only way to construct a
//! `Query`; `executor::Executor::run` is the only way to run one.

pub mod builder;
pub mod executor;
pub mod plan;
pub mod predicate;

pub use builder::{CachePolicy, Query, QueryBuilder, SortDirection};
pub use executor::{Executor, RowSource};
pub use plan::{PlanNode, Planner};
pub use predicate::{CompareOp, ComparePredicate, Predicate};
