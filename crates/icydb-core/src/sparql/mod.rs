//! Module: sparql
//! Responsibility: the SPARQL-shaped graph query front end (spec.md
//! §4.6) — a `GraphPattern` AST, its conversion to an execution-side
//! `ExecutionNode` tree (`GraphPatternConverter`), property paths, and the
//! executor that runs the result against a `Hexastore`-strategy graph
//! index.
//! Does not own: the graph index key layout (`index::maintainers::graph`)
//! or node-at-a-time traversal algorithms (`graph`), both of which this
//! module's executor and path evaluator build on.
//! Boundary: `sparql::execute::execute` is the only entry point that
//! touches storage; `ast`/`algebra`/`path` are pure data.

pub mod algebra;
pub mod ast;
pub mod convert;
pub mod execute;
pub mod path;

pub use algebra::ExecutionNode;
pub use ast::{Aggregate, GraphPattern, Term, Triple};
pub use convert::GraphPatternConverter;
pub use execute::{Binding, TripleIndex, execute};
pub use path::{PathLength, PropertyPath};
