//! Module: graph::pagerank
//! Responsibility: damped iterative PageRank over a fixed node set
//! (spec.md §4.7), bounded by `max_iterations` and an L1 convergence
//! threshold.
//! Does not own: node enumeration (callers supply the node set — this
//! crate has no global "every node" index) or edge lookup
//! (`graph::traversal`).
//! Boundary: `pagerank` is the only entry point; it never mutates state.

use crate::graph::traversal::{EdgeIndex, node_key};
use crate::kv::Transaction;
use icydb_error::InternalError;
use icydb_primitives::FieldValue;
use std::collections::HashMap;
use std::time::Instant;

pub const DEFAULT_DAMPING: f64 = 0.85;
const CONVERGENCE_THRESHOLD: f64 = 1e-6;

#[derive(Debug)]
pub struct PageRankResult {
    /// Final score per node, in the order `nodes` was supplied.
    pub scores: Vec<(FieldValue, f64)>,
    pub iterations: u32,
    pub convergence_delta: f64,
    pub duration_ns: u64,
    pub is_complete: bool,
}

#[derive(Clone, Copy, Debug)]
pub struct PageRankOptions {
    pub damping: f64,
    pub max_iterations: u32,
}

impl Default for PageRankOptions {
    fn default() -> Self {
        Self {
            damping: DEFAULT_DAMPING,
            max_iterations: 100,
        }
    }
}

/// Runs PageRank over exactly `nodes` — edges leading outside this set are
/// followed for mass but do not add new nodes to the graph iterated over,
/// matching a bounded/resumable computation over a caller-chosen subgraph.
pub fn pagerank(
    edges: &EdgeIndex,
    nodes: &[FieldValue],
    options: PageRankOptions,
    txn: &mut dyn Transaction,
) -> Result<PageRankResult, InternalError> {
    let started_at = Instant::now();
    let n = nodes.len().max(1) as f64;
    let keys: Vec<Vec<u8>> = nodes.iter().map(node_key).collect();
    let index_of: HashMap<Vec<u8>, usize> = keys.iter().cloned().zip(0..).collect();

    let mut out_degree = vec![0u32; nodes.len()];
    let mut out_links: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for (i, node) in nodes.iter().enumerate() {
        for (_, to) in edges.forward(node, txn)? {
            if let Some(&j) = index_of.get(&node_key(&to)) {
                out_links[i].push(j);
                out_degree[i] += 1;
            }
        }
    }

    let mut scores = vec![1.0 / n; nodes.len()];
    let mut iterations = 0u32;
    let mut delta = f64::INFINITY;
    let mut is_complete = false;

    while iterations < options.max_iterations {
        let dangling_mass: f64 = (0..nodes.len())
            .filter(|&i| out_degree[i] == 0)
            .map(|i| scores[i])
            .sum();

        let mut next = vec![(1.0 - options.damping) / n; nodes.len()];
        for i in 0..nodes.len() {
            let distributable = scores[i] / out_degree[i].max(1) as f64;
            if out_degree[i] == 0 {
                continue;
            }
            for &j in &out_links[i] {
                next[j] += options.damping * distributable;
            }
        }
        for score in &mut next {
            *score += options.damping * dangling_mass / n;
        }

        delta = next.iter().zip(&scores).map(|(a, b)| (a - b).abs()).sum();
        scores = next;
        iterations += 1;

        if delta < CONVERGENCE_THRESHOLD {
            is_complete = true;
            break;
        }
    }

    Ok(PageRankResult {
        scores: nodes.iter().cloned().zip(scores).collect(),
        iterations,
        convergence_delta: delta,
        duration_ns: started_at.elapsed().as_nanos() as u64,
        is_complete,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::contracts::{IndexMaintainer, Item};
    use crate::index::maintainers::{GraphMaintainer, GraphStrategy};
    use crate::kv::{MemStore, Store};
    use crate::subspace::Subspace;

    fn edge(from: &str, to: &str) -> Item {
        let mut item = Item::new();
        item.insert("from".into(), FieldValue::String(from.into()));
        item.insert("edge".into(), FieldValue::String("link".into()));
        item.insert("to".into(), FieldValue::String(to.into()));
        item
    }

    #[test]
    fn converges_to_a_uniform_distribution_on_a_symmetric_cycle() {
        let store = MemStore::new();
        let base = Subspace::root(b"g".to_vec());
        let maintainer = GraphMaintainer::new(
            GraphStrategy::Adjacency,
            base.clone(),
            ["from".into(), "edge".into(), "to".into()],
        );
        store
            .run(|txn| {
                maintainer.update_index(None, Some(&edge("a", "b")), b"e1", txn)?;
                maintainer.update_index(None, Some(&edge("b", "c")), b"e2", txn)?;
                maintainer.update_index(None, Some(&edge("c", "a")), b"e3", txn)
            })
            .unwrap();

        let edges = EdgeIndex::new(&base);
        let nodes = vec![
            FieldValue::String("a".into()),
            FieldValue::String("b".into()),
            FieldValue::String("c".into()),
        ];

        let result = store
            .run(|txn| pagerank(&edges, &nodes, PageRankOptions::default(), txn))
            .unwrap();

        assert!(result.is_complete);
        for (_, score) in &result.scores {
            assert!((score - 1.0 / 3.0).abs() < 1e-4);
        }
    }

    #[test]
    fn low_iteration_budget_reports_incomplete() {
        let store = MemStore::new();
        let base = Subspace::root(b"g".to_vec());
        let maintainer = GraphMaintainer::new(
            GraphStrategy::Adjacency,
            base.clone(),
            ["from".into(), "edge".into(), "to".into()],
        );
        store
            .run(|txn| maintainer.update_index(None, Some(&edge("a", "b")), b"e1", txn))
            .unwrap();

        let edges = EdgeIndex::new(&base);
        let nodes = vec![FieldValue::String("a".into()), FieldValue::String("b".into())];

        let result = store
            .run(|txn| {
                pagerank(
                    &edges,
                    &nodes,
                    PageRankOptions {
                        damping: DEFAULT_DAMPING,
                        max_iterations: 1,
                    },
                    txn,
                )
            })
            .unwrap();

        assert_eq!(result.iterations, 1);
    }
}
