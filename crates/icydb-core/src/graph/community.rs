//! Module: graph::community
//! Responsibility: community detection by synchronous label propagation
//! over a fixed node set (spec.md §4.7), plus a modularity estimate.
//! Does not own: node enumeration or edge lookup (`graph::traversal`).
//! Boundary: `detect_communities` is the only entry point.

use crate::graph::traversal::{EdgeIndex, node_key};
use crate::kv::Transaction;
use icydb_error::InternalError;
use icydb_primitives::FieldValue;
use std::collections::HashMap;
use std::time::Instant;

#[derive(Debug)]
pub struct CommunityResult {
    /// Community label per node, in the order `nodes` was supplied.
    pub assignments: Vec<(FieldValue, usize)>,
    pub communities: usize,
    pub iterations: u32,
    pub modularity: Option<f64>,
    pub duration_ns: u64,
}

#[derive(Clone, Copy, Debug)]
pub struct CommunityOptions {
    pub max_iterations: u32,
    pub compute_modularity: bool,
}

impl Default for CommunityOptions {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            compute_modularity: true,
        }
    }
}

/// Label propagation over the undirected closure of `edges` (forward and
/// backward both count as neighbors): each node adopts the most frequent
/// label among its neighbors, updated in place in node order each pass
/// (ties broken toward the larger label index for determinism). Stops
/// early once a full pass changes no label.
pub fn detect_communities(
    edges: &EdgeIndex,
    nodes: &[FieldValue],
    options: CommunityOptions,
    txn: &mut dyn Transaction,
) -> Result<CommunityResult, InternalError> {
    let started_at = Instant::now();
    let keys: Vec<Vec<u8>> = nodes.iter().map(node_key).collect();
    let index_of: HashMap<Vec<u8>, usize> = keys.iter().cloned().zip(0..).collect();

    let mut neighbors: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    let mut edge_count = 0u64;
    for (i, node) in nodes.iter().enumerate() {
        for (_, to) in edges.forward(node, txn)? {
            if let Some(&j) = index_of.get(&node_key(&to)) {
                neighbors[i].push(j);
                edge_count += 1;
            }
        }
        for (_, from) in edges.backward(node, txn)? {
            if let Some(&j) = index_of.get(&node_key(&from)) {
                neighbors[i].push(j);
            }
        }
    }

    let mut labels: Vec<usize> = (0..nodes.len()).collect();
    let mut iterations = 0u32;

    while iterations < options.max_iterations {
        let mut changed = false;
        for i in 0..nodes.len() {
            if neighbors[i].is_empty() {
                continue;
            }
            let mut counts: HashMap<usize, u32> = HashMap::new();
            for &j in &neighbors[i] {
                *counts.entry(labels[j]).or_insert(0) += 1;
            }
            let best = counts
                .into_iter()
                .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
                .map(|(label, _)| label)
                .unwrap_or(labels[i]);
            if best != labels[i] {
                labels[i] = best;
                changed = true;
            }
        }
        iterations += 1;
        if !changed {
            break;
        }
    }

    let distinct: std::collections::BTreeSet<usize> = labels.iter().copied().collect();
    let modularity = options
        .compute_modularity
        .then(|| modularity(&neighbors, &labels, edge_count));

    Ok(CommunityResult {
        assignments: nodes.iter().cloned().zip(labels).collect(),
        communities: distinct.len(),
        iterations,
        modularity,
        duration_ns: started_at.elapsed().as_nanos() as u64,
    })
}

/// Standard modularity `Q = (1/2m) * sum_ij (A_ij - k_i*k_j/2m) * delta(c_i,c_j)`
/// over the undirected adjacency this module builds.
fn modularity(neighbors: &[Vec<usize>], labels: &[usize], edge_count: u64) -> f64 {
    let two_m = (2 * edge_count).max(1) as f64;
    let degree: Vec<f64> = neighbors.iter().map(|n| n.len() as f64).collect();

    let mut q = 0.0;
    for i in 0..neighbors.len() {
        for &j in &neighbors[i] {
            if labels[i] == labels[j] {
                q += 1.0 - (degree[i] * degree[j]) / two_m;
            }
        }
    }
    q / two_m
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
    fn two_disjoint_triangles_form_two_communities() {
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
                maintainer.update_index(None, Some(&edge("c", "a")), b"e3", txn)?;
                maintainer.update_index(None, Some(&edge("x", "y")), b"e4", txn)?;
                maintainer.update_index(None, Some(&edge("y", "z")), b"e5", txn)?;
                maintainer.update_index(None, Some(&edge("z", "x")), b"e6", txn)
            })
            .unwrap();

        let edges = EdgeIndex::new(&base);
        let nodes = vec!["a", "b", "c", "x", "y", "z"]
            .into_iter()
            .map(|s| FieldValue::String(s.into()))
            .collect::<Vec<_>>();

        let result = store
            .run(|txn| detect_communities(&edges, &nodes, CommunityOptions::default(), txn))
            .unwrap();

        assert_eq!(result.communities, 2);
        let by_name: HashMap<&str, usize> = result
            .assignments
            .iter()
            .map(|(node, label)| match node {
                FieldValue::String(s) => (s.as_str(), *label),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(by_name["a"], by_name["b"]);
        assert_eq!(by_name["b"], by_name["c"]);
        assert_eq!(by_name["x"], by_name["y"]);
        assert_ne!(by_name["a"], by_name["x"]);
    }
}
