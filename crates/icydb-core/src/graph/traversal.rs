//! Module: graph::traversal
//! Responsibility: the forward/backward edge-lookup primitive every graph
//! algorithm in this module is built on, reading an `Adjacency`-strategy
//! graph index's `fwd`/`rev` subspaces (spec.md §4.7).
//! Does not own: the adjacency key layout itself (`index::maintainers::graph`)
//! or any particular algorithm's traversal order.
//! Boundary: `EdgeIndex::forward`/`backward` are the only ways an algorithm
//! reads edges; nothing here touches the KV store except through `Transaction`.

use crate::kv::{KeySelector, RangeOptions, Transaction};
use crate::subspace::Subspace;
use icydb_error::InternalError;
use icydb_primitives::FieldValue;

/// A single hop: the edge label and the node on the other end.
pub type Edge = (FieldValue, FieldValue);

///
/// EdgeIndex
///
/// Wraps a graph index's base subspace built with `GraphStrategy::Adjacency`
/// (`index::maintainers::graph`). Triple-store and hexastore layouts serve
/// BGP joins (`sparql`), not the node-at-a-time traversal these algorithms
/// need, so this type assumes the `fwd`/`rev` permutations adjacency
/// maintains.
///

pub struct EdgeIndex {
    forward: Subspace,
    backward: Subspace,
}

impl EdgeIndex {
    #[must_use]
    pub fn new(base: &Subspace) -> Self {
        Self {
            forward: base.subspace(b"fwd"),
            backward: base.subspace(b"rev"),
        }
    }

    /// Outgoing edges from `node`: `(edge, to)` pairs.
    pub fn forward(&self, node: &FieldValue, txn: &mut dyn Transaction) -> Result<Vec<Edge>, InternalError> {
        scan(&self.forward, node, txn)
    }

    /// Incoming edges into `node`: `(edge, from)` pairs.
    pub fn backward(&self, node: &FieldValue, txn: &mut dyn Transaction) -> Result<Vec<Edge>, InternalError> {
        scan(&self.backward, node, txn)
    }
}

fn scan(subspace: &Subspace, node: &FieldValue, txn: &mut dyn Transaction) -> Result<Vec<Edge>, InternalError> {
    let prefix = subspace.pack(std::slice::from_ref(node))?;
    let (begin, end) = Subspace::root(prefix).range();
    let rows = txn.get_range(
        KeySelector::first_greater_or_equal(begin),
        KeySelector::first_greater_or_equal(end),
        RangeOptions::default(),
    )?;
    rows.iter()
        .map(|(key, _)| {
            let mut tuple = subspace.unpack(key)?;
            let other = tuple.pop().ok_or_else(|| {
                InternalError::invariant(icydb_error::ErrorOrigin::Graph, "adjacency entry missing far node")
            })?;
            let edge = tuple.pop().ok_or_else(|| {
                InternalError::invariant(icydb_error::ErrorOrigin::Graph, "adjacency entry missing edge label")
            })?;
            Ok((edge, other))
        })
        .collect()
}

/// Stable identity key for a node inside an algorithm's visited/score maps.
/// `FieldValue` has no derived `Eq`/`Hash` (see `query::executor`'s
/// dedupe note), so every algorithm here keys on the node's CBOR encoding.
pub fn node_key(node: &FieldValue) -> Vec<u8> {
    serde_cbor::to_vec(node).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::contracts::{IndexMaintainer, Item};
    use crate::index::maintainers::{GraphMaintainer, GraphStrategy};
    use crate::kv::{MemStore, Store};

    fn edge(from: &str, label: &str, to: &str) -> Item {
        let mut item = Item::new();
        item.insert("from".into(), FieldValue::String(from.into()));
        item.insert("edge".into(), FieldValue::String(label.into()));
        item.insert("to".into(), FieldValue::String(to.into()));
        item
    }

    #[test]
    fn forward_and_backward_agree_on_reversed_direction() {
        let store = MemStore::new();
        let base = Subspace::root(b"g".to_vec());
        let maintainer = GraphMaintainer::new(
            GraphStrategy::Adjacency,
            base.clone(),
            ["from".into(), "edge".into(), "to".into()],
        );
        store
            .run(|txn| maintainer.update_index(None, Some(&edge("a", "knows", "b")), b"e1", txn))
            .unwrap();

        let edges = EdgeIndex::new(&base);
        let a_node = FieldValue::String("a".into());
        let b_node = FieldValue::String("b".into());

        let out = store.run(|txn| edges.forward(&a_node, txn)).unwrap();
        assert_eq!(out.len(), 1);
        assert!(out[0].1.eq_value(&b_node));

        let into = store.run(|txn| edges.backward(&b_node, txn)).unwrap();
        assert_eq!(into.len(), 1);
        assert!(into[0].1.eq_value(&a_node));
    }
}
