//! Module: index::maintainers::graph
//! Responsibility: graph index key layouts — adjacency, triple-store, and
//! hexastore strategies (spec.md §4.3).
//! Does not own: BGP join planning (see `query`/`graph` — the query
//! executor picks which permutation best matches a bound/free pattern).
//! Boundary: one `GraphMaintainer` per graph index descriptor.

use crate::index::contracts::{IndexMaintainer, Item};
use crate::subspace::Subspace;
use icydb_error::InternalError;
use icydb_primitives::FieldValue;

///
/// GraphStrategy
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GraphStrategy {
    Adjacency,
    TripleStore,
    Hexastore,
}

/// Index into `[from/s, edge/p, to/o]` for each permutation a strategy
/// maintains.
const TRIPLE_STORE_PERMS: [[usize; 3]; 3] = [[0, 1, 2], [1, 2, 0], [2, 0, 1]];
const HEXASTORE_PERMS: [[usize; 3]; 6] = [
    [0, 1, 2],
    [0, 2, 1],
    [1, 0, 2],
    [1, 2, 0],
    [2, 0, 1],
    [2, 1, 0],
];

///
/// GraphMaintainer
///
/// `fields` is always `[from, edge, to]` (role order, not indexed-field
/// declaration order) regardless of strategy.
///

pub struct GraphMaintainer {
    pub strategy: GraphStrategy,
    pub base: Subspace,
    pub fields: [String; 3],
}

impl GraphMaintainer {
    #[must_use]
    pub fn new(strategy: GraphStrategy, base: Subspace, fields: [String; 3]) -> Self {
        Self {
            strategy,
            base,
            fields,
        }
    }

    fn role_values(&self, item: &Item) -> Option<[FieldValue; 3]> {
        let from = item.get(&self.fields[0])?.clone();
        let edge = item.get(&self.fields[1])?.clone();
        let to = item.get(&self.fields[2])?.clone();
        Some([from, edge, to])
    }

    fn perm_key(
        &self,
        subspace_name: &[u8],
        values: &[FieldValue; 3],
        order: [usize; 3],
    ) -> Result<Vec<u8>, InternalError> {
        let tuple = vec![
            values[order[0]].clone(),
            values[order[1]].clone(),
            values[order[2]].clone(),
        ];
        self.base.subspace(subspace_name).pack(&tuple)
    }
}

impl IndexMaintainer for GraphMaintainer {
    fn compute_index_keys(&self, item: &Item, _pk: &[u8]) -> Result<Vec<Vec<u8>>, InternalError> {
        let Some(values) = self.role_values(item) else {
            return Ok(Vec::new());
        };

        match self.strategy {
            GraphStrategy::Adjacency => Ok(vec![
                self.perm_key(b"fwd", &values, [0, 1, 2])?,
                self.perm_key(b"rev", &values, [2, 1, 0])?,
            ]),
            GraphStrategy::TripleStore => TRIPLE_STORE_PERMS
                .iter()
                .enumerate()
                .map(|(i, &order)| self.perm_key(perm_name(i), &values, order))
                .collect(),
            GraphStrategy::Hexastore => HEXASTORE_PERMS
                .iter()
                .enumerate()
                .map(|(i, &order)| self.perm_key(perm_name(i), &values, order))
                .collect(),
        }
    }
}

fn perm_name(i: usize) -> &'static [u8] {
    const NAMES: [&[u8]; 6] = [b"p0", b"p1", b"p2", b"p3", b"p4", b"p5"];
    NAMES[i]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge_item() -> Item {
        let mut item = Item::new();
        item.insert("from".into(), FieldValue::String("a".into()));
        item.insert("edge".into(), FieldValue::String("knows".into()));
        item.insert("to".into(), FieldValue::String("b".into()));
        item
    }

    #[test]
    fn adjacency_produces_forward_and_reverse_entries() {
        let maintainer = GraphMaintainer::new(
            GraphStrategy::Adjacency,
            Subspace::root(b"idx".to_vec()),
            ["from".into(), "edge".into(), "to".into()],
        );
        let keys = maintainer.compute_index_keys(&edge_item(), b"e1").unwrap();
        assert_eq!(keys.len(), 2);
        assert_ne!(keys[0], keys[1]);
    }

    #[test]
    fn hexastore_produces_six_permutations() {
        let maintainer = GraphMaintainer::new(
            GraphStrategy::Hexastore,
            Subspace::root(b"idx".to_vec()),
            ["from".into(), "edge".into(), "to".into()],
        );
        let keys = maintainer.compute_index_keys(&edge_item(), b"e1").unwrap();
        assert_eq!(keys.len(), 6);
        let unique: std::collections::HashSet<_> = keys.iter().collect();
        assert_eq!(unique.len(), 6);
    }

    #[test]
    fn missing_role_field_produces_no_entries() {
        let maintainer = GraphMaintainer::new(
            GraphStrategy::TripleStore,
            Subspace::root(b"idx".to_vec()),
            ["from".into(), "edge".into(), "to".into()],
        );
        assert!(
            maintainer
                .compute_index_keys(&Item::new(), b"e1")
                .unwrap()
                .is_empty()
        );
    }
}
