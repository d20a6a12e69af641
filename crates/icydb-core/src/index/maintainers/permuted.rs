//! Module: index::maintainers::permuted
//! Responsibility: permuted index key layout — stores every permutation of
//! the indexed fields so any prefix-equality pattern hits one (spec.md
//! §4.3).
//! Does not own: permutation selection by the planner.
//! Boundary: one `PermutedMaintainer` per permuted index descriptor.

use crate::index::contracts::{IndexMaintainer, Item, field_values};
use crate::subspace::Subspace;
use icydb_error::InternalError;
use icydb_primitives::FieldValue;

///
/// PermutedMaintainer
///
/// One child subspace per permutation of `fields`, keyed by the
/// permutation's index into `all_permutations(fields.len())`. Each
/// permutation's entries use the scalar layout
/// `[perm-subspace][field-values-in-perm-order…][pk] = ∅`.
///

pub struct PermutedMaintainer {
    pub base: Subspace,
    pub fields: Vec<String>,
    pub sparse: bool,
    permutations: Vec<Vec<usize>>,
}

impl PermutedMaintainer {
    #[must_use]
    pub fn new(base: Subspace, fields: Vec<String>) -> Self {
        let permutations = all_permutations(fields.len());
        Self {
            base,
            fields,
            sparse: false,
            permutations,
        }
    }

    #[must_use]
    pub const fn with_sparse(mut self, sparse: bool) -> Self {
        self.sparse = sparse;
        self
    }

    fn perm_subspace(&self, perm_index: usize) -> Subspace {
        self.base.subspace(&(perm_index as u32).to_be_bytes())
    }
}

impl IndexMaintainer for PermutedMaintainer {
    fn compute_index_keys(&self, item: &Item, pk: &[u8]) -> Result<Vec<Vec<u8>>, InternalError> {
        let Some(values) = field_values(item, &self.fields, self.sparse) else {
            return Ok(Vec::new());
        };
        self.permutations
            .iter()
            .enumerate()
            .map(|(perm_index, order)| {
                let mut tuple: Vec<FieldValue> = order.iter().map(|&i| values[i].clone()).collect();
                tuple.push(FieldValue::Data(pk.to_vec()));
                self.perm_subspace(perm_index).pack(&tuple)
            })
            .collect()
    }
}

fn all_permutations(n: usize) -> Vec<Vec<usize>> {
    fn permute(remaining: &[usize], acc: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
        if remaining.is_empty() {
            out.push(acc.clone());
            return;
        }
        for (i, &value) in remaining.iter().enumerate() {
            let mut rest = remaining.to_vec();
            rest.remove(i);
            acc.push(value);
            permute(&rest, acc, out);
            acc.pop();
        }
    }
    let indices: Vec<usize> = (0..n).collect();
    let mut out = Vec::new();
    permute(&indices, &mut Vec::new(), &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_fields_produce_two_permutation_subspaces() {
        let mut item = Item::new();
        item.insert("a".into(), FieldValue::Int64(1));
        item.insert("b".into(), FieldValue::Int64(2));
        let maintainer = PermutedMaintainer::new(
            Subspace::root(b"idx".to_vec()),
            vec!["a".to_string(), "b".to_string()],
        );
        let keys = maintainer.compute_index_keys(&item, b"pk").unwrap();
        assert_eq!(keys.len(), 2);
        assert_ne!(keys[0], keys[1]);
    }

    #[test]
    fn three_fields_produce_six_permutations() {
        assert_eq!(all_permutations(3).len(), 6);
    }
}
