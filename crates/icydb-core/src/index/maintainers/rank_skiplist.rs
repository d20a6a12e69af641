//! Module: index::maintainers::rank_skiplist
//! Responsibility: the precise rank index maintainer — drives a
//! `rank::SkipList` from item writes, for rank indexes that need
//! `O(log n)` point rank in addition to top-K (spec.md §4.3/§4.5).
//! Does not own: span-counter algebra (see `rank::SkipList`) or the
//! simple flat-set rank maintainer (`rank_simple`, for indexes that
//! only need top-K).
//! Boundary: one `SkiplistRankMaintainer` per precise-rank index
//! descriptor.

use crate::index::contracts::{IndexMaintainer, Item};
use crate::kv::Transaction;
use crate::rank::{ScoredPk, SkipList};
use crate::subspace::Subspace;
use icydb_error::{ErrorClass, ErrorOrigin, InternalError};
use icydb_primitives::FieldValue;

///
/// SkiplistRankMaintainer
///
/// `extract_score` applies the same reject-on-overflow narrowing as
/// [`super::rank_simple::SimpleRankMaintainer`] (spec.md §9 open
/// question 1).
///

pub struct SkiplistRankMaintainer {
    pub name: String,
    pub field: String,
    pub list: SkipList,
}

impl SkiplistRankMaintainer {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        index_subspace: Subspace,
        field: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            field: field.into(),
            list: SkipList::new(index_subspace),
        }
    }

    fn extract_score(&self, item: &Item) -> Result<Option<i64>, InternalError> {
        match item.get(&self.field) {
            None | Some(FieldValue::Null) => Ok(None),
            Some(value) => value.narrow_to_i64().map(Some).map_err(|e| {
                InternalError::new(
                    ErrorClass::InvalidScore,
                    ErrorOrigin::Rank,
                    format!("rank index {}: {e}", self.name),
                )
            }),
        }
    }

    pub fn rank(
        &self,
        txn: &mut dyn Transaction,
        score: i64,
        pk: Vec<u8>,
    ) -> Result<Option<u64>, InternalError> {
        self.list.rank(txn, FieldValue::Int64(score), pk)
    }

    pub fn top_k(
        &self,
        txn: &mut dyn Transaction,
        k: usize,
    ) -> Result<Vec<ScoredPk>, InternalError> {
        self.list.top_k(txn, k)
    }

    pub fn percentile(
        &self,
        txn: &mut dyn Transaction,
        p: f64,
    ) -> Result<Option<FieldValue>, InternalError> {
        self.list.percentile(txn, p)
    }
}

impl IndexMaintainer for SkiplistRankMaintainer {
    fn update_index(
        &self,
        old_item: Option<&Item>,
        new_item: Option<&Item>,
        pk: &[u8],
        txn: &mut dyn Transaction,
    ) -> Result<(), InternalError> {
        let old_score = old_item
            .map(|i| self.extract_score(i))
            .transpose()?
            .flatten();
        let new_score = new_item
            .map(|i| self.extract_score(i))
            .transpose()?
            .flatten();
        if old_score == new_score {
            return Ok(());
        }
        if let Some(score) = old_score {
            self.list
                .delete(txn, FieldValue::Int64(score), pk.to_vec())?;
        }
        if let Some(score) = new_score {
            self.list
                .insert(txn, FieldValue::Int64(score), pk.to_vec())?;
        }
        Ok(())
    }

    fn compute_index_keys(&self, _item: &Item, _pk: &[u8]) -> Result<Vec<Vec<u8>>, InternalError> {
        // The skip list's key layout is owned entirely by `SkipList`
        // (span-valued entries, head-span and count records); there is
        // no single "set of marker keys" to report here. The online
        // builder drives this maintainer through `update_index`
        // directly rather than through the default `scan_item`.
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::{MemStore, Store};

    fn item(score: i64) -> Item {
        let mut item = Item::new();
        item.insert("score".to_string(), FieldValue::Int64(score));
        item
    }

    #[test]
    fn insert_then_rank_then_delete() {
        let store = MemStore::new();
        let maintainer =
            SkiplistRankMaintainer::new("lb", Subspace::root(b"idx".to_vec()), "score");

        store
            .run(|txn| {
                for (pk, score) in [("p1", 50), ("p2", 90), ("p3", 70)] {
                    maintainer.update_index(None, Some(&item(score)), pk.as_bytes(), txn)?;
                }
                Ok(())
            })
            .unwrap();

        assert_eq!(
            store
                .run(|txn| maintainer.rank(txn, 90, b"p2".to_vec()))
                .unwrap(),
            Some(0)
        );
        assert_eq!(
            store
                .run(|txn| maintainer.rank(txn, 50, b"p1".to_vec()))
                .unwrap(),
            Some(2)
        );

        store
            .run(|txn| maintainer.update_index(Some(&item(90)), None, b"p2", txn))
            .unwrap();
        assert_eq!(
            store
                .run(|txn| maintainer.rank(txn, 90, b"p2".to_vec()))
                .unwrap(),
            None
        );
    }
}
