//! Module: index::maintainers::rank_simple
//! Responsibility: the simple rank index key layout — a flat
//! `[score][pk] = ∅` marker set plus an atomic count, for rank indexes
//! that only need `topK`/count and not `O(log n)` point rank (spec.md
//! §4.3 "Rank (simple)").
//! Does not own: the skip-list rank maintainer (see
//! `rank_skiplist` — for indexes that declare `rank(precise: true)`).
//! Boundary: one `SimpleRankMaintainer` per simple-rank index descriptor.

use crate::index::contracts::{IndexMaintainer, Item};
use crate::kv::{KeySelector, RangeOptions, Transaction};
use crate::rank::{ScoredPk, TopKHeap};
use crate::subspace::Subspace;
use icydb_error::{ErrorClass, ErrorOrigin, InternalError};
use icydb_primitives::FieldValue;

///
/// SimpleRankMaintainer
///
/// Key layout `[subspace/scores][score][pk] = ∅`, plus an atomic
/// `_count` key. `topK` drains a [`TopKHeap`] seeded from a full scan —
/// this maintainer has no span counters, so a point `rank(score, pk)`
/// query is not offered; use the skip-list maintainer when that's
/// needed.
///

pub struct SimpleRankMaintainer {
    pub name: String,
    pub scores: Subspace,
    pub count: Vec<u8>,
    pub field: String,
}

impl SimpleRankMaintainer {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        index_subspace: &Subspace,
        field: impl Into<String>,
    ) -> Result<Self, InternalError> {
        let name = name.into();
        let count = index_subspace.pack(&[FieldValue::String("_count".to_string())])?;
        Ok(Self {
            name,
            scores: index_subspace.subspace(b"scores"),
            count,
            field: field.into(),
        })
    }

    fn extract_score(&self, item: &Item) -> Result<Option<i64>, InternalError> {
        match item.get(&self.field) {
            None | Some(FieldValue::Null) => Ok(None),
            Some(value) => value.narrow_to_i64().map(Some).map_err(|e| {
                InternalError::new(
                    ErrorClass::InvalidScore,
                    ErrorOrigin::Index,
                    format!("rank index {}: {e}", self.name),
                )
            }),
        }
    }

    fn entry_key(&self, score: i64, pk: &[u8]) -> Result<Vec<u8>, InternalError> {
        self.scores
            .pack(&[FieldValue::Int64(score), FieldValue::Data(pk.to_vec())])
    }

    /// Drain every `(score, pk)` pair into a bounded top-K heap and
    /// return the top `k` in descending order, ties broken by ascending
    /// pk.
    pub fn top_k(
        &self,
        txn: &mut dyn Transaction,
        k: usize,
    ) -> Result<Vec<ScoredPk>, InternalError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let (begin, end) = self.scores.range();
        let rows = txn.get_range(
            KeySelector::first_greater_or_equal(begin),
            KeySelector::first_greater_or_equal(end),
            RangeOptions::default(),
        )?;
        let mut heap = TopKHeap::new(k);
        for (key, _) in rows {
            let mut tuple = self.scores.unpack(&key)?;
            let pk = match tuple.pop() {
                Some(FieldValue::Data(d)) => d,
                _ => {
                    return Err(InternalError::invariant(
                        ErrorOrigin::Index,
                        "simple rank entry key missing its primary-key component",
                    ));
                }
            };
            let score = tuple.pop().ok_or_else(|| {
                InternalError::invariant(
                    ErrorOrigin::Index,
                    "simple rank entry key missing its score component",
                )
            })?;
            heap.offer(ScoredPk::new(score, pk));
        }
        Ok(heap.drain_desc())
    }

    pub fn count(&self, txn: &mut dyn Transaction) -> Result<i64, InternalError> {
        txn.get_counter(&self.count)
    }
}

impl IndexMaintainer for SimpleRankMaintainer {
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
            txn.clear(&self.entry_key(score, pk)?);
            txn.atomic_add(&self.count, -1)?;
        }
        if let Some(score) = new_score {
            txn.set(self.entry_key(score, pk)?, Vec::new());
            txn.atomic_add(&self.count, 1)?;
        }
        Ok(())
    }

    fn compute_index_keys(&self, item: &Item, pk: &[u8]) -> Result<Vec<Vec<u8>>, InternalError> {
        match self.extract_score(item)? {
            None => Ok(Vec::new()),
            Some(score) => Ok(vec![self.entry_key(score, pk)?]),
        }
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
    fn top_k_and_count_track_inserts() {
        let store = MemStore::new();
        let maintainer =
            SimpleRankMaintainer::new("leaderboard", &Subspace::root(b"idx".to_vec()), "score")
                .unwrap();

        store
            .run(|txn| {
                for (pk, score) in [("p1", 50), ("p2", 90), ("p3", 70)] {
                    maintainer.update_index(None, Some(&item(score)), pk.as_bytes(), txn)?;
                }
                Ok(())
            })
            .unwrap();

        let top = store.run(|txn| maintainer.top_k(txn, 2)).unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].pk, b"p2");
        assert_eq!(top[1].pk, b"p3");
        assert_eq!(store.run(|txn| maintainer.count(txn)).unwrap(), 3);
    }

    #[test]
    fn non_integral_score_is_an_invalid_score_error() {
        let store = MemStore::new();
        let maintainer =
            SimpleRankMaintainer::new("leaderboard", &Subspace::root(b"idx".to_vec()), "score")
                .unwrap();
        let mut item = Item::new();
        item.insert("score".to_string(), FieldValue::Double(1.5));
        let result = store.run(|txn| maintainer.update_index(None, Some(&item), b"p1", txn));
        assert_eq!(result.unwrap_err().class, ErrorClass::InvalidScore);
    }

    #[test]
    fn delete_decrements_count() {
        let store = MemStore::new();
        let maintainer =
            SimpleRankMaintainer::new("leaderboard", &Subspace::root(b"idx".to_vec()), "score")
                .unwrap();
        store
            .run(|txn| maintainer.update_index(None, Some(&item(50)), b"p1", txn))
            .unwrap();
        store
            .run(|txn| maintainer.update_index(Some(&item(50)), None, b"p1", txn))
            .unwrap();
        assert_eq!(store.run(|txn| maintainer.count(txn)).unwrap(), 0);
    }
}
