//! Module: index::maintainers::aggregation
//! Responsibility: per-group atomic counter/sum maintenance — key layout
//! `[subspace/group][group-key] = count-or-sum` (spec.md §4.3
//! "Aggregation").
//! Does not own: the group-by field extraction rules beyond reading named
//! fields off the item; callers define which fields form the group key.
//! Boundary: one `AggregationMaintainer` per aggregation index descriptor;
//! reads are O(1) per group via `Transaction::get_counter`.

use crate::index::contracts::{IndexMaintainer, Item};
use crate::kv::Transaction;
use crate::subspace::Subspace;
use icydb_error::InternalError;
use icydb_primitives::FieldValue;

///
/// AggregationMaintainer
///
/// With `sum_field: None`, each group tracks a plain count of member
/// items. With `sum_field: Some(f)`, each group instead tracks the sum of
/// field `f` across member items; an item missing `f` or carrying a
/// non-integral value contributes nothing rather than erroring, since
/// group membership (not the summed field) is the index's primary key.
///

pub struct AggregationMaintainer {
    pub name: String,
    pub group: Subspace,
    pub group_fields: Vec<String>,
    pub sum_field: Option<String>,
}

impl AggregationMaintainer {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        index_subspace: &Subspace,
        group_fields: Vec<String>,
        sum_field: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            group: index_subspace.subspace(b"group"),
            group_fields,
            sum_field,
        }
    }

    fn group_key(&self, item: &Item) -> Result<Option<Vec<u8>>, InternalError> {
        let mut values = Vec::with_capacity(self.group_fields.len());
        for field in &self.group_fields {
            match item.get(field) {
                Some(v) if !v.is_null() => values.push(v.clone()),
                _ => return Ok(None),
            }
        }
        Ok(Some(self.group.pack(&values)?))
    }

    fn contribution(&self, item: &Item) -> i64 {
        match &self.sum_field {
            None => 1,
            Some(field) => match item.get(field).and_then(|v| v.narrow_to_i64().ok()) {
                Some(n) => n,
                None => 0,
            },
        }
    }

    pub fn read(
        &self,
        txn: &mut dyn Transaction,
        group_values: &[FieldValue],
    ) -> Result<i64, InternalError> {
        let key = self.group.pack(group_values)?;
        txn.get_counter(&key)
    }
}

impl IndexMaintainer for AggregationMaintainer {
    fn update_index(
        &self,
        old_item: Option<&Item>,
        new_item: Option<&Item>,
        _pk: &[u8],
        txn: &mut dyn Transaction,
    ) -> Result<(), InternalError> {
        let old_group = old_item.map(|i| self.group_key(i)).transpose()?.flatten();
        let new_group = new_item.map(|i| self.group_key(i)).transpose()?.flatten();

        if old_group == new_group {
            if let (Some(group), Some(old), Some(new)) = (&old_group, old_item, new_item) {
                let delta = self.contribution(new) - self.contribution(old);
                if delta != 0 {
                    txn.atomic_add(group, delta)?;
                }
            }
            return Ok(());
        }
        if let (Some(group), Some(old)) = (&old_group, old_item) {
            txn.atomic_add(group, -self.contribution(old))?;
        }
        if let (Some(group), Some(new)) = (&new_group, new_item) {
            txn.atomic_add(group, self.contribution(new))?;
        }
        Ok(())
    }

    fn compute_index_keys(&self, item: &Item, _pk: &[u8]) -> Result<Vec<Vec<u8>>, InternalError> {
        match self.group_key(item)? {
            None => Ok(Vec::new()),
            Some(key) => Ok(vec![key]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::{MemStore, Store};

    fn item(team: &str) -> Item {
        let mut item = Item::new();
        item.insert("team".to_string(), FieldValue::String(team.to_string()));
        item
    }

    fn item_with_points(team: &str, points: i64) -> Item {
        let mut item = item(team);
        item.insert("points".to_string(), FieldValue::Int64(points));
        item
    }

    #[test]
    fn count_tracks_group_membership() {
        let store = MemStore::new();
        let maintainer = AggregationMaintainer::new(
            "by_team",
            &Subspace::root(b"idx".to_vec()),
            vec!["team".to_string()],
            None,
        );

        store
            .run(|txn| {
                maintainer.update_index(None, Some(&item("red")), b"p1", txn)?;
                maintainer.update_index(None, Some(&item("red")), b"p2", txn)?;
                maintainer.update_index(None, Some(&item("blue")), b"p3", txn)
            })
            .unwrap();

        assert_eq!(
            store
                .run(|txn| maintainer.read(txn, &[FieldValue::String("red".into())]))
                .unwrap(),
            2
        );
        assert_eq!(
            store
                .run(|txn| maintainer.read(txn, &[FieldValue::String("blue".into())]))
                .unwrap(),
            1
        );
    }

    #[test]
    fn sum_field_tracks_totals_and_moving_between_groups() {
        let store = MemStore::new();
        let maintainer = AggregationMaintainer::new(
            "points_by_team",
            &Subspace::root(b"idx".to_vec()),
            vec!["team".to_string()],
            Some("points".to_string()),
        );

        store
            .run(|txn| {
                maintainer.update_index(None, Some(&item_with_points("red", 10)), b"p1", txn)?;
                maintainer.update_index(None, Some(&item_with_points("red", 5)), b"p2", txn)
            })
            .unwrap();
        assert_eq!(
            store
                .run(|txn| maintainer.read(txn, &[FieldValue::String("red".into())]))
                .unwrap(),
            15
        );

        // p2 transfers from red to blue, bringing its points with it.
        store
            .run(|txn| {
                maintainer.update_index(
                    Some(&item_with_points("red", 5)),
                    Some(&item_with_points("blue", 5)),
                    b"p2",
                    txn,
                )
            })
            .unwrap();
        assert_eq!(
            store
                .run(|txn| maintainer.read(txn, &[FieldValue::String("red".into())]))
                .unwrap(),
            10
        );
        assert_eq!(
            store
                .run(|txn| maintainer.read(txn, &[FieldValue::String("blue".into())]))
                .unwrap(),
            5
        );
    }

    #[test]
    fn item_missing_a_group_field_is_not_counted() {
        let store = MemStore::new();
        let maintainer = AggregationMaintainer::new(
            "by_team",
            &Subspace::root(b"idx".to_vec()),
            vec!["team".to_string()],
            None,
        );
        store
            .run(|txn| maintainer.update_index(None, Some(&Item::new()), b"p1", txn))
            .unwrap();
        assert_eq!(
            store
                .run(|txn| maintainer.read(txn, &[FieldValue::String("red".into())]))
                .unwrap(),
            0
        );
    }
}
