//! Module: index::contracts
//! Responsibility: the per-index-kind maintainer contract (spec.md §4.3).
//! Does not own: concrete key layouts — see `index::maintainers::*`.
//! Boundary: the write path (`upsert`/delete) and the online builder both
//! drive maintainers exclusively through this trait.

use icydb_error::InternalError;
use icydb_primitives::FieldValue;
use std::collections::{BTreeMap, HashSet};

/// An item's field values, keyed by field name. The core never assumes a
/// concrete Rust struct per entity; every maintainer reads fields by name
/// out of this map.
pub type Item = BTreeMap<String, FieldValue>;

///
/// IndexMaintainer
///
/// `update_index` must be idempotent when `old_item == new_item` (spec.md
/// §4.3). The default implementation derives `update_index`/`scan_item`
/// from `compute_index_keys` by set-difference — correct for every
/// maintainer whose entries are bare markers (empty values). Maintainers
/// that carry a payload (rank span counters, aggregation accumulators) or
/// enforce uniqueness override `update_index` directly.
///

pub trait IndexMaintainer {
    /// Emit deletions implied by `old_item` and writes implied by
    /// `new_item`.
    fn update_index(
        &self,
        old_item: Option<&Item>,
        new_item: Option<&Item>,
        pk: &[u8],
        txn: &mut dyn crate::kv::Transaction,
    ) -> Result<(), InternalError> {
        let old_keys = keys_or_empty(self, old_item, pk)?;
        let new_keys = keys_or_empty(self, new_item, pk)?;
        for key in old_keys.difference(&new_keys) {
            txn.clear(key);
        }
        for key in new_keys.difference(&old_keys) {
            txn.set(key.clone(), Vec::new());
        }
        Ok(())
    }

    /// Write-only form used by the online builder / bulk load; never
    /// reads.
    fn scan_item(
        &self,
        item: &Item,
        pk: &[u8],
        txn: &mut dyn crate::kv::Transaction,
    ) -> Result<(), InternalError> {
        for key in self.compute_index_keys(item, pk)? {
            txn.set(key, Vec::new());
        }
        Ok(())
    }

    /// Pure function: the exact set of keys this item occupies in the
    /// index. Sparse maintainers return `[]` when the indexed expression
    /// evaluates to null.
    fn compute_index_keys(&self, item: &Item, pk: &[u8]) -> Result<Vec<Vec<u8>>, InternalError>;
}

fn keys_or_empty(
    maintainer: &(impl IndexMaintainer + ?Sized),
    item: Option<&Item>,
    pk: &[u8],
) -> Result<HashSet<Vec<u8>>, InternalError> {
    match item {
        Some(item) => Ok(maintainer
            .compute_index_keys(item, pk)?
            .into_iter()
            .collect()),
        None => Ok(HashSet::new()),
    }
}

/// Read `fields` off `item` in order; a missing field is treated as
/// `Null`. When `sparse` and any value is `Null`, returns `None` — no
/// index entry for this item (spec.md §4.3 sparse convention).
pub fn field_values(item: &Item, fields: &[String], sparse: bool) -> Option<Vec<FieldValue>> {
    let values: Vec<FieldValue> = fields
        .iter()
        .map(|name| item.get(name).cloned().unwrap_or(FieldValue::Null))
        .collect();
    if sparse && values.iter().any(FieldValue::is_null) {
        None
    } else {
        Some(values)
    }
}

#[must_use]
pub fn values_equal(a: &[FieldValue], b: &[FieldValue]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.eq_value(y))
}
