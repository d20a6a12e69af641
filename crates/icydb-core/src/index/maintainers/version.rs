//! Module: index::maintainers::version
//! Responsibility: append-only per-item history — key layout
//! `[subspace/history][pk][commit-version] = snapshot` (spec.md §4.3
//! "Version"), with `versions(pk, limit)` and `diff(pk)`.
//! Does not own: the KV store's own MVCC (there isn't one at this trait
//! boundary) — `commit-version` here is a monotonic sequence number this
//! maintainer allocates itself via an atomic counter, not a store-level
//! committed version.
//! Boundary: one `VersionMaintainer` per version-index descriptor.

use crate::index::contracts::{IndexMaintainer, Item};
use crate::kv::{KeySelector, RangeOptions, Transaction};
use crate::subspace::Subspace;
use icydb_error::{ErrorClass, ErrorOrigin, InternalError};
use icydb_primitives::FieldValue;

/// One historical record: the sequence number this maintainer assigned it
/// and the full item snapshot at that point (`None` records a delete).
pub struct VersionEntry {
    pub version: i64,
    pub snapshot: Option<Item>,
}

///
/// VersionMaintainer
///
/// Snapshots (not deltas) are stored; `diff` computes the changed fields
/// between two adjacent snapshots on read, which keeps `update_index`
/// simple and keeps every stored record self-contained for `versions`.
///

pub struct VersionMaintainer {
    pub name: String,
    pub history: Subspace,
    pub seq: Vec<u8>,
}

impl VersionMaintainer {
    #[must_use]
    pub fn new(name: impl Into<String>, index_subspace: &Subspace) -> Result<Self, InternalError> {
        let name = name.into();
        let seq = index_subspace.pack(&[FieldValue::String("_seq".to_string())])?;
        Ok(Self {
            name,
            history: index_subspace.subspace(b"history"),
            seq,
        })
    }

    fn pk_subspace(&self, pk: &[u8]) -> Subspace {
        self.history.subspace(pk)
    }

    fn encode(&self, item: Option<&Item>) -> Result<Vec<u8>, InternalError> {
        serde_cbor::to_vec(&item).map_err(|e| {
            InternalError::new(
                ErrorClass::Internal,
                ErrorOrigin::Serialize,
                format!(
                    "version index {}: failed to encode snapshot: {e}",
                    self.name
                ),
            )
        })
    }

    fn decode(&self, bytes: &[u8]) -> Result<Option<Item>, InternalError> {
        serde_cbor::from_slice(bytes).map_err(|e| {
            InternalError::new(
                ErrorClass::Corruption,
                ErrorOrigin::Serialize,
                format!(
                    "version index {}: failed to decode snapshot: {e}",
                    self.name
                ),
            )
        })
    }

    fn next_version(&self, txn: &mut dyn Transaction) -> Result<i64, InternalError> {
        txn.atomic_add(&self.seq, 1)?;
        txn.get_counter(&self.seq)
    }

    /// Most recent `limit` snapshots for `pk`, newest first.
    pub fn versions(
        &self,
        txn: &mut dyn Transaction,
        pk: &[u8],
        limit: usize,
    ) -> Result<Vec<VersionEntry>, InternalError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let sub = self.pk_subspace(pk);
        let (begin, end) = sub.range();
        let rows = txn.get_range(
            KeySelector::first_greater_or_equal(begin),
            KeySelector::first_greater_or_equal(end),
            RangeOptions {
                reverse: true,
                limit: Some(limit),
                ..RangeOptions::default()
            },
        )?;
        let mut out = Vec::with_capacity(rows.len());
        for (key, value) in rows {
            let mut tuple = sub.unpack(&key)?;
            let version = match tuple.pop() {
                Some(FieldValue::Int64(v)) => v,
                _ => {
                    return Err(InternalError::invariant(
                        ErrorOrigin::Index,
                        "version history entry key missing its version component",
                    ));
                }
            };
            out.push(VersionEntry {
                version,
                snapshot: self.decode(&value)?,
            });
        }
        Ok(out)
    }

    /// Field-level differences between the two most recent snapshots for
    /// `pk`: `(field, old_value, new_value)`, `None` standing for absence
    /// (field added, removed, or the whole item created/deleted).
    pub fn diff(
        &self,
        txn: &mut dyn Transaction,
        pk: &[u8],
    ) -> Result<Vec<(String, Option<FieldValue>, Option<FieldValue>)>, InternalError> {
        let recent = self.versions(txn, pk, 2)?;
        let (new, old) = match (recent.first(), recent.get(1)) {
            (Some(new), Some(old)) => (new.snapshot.as_ref(), old.snapshot.as_ref()),
            (Some(new), None) => (new.snapshot.as_ref(), None),
            (None, _) => return Ok(Vec::new()),
        };

        let mut fields: std::collections::BTreeSet<&String> = std::collections::BTreeSet::new();
        if let Some(o) = old {
            fields.extend(o.keys());
        }
        if let Some(n) = new {
            fields.extend(n.keys());
        }

        let mut out = Vec::new();
        for field in fields {
            let old_value = old.and_then(|o| o.get(field)).cloned();
            let new_value = new.and_then(|n| n.get(field)).cloned();
            let changed = match (&old_value, &new_value) {
                (Some(a), Some(b)) => !a.eq_value(b),
                (None, None) => false,
                _ => true,
            };
            if changed {
                out.push((field.clone(), old_value, new_value));
            }
        }
        Ok(out)
    }
}

impl IndexMaintainer for VersionMaintainer {
    fn update_index(
        &self,
        old_item: Option<&Item>,
        new_item: Option<&Item>,
        pk: &[u8],
        txn: &mut dyn Transaction,
    ) -> Result<(), InternalError> {
        if old_item.is_none() && new_item.is_none() {
            return Ok(());
        }
        let version = self.next_version(txn)?;
        let key = self.pk_subspace(pk).pack(&[FieldValue::Int64(version)])?;
        let bytes = self.encode(new_item)?;
        txn.set(key, bytes);
        Ok(())
    }

    fn compute_index_keys(&self, _item: &Item, _pk: &[u8]) -> Result<Vec<Vec<u8>>, InternalError> {
        // History entries are append-only and keyed by an allocated
        // version number, not derivable as a pure function of the item;
        // the online builder drives this maintainer through
        // `update_index` directly.
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::{MemStore, Store};

    fn item(name: &str) -> Item {
        let mut item = Item::new();
        item.insert("name".to_string(), FieldValue::String(name.to_string()));
        item
    }

    #[test]
    fn versions_returns_newest_first() {
        let store = MemStore::new();
        let maintainer =
            VersionMaintainer::new("history", &Subspace::root(b"idx".to_vec())).unwrap();

        store
            .run(|txn| {
                maintainer.update_index(None, Some(&item("alice")), b"p1", txn)?;
                maintainer.update_index(Some(&item("alice")), Some(&item("alicia")), b"p1", txn)
            })
            .unwrap();

        let versions = store
            .run(|txn| maintainer.versions(txn, b"p1", 10))
            .unwrap();
        assert_eq!(versions.len(), 2);
        assert!(
            versions[0]
                .snapshot
                .as_ref()
                .unwrap()
                .get("name")
                .unwrap()
                .eq_value(&FieldValue::String("alicia".to_string()))
        );
        assert!(
            versions[1]
                .snapshot
                .as_ref()
                .unwrap()
                .get("name")
                .unwrap()
                .eq_value(&FieldValue::String("alice".to_string()))
        );
        assert!(versions[0].version > versions[1].version);
    }

    #[test]
    fn diff_reports_changed_field() {
        let store = MemStore::new();
        let maintainer =
            VersionMaintainer::new("history", &Subspace::root(b"idx".to_vec())).unwrap();
        store
            .run(|txn| {
                maintainer.update_index(None, Some(&item("alice")), b"p1", txn)?;
                maintainer.update_index(Some(&item("alice")), Some(&item("alicia")), b"p1", txn)
            })
            .unwrap();

        let diff = store.run(|txn| maintainer.diff(txn, b"p1")).unwrap();
        assert_eq!(diff.len(), 1);
        assert_eq!(diff[0].0, "name");
        assert!(
            diff[0]
                .1
                .as_ref()
                .unwrap()
                .eq_value(&FieldValue::String("alice".to_string()))
        );
        assert!(
            diff[0]
                .2
                .as_ref()
                .unwrap()
                .eq_value(&FieldValue::String("alicia".to_string()))
        );
    }

    #[test]
    fn delete_is_recorded_as_a_none_snapshot() {
        let store = MemStore::new();
        let maintainer =
            VersionMaintainer::new("history", &Subspace::root(b"idx".to_vec())).unwrap();
        store
            .run(|txn| {
                maintainer.update_index(None, Some(&item("alice")), b"p1", txn)?;
                maintainer.update_index(Some(&item("alice")), None, b"p1", txn)
            })
            .unwrap();

        let versions = store
            .run(|txn| maintainer.versions(txn, b"p1", 10))
            .unwrap();
        assert_eq!(versions.len(), 2);
        assert!(versions[0].snapshot.is_none());
    }
}
