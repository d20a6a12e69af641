//! Module: builder::index_from_index
//! Responsibility: build a new index by scanning an existing readable
//! index instead of primary data, when the new index's fields are
//! derivable from the source index's key shape (spec.md §4.8).
//! Does not own: the RangeSet/throttler pipeline itself — reused from
//! `builder::online` rather than duplicated.
//! Boundary: `extract_primary_key` reads the source entity's declared
//! `icydb_schema::PrimaryKeyDef` arity rather than assuming the last
//! tuple element is the primary key (open question resolved in
//! icydb-schema; spec.md §9 names this exact pitfall).

use crate::builder::range_set::RangeSet;
use crate::builder::throttler::Throttler;
use crate::index::contracts::{IndexMaintainer, Item};
use crate::kv::{KeySelector, RangeOptions, Store, StreamingMode};
use crate::subspace::Subspace;
use icydb_error::{ErrorClass, ErrorOrigin, InternalError};
use icydb_primitives::FieldValue;
use icydb_schema::PrimaryKeyDef;
use std::time::Duration;

/// Result of comparing a candidate source index's fields against the
/// fields the target index needs.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Compatibility {
    /// Every target field is present in the source key; entries can be
    /// built directly from the source's key tuple.
    Compatible,
    /// The source key supplies the primary key but not every target
    /// field; each source entry requires an item fetch.
    RequiresDataFetch,
    /// The source cannot serve as a basis for this build at all.
    Incompatible(String),
}

#[must_use]
pub fn analyze_compatibility(
    source_readable: bool,
    source_fields: &[String],
    target_fields: &[String],
) -> Compatibility {
    if !source_readable {
        return Compatibility::Incompatible("source index is not yet readable".to_string());
    }
    if target_fields.iter().all(|f| source_fields.contains(f)) {
        Compatibility::Compatible
    } else {
        Compatibility::RequiresDataFetch
    }
}

/// Split a source index entry's unpacked key tuple into `(field values,
/// primary key)`, per the entity's declared primary-key arity.
pub fn extract_primary_key(
    mut tuple: Vec<FieldValue>,
    pk: &PrimaryKeyDef,
) -> Result<(Vec<FieldValue>, Vec<FieldValue>), InternalError> {
    if tuple.len() < pk.arity() {
        return Err(InternalError::invariant(
            ErrorOrigin::Builder,
            format!(
                "source index entry has {} components, fewer than the primary key's arity {}",
                tuple.len(),
                pk.arity()
            ),
        ));
    }
    let pk_values = tuple.split_off(tuple.len() - pk.arity());
    Ok((tuple, pk_values))
}

fn pk_bytes(pk_values: &[FieldValue]) -> Result<Vec<u8>, InternalError> {
    let sub = Subspace::root(Vec::new());
    sub.pack(pk_values)
}

///
/// IndexFromIndexBuilder
///
/// Drives the same RangeSet/throttler pipeline as `OnlineBuilder`, but
/// streams `source_index`'s own entries instead of a raw item source.
/// `items`, when set, is consulted only in `RequiresDataFetch` mode.
///

pub struct IndexFromIndexBuilder<'m> {
    pub control: Subspace,
    pub source_index: Subspace,
    pub source_fields: Vec<String>,
    pub primary_key: PrimaryKeyDef,
    pub items: Option<Subspace>,
    pub target: &'m dyn IndexMaintainer,
    pub target_fields: Vec<String>,
}

impl<'m> IndexFromIndexBuilder<'m> {
    fn range_set_key(&self) -> Vec<u8> {
        self.control
            .prefix()
            .iter()
            .copied()
            .chain(*b"_rangeset")
            .collect()
    }

    fn load_range_set(&self, store: &dyn Store) -> Result<RangeSet, InternalError> {
        let key = self.range_set_key();
        store.run(|txn| match txn.get(&key)? {
            Some(bytes) => serde_cbor::from_slice(&bytes).map_err(|e| {
                InternalError::new(
                    ErrorClass::Corruption,
                    ErrorOrigin::Serialize,
                    format!("failed to decode range set: {e}"),
                )
            }),
            None => {
                let (begin, end) = self.source_index.range();
                Ok(RangeSet::covering(begin, end))
            }
        })
    }

    fn item_for_pk(&self, store: &dyn Store, pk: &[u8]) -> Result<Option<Item>, InternalError> {
        let Some(items) = &self.items else {
            return Err(InternalError::invariant(
                ErrorOrigin::Builder,
                "requiresDataFetch mode needs an item source",
            ));
        };
        let key = items.pack(&[FieldValue::Data(pk.to_vec())])?;
        store.run(|txn| match txn.get(&key)? {
            None => Ok(None),
            Some(bytes) => serde_cbor::from_slice(&bytes).map(Some).map_err(|e| {
                InternalError::new(
                    ErrorClass::Corruption,
                    ErrorOrigin::Serialize,
                    format!("failed to decode source item: {e}"),
                )
            }),
        })
    }

    pub fn build(
        &self,
        store: &dyn Store,
        mut sleep: impl FnMut(Duration),
    ) -> Result<u64, InternalError> {
        let source_readable = true; // caller is expected to have checked via `analyze_compatibility` first.
        let compat =
            analyze_compatibility(source_readable, &self.source_fields, &self.target_fields);
        if let Compatibility::Incompatible(reason) = compat {
            return Err(InternalError::new(
                ErrorClass::IncompatibleSource,
                ErrorOrigin::Builder,
                reason,
            ));
        }
        let needs_fetch = compat == Compatibility::RequiresDataFetch;

        let mut range_set = self.load_range_set(store)?;
        let mut throttler = Throttler::new();
        let mut scanned_total = 0u64;

        while !range_set.is_empty() {
            let Some((begin, end)) = range_set.next_batch_bounds() else {
                break;
            };
            let batch_size = throttler.batch_size;
            let range_set_key = self.range_set_key();

            let outcome = store.run(|txn| {
                let rows = txn.get_range(
                    KeySelector::first_greater_or_equal(begin.clone()),
                    KeySelector::first_greater_or_equal(end.clone()),
                    RangeOptions {
                        limit: Some(batch_size),
                        mode: StreamingMode::Iterator,
                        ..RangeOptions::default()
                    },
                )?;
                let scanned = rows.len();
                let mut last_key = None;
                for (key, _) in &rows {
                    let tuple = self.source_index.unpack(key)?;
                    let (field_values, pk_values) = extract_primary_key(tuple, &self.primary_key)?;
                    let pk = pk_bytes(&pk_values)?;

                    if needs_fetch {
                        if let Some(item) = self.item_for_pk(store, &pk)? {
                            self.target.scan_item(&item, &pk, txn)?;
                        }
                    } else {
                        let mut item = Item::new();
                        for (field, value) in self.source_fields.iter().zip(field_values) {
                            item.insert(field.clone(), value);
                        }
                        self.target.scan_item(&item, &pk, txn)?;
                    }
                    last_key = Some(key.clone());
                }

                let mut next = range_set.clone();
                match last_key {
                    Some(last_key) => next.record_progress(last_key, scanned < batch_size),
                    None => next.mark_range_complete(),
                }
                txn.set(
                    range_set_key.clone(),
                    serde_cbor::to_vec(&next).map_err(|e| {
                        InternalError::new(
                            ErrorClass::Internal,
                            ErrorOrigin::Serialize,
                            format!("failed to encode range set: {e}"),
                        )
                    })?,
                );
                Ok((next, scanned))
            });

            match outcome {
                Ok((next_range_set, scanned)) => {
                    range_set = next_range_set;
                    throttler.on_success();
                    scanned_total += scanned as u64;
                }
                Err(err) => {
                    throttler.on_failure(err.is_transient());
                    if err.is_transient() {
                        sleep(throttler.sleep);
                    } else {
                        return Err(err);
                    }
                }
            }
        }

        Ok(scanned_total)
    }
}
