//! Module: index::maintainers::scalar
//! Responsibility: scalar and composite index key layout (spec.md §4.3).
//! Does not own: uniqueness-probe layout for other maintainer kinds.
//! Boundary: one `ScalarMaintainer` instance per scalar/composite index
//! descriptor.

use crate::index::contracts::{IndexMaintainer, Item, field_values, values_equal};
use crate::kv::Transaction;
use crate::subspace::{Subspace, encode_component};
use icydb_error::{ErrorClass, ErrorOrigin, InternalError};
use icydb_primitives::FieldValue;

///
/// ScalarMaintainer
///
/// Key layout `[subspace][field-values…][pk] = ∅`. When `unique`, an
/// additional probe key `[unique-subspace][field-values…] = pk` is
/// maintained; `update_index` checks it before writing a new entry and
/// fails with `UniqueViolation` if it already names a different primary
/// key (spec.md §4.3 "Uniqueness enforcement").
///

pub struct ScalarMaintainer {
    pub name: String,
    pub entries: Subspace,
    pub unique_probe: Subspace,
    pub fields: Vec<String>,
    pub unique: bool,
    pub sparse: bool,
}

impl ScalarMaintainer {
    #[must_use]
    pub fn new(name: impl Into<String>, index_subspace: &Subspace, fields: Vec<String>) -> Self {
        Self {
            name: name.into(),
            entries: index_subspace.subspace(b"entries"),
            unique_probe: index_subspace.subspace(b"unique"),
            fields,
            unique: false,
            sparse: false,
        }
    }

    #[must_use]
    pub const fn with_unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    #[must_use]
    pub const fn with_sparse(mut self, sparse: bool) -> Self {
        self.sparse = sparse;
        self
    }

    fn field_values(&self, item: &Item) -> Option<Vec<FieldValue>> {
        field_values(item, &self.fields, self.sparse)
    }

    fn entry_key(&self, values: &[FieldValue], pk: &[u8]) -> Result<Vec<u8>, InternalError> {
        let mut tuple = values.to_vec();
        tuple.push(FieldValue::Data(pk.to_vec()));
        self.entries.pack(&tuple)
    }

    fn probe_key(&self, values: &[FieldValue]) -> Result<Vec<u8>, InternalError> {
        self.unique_probe.pack(values)
    }
}

impl IndexMaintainer for ScalarMaintainer {
    fn update_index(
        &self,
        old_item: Option<&Item>,
        new_item: Option<&Item>,
        pk: &[u8],
        txn: &mut dyn Transaction,
    ) -> Result<(), InternalError> {
        let old_values = old_item.and_then(|i| self.field_values(i));
        let new_values = new_item.and_then(|i| self.field_values(i));

        let unchanged = match (&old_values, &new_values) {
            (Some(a), Some(b)) => values_equal(a, b),
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            return Ok(());
        }

        if let Some(values) = &old_values {
            txn.clear(&self.entry_key(values, pk)?);
            if self.unique {
                txn.clear(&self.probe_key(values)?);
            }
        }

        if let Some(values) = &new_values {
            if self.unique {
                let probe_key = self.probe_key(values)?;
                if let Some(existing) = txn.get(&probe_key)? {
                    if existing != pk {
                        return Err(InternalError::new(
                            ErrorClass::UniqueViolation,
                            ErrorOrigin::Index,
                            format!(
                                "unique index {} already has an entry for this key",
                                self.name
                            ),
                        ));
                    }
                }
                txn.set(probe_key, pk.to_vec());
            }
            txn.set(self.entry_key(values, pk)?, Vec::new());
        }
        Ok(())
    }

    fn compute_index_keys(&self, item: &Item, pk: &[u8]) -> Result<Vec<Vec<u8>>, InternalError> {
        match self.field_values(item) {
            None => Ok(Vec::new()),
            Some(values) => Ok(vec![self.entry_key(&values, pk)?]),
        }
    }
}
