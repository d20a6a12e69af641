//! Module: catalog
//! Responsibility: persist entity records into the KV store and rebuild an
//! `icydb_schema::Catalog` from them (spec.md §4.2).
//! Does not own: in-memory catalog semantics (register/add_field/add_index,
//! validation) — that lives in `icydb_schema::Catalog`; this module is only
//! the KV-backed storage adapter.
//! Boundary: every catalog mutation at runtime goes through `CatalogStore`.

use crate::kv::Transaction;
use crate::subspace::Subspace;
use icydb_error::{ErrorOrigin, InternalError};
use icydb_primitives::FieldValue;
use icydb_schema::{Catalog, Entity};

/// Entity records are small, hand-authored schema objects; a generous but
/// finite bound guards CBOR decode against a corrupted or adversarial
/// record claiming an unbounded length.
const MAX_ENTITY_RECORD_BYTES: usize = 1024 * 1024;

///
/// CatalogStore
///
/// Thin persistence adapter: one key per entity under `subspace`, CBOR
/// encoded. `icydb_schema::Entity`'s `#[serde(default)]` fields (index
/// metadata, optional/array flags) already give every decode the "accept
/// legacy records missing newer fields" behavior spec.md §4.2 requires.
///

pub struct CatalogStore {
    subspace: Subspace,
}

impl CatalogStore {
    #[must_use]
    pub fn new(subspace: Subspace) -> Self {
        Self { subspace }
    }

    fn entity_key(&self, type_name: &str) -> Result<Vec<u8>, InternalError> {
        self.subspace
            .pack(&[FieldValue::String(type_name.to_string())])
    }

    pub fn put_entity(&self, txn: &mut dyn Transaction, entity: &Entity) -> Result<(), InternalError> {
        let key = self.entity_key(&entity.type_name)?;
        let bytes = serde_cbor::to_vec(entity).map_err(|e| {
            InternalError::new(
                icydb_error::ErrorClass::Internal,
                ErrorOrigin::Serialize,
                format!("failed to encode entity {}: {e}", entity.type_name),
            )
        })?;
        txn.set(key, bytes);
        Ok(())
    }

    pub fn get_entity(
        &self,
        txn: &mut dyn Transaction,
        type_name: &str,
    ) -> Result<Option<Entity>, InternalError> {
        let key = self.entity_key(type_name)?;
        match txn.get(&key)? {
            Some(bytes) => decode_entity(&bytes).map(Some),
            None => Ok(None),
        }
    }

    pub fn remove_entity(&self, txn: &mut dyn Transaction, type_name: &str) -> Result<(), InternalError> {
        let key = self.entity_key(type_name)?;
        txn.clear(&key);
        Ok(())
    }

    pub fn list_entities(&self, txn: &mut dyn Transaction) -> Result<Vec<Entity>, InternalError> {
        let (begin, end) = self.subspace.range();
        let rows = txn.get_range(
            crate::kv::KeySelector::first_greater_or_equal(begin),
            crate::kv::KeySelector::first_greater_or_equal(end),
            crate::kv::RangeOptions::default(),
        )?;
        rows.iter().map(|(_, value)| decode_entity(value)).collect()
    }

    /// Rebuild a full in-memory `Catalog` from every persisted entity
    /// record, bypassing `Catalog::register`'s monotonic-add checks since
    /// the records were already validated when first written.
    pub fn load_catalog(&self, txn: &mut dyn Transaction) -> Result<Catalog, InternalError> {
        let mut catalog = Catalog::default();
        for entity in self.list_entities(txn)? {
            catalog.upsert_raw(entity);
        }
        Ok(catalog)
    }
}

fn decode_entity(bytes: &[u8]) -> Result<Entity, InternalError> {
    if bytes.len() > MAX_ENTITY_RECORD_BYTES {
        return Err(InternalError::new(
            icydb_error::ErrorClass::Corruption,
            ErrorOrigin::Serialize,
            format!(
                "entity record of {} bytes exceeds the {MAX_ENTITY_RECORD_BYTES}-byte bound",
                bytes.len()
            ),
        ));
    }
    serde_cbor::from_slice(bytes).map_err(|e| {
        InternalError::new(
            icydb_error::ErrorClass::Corruption,
            ErrorOrigin::Serialize,
            format!("failed to decode entity record: {e}"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::{MemStore, Store};
    use icydb_schema::{FieldSchema, PrimaryKeyDef};
    use icydb_primitives::PrimitiveType;

    fn sample_entity() -> Entity {
        let mut entity = Entity::new("User", PrimaryKeyDef::single("id"));
        entity.fields.fields.push(FieldSchema::new("id", 1, PrimitiveType::Uuid));
        entity.fields.fields.push(FieldSchema::new("email", 2, PrimitiveType::String));
        entity
    }

    #[test]
    fn put_then_get_round_trips() {
        let store = MemStore::new();
        let catalog_store = CatalogStore::new(Subspace::root(b"catalog".to_vec()));
        let entity = sample_entity();

        store
            .run(|txn| catalog_store.put_entity(txn, &entity))
            .unwrap();

        let fetched = store
            .run(|txn| catalog_store.get_entity(txn, "User"))
            .unwrap()
            .unwrap();
        assert_eq!(fetched.type_name, "User");
        assert_eq!(fetched.fields.fields.len(), 2);
    }

    #[test]
    fn load_catalog_rebuilds_every_entity() {
        let store = MemStore::new();
        let catalog_store = CatalogStore::new(Subspace::root(b"catalog".to_vec()));
        store
            .run(|txn| {
                catalog_store.put_entity(txn, &sample_entity())?;
                let mut other = Entity::new("Order", PrimaryKeyDef::single("id"));
                other.fields.fields.push(FieldSchema::new("id", 1, PrimitiveType::Uuid));
                catalog_store.put_entity(txn, &other)
            })
            .unwrap();

        let catalog = store.run(|txn| catalog_store.load_catalog(txn)).unwrap();
        assert!(catalog.entity("User").is_some());
        assert!(catalog.entity("Order").is_some());
    }

    #[test]
    fn decode_rejects_oversized_record() {
        let oversized = vec![0u8; MAX_ENTITY_RECORD_BYTES + 1];
        assert!(decode_entity(&oversized).is_err());
    }
}
