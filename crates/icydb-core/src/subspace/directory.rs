//! Module: subspace::directory
//! Responsibility: resolve an entity's directory components plus a runtime
//! partition binding into a concrete `Subspace`, with a process-local
//! resolution cache.
//! Does not own: tuple encoding (see `subspace::tuple`) or index key
//! layout.
//! Boundary: every entity-scoped read/write goes through
//! `DirectoryResolver::resolve` to find its subspace.

use super::{encode_component, Subspace};
use crate::kv::Transaction;
use icydb_error::{ErrorClass, ErrorOrigin, InternalError};
use icydb_primitives::FieldValue;
use icydb_schema::{DirectoryComponent, Entity};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

///
/// DirectoryPath
///
/// Captures an entity's directory components together with the dynamic
/// field bindings needed to resolve them — either extracted from a stored
/// item or supplied explicitly by a query builder's `.partition(...)`
/// call.
///

#[derive(Clone, Debug)]
pub struct DirectoryPath {
    type_name: String,
    components: Vec<DirectoryComponent>,
    bindings: BTreeMap<String, FieldValue>,
}

impl DirectoryPath {
    /// Capture every dynamic directory field's value from an item's field
    /// map.
    #[must_use]
    pub fn from_item(entity: &Entity, item: &BTreeMap<String, FieldValue>) -> Self {
        let mut bindings = BTreeMap::new();
        for field in entity.dynamic_directory_fields() {
            if let Some(value) = item.get(field) {
                bindings.insert(field.to_string(), value.clone());
            }
        }
        Self {
            type_name: entity.type_name.clone(),
            components: entity.directory.clone(),
            bindings,
        }
    }

    /// Build from an explicit partition binding, as used by the query
    /// builder's `.partition(keyPath, equals: value)`.
    #[must_use]
    pub fn from_partition(entity: &Entity, bindings: BTreeMap<String, FieldValue>) -> Self {
        Self {
            type_name: entity.type_name.clone(),
            components: entity.directory.clone(),
            bindings,
        }
    }

    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Fails with `MissingDirectoryFields` naming every dynamic component
    /// whose binding is absent.
    pub fn validate(&self) -> Result<(), InternalError> {
        let missing: Vec<&str> = self
            .components
            .iter()
            .filter_map(DirectoryComponent::dynamic_field)
            .filter(|field| !self.bindings.contains_key(*field))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(InternalError::new(
                ErrorClass::MissingDirectoryFields,
                ErrorOrigin::Directory,
                format!("missing directory fields: [{}]", missing.join(", ")),
            ))
        }
    }

    /// Deterministic, error-free once `validate` has succeeded.
    pub fn resolve(&self) -> Result<Vec<Vec<u8>>, InternalError> {
        self.validate()?;
        self.components
            .iter()
            .map(|component| match component {
                DirectoryComponent::Static(name) => Ok(name.as_bytes().to_vec()),
                DirectoryComponent::Dynamic(field) => {
                    let value = self
                        .bindings
                        .get(field)
                        .expect("validate() guarantees every dynamic binding is present");
                    encode_component(value)
                }
            })
            .collect()
    }
}

///
/// DirectoryResolver
///
/// Allocates a stable short subspace for each distinct `(typeName,
/// partitionValues)` path under a caller-supplied system subspace, caching
/// the mapping in-process after its first resolution under a transaction.
///

pub struct DirectoryResolver {
    system: Subspace,
    cache: Mutex<HashMap<(String, Vec<Vec<u8>>), Subspace>>,
}

impl DirectoryResolver {
    #[must_use]
    pub fn new(system: Subspace) -> Self {
        Self {
            system,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve `path` (the output of [`DirectoryPath::resolve`]) for
    /// `type_name` to its subspace, allocating a new one under `txn` the
    /// first time this process sees it.
    pub fn resolve(
        &self,
        txn: &mut dyn Transaction,
        type_name: &str,
        path: &[Vec<u8>],
    ) -> Result<Subspace, InternalError> {
        let cache_key = (type_name.to_string(), path.to_vec());
        if let Some(hit) = self.cache.lock().expect("directory cache poisoned").get(&cache_key) {
            return Ok(hit.clone());
        }

        let mut path_node = self.system.subspace(b"dir_map").subspace(type_name.as_bytes());
        for segment in path {
            path_node = path_node.subspace(segment);
        }
        let path_key = path_node.prefix().to_vec();

        let id = match txn.get(&path_key)? {
            Some(bytes) => decode_id(&bytes)?,
            None => {
                let counter_key = self.system.subspace(b"dir_next_id").prefix().to_vec();
                txn.atomic_add(&counter_key, 1)?;
                let id = txn.get_counter(&counter_key)?;
                txn.set(path_key, id.to_be_bytes().to_vec());
                id
            }
        };

        let subspace = self.system.subspace(b"dir_data").subspace(&id.to_be_bytes());
        self.cache
            .lock()
            .expect("directory cache poisoned")
            .insert(cache_key, subspace.clone());
        Ok(subspace)
    }
}

fn decode_id(bytes: &[u8]) -> Result<i64, InternalError> {
    let buf: [u8; 8] = bytes.try_into().map_err(|_| {
        InternalError::invariant(ErrorOrigin::Directory, "directory id record has wrong width")
    })?;
    Ok(i64::from_be_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::{MemStore, Store};
    use icydb_schema::PrimaryKeyDef;

    fn tenant_entity() -> Entity {
        let mut entity = Entity::new("Order", PrimaryKeyDef::single("id"));
        entity.directory = vec![
            DirectoryComponent::Static("tenants".to_string()),
            DirectoryComponent::Dynamic("tenant_id".to_string()),
            DirectoryComponent::Static("orders".to_string()),
        ];
        entity
    }

    #[test]
    fn validate_reports_missing_dynamic_binding() {
        let entity = tenant_entity();
        let path = DirectoryPath::from_item(&entity, &BTreeMap::new());
        let err = path.validate().unwrap_err();
        assert_eq!(err.class, ErrorClass::MissingDirectoryFields);
    }

    #[test]
    fn resolve_is_deterministic_once_validated() {
        let entity = tenant_entity();
        let mut bindings = BTreeMap::new();
        bindings.insert("tenant_id".to_string(), FieldValue::String("acme".into()));
        let path = DirectoryPath::from_partition(&entity, bindings);
        let first = path.resolve().unwrap();
        let second = path.resolve().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn resolver_caches_across_calls_and_is_stable() {
        let store = MemStore::new();
        let resolver = DirectoryResolver::new(Subspace::root(b"sys".to_vec()));
        let segments = vec![b"acme".to_vec()];

        let first = store
            .run(|txn| resolver.resolve(txn, "Order", &segments))
            .unwrap();
        let second = store
            .run(|txn| resolver.resolve(txn, "Order", &segments))
            .unwrap();
        assert_eq!(first.prefix(), second.prefix());

        let other = store
            .run(|txn| resolver.resolve(txn, "Order", &[b"other".to_vec()]))
            .unwrap();
        assert_ne!(first.prefix(), other.prefix());
    }
}
