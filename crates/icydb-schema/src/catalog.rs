use crate::node::{Entity, FieldSchema, IndexDescriptor};
use crate::validate::ValidateNode;
use icydb_error::{ErrorClass, ErrorOrigin, InternalError};
use std::collections::BTreeMap;

///
/// Catalog
///
/// Persists one record per entity: `(type_name, fields, directory
/// components, indexes)` (spec.md §4.2). Entities register once; fields
/// and indexes may be added monotonically afterwards. Index removal
/// requires explicit teardown (`remove_index`) rather than silent
/// overwrite, matching the lifecycle in spec.md §3.
///

#[derive(Clone, Debug, Default)]
pub struct Catalog {
    entities: BTreeMap<String, Entity>,
}

impl Catalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new entity. Fails if the type name is already registered
    /// or the entity fails its own validation.
    pub fn register(&mut self, entity: Entity) -> Result<(), InternalError> {
        if self.entities.contains_key(&entity.type_name) {
            return Err(InternalError::conflict(
                ErrorOrigin::Catalog,
                format!("entity already registered: {}", entity.type_name),
            ));
        }
        entity.validate().map_err(|e| {
            InternalError::new(
                ErrorClass::ParseError,
                ErrorOrigin::Catalog,
                format!("entity {} failed validation: {e}", entity.type_name),
            )
        })?;
        self.entities.insert(entity.type_name.clone(), entity);
        Ok(())
    }

    /// Replace an already-registered entity's record wholesale — used by
    /// the legacy-record decode path when re-importing a catalog that may
    /// widen a field list or append indexes.
    pub fn upsert_raw(&mut self, entity: Entity) {
        self.entities.insert(entity.type_name.clone(), entity);
    }

    #[must_use]
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    #[must_use]
    pub fn entity(&self, type_name: &str) -> Option<&Entity> {
        self.entities.get(type_name)
    }

    pub fn entity_mut(&mut self, type_name: &str) -> Option<&mut Entity> {
        self.entities.get_mut(type_name)
    }

    pub fn require_entity(&self, type_name: &str) -> Result<&Entity, InternalError> {
        self.entity(type_name).ok_or_else(|| {
            InternalError::new(
                ErrorClass::UnknownEntity,
                ErrorOrigin::Catalog,
                format!("unknown entity: {type_name}"),
            )
        })
    }

    #[must_use]
    pub fn index_descriptors(&self, type_name: &str) -> &[IndexDescriptor] {
        self.entity(type_name)
            .map_or(&[], |e| e.indexes.as_slice())
    }

    #[must_use]
    pub fn all_index_descriptors(&self) -> Vec<(&str, &IndexDescriptor)> {
        self.entities
            .values()
            .flat_map(|e| {
                e.indexes
                    .iter()
                    .map(move |idx| (e.type_name.as_str(), idx))
            })
            .collect()
    }

    /// Add a field to an already-registered entity. Monotonic: fails if
    /// the name or field number collides with an existing field.
    pub fn add_field(&mut self, type_name: &str, field: FieldSchema) -> Result<(), InternalError> {
        let entity = self.entities.get_mut(type_name).ok_or_else(|| {
            InternalError::new(
                ErrorClass::UnknownEntity,
                ErrorOrigin::Catalog,
                format!("unknown entity: {type_name}"),
            )
        })?;
        if entity.fields.get(&field.name).is_some() {
            return Err(InternalError::conflict(
                ErrorOrigin::Catalog,
                format!("field already exists: {}.{}", type_name, field.name),
            ));
        }
        if entity
            .fields
            .iter()
            .any(|f| f.field_number == field.field_number)
        {
            return Err(InternalError::conflict(
                ErrorOrigin::Catalog,
                format!(
                    "field number {} already in use on {}",
                    field.field_number, type_name
                ),
            ));
        }
        entity.fields.fields.push(field);
        Ok(())
    }

    /// Add an index descriptor to an already-registered entity. The index
    /// starts in `disabled` state from the caller's perspective — the
    /// online builder (§4.4) is responsible for bringing it to `readable`.
    pub fn add_index(
        &mut self,
        type_name: &str,
        index: IndexDescriptor,
    ) -> Result<(), InternalError> {
        let entity = self.entities.get_mut(type_name).ok_or_else(|| {
            InternalError::new(
                ErrorClass::UnknownEntity,
                ErrorOrigin::Catalog,
                format!("unknown entity: {type_name}"),
            )
        })?;
        if entity.index(&index.name).is_some() {
            return Err(InternalError::conflict(
                ErrorOrigin::Catalog,
                format!("index already exists: {}.{}", type_name, index.name),
            ));
        }
        for field in &index.fields {
            if entity.fields.get(field).is_none() {
                return Err(InternalError::new(
                    ErrorClass::ParseError,
                    ErrorOrigin::Catalog,
                    format!("index {} references unknown field {field}", index.name),
                ));
            }
        }
        entity.indexes.push(index);
        Ok(())
    }

    /// Explicit teardown of an index descriptor — the only way an index
    /// may disappear from the catalog (spec.md §4.2: "removal requires
    /// explicit teardown").
    pub fn remove_index(&mut self, type_name: &str, index_name: &str) -> Result<(), InternalError> {
        let entity = self.entities.get_mut(type_name).ok_or_else(|| {
            InternalError::new(
                ErrorClass::UnknownEntity,
                ErrorOrigin::Catalog,
                format!("unknown entity: {type_name}"),
            )
        })?;
        let before = entity.indexes.len();
        entity.indexes.retain(|idx| idx.name != index_name);
        if entity.indexes.len() == before {
            return Err(InternalError::new(
                ErrorClass::UnknownIndex,
                ErrorOrigin::Catalog,
                format!("unknown index: {type_name}.{index_name}"),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{FieldSchema, IndexDescriptor, IndexKind, PrimaryKeyDef};
    use icydb_primitives::PrimitiveType;

    fn sample_entity() -> Entity {
        let mut e = Entity::new("User", PrimaryKeyDef::single("id"));
        e.fields.fields.push(FieldSchema::new("id", 0, PrimitiveType::Uuid));
        e.fields
            .fields
            .push(FieldSchema::new("email", 1, PrimitiveType::String));
        e
    }

    #[test]
    fn register_then_lookup() {
        let mut catalog = Catalog::new();
        catalog.register(sample_entity()).unwrap();
        assert!(catalog.entity("User").is_some());
        assert!(catalog.entity("Missing").is_none());
    }

    #[test]
    fn duplicate_registration_rejected() {
        let mut catalog = Catalog::new();
        catalog.register(sample_entity()).unwrap();
        let err = catalog.register(sample_entity()).unwrap_err();
        assert_eq!(err.class, ErrorClass::Conflict);
    }

    #[test]
    fn add_field_rejects_number_collision() {
        let mut catalog = Catalog::new();
        catalog.register(sample_entity()).unwrap();
        let err = catalog
            .add_field("User", FieldSchema::new("other", 1, PrimitiveType::Bool))
            .unwrap_err();
        assert_eq!(err.class, ErrorClass::Conflict);
    }

    #[test]
    fn add_and_remove_index() {
        let mut catalog = Catalog::new();
        catalog.register(sample_entity()).unwrap();
        catalog
            .add_index(
                "User",
                IndexDescriptor::new("by_email", IndexKind::Scalar, vec!["email".into()]),
            )
            .unwrap();
        assert_eq!(catalog.index_descriptors("User").len(), 1);
        catalog.remove_index("User", "by_email").unwrap();
        assert!(catalog.index_descriptors("User").is_empty());
        let err = catalog.remove_index("User", "by_email").unwrap_err();
        assert_eq!(err.class, ErrorClass::UnknownIndex);
    }
}
