use crate::node::{
    directory::DirectoryComponent,
    field::FieldList,
    index::IndexDescriptor,
    primary_key::PrimaryKeyDef,
};
use crate::validate::{ErrorTree, ValidateNode};
use serde::{Deserialize, Serialize};

///
/// Entity
///
/// A registered record type: a stable name, its field list, the directory
/// components that resolve its root subspace, its primary-key arity, and
/// its index descriptors (spec.md §3).
///

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Entity {
    pub type_name: String,
    pub fields: FieldList,
    pub directory: Vec<DirectoryComponent>,
    pub primary_key: PrimaryKeyDef,
    #[serde(default)]
    pub indexes: Vec<IndexDescriptor>,
}

impl Entity {
    #[must_use]
    pub fn new(type_name: impl Into<String>, primary_key: PrimaryKeyDef) -> Self {
        Self {
            type_name: type_name.into(),
            fields: FieldList::default(),
            directory: Vec::new(),
            primary_key,
            indexes: Vec::new(),
        }
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&crate::node::field::FieldSchema> {
        self.fields.get(name)
    }

    #[must_use]
    pub fn index(&self, name: &str) -> Option<&IndexDescriptor> {
        self.indexes.iter().find(|idx| idx.name == name)
    }

    #[must_use]
    pub fn dynamic_directory_fields(&self) -> Vec<&str> {
        self.directory
            .iter()
            .filter_map(DirectoryComponent::dynamic_field)
            .collect()
    }
}

impl ValidateNode for Entity {
    fn validate(&self) -> Result<(), ErrorTree> {
        let mut errs = ErrorTree::new();
        if self.type_name.is_empty() {
            errs.add_message("entity type_name must not be empty");
        }
        if let Err(e) = self.fields.validate() {
            errs.merge(e);
        }
        for pk_field in &self.primary_key.fields {
            if self.fields.get(pk_field).is_none() {
                errs.add_message(format!(
                    "primary key references unknown field: {pk_field}"
                ));
            }
        }
        for index in &self.indexes {
            if let Err(e) = index.validate() {
                errs.merge(e);
            }
            for field in &index.fields {
                if self.fields.get(field).is_none() {
                    errs.add_message(format!(
                        "index {} references unknown field: {field}",
                        index.name
                    ));
                }
            }
        }
        let mut seen = std::collections::HashSet::new();
        for index in &self.indexes {
            if !seen.insert(&index.name) {
                errs.add_message(format!("duplicate index name: {}", index.name));
            }
        }
        errs.result()
    }
}
