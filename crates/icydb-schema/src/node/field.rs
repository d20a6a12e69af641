use crate::validate::{ErrorTree, ValidateNode};
use icydb_primitives::PrimitiveType;
use serde::{Deserialize, Serialize};

///
/// FieldSchema
///
/// One entity field: a stable name, a dense field number (used for the
/// catalog's legacy-decode compatibility and for compact tuple encoding by
/// the external tuple codec), a primitive type tag, and the
/// optional/array flags spec.md §3 requires.
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    pub field_number: u32,
    #[serde(rename = "type")]
    pub ty: PrimitiveType,
    #[serde(default)]
    pub is_optional: bool,
    #[serde(default)]
    pub is_array: bool,
}

impl FieldSchema {
    #[must_use]
    pub fn new(name: impl Into<String>, field_number: u32, ty: PrimitiveType) -> Self {
        Self {
            name: name.into(),
            field_number,
            ty,
            is_optional: false,
            is_array: false,
        }
    }

    #[must_use]
    pub const fn optional(mut self) -> Self {
        self.is_optional = true;
        self
    }

    #[must_use]
    pub const fn array(mut self) -> Self {
        self.is_array = true;
        self
    }
}

impl ValidateNode for FieldSchema {
    fn validate(&self) -> Result<(), ErrorTree> {
        let mut errs = ErrorTree::new();
        if self.name.is_empty() {
            errs.add_message("field name must not be empty");
        }
        errs.result()
    }
}

///
/// FieldList
///

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct FieldList {
    pub fields: Vec<FieldSchema>,
}

impl FieldList {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    #[must_use]
    pub fn iter(&self) -> std::slice::Iter<'_, FieldSchema> {
        self.fields.iter()
    }
}

impl ValidateNode for FieldList {
    fn validate(&self) -> Result<(), ErrorTree> {
        let mut errs = ErrorTree::new();
        let mut seen_names = std::collections::HashSet::new();
        let mut seen_numbers = std::collections::HashSet::new();
        for field in &self.fields {
            if let Err(e) = field.validate() {
                errs.merge(e);
            }
            if !seen_names.insert(&field.name) {
                errs.add_message(format!("duplicate field name: {}", field.name));
            }
            if !seen_numbers.insert(field.field_number) {
                errs.add_message(format!(
                    "duplicate field number {} (field {})",
                    field.field_number, field.name
                ));
            }
        }
        errs.result()
    }
}
