use serde::{Deserialize, Serialize};

///
/// PrimaryKeyDef
///
/// The ordered list of fields composing an entity's primary key.
///
/// Resolves spec.md §9's open question about the index-from-index
/// builder's `extractPrimaryKey`: rather than assuming the last tuple
/// element of an index entry is the primary key, every consumer that needs
/// the primary-key arity consults this declaration (spec.md §3 SUPPLEMENT).
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PrimaryKeyDef {
    pub fields: Vec<String>,
}

impl PrimaryKeyDef {
    #[must_use]
    pub fn new(fields: Vec<String>) -> Self {
        assert!(!fields.is_empty(), "primary key must have at least one field");
        Self { fields }
    }

    #[must_use]
    pub fn single(field: impl Into<String>) -> Self {
        Self::new(vec![field.into()])
    }

    #[must_use]
    pub fn arity(&self) -> usize {
        self.fields.len()
    }
}
