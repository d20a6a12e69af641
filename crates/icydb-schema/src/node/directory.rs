use serde::{Deserialize, Serialize};

///
/// DirectoryComponent
///
/// One segment of an entity's path to its root subspace (spec.md §4.1).
/// `Static` contributes a literal path segment; `Dynamic` requires a
/// runtime binding supplied by the item being persisted or by an explicit
/// partition binding at query time.
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum DirectoryComponent {
    Static(String),
    Dynamic(String),
}

impl DirectoryComponent {
    #[must_use]
    pub const fn is_dynamic(&self) -> bool {
        matches!(self, Self::Dynamic(_))
    }

    #[must_use]
    pub fn dynamic_field(&self) -> Option<&str> {
        match self {
            Self::Dynamic(name) => Some(name),
            Self::Static(_) => None,
        }
    }
}
