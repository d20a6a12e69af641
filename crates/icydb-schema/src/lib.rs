//! Schema catalog: entity/field/index metadata and its YAML round-trip
//! form (spec.md §4.2, §6).

pub mod catalog;
pub mod node;
pub mod validate;
pub mod yaml;

pub use catalog::Catalog;
pub use node::{
    DirectoryComponent, Entity, FieldList, FieldSchema, IndexDescriptor, IndexKind, MetaMap,
    MetaValue, PrimaryKeyDef,
};
pub use validate::{ErrorTree, ValidateNode};
