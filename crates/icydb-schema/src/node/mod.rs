pub mod directory;
pub mod entity;
pub mod field;
pub mod index;
pub mod primary_key;

pub use directory::DirectoryComponent;
pub use entity::Entity;
pub use field::{FieldList, FieldSchema};
pub use index::{IndexDescriptor, IndexKind, MetaMap, MetaValue};
pub use primary_key::PrimaryKeyDef;
