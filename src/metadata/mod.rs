pub mod cache;
pub mod entity;
pub mod field;
pub mod schema;

pub use cache::{EntityMetadataCache, SharedMetadataCache};
pub use entity::{EntityDescriptor, FieldAccessor};
pub use field::{ClassificationContext, FieldDescriptor};
pub use schema::{
    AccessorMethod, ColumnSpec, FieldMarkers, FieldSchema, Getter, Record, RelationKind, Setter,
    TypeSchema, TypeSchemaBuilder, ZeroConstructor,
};
