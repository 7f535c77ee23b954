use serde::Serialize;

use super::schema::FieldSchema;
use crate::core::TypeRef;

/// Structural fact sheet for one field of one record type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub type_ref: TypeRef,
    pub is_collection_or_map: bool,
    pub is_non_updatable: bool,
    pub is_non_nullable: bool,
    pub is_identity: bool,
    pub is_version: bool,
    pub is_unique: bool,
}

/// Type-level context a field is classified in.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassificationContext<'a> {
    /// Non-updatable field names declared anywhere in the type hierarchy
    pub non_updatable: &'a [String],
    /// Archive flag that must be protected from generic updates, if any
    pub protected_flag: Option<&'a str>,
}

impl FieldDescriptor {
    pub fn classify(schema: &FieldSchema, context: ClassificationContext<'_>) -> Self {
        let markers = &schema.markers;
        let is_collection_or_map = schema.type_ref.is_collection_or_map();
        let is_identity = schema.is_identity();

        let is_non_updatable = markers.non_updatable
            || context.non_updatable.iter().any(|name| name == &schema.name)
            || context.protected_flag == Some(schema.name.as_str())
            || is_identity
            || markers.version
            || markers.element_collection
            || is_collection_or_map;

        let is_non_nullable = markers.non_nullable
            || markers.column.map(|column| !column.nullable).unwrap_or(false)
            || markers.relation.map(|(_, optional)| !optional).unwrap_or(false);

        Self {
            name: schema.name.clone(),
            type_ref: schema.type_ref.clone(),
            is_collection_or_map,
            is_non_updatable,
            is_non_nullable,
            is_identity,
            is_version: markers.version,
            is_unique: schema.is_unique(),
        }
    }

    pub fn is_cascade_updatable(&self) -> bool {
        !self.is_non_updatable
    }
}
