use thiserror::Error;

use super::Value;

/// Malformed or conflicting declarations, detected while synthesizing query
/// definitions. Each variant names the entity and the offending member.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SpecificationError {
    #[error("Resolver '{method}' on '{entity}' references unknown field '{field}'")]
    UnknownArgumentField {
        entity: String,
        method: String,
        field: String,
    },

    #[error("Field '{field}' not found on '{entity}'")]
    UnknownField { entity: String, field: String },

    #[error("Resolver '{method}' on '{entity}' binds field '{field}' more than once")]
    DuplicateArgument {
        entity: String,
        method: String,
        field: String,
    },

    #[error("Method '{method}' is generated more than once for '{entity}'")]
    DuplicateMethod { entity: String, method: String },

    #[error("Query kind '{kind}' used by '{method}' on '{entity}' is not supported")]
    UnsupportedQueryKind {
        entity: String,
        method: String,
        kind: String,
    },

    #[error(
        "Field '{field}' on '{entity}' is marked find_by_unique but has no uniqueness constraint; declare it as column(unique)"
    )]
    ConstraintMismatch { entity: String, field: String },

    #[error("Field '{field}' on '{entity}' cannot be marked both find_by and find_by_unique")]
    ConflictingMarker { entity: String, field: String },

    #[error("Field '{field}' on '{entity}' is marked for fuzzy search but has non-textual type {type_name}")]
    InvalidSearchField {
        entity: String,
        field: String,
        type_name: String,
    },

    #[error("Invalid declaration on '{entity}': {reason}")]
    Invalid { entity: String, reason: String },
}

#[derive(Error, Debug)]
pub enum DataError {
    #[error("Specification error: {0}")]
    Specification(#[from] SpecificationError),

    #[error("Entity '{0}' is not registered in the metadata cache")]
    UnknownEntity(String),

    #[error("No zero-argument constructor found for '{0}'")]
    NoDefaultConstructor(String),

    #[error("Entity '{0}' has no identity field")]
    MissingIdentityField(String),

    #[error("Entity name '{0}' is already registered by a different type")]
    ConflictingEntityName(String),

    #[error("No {entity} found with id {id}")]
    EntityNotFound { entity: String, id: Value },

    #[error("Entity '{0}' is not archivable")]
    NotArchivable(String),

    #[error("Accessor failure on {entity}.{field}: {reason}")]
    Accessor {
        entity: String,
        field: String,
        reason: String,
    },

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl DataError {
    /// Not-found is the only error class callers are expected to branch on.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::EntityNotFound { .. })
    }

    pub fn is_specification(&self) -> bool {
        matches!(self, Self::Specification(_))
    }
}

pub type Result<T> = std::result::Result<T, DataError>;

impl<T> From<std::sync::PoisonError<T>> for DataError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}
