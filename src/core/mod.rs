pub mod error;
pub mod types;
pub mod value;

pub use error::{DataError, Result, SpecificationError};
pub use types::{FieldValue, TypeKind, TypeRef};
pub use value::Value;
