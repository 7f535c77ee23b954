use super::{DataError, Result, Value};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use uuid::Uuid;

/// Structural class of a declared field type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    Text,
    Integer,
    Float,
    Boolean,
    Uuid,
    Timestamp,
    Optional(Box<TypeKind>),
    Collection(Box<TypeKind>),
    Map(Box<TypeKind>),
    Other,
}

impl TypeKind {
    pub fn is_textual(&self) -> bool {
        match self {
            Self::Text => true,
            Self::Optional(inner) => inner.is_textual(),
            _ => false,
        }
    }

    pub fn is_collection_or_map(&self) -> bool {
        match self {
            Self::Collection(_) | Self::Map(_) => true,
            Self::Optional(inner) => inner.is_collection_or_map(),
            _ => false,
        }
    }

    pub fn is_boolean(&self) -> bool {
        match self {
            Self::Boolean => true,
            Self::Optional(inner) => inner.is_boolean(),
            _ => false,
        }
    }
}

/// Declared type of a field: the Rust spelling used when rendering a
/// parameter, plus its structural kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeRef {
    pub name: String,
    pub kind: TypeKind,
}

impl TypeRef {
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// A user type with no special classification.
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Other)
    }

    pub fn optional_of(inner: &TypeRef) -> Self {
        Self::new(
            format!("Option<{}>", inner.name),
            TypeKind::Optional(Box::new(inner.kind.clone())),
        )
    }

    pub fn collection_of(inner: &TypeRef) -> Self {
        Self::new(
            format!("Vec<{}>", inner.name),
            TypeKind::Collection(Box::new(inner.kind.clone())),
        )
    }

    pub fn map_of(key: &str, inner: &TypeRef) -> Self {
        Self::new(
            format!("{}<String, {}>", key, inner.name),
            TypeKind::Map(Box::new(inner.kind.clone())),
        )
    }

    pub fn is_textual(&self) -> bool {
        self.kind.is_textual()
    }

    pub fn is_collection_or_map(&self) -> bool {
        self.kind.is_collection_or_map()
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Conversion between a concrete field type and [`Value`].
///
/// Every field exposed through the accessor table implements this; the
/// derive macro requires it for each non-`base` field.
pub trait FieldValue: Sized {
    fn type_ref() -> TypeRef;
    fn to_value(&self) -> Value;
    fn from_value(value: Value) -> Result<Self>;
}

fn mismatch(expected: &str, value: &Value) -> DataError {
    DataError::TypeMismatch(format!("expected {}, got {}", expected, value.type_name()))
}

impl FieldValue for String {
    fn type_ref() -> TypeRef {
        TypeRef::new("String", TypeKind::Text)
    }

    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Text(s) => Ok(s),
            other => Err(mismatch("TEXT", &other)),
        }
    }
}

impl FieldValue for bool {
    fn type_ref() -> TypeRef {
        TypeRef::new("bool", TypeKind::Boolean)
    }

    fn to_value(&self) -> Value {
        Value::Boolean(*self)
    }

    fn from_value(value: Value) -> Result<Self> {
        value.as_bool().ok_or_else(|| mismatch("BOOLEAN", &value))
    }
}

macro_rules! impl_integer_field_value {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl FieldValue for $ty {
                fn type_ref() -> TypeRef {
                    TypeRef::new($name, TypeKind::Integer)
                }

                fn to_value(&self) -> Value {
                    Value::Integer(*self as i64)
                }

                fn from_value(value: Value) -> Result<Self> {
                    let raw = value.as_i64().ok_or_else(|| mismatch("INTEGER", &value))?;
                    <$ty>::try_from(raw).map_err(|_| {
                        DataError::TypeMismatch(format!("{} does not fit in {}", raw, $name))
                    })
                }
            }
        )*
    };
}

impl_integer_field_value!(
    i64 => "i64",
    i32 => "i32",
    i16 => "i16",
    i8 => "i8",
    u32 => "u32",
    u16 => "u16",
    u8 => "u8",
);

/// Integers that may exceed `i64`; out-of-range values travel as decimal text.
macro_rules! impl_wide_integer_field_value {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl FieldValue for $ty {
                fn type_ref() -> TypeRef {
                    TypeRef::new($name, TypeKind::Integer)
                }

                fn to_value(&self) -> Value {
                    match i64::try_from(*self) {
                        Ok(raw) => Value::Integer(raw),
                        Err(_) => Value::Text(self.to_string()),
                    }
                }

                fn from_value(value: Value) -> Result<Self> {
                    match value {
                        Value::Text(s) => s.parse::<$ty>().map_err(|err| {
                            DataError::TypeMismatch(format!("invalid {} '{}': {}", $name, s, err))
                        }),
                        other => {
                            let raw = other.as_i64().ok_or_else(|| mismatch("INTEGER", &other))?;
                            <$ty>::try_from(raw).map_err(|_| {
                                DataError::TypeMismatch(format!("{} does not fit in {}", raw, $name))
                            })
                        }
                    }
                }
            }
        )*
    };
}

impl_wide_integer_field_value!(u64 => "u64", usize => "usize", isize => "isize");

impl FieldValue for f64 {
    fn type_ref() -> TypeRef {
        TypeRef::new("f64", TypeKind::Float)
    }

    fn to_value(&self) -> Value {
        Value::Float(*self)
    }

    fn from_value(value: Value) -> Result<Self> {
        value.as_f64().ok_or_else(|| mismatch("FLOAT", &value))
    }
}

impl FieldValue for f32 {
    fn type_ref() -> TypeRef {
        TypeRef::new("f32", TypeKind::Float)
    }

    fn to_value(&self) -> Value {
        Value::Float(*self as f64)
    }

    fn from_value(value: Value) -> Result<Self> {
        value
            .as_f64()
            .map(|f| f as f32)
            .ok_or_else(|| mismatch("FLOAT", &value))
    }
}

impl FieldValue for Uuid {
    fn type_ref() -> TypeRef {
        TypeRef::new("Uuid", TypeKind::Uuid)
    }

    fn to_value(&self) -> Value {
        Value::Uuid(*self)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Uuid(u) => Ok(u),
            Value::Text(s) => Uuid::parse_str(&s)
                .map_err(|err| DataError::TypeMismatch(format!("invalid uuid '{}': {}", s, err))),
            other => Err(mismatch("UUID", &other)),
        }
    }
}

/// Timestamps travel as RFC 3339 text.
impl FieldValue for DateTime<Utc> {
    fn type_ref() -> TypeRef {
        TypeRef::new("DateTime<Utc>", TypeKind::Timestamp)
    }

    fn to_value(&self) -> Value {
        Value::Text(self.to_rfc3339())
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Text(s) => DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|err| DataError::TypeMismatch(format!("invalid timestamp '{}': {}", s, err))),
            other => Err(mismatch("TIMESTAMP", &other)),
        }
    }
}

impl<T: FieldValue> FieldValue for Option<T> {
    fn type_ref() -> TypeRef {
        TypeRef::optional_of(&T::type_ref())
    }

    fn to_value(&self) -> Value {
        match self {
            Some(inner) => inner.to_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: FieldValue> FieldValue for Vec<T> {
    fn type_ref() -> TypeRef {
        TypeRef::collection_of(&T::type_ref())
    }

    fn to_value(&self) -> Value {
        Value::List(self.iter().map(FieldValue::to_value).collect())
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::List(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(mismatch("LIST", &other)),
        }
    }
}

impl<T: FieldValue> FieldValue for BTreeMap<String, T> {
    fn type_ref() -> TypeRef {
        TypeRef::map_of("BTreeMap", &T::type_ref())
    }

    fn to_value(&self) -> Value {
        Value::Map(
            self.iter()
                .map(|(key, item)| (key.clone(), item.to_value()))
                .collect(),
        )
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Map(entries) => entries
                .into_iter()
                .map(|(key, item)| T::from_value(item).map(|item| (key, item)))
                .collect(),
            other => Err(mismatch("MAP", &other)),
        }
    }
}

impl<T: FieldValue> FieldValue for HashMap<String, T> {
    fn type_ref() -> TypeRef {
        TypeRef::map_of("HashMap", &T::type_ref())
    }

    fn to_value(&self) -> Value {
        Value::Map(
            self.iter()
                .map(|(key, item)| (key.clone(), item.to_value()))
                .collect(),
        )
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Map(entries) => entries
                .into_iter()
                .map(|(key, item)| T::from_value(item).map(|item| (key, item)))
                .collect(),
            other => Err(mismatch("MAP", &other)),
        }
    }
}
