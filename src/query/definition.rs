use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::TypeRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnShape {
    SingleOptional,
    List,
}

/// One named, positionally bound parameter of a generated lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParameter {
    pub name: String,
    pub type_ref: TypeRef,
}

impl QueryParameter {
    pub fn new(name: impl Into<String>, type_ref: TypeRef) -> Self {
        Self {
            name: name.into(),
            type_ref,
        }
    }
}

/// A synthesized lookup: what the harness renders into one repository method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryDefinition {
    pub method_name: String,
    /// Order is the order callers pass arguments in.
    pub parameters: Vec<QueryParameter>,
    pub query_string: String,
    pub return_shape: ReturnShape,
}

impl QueryDefinition {
    pub fn parameter_names(&self) -> Vec<&str> {
        self.parameters.iter().map(|p| p.name.as_str()).collect()
    }

    /// Rust-style signature for `record_type`, e.g.
    /// `fn find_by_title(title: String) -> Vec<Post>`.
    pub fn signature(&self, record_type: &str) -> String {
        let params = self
            .parameters
            .iter()
            .map(|p| format!("{}: {}", p.name, p.type_ref))
            .collect::<Vec<_>>()
            .join(", ");
        let returns = match self.return_shape {
            ReturnShape::SingleOptional => format!("Option<{}>", record_type),
            ReturnShape::List => format!("Vec<{}>", record_type),
        };
        format!("fn {}({}) -> {}", self.method_name, params, returns)
    }
}

impl fmt::Display for QueryDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.method_name, self.query_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FieldValue;

    #[test]
    fn test_signature_rendering() {
        let definition = QueryDefinition {
            method_name: "find_by_email".into(),
            parameters: vec![QueryParameter::new("email", String::type_ref())],
            query_string: "SELECT u FROM User u WHERE u.email = :email".into(),
            return_shape: ReturnShape::SingleOptional,
        };
        assert_eq!(
            definition.signature("User"),
            "fn find_by_email(email: String) -> Option<User>"
        );
        assert_eq!(definition.parameter_names(), vec!["email"]);
    }

    #[test]
    fn test_serialized_shape() {
        let definition = QueryDefinition {
            method_name: "by_age".into(),
            parameters: vec![QueryParameter::new("age", i32::type_ref())],
            query_string: "SELECT u FROM User u WHERE u.age = :age".into(),
            return_shape: ReturnShape::List,
        };
        let json = serde_json::to_value(&definition).unwrap();
        assert_eq!(json["return_shape"], "list");
        assert_eq!(json["parameters"][0]["type_ref"]["name"], "i32");
    }
}
