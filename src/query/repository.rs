use serde::Serialize;
use std::collections::HashSet;
use tracing::{Level, event};

use super::definition::QueryDefinition;
use super::fuzzy::FuzzySearchSynthesizer;
use super::synthesizer::QuerySpecSynthesizer;
use crate::config::DataLayerConfig;
use crate::core::{Result, SpecificationError, TypeRef};
use crate::metadata::EntityDescriptor;

/// Every generated lookup of one record type, keyed by its identity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositorySurface {
    pub type_name: String,
    pub entity_name: String,
    pub id_type: TypeRef,
    /// Field lookups, then resolvers, then the fuzzy search.
    pub definitions: Vec<QueryDefinition>,
}

impl RepositorySurface {
    pub fn synthesize(entity: &EntityDescriptor, config: &DataLayerConfig) -> Result<Self> {
        let result = Self::collect(entity, config);
        if let Err(err) = &result {
            event!(Level::ERROR, entity = %entity.type_name(), error = %err, "repository synthesis failed");
        }
        result
    }

    fn collect(entity: &EntityDescriptor, config: &DataLayerConfig) -> Result<Self> {
        let declarations = entity.declarations();
        let mut definitions = Vec::new();

        for lookup in &declarations.field_lookups {
            definitions.extend(QuerySpecSynthesizer::synthesize_field_lookups(lookup, entity)?);
        }
        for resolver in &declarations.resolvers {
            definitions.push(QuerySpecSynthesizer::synthesize(resolver, entity)?);
        }

        let fuzzy = FuzzySearchSynthesizer::new(config);
        let search_fields = fuzzy.collect_search_fields(entity)?;
        if let Some(definition) = fuzzy.synthesize(entity, &search_fields)? {
            definitions.push(definition);
        }

        let mut seen = HashSet::new();
        for definition in &definitions {
            if !seen.insert(definition.method_name.as_str()) {
                return Err(SpecificationError::DuplicateMethod {
                    entity: entity.type_name().to_string(),
                    method: definition.method_name.clone(),
                }
                .into());
            }
        }

        Ok(Self {
            type_name: entity.type_name().to_string(),
            entity_name: entity.entity_name().to_string(),
            id_type: entity.identity_field().type_ref.clone(),
            definitions,
        })
    }

    pub fn definition(&self, method_name: &str) -> Option<&QueryDefinition> {
        self.definitions
            .iter()
            .find(|definition| definition.method_name == method_name)
    }

    pub fn method_names(&self) -> Vec<&str> {
        self.definitions
            .iter()
            .map(|definition| definition.method_name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DataError, FieldValue};
    use crate::metadata::{FieldSchema, TypeSchema};
    use crate::query::{LookupMarker, QuerySpecification};

    #[derive(Default)]
    struct User {
        id: i64,
        email: String,
        name: String,
    }

    fn schema(resolvers: Vec<QuerySpecification>) -> TypeSchema {
        let mut builder = TypeSchema::builder::<User>("User")
            .entity()
            .zero_with(User::default)
            .field(FieldSchema::of::<i64>("id").identity())
            .accessors::<i64>("id", |r| &r.id, |r| &mut r.id)
            .field(FieldSchema::of::<String>("email").column(false, true))
            .accessors::<String>("email", |r| &r.email, |r| &mut r.email)
            .lookup("email", LookupMarker::FindByUnique)
            .field(FieldSchema::of::<String>("name"))
            .accessors::<String>("name", |r| &r.name, |r| &mut r.name)
            .lookup("name", LookupMarker::FindAllBy)
            .fuzzy_field("name");
        for resolver in resolvers {
            builder = builder.resolver(resolver);
        }
        builder.build()
    }

    fn descriptor(schema: TypeSchema) -> EntityDescriptor {
        EntityDescriptor::build(&schema, &DataLayerConfig::default()).unwrap()
    }

    #[test]
    fn test_surface_ordering() {
        let entity = descriptor(schema(vec![
            QuerySpecification::new("by_name_or_email").where_template("|||").args(["name", "email"]),
        ]));
        let surface = RepositorySurface::synthesize(&entity, &DataLayerConfig::default()).unwrap();

        assert_eq!(surface.entity_name, "User");
        assert_eq!(surface.id_type, i64::type_ref());
        assert_eq!(
            surface.method_names(),
            vec!["find_by_email", "find_all_by_name_in", "by_name_or_email", "fuzzy_search"]
        );
        assert_eq!(
            surface.definition("by_name_or_email").unwrap().query_string,
            "SELECT u FROM User u WHERE u.name = :name OR u.email = :email"
        );
    }

    #[test]
    fn test_duplicate_method_names_rejected() {
        let entity = descriptor(schema(vec![
            QuerySpecification::new("find_by_email").args(["email"]),
        ]));
        let err = RepositorySurface::synthesize(&entity, &DataLayerConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            DataError::Specification(SpecificationError::DuplicateMethod { method, .. })
                if method == "find_by_email"
        ));
    }
}
