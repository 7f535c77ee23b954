use tracing::{Level, event};

use super::definition::{QueryDefinition, QueryParameter, ReturnShape};
use super::synthesizer::select_prefix;
use crate::config::DataLayerConfig;
use crate::core::{FieldValue, Result, SpecificationError};
use crate::metadata::{EntityDescriptor, FieldDescriptor};

/// Builds the case-sensitive substring search over a record's textual fields.
#[derive(Debug, Clone)]
pub struct FuzzySearchSynthesizer {
    method_name: String,
    search_term_param: String,
}

impl FuzzySearchSynthesizer {
    pub fn new(config: &DataLayerConfig) -> Self {
        Self {
            method_name: config.fuzzy_method_name.clone(),
            search_term_param: config.search_term_param.clone(),
        }
    }

    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    /// Resolves the entity's fuzzy search declarations to field descriptors.
    ///
    /// Field-level markers come first, then the type-level list. Every named
    /// field must exist and be textual.
    pub fn collect_search_fields<'e>(&self, entity: &'e EntityDescriptor) -> Result<Vec<&'e FieldDescriptor>> {
        entity
            .declarations()
            .fuzzy_candidates()
            .iter()
            .map(|name| {
                let field = entity.require_field(name)?;
                check_textual(entity, field)?;
                Ok(field)
            })
            .collect()
    }

    /// `None` when there is nothing to search.
    pub fn synthesize(
        &self,
        entity: &EntityDescriptor,
        fields: &[&FieldDescriptor],
    ) -> Result<Option<QueryDefinition>> {
        if fields.is_empty() {
            return Ok(None);
        }

        let alias = entity.alias();
        let mut conditions = Vec::with_capacity(fields.len());
        for field in fields {
            check_textual(entity, field)?;
            conditions.push(format!(
                "{}.{} LIKE %:{}%",
                alias, field.name, self.search_term_param
            ));
        }

        let definition = QueryDefinition {
            method_name: self.method_name.clone(),
            parameters: vec![QueryParameter::new(
                self.search_term_param.clone(),
                String::type_ref(),
            )],
            query_string: format!("{} WHERE {}", select_prefix(entity), conditions.join(" OR ")),
            return_shape: ReturnShape::List,
        };
        event!(
            Level::DEBUG,
            entity = %entity.type_name(),
            fields = fields.len(),
            "fuzzy search synthesized"
        );
        Ok(Some(definition))
    }
}

fn check_textual(entity: &EntityDescriptor, field: &FieldDescriptor) -> Result<()> {
    if field.type_ref.is_textual() {
        return Ok(());
    }
    Err(SpecificationError::InvalidSearchField {
        entity: entity.type_name().to_string(),
        field: field.name.clone(),
        type_name: field.type_ref.to_string(),
    }
    .into())
}
