use lazy_static::lazy_static;
use regex::Regex;
use tracing::{Level, event};

use super::definition::{QueryDefinition, QueryParameter, ReturnShape};
use super::spec::{AND_TOKEN, FieldLookupSpec, LookupMarker, OR_TOKEN, QueryKind, QuerySpecification};
use crate::core::{Result, SpecificationError, TypeRef};
use crate::metadata::{EntityDescriptor, FieldDescriptor};

lazy_static! {
    static ref WHERE_PREFIX: Regex = Regex::new(r"(?i)^\s*where\b").unwrap();
}

/// Compiles query specifications into query definitions.
///
/// A pure function of the specification and the owning entity's descriptor.
pub struct QuerySpecSynthesizer;

impl QuerySpecSynthesizer {
    pub fn synthesize(spec: &QuerySpecification, entity: &EntityDescriptor) -> Result<QueryDefinition> {
        validate(spec, entity)?;

        let mut parts = vec![select_prefix(entity)];
        if let Some(clause) = where_clause(spec, entity) {
            parts.push(clause);
        }
        if !spec.order_by.trim().is_empty() {
            parts.push(spec.order_by.clone());
        }

        let parameters = spec
            .args
            .iter()
            .map(|arg| {
                let field = entity.require_field(arg)?;
                Ok(QueryParameter::new(arg.clone(), field.type_ref.clone()))
            })
            .collect::<Result<Vec<_>>>()?;

        let definition = QueryDefinition {
            method_name: spec.method_name.clone(),
            parameters,
            query_string: parts.join(" "),
            return_shape: ReturnShape::List,
        };
        event!(
            Level::DEBUG,
            entity = %entity.type_name(),
            method = %definition.method_name,
            query = %definition.query_string,
            "resolver synthesized"
        );
        Ok(definition)
    }

    /// Definitions for the single-field lookup markers on one field, in
    /// find-by, find-all-by, find-by-unique order.
    pub fn synthesize_field_lookups(
        lookup: &FieldLookupSpec,
        entity: &EntityDescriptor,
    ) -> Result<Vec<QueryDefinition>> {
        let field = entity.require_field(&lookup.field)?;

        if lookup.has(LookupMarker::FindByUnique) {
            if lookup.has(LookupMarker::FindBy) {
                return Err(SpecificationError::ConflictingMarker {
                    entity: entity.type_name().to_string(),
                    field: field.name.clone(),
                }
                .into());
            }
            if !field.is_unique {
                return Err(SpecificationError::ConstraintMismatch {
                    entity: entity.type_name().to_string(),
                    field: field.name.clone(),
                }
                .into());
            }
        }

        let mut definitions = Vec::new();
        if lookup.has(LookupMarker::FindBy) {
            definitions.push(equality_lookup(entity, field, ReturnShape::List));
        }
        if lookup.has(LookupMarker::FindAllBy) {
            definitions.push(membership_lookup(entity, field));
        }
        if lookup.has(LookupMarker::FindByUnique) {
            definitions.push(equality_lookup(entity, field, ReturnShape::SingleOptional));
        }
        Ok(definitions)
    }
}

fn validate(spec: &QuerySpecification, entity: &EntityDescriptor) -> Result<()> {
    let entity_name = entity.type_name();
    if spec.method_name.trim().is_empty() {
        return Err(SpecificationError::Invalid {
            entity: entity_name.to_string(),
            reason: "resolver has an empty method name".to_string(),
        }
        .into());
    }

    if spec.kind != QueryKind::SelectBy {
        return Err(SpecificationError::UnsupportedQueryKind {
            entity: entity_name.to_string(),
            method: spec.method_name.clone(),
            kind: spec.kind.to_string(),
        }
        .into());
    }

    for (idx, arg) in spec.args.iter().enumerate() {
        if entity.field(arg).is_none() {
            return Err(SpecificationError::UnknownArgumentField {
                entity: entity_name.to_string(),
                method: spec.method_name.clone(),
                field: arg.clone(),
            }
            .into());
        }
        if spec.args[..idx].contains(arg) {
            return Err(SpecificationError::DuplicateArgument {
                entity: entity_name.to_string(),
                method: spec.method_name.clone(),
                field: arg.clone(),
            }
            .into());
        }
    }
    Ok(())
}

pub(crate) fn select_prefix(entity: &EntityDescriptor) -> String {
    let alias = entity.alias();
    format!("SELECT {} FROM {} {}", alias, entity.entity_name(), alias)
}

fn where_clause(spec: &QuerySpecification, entity: &EntityDescriptor) -> Option<String> {
    let conjunction = match spec.where_template.as_str() {
        AND_TOKEN => " AND ",
        OR_TOKEN => " OR ",
        literal if literal.trim().is_empty() => return None,
        literal if WHERE_PREFIX.is_match(literal) => return Some(literal.to_string()),
        literal => return Some(format!("WHERE {}", literal)),
    };

    if spec.args.is_empty() {
        return None;
    }
    let alias = entity.alias();
    let conditions = spec
        .args
        .iter()
        .map(|arg| format!("{}.{} = :{}", alias, arg, arg))
        .collect::<Vec<_>>();
    Some(format!("WHERE {}", conditions.join(conjunction)))
}

fn equality_lookup(entity: &EntityDescriptor, field: &FieldDescriptor, shape: ReturnShape) -> QueryDefinition {
    QueryDefinition {
        method_name: format!("find_by_{}", field.name),
        parameters: vec![QueryParameter::new(field.name.clone(), field.type_ref.clone())],
        query_string: format!(
            "{} WHERE {}.{} = :{}",
            select_prefix(entity),
            entity.alias(),
            field.name,
            field.name
        ),
        return_shape: shape,
    }
}

fn membership_lookup(entity: &EntityDescriptor, field: &FieldDescriptor) -> QueryDefinition {
    let param = pluralize(&field.name);
    QueryDefinition {
        method_name: format!("find_all_by_{}_in", field.name),
        query_string: format!(
            "{} WHERE {}.{} IN :{}",
            select_prefix(entity),
            entity.alias(),
            field.name,
            param
        ),
        parameters: vec![QueryParameter::new(param, TypeRef::collection_of(&field.type_ref))],
        return_shape: ReturnShape::List,
    }
}

/// English plural of a field name, used for collection parameters.
pub(crate) fn pluralize(word: &str) -> String {
    let lower = word.to_ascii_lowercase();
    if let Some(stem) = word.strip_suffix('y') {
        let before = stem.chars().last();
        if before.is_some_and(|c| !"aeiou".contains(c.to_ascii_lowercase())) {
            return format!("{}ies", stem);
        }
    }
    if ["s", "x", "z", "ch", "sh"].iter().any(|suffix| lower.ends_with(suffix)) {
        return format!("{}es", word);
    }
    format!("{}s", word)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DataLayerConfig;
    use crate::core::{DataError, FieldValue};
    use crate::metadata::{FieldSchema, Record, TypeSchema};

    #[derive(Default)]
    struct Post {
        id: i64,
        title: String,
        content: String,
        slug: String,
        category: String,
    }

    impl Record for Post {
        fn schema() -> TypeSchema {
            TypeSchema::builder::<Self>("Post")
                .entity()
                .zero_with(Self::default)
                .field(FieldSchema::of::<i64>("id").identity())
                .accessors::<i64>("id", |r| &r.id, |r| &mut r.id)
                .field(FieldSchema::of::<String>("title"))
                .accessors::<String>("title", |r| &r.title, |r| &mut r.title)
                .field(FieldSchema::of::<String>("content"))
                .accessors::<String>("content", |r| &r.content, |r| &mut r.content)
                .field(FieldSchema::of::<String>("slug").column(false, true))
                .accessors::<String>("slug", |r| &r.slug, |r| &mut r.slug)
                .field(FieldSchema::of::<String>("category"))
                .accessors::<String>("category", |r| &r.category, |r| &mut r.category)
                .build()
        }
    }

    fn post() -> EntityDescriptor {
        EntityDescriptor::build(&Post::schema(), &DataLayerConfig::default()).unwrap()
    }

    fn spec_err(result: Result<impl std::fmt::Debug>) -> SpecificationError {
        match result {
            Err(DataError::Specification(err)) => err,
            other => panic!("expected specification error, got {other:?}"),
        }
    }

    #[test]
    fn test_and_chain() {
        let spec = QuerySpecification::new("by_title_and_content").args(["title", "content"]);
        let definition = QuerySpecSynthesizer::synthesize(&spec, &post()).unwrap();
        assert_eq!(
            definition.query_string,
            "SELECT p FROM Post p WHERE p.title = :title AND p.content = :content"
        );
        assert_eq!(definition.parameter_names(), vec!["title", "content"]);
        assert_eq!(definition.parameters[0].type_ref, String::type_ref());
        assert_eq!(definition.return_shape, ReturnShape::List);
    }

    #[test]
    fn test_or_chain_has_one_fewer_conjunction_than_args() {
        let spec = QuerySpecification::new("by_any")
            .where_template(OR_TOKEN)
            .args(["content", "title", "category"]);
        let definition = QuerySpecSynthesizer::synthesize(&spec, &post()).unwrap();
        assert_eq!(definition.query_string.matches(" OR ").count(), 2);
        assert!(!definition.query_string.contains(" AND "));
        assert_eq!(definition.parameter_names(), vec!["content", "title", "category"]);
        for arg in ["content", "title", "category"] {
            assert_eq!(definition.query_string.matches(&format!(":{}", arg)).count(), 1);
        }
    }

    #[test]
    fn test_literal_template_prefixed_unless_already_where() {
        let bare = QuerySpecification::new("recent")
            .where_template("p.id > :id")
            .args(["id"]);
        assert_eq!(
            QuerySpecSynthesizer::synthesize(&bare, &post()).unwrap().query_string,
            "SELECT p FROM Post p WHERE p.id > :id"
        );

        let explicit = QuerySpecification::new("recent")
            .where_template("  where p.id > :id")
            .args(["id"]);
        assert_eq!(
            QuerySpecSynthesizer::synthesize(&explicit, &post()).unwrap().query_string,
            "SELECT p FROM Post p   where p.id > :id"
        );

        let lookalike = QuerySpecification::new("whereabouts")
            .where_template("whereabouts = :id")
            .args(["id"]);
        assert_eq!(
            QuerySpecSynthesizer::synthesize(&lookalike, &post()).unwrap().query_string,
            "SELECT p FROM Post p WHERE whereabouts = :id"
        );
    }

    #[test]
    fn test_order_by_appended() {
        let spec = QuerySpecification::new("by_category")
            .args(["category"])
            .order_by("ORDER BY p.title DESC");
        assert_eq!(
            QuerySpecSynthesizer::synthesize(&spec, &post()).unwrap().query_string,
            "SELECT p FROM Post p WHERE p.category = :category ORDER BY p.title DESC"
        );
    }

    #[test]
    fn test_conjunction_without_args_selects_all() {
        let spec = QuerySpecification::new("everything").order_by("ORDER BY p.id");
        assert_eq!(
            QuerySpecSynthesizer::synthesize(&spec, &post()).unwrap().query_string,
            "SELECT p FROM Post p ORDER BY p.id"
        );
    }

    #[test]
    fn test_unknown_and_duplicate_args_rejected() {
        let unknown = QuerySpecification::new("by_author").args(["author"]);
        assert!(matches!(
            spec_err(QuerySpecSynthesizer::synthesize(&unknown, &post())),
            SpecificationError::UnknownArgumentField { field, .. } if field == "author"
        ));

        let duplicate = QuerySpecification::new("twice").args(["title", "title"]);
        assert!(matches!(
            spec_err(QuerySpecSynthesizer::synthesize(&duplicate, &post())),
            SpecificationError::DuplicateArgument { .. }
        ));
    }

    #[test]
    fn test_unsupported_kind_rejected() {
        let spec = QuerySpecification::new("count_titles")
            .kind(QueryKind::Count)
            .args(["title"]);
        assert!(matches!(
            spec_err(QuerySpecSynthesizer::synthesize(&spec, &post())),
            SpecificationError::UnsupportedQueryKind { kind, .. } if kind == "count"
        ));
    }

    #[test]
    fn test_field_lookups() {
        let entity = post();
        let lookup = FieldLookupSpec::new("category")
            .marker(LookupMarker::FindBy)
            .marker(LookupMarker::FindAllBy);
        let definitions = QuerySpecSynthesizer::synthesize_field_lookups(&lookup, &entity).unwrap();
        assert_eq!(definitions.len(), 2);

        assert_eq!(definitions[0].method_name, "find_by_category");
        assert_eq!(
            definitions[0].query_string,
            "SELECT p FROM Post p WHERE p.category = :category"
        );
        assert_eq!(definitions[0].return_shape, ReturnShape::List);

        assert_eq!(definitions[1].method_name, "find_all_by_category_in");
        assert_eq!(definitions[1].parameter_names(), vec!["categories"]);
        assert_eq!(definitions[1].parameters[0].type_ref.name, "Vec<String>");
        assert_eq!(
            definitions[1].query_string,
            "SELECT p FROM Post p WHERE p.category IN :categories"
        );
    }

    #[test]
    fn test_find_by_unique() {
        let entity = post();
        let unique = FieldLookupSpec::new("slug").marker(LookupMarker::FindByUnique);
        let definitions = QuerySpecSynthesizer::synthesize_field_lookups(&unique, &entity).unwrap();
        assert_eq!(definitions.len(), 1);
        assert_eq!(definitions[0].return_shape, ReturnShape::SingleOptional);

        let not_unique = FieldLookupSpec::new("title").marker(LookupMarker::FindByUnique);
        assert!(matches!(
            spec_err(QuerySpecSynthesizer::synthesize_field_lookups(&not_unique, &entity)),
            SpecificationError::ConstraintMismatch { field, .. } if field == "title"
        ));

        let conflicting = FieldLookupSpec::new("slug")
            .marker(LookupMarker::FindBy)
            .marker(LookupMarker::FindByUnique);
        assert!(matches!(
            spec_err(QuerySpecSynthesizer::synthesize_field_lookups(&conflicting, &entity)),
            SpecificationError::ConflictingMarker { .. }
        ));
    }

    #[test]
    fn test_pluralize() {
        assert_eq!(pluralize("title"), "titles");
        assert_eq!(pluralize("category"), "categories");
        assert_eq!(pluralize("key"), "keys");
        assert_eq!(pluralize("status"), "statuses");
        assert_eq!(pluralize("box"), "boxes");
        assert_eq!(pluralize("branch"), "branches");
    }
}
