use serde::{Deserialize, Serialize};
use std::fmt;

/// Where-template token expanding to `a.f1 = :f1 AND a.f2 = :f2 ...`.
pub const AND_TOKEN: &str = "&&&";
/// Where-template token expanding to `a.f1 = :f1 OR a.f2 = :f2 ...`.
pub const OR_TOKEN: &str = "|||";

/// Kind of query a resolver declares.
///
/// Only `SelectBy` is synthesized; the others are reserved and rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    #[default]
    SelectBy,
    Count,
    Avg,
    Max,
    Min,
    Sum,
    Update,
    Delete,
}

impl QueryKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SelectBy => "select_by",
            Self::Count => "count",
            Self::Avg => "avg",
            Self::Max => "max",
            Self::Min => "min",
            Self::Sum => "sum",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "select_by" => Some(Self::SelectBy),
            "count" => Some(Self::Count),
            "avg" => Some(Self::Avg),
            "max" => Some(Self::Max),
            "min" => Some(Self::Min),
            "sum" => Some(Self::Sum),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Declarative description of a free-form lookup on one record type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySpecification {
    #[serde(default)]
    pub kind: QueryKind,
    pub method_name: String,
    #[serde(default = "default_where_template")]
    pub where_template: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub order_by: String,
}

fn default_where_template() -> String {
    AND_TOKEN.to_string()
}

impl QuerySpecification {
    /// A `SelectBy` resolver with an AND-chained where clause and no args.
    pub fn new(method_name: impl Into<String>) -> Self {
        Self {
            kind: QueryKind::SelectBy,
            method_name: method_name.into(),
            where_template: default_where_template(),
            args: Vec::new(),
            order_by: String::new(),
        }
    }

    pub fn kind(mut self, kind: QueryKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn where_template(mut self, template: impl Into<String>) -> Self {
        self.where_template = template.into();
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = order_by.into();
        self
    }
}

/// Single-field lookup marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupMarker {
    FindBy,
    FindAllBy,
    FindByUnique,
}

/// The lookup markers carried by one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldLookupSpec {
    pub field: String,
    pub markers: Vec<LookupMarker>,
}

impl FieldLookupSpec {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            markers: Vec::new(),
        }
    }

    pub fn marker(mut self, marker: LookupMarker) -> Self {
        if !self.markers.contains(&marker) {
            self.markers.push(marker);
        }
        self
    }

    pub fn has(&self, marker: LookupMarker) -> bool {
        self.markers.contains(&marker)
    }
}

/// Everything a record type declares about its generated lookups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declarations {
    #[serde(default)]
    pub resolvers: Vec<QuerySpecification>,
    #[serde(default)]
    pub field_lookups: Vec<FieldLookupSpec>,
    /// Fields carrying a per-field fuzzy search marker, in declaration order.
    #[serde(default)]
    pub fuzzy_fields: Vec<String>,
    /// Type-level fuzzy search field list.
    #[serde(default)]
    pub fuzzy_search_fields: Vec<String>,
}

impl Declarations {
    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
            && self.field_lookups.is_empty()
            && self.fuzzy_fields.is_empty()
            && self.fuzzy_search_fields.is_empty()
    }

    /// Folds in the declarations of a supertype level. Lookups on the same
    /// field share one entry; a resolver whose method name is already
    /// declared here is overridden.
    pub fn absorb(&mut self, inherited: &Declarations) {
        for resolver in &inherited.resolvers {
            if !self
                .resolvers
                .iter()
                .any(|own| own.method_name == resolver.method_name)
            {
                self.resolvers.push(resolver.clone());
            }
        }
        for lookup in &inherited.field_lookups {
            match self
                .field_lookups
                .iter_mut()
                .find(|own| own.field == lookup.field)
            {
                Some(own) => {
                    for marker in &lookup.markers {
                        if !own.has(*marker) {
                            own.markers.push(*marker);
                        }
                    }
                }
                None => self.field_lookups.push(lookup.clone()),
            }
        }
        self.fuzzy_fields.extend(inherited.fuzzy_fields.iter().cloned());
        self.fuzzy_search_fields
            .extend(inherited.fuzzy_search_fields.iter().cloned());
    }

    /// Candidate fuzzy search field names: field-level markers first, then the
    /// type-level list, keeping the first occurrence of each name.
    pub fn fuzzy_candidates(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for name in self.fuzzy_fields.iter().chain(self.fuzzy_search_fields.iter()) {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_specification_defaults_from_json() {
        let spec: QuerySpecification =
            serde_json::from_str(r#"{"method_name": "by_title", "args": ["title"]}"#).unwrap();
        assert_eq!(spec.kind, QueryKind::SelectBy);
        assert_eq!(spec.where_template, AND_TOKEN);
        assert!(spec.order_by.is_empty());
    }

    #[test]
    fn test_specification_without_args_from_json() {
        let spec: QuerySpecification = serde_json::from_str(
            r#"{"method_name": "recent", "where_template": "p.views > 10"}"#,
        )
        .unwrap();
        assert!(spec.args.is_empty());
        assert_eq!(spec, QuerySpecification::new("recent").where_template("p.views > 10"));
    }

    #[test]
    fn test_query_kind_names_round_trip() {
        for kind in [QueryKind::SelectBy, QueryKind::Count, QueryKind::Delete] {
            assert_eq!(QueryKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(QueryKind::from_name("SELECT_BY"), Some(QueryKind::SelectBy));
        assert_eq!(QueryKind::from_name("upsert"), None);
    }

    #[test]
    fn test_absorb_merges_supertype_declarations() {
        let mut own = Declarations {
            resolvers: vec![QuerySpecification::new("by_code").args(["code"])],
            field_lookups: vec![FieldLookupSpec::new("code").marker(LookupMarker::FindBy)],
            fuzzy_fields: vec!["title".into()],
            ..Declarations::default()
        };
        let inherited = Declarations {
            resolvers: vec![
                QuerySpecification::new("by_code").args(["legacy_code"]),
                QuerySpecification::new("by_owner").args(["owner"]),
            ],
            field_lookups: vec![
                FieldLookupSpec::new("code").marker(LookupMarker::FindAllBy),
                FieldLookupSpec::new("owner").marker(LookupMarker::FindBy),
            ],
            fuzzy_fields: vec!["notes".into()],
            fuzzy_search_fields: vec!["title".into()],
        };
        own.absorb(&inherited);

        let names: Vec<_> = own.resolvers.iter().map(|r| r.method_name.as_str()).collect();
        assert_eq!(names, vec!["by_code", "by_owner"]);
        assert_eq!(own.resolvers[0].args, vec!["code".to_string()]);
        assert_eq!(
            own.field_lookups[0].markers,
            vec![LookupMarker::FindBy, LookupMarker::FindAllBy]
        );
        assert_eq!(own.field_lookups[1].field, "owner");
        assert_eq!(own.fuzzy_candidates(), vec!["title".to_string(), "notes".to_string()]);
    }

    #[test]
    fn test_fuzzy_candidates_field_level_first() {
        let declarations = Declarations {
            fuzzy_fields: vec!["title".into()],
            fuzzy_search_fields: vec!["content".into(), "title".into()],
            ..Declarations::default()
        };
        assert_eq!(declarations.fuzzy_candidates(), vec!["title", "content"]);
    }

    #[test]
    fn test_lookup_markers_not_duplicated() {
        let spec = FieldLookupSpec::new("email")
            .marker(LookupMarker::FindBy)
            .marker(LookupMarker::FindBy);
        assert_eq!(spec.markers, vec![LookupMarker::FindBy]);
    }
}
