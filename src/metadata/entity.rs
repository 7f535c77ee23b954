use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

use tracing::{Level, event};

use super::field::{ClassificationContext, FieldDescriptor};
use super::schema::{AccessorMethod, Getter, Setter, TypeSchema, getter_name, setter_name};
use crate::config::DataLayerConfig;
use crate::core::{DataError, Result, SpecificationError, Value};
use crate::query::Declarations;

/// Cached getter/setter pair of one field.
#[derive(Clone, Default)]
pub struct FieldAccessor {
    getter: Option<Getter>,
    setter: Option<Setter>,
}

impl FieldAccessor {
    pub fn has_getter(&self) -> bool {
        self.getter.is_some()
    }

    pub fn has_setter(&self) -> bool {
        self.setter.is_some()
    }
}

/// Per-record-type aggregate of cached metadata.
///
/// Built once by [`EntityMetadataCache`](super::EntityMetadataCache) and
/// read-only afterwards.
pub struct EntityDescriptor {
    type_id: TypeId,
    type_name: String,
    entity_name: String,
    identity_field: String,
    fields: Vec<FieldDescriptor>,
    field_index: HashMap<String, usize>,
    cascade_updatable: Vec<String>,
    accessors: HashMap<String, FieldAccessor>,
    zero_instance: Box<dyn Any + Send + Sync>,
    archive_flag: Option<String>,
    declarations: Declarations,
}

impl EntityDescriptor {
    /// Flattens the type hierarchy, classifies every field, binds accessors
    /// and constructs the zero instance.
    pub fn build(schema: &TypeSchema, config: &DataLayerConfig) -> Result<Self> {
        let type_name = schema.type_name().to_string();

        let mut field_schemas = Vec::new();
        let mut methods: HashMap<&str, &AccessorMethod> = HashMap::new();
        let mut non_updatable = Vec::new();
        let mut declarations = Declarations::default();
        for level in schema.hierarchy() {
            declarations.absorb(level.declarations());
            field_schemas.extend(level.fields().iter());
            for method in level.methods() {
                // most-derived definition wins
                methods.entry(method.name()).or_insert(method);
            }
            non_updatable.extend(level.non_updatable().iter().cloned());
        }

        let archive_flag = resolve_archive_flag(schema, &field_schemas, config)?;
        let context = ClassificationContext {
            non_updatable: &non_updatable,
            protected_flag: if config.protect_archive_flag {
                archive_flag.as_deref()
            } else {
                None
            },
        };

        let mut fields = Vec::with_capacity(field_schemas.len());
        let mut field_index = HashMap::new();
        for field_schema in &field_schemas {
            if field_index.contains_key(&field_schema.name) {
                continue;
            }
            field_index.insert(field_schema.name.clone(), fields.len());
            fields.push(FieldDescriptor::classify(field_schema, context));
        }

        let identity_field = fields
            .iter()
            .find(|field| field.is_identity)
            .map(|field| field.name.clone())
            .ok_or_else(|| DataError::MissingIdentityField(type_name.clone()))?;

        let mut accessors = HashMap::new();
        for field in &fields {
            let getter = match methods.get(getter_name(&field.name).as_str()) {
                Some(AccessorMethod::Getter { call, .. }) => Some(call.clone()),
                _ => None,
            };
            let setter = match methods.get(setter_name(&field.name).as_str()) {
                Some(AccessorMethod::Setter { call, .. }) => Some(call.clone()),
                _ => None,
            };
            accessors.insert(field.name.clone(), FieldAccessor { getter, setter });
        }

        let zero_instance = match schema.zero_constructor() {
            Some(constructor) => constructor(),
            None => return Err(DataError::NoDefaultConstructor(type_name)),
        };

        let cascade_updatable = fields
            .iter()
            .filter(|field| field.is_cascade_updatable())
            .map(|field| field.name.clone())
            .collect::<Vec<_>>();

        event!(
            Level::DEBUG,
            entity = %type_name,
            fields = fields.len(),
            cascade_updatable = cascade_updatable.len(),
            "entity descriptor built"
        );

        Ok(Self {
            type_id: schema.type_id(),
            entity_name: schema.resolved_entity_name().to_string(),
            type_name,
            identity_field,
            fields,
            field_index,
            cascade_updatable,
            accessors,
            zero_instance,
            archive_flag,
            declarations,
        })
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Name used in query strings.
    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }

    /// Query alias: the lower-cased first letter of the entity name.
    pub fn alias(&self) -> String {
        self.entity_name
            .chars()
            .next()
            .map(|first| first.to_lowercase().collect())
            .unwrap_or_default()
    }

    pub fn identity_field(&self) -> &FieldDescriptor {
        &self.fields[self.field_index[&self.identity_field]]
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.field_index.get(name).map(|idx| &self.fields[*idx])
    }

    pub fn require_field(&self, name: &str) -> Result<&FieldDescriptor> {
        self.field(name).ok_or_else(|| {
            SpecificationError::UnknownField {
                entity: self.type_name.clone(),
                field: name.to_string(),
            }
            .into()
        })
    }

    pub fn cascade_updatable_fields(&self) -> &[String] {
        &self.cascade_updatable
    }

    pub fn archive_flag(&self) -> Option<&str> {
        self.archive_flag.as_deref()
    }

    pub fn declarations(&self) -> &Declarations {
        &self.declarations
    }

    pub fn accessor(&self, field: &str) -> Option<&FieldAccessor> {
        self.accessors.get(field)
    }

    /// The zero instance built at cache initialisation, if it is a `T`.
    pub fn zero_instance<T: Any>(&self) -> Option<&T> {
        self.zero_instance.downcast_ref::<T>()
    }

    pub fn invoke_getter(&self, instance: &dyn Any, field: &str) -> Result<Value> {
        let getter = self
            .accessors
            .get(field)
            .and_then(|accessor| accessor.getter.as_ref())
            .ok_or_else(|| self.accessor_error(field, "no getter bound"))?;
        getter(instance).map_err(|err| self.wrap_accessor_error(field, err))
    }

    pub fn invoke_setter(&self, instance: &mut dyn Any, field: &str, value: Value) -> Result<()> {
        let setter = self
            .accessors
            .get(field)
            .and_then(|accessor| accessor.setter.as_ref())
            .ok_or_else(|| self.accessor_error(field, "no setter bound"))?;
        setter(instance, value).map_err(|err| self.wrap_accessor_error(field, err))
    }

    pub fn identity_of(&self, instance: &dyn Any) -> Result<Value> {
        self.invoke_getter(instance, &self.identity_field)
    }

    fn accessor_error(&self, field: &str, reason: &str) -> DataError {
        DataError::Accessor {
            entity: self.type_name.clone(),
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }

    fn wrap_accessor_error(&self, field: &str, err: DataError) -> DataError {
        match err {
            DataError::Accessor { reason, .. } => self.accessor_error(field, &reason),
            other => self.accessor_error(field, &other.to_string()),
        }
    }
}

fn resolve_archive_flag(
    schema: &TypeSchema,
    fields: &[&super::schema::FieldSchema],
    config: &DataLayerConfig,
) -> Result<Option<String>> {
    let marked = fields.iter().find(|field| field.markers.archive_flag);
    let candidate = match marked {
        Some(field) => field,
        None if schema.is_archivable() => fields
            .iter()
            .find(|field| field.name == config.archive_flag_field)
            .ok_or_else(|| SpecificationError::Invalid {
                entity: schema.type_name().to_string(),
                reason: format!(
                    "archivable type has no '{}' field",
                    config.archive_flag_field
                ),
            })?,
        None => return Ok(None),
    };

    if !candidate.type_ref.kind.is_boolean() {
        return Err(SpecificationError::Invalid {
            entity: schema.type_name().to_string(),
            reason: format!(
                "archive flag '{}' must be boolean, found {}",
                candidate.name, candidate.type_ref
            ),
        }
        .into());
    }
    Ok(Some(candidate.name.clone()))
}

impl fmt::Debug for EntityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityDescriptor")
            .field("type_name", &self.type_name)
            .field("entity_name", &self.entity_name)
            .field("identity_field", &self.identity_field)
            .field("fields", &self.fields)
            .field("cascade_updatable", &self.cascade_updatable)
            .field("archive_flag", &self.archive_flag)
            .finish()
    }
}
