use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::core::{DataError, FieldValue, Result, TypeRef, Value};
use crate::query::{Declarations, FieldLookupSpec, LookupMarker, QuerySpecification};

/// Type-erased getter: reads one field of a record passed as `&dyn Any`.
pub type Getter = Arc<dyn Fn(&dyn Any) -> Result<Value> + Send + Sync>;
/// Type-erased setter: writes one field of a record passed as `&mut dyn Any`.
pub type Setter = Arc<dyn Fn(&mut dyn Any, Value) -> Result<()> + Send + Sync>;
/// Zero-argument constructor producing the record's zero value.
pub type ZeroConstructor = Arc<dyn Fn() -> Box<dyn Any + Send + Sync> + Send + Sync>;

/// A record type whose structure can be described at runtime.
///
/// Usually implemented with `#[derive(Record)]`.
pub trait Record: Any + Send + Sync {
    fn schema() -> TypeSchema;
}

/// A public accessor method exposed by a record type.
#[derive(Clone)]
pub enum AccessorMethod {
    Getter { name: String, call: Getter },
    Setter { name: String, call: Setter },
}

impl AccessorMethod {
    pub fn name(&self) -> &str {
        match self {
            Self::Getter { name, .. } | Self::Setter { name, .. } => name,
        }
    }
}

impl fmt::Debug for AccessorMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Getter { name, .. } => write!(f, "Getter({})", name),
            Self::Setter { name, .. } => write!(f, "Setter({})", name),
        }
    }
}

pub fn getter_name(field: &str) -> String {
    format!("get_{}", field)
}

pub fn setter_name(field: &str) -> String {
    format!("set_{}", field)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    ManyToOne,
    OneToOne,
}

/// Column-level constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub nullable: bool,
    pub unique: bool,
}

impl Default for ColumnSpec {
    fn default() -> Self {
        Self {
            nullable: true,
            unique: false,
        }
    }
}

/// Structural markers declared on a field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMarkers {
    pub identity: bool,
    pub embedded_id: bool,
    pub version: bool,
    pub non_updatable: bool,
    pub non_nullable: bool,
    pub element_collection: bool,
    pub archive_flag: bool,
    pub column: Option<ColumnSpec>,
    pub relation: Option<(RelationKind, bool)>,
}

/// Declared shape of one field, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema {
    pub name: String,
    pub type_ref: TypeRef,
    pub markers: FieldMarkers,
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, type_ref: TypeRef) -> Self {
        Self {
            name: name.into(),
            type_ref,
            markers: FieldMarkers::default(),
        }
    }

    pub fn of<F: FieldValue>(name: impl Into<String>) -> Self {
        Self::new(name, F::type_ref())
    }

    pub fn identity(mut self) -> Self {
        self.markers.identity = true;
        self
    }

    pub fn embedded_id(mut self) -> Self {
        self.markers.embedded_id = true;
        self
    }

    pub fn version(mut self) -> Self {
        self.markers.version = true;
        self
    }

    pub fn non_updatable(mut self) -> Self {
        self.markers.non_updatable = true;
        self
    }

    pub fn non_nullable(mut self) -> Self {
        self.markers.non_nullable = true;
        self
    }

    pub fn element_collection(mut self) -> Self {
        self.markers.element_collection = true;
        self
    }

    pub fn archive_flag(mut self) -> Self {
        self.markers.archive_flag = true;
        self
    }

    pub fn column(mut self, nullable: bool, unique: bool) -> Self {
        self.markers.column = Some(ColumnSpec { nullable, unique });
        self
    }

    pub fn relation(mut self, kind: RelationKind, optional: bool) -> Self {
        self.markers.relation = Some((kind, optional));
        self
    }

    pub fn is_identity(&self) -> bool {
        self.markers.identity || self.markers.embedded_id
    }

    pub fn is_unique(&self) -> bool {
        self.markers.column.map(|column| column.unique).unwrap_or(false)
    }
}

/// Runtime description of a record type: its own fields and accessors, an
/// optional supertype, and the lookups it declares.
pub struct TypeSchema {
    type_id: TypeId,
    type_name: String,
    entity_name: Option<String>,
    table_name: Option<String>,
    persistable: bool,
    archivable: bool,
    fields: Vec<FieldSchema>,
    methods: Vec<AccessorMethod>,
    non_updatable: Vec<String>,
    zero: Option<ZeroConstructor>,
    supertype: Option<Box<TypeSchema>>,
    declarations: Declarations,
}

impl TypeSchema {
    pub fn builder<T: Any + Send + Sync>(type_name: impl Into<String>) -> TypeSchemaBuilder<T> {
        TypeSchemaBuilder {
            schema: TypeSchema {
                type_id: TypeId::of::<T>(),
                type_name: type_name.into(),
                entity_name: None,
                table_name: None,
                persistable: false,
                archivable: false,
                fields: Vec::new(),
                methods: Vec::new(),
                non_updatable: Vec::new(),
                zero: None,
                supertype: None,
                declarations: Declarations::default(),
            },
            _marker: PhantomData,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Declared entity name, else declared table name, else the type name.
    pub fn resolved_entity_name(&self) -> &str {
        self.entity_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .or_else(|| self.table_name.as_deref().filter(|name| !name.is_empty()))
            .unwrap_or(&self.type_name)
    }

    pub fn is_persistable(&self) -> bool {
        self.persistable
    }

    pub fn is_archivable(&self) -> bool {
        self.archivable
    }

    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }

    pub fn methods(&self) -> &[AccessorMethod] {
        &self.methods
    }

    pub fn non_updatable(&self) -> &[String] {
        &self.non_updatable
    }

    pub fn zero_constructor(&self) -> Option<&ZeroConstructor> {
        self.zero.as_ref()
    }

    pub fn supertype(&self) -> Option<&TypeSchema> {
        self.supertype.as_deref()
    }

    pub fn declarations(&self) -> &Declarations {
        &self.declarations
    }

    /// This schema followed by each supertype, most-derived first.
    pub fn hierarchy(&self) -> impl Iterator<Item = &TypeSchema> {
        std::iter::successors(Some(self), |schema| schema.supertype())
    }

    /// Re-targets every accessor of this schema (and its supertypes) from `P`
    /// to a containing record `C`, reaching `P` through the projections.
    fn lifted<C, P>(self, get: fn(&C) -> &P, get_mut: fn(&mut C) -> &mut P) -> TypeSchema
    where
        C: Any,
        P: Any,
    {
        let methods = self
            .methods
            .into_iter()
            .map(|method| match method {
                AccessorMethod::Getter { name, call } => {
                    let field = name.clone();
                    AccessorMethod::Getter {
                        name,
                        call: Arc::new(move |instance: &dyn Any| -> Result<Value> {
                            let outer = downcast_ref::<C>(instance, &field)?;
                            let inner: &dyn Any = get(outer);
                            call(inner)
                        }),
                    }
                }
                AccessorMethod::Setter { name, call } => {
                    let field = name.clone();
                    AccessorMethod::Setter {
                        name,
                        call: Arc::new(move |instance: &mut dyn Any, value: Value| -> Result<()> {
                            let outer = downcast_mut::<C>(instance, &field)?;
                            let inner: &mut dyn Any = get_mut(outer);
                            call(inner, value)
                        }),
                    }
                }
            })
            .collect();

        TypeSchema {
            methods,
            supertype: self
                .supertype
                .map(|parent| Box::new(parent.lifted::<C, P>(get, get_mut))),
            ..self
        }
    }
}

impl fmt::Debug for TypeSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeSchema")
            .field("type_name", &self.type_name)
            .field("entity_name", &self.resolved_entity_name())
            .field("persistable", &self.persistable)
            .field("archivable", &self.archivable)
            .field("fields", &self.fields)
            .field("methods", &self.methods)
            .field("has_zero", &self.zero.is_some())
            .field("supertype", &self.supertype)
            .finish()
    }
}

fn downcast_ref<'a, T: Any>(instance: &'a dyn Any, method: &str) -> Result<&'a T> {
    instance.downcast_ref::<T>().ok_or_else(|| DataError::Accessor {
        entity: std::any::type_name::<T>().to_string(),
        field: method.to_string(),
        reason: "instance has a different type".to_string(),
    })
}

fn downcast_mut<'a, T: Any>(instance: &'a mut dyn Any, method: &str) -> Result<&'a mut T> {
    instance.downcast_mut::<T>().ok_or_else(|| DataError::Accessor {
        entity: std::any::type_name::<T>().to_string(),
        field: method.to_string(),
        reason: "instance has a different type".to_string(),
    })
}

/// Builds a [`TypeSchema`] for `T`; the expansion target of `#[derive(Record)]`.
pub struct TypeSchemaBuilder<T> {
    schema: TypeSchema,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> TypeSchemaBuilder<T> {
    /// Mark the type as a persistable record.
    pub fn entity(mut self) -> Self {
        self.schema.persistable = true;
        self
    }

    pub fn entity_name(mut self, name: impl Into<String>) -> Self {
        self.schema.entity_name = Some(name.into());
        self.schema.persistable = true;
        self
    }

    pub fn table_name(mut self, name: impl Into<String>) -> Self {
        self.schema.table_name = Some(name.into());
        self.schema.persistable = true;
        self
    }

    pub fn archivable(mut self) -> Self {
        self.schema.archivable = true;
        self
    }

    /// Type-level list of fields generic updates must not overwrite.
    pub fn non_updatable<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.schema
            .non_updatable
            .extend(names.into_iter().map(Into::into));
        self
    }

    pub fn zero_with<F>(mut self, constructor: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.schema.zero = Some(Arc::new(move || {
            let instance: Box<dyn Any + Send + Sync> = Box::new(constructor());
            instance
        }));
        self
    }

    /// Installs `constructor` when present; otherwise leaves the type without one.
    pub fn zero_from(self, constructor: Option<fn() -> T>) -> Self {
        match constructor {
            Some(constructor) => self.zero_with(constructor),
            None => self,
        }
    }

    pub fn field(mut self, field: FieldSchema) -> Self {
        self.schema.fields.push(field);
        self
    }

    pub fn getter<F>(mut self, field: &str, get: fn(&T) -> &F) -> Self
    where
        F: FieldValue + 'static,
    {
        let name = getter_name(field);
        let method = name.clone();
        self.schema.methods.push(AccessorMethod::Getter {
            name,
            call: Arc::new(move |instance: &dyn Any| -> Result<Value> {
                let record = downcast_ref::<T>(instance, &method)?;
                Ok(get(record).to_value())
            }),
        });
        self
    }

    pub fn setter<F>(mut self, field: &str, get_mut: fn(&mut T) -> &mut F) -> Self
    where
        F: FieldValue + 'static,
    {
        let name = setter_name(field);
        let method = name.clone();
        self.schema.methods.push(AccessorMethod::Setter {
            name,
            call: Arc::new(move |instance: &mut dyn Any, value: Value| -> Result<()> {
                let record = downcast_mut::<T>(instance, &method)?;
                *get_mut(record) = F::from_value(value)?;
                Ok(())
            }),
        });
        self
    }

    /// Getter and setter for one field.
    pub fn accessors<F>(self, field: &str, get: fn(&T) -> &F, get_mut: fn(&mut T) -> &mut F) -> Self
    where
        F: FieldValue + 'static,
    {
        self.getter(field, get).setter(field, get_mut)
    }

    pub fn resolver(mut self, spec: QuerySpecification) -> Self {
        self.schema.declarations.resolvers.push(spec);
        self
    }

    pub fn lookup(mut self, field: &str, marker: LookupMarker) -> Self {
        let lookups = &mut self.schema.declarations.field_lookups;
        match lookups.iter_mut().find(|lookup| lookup.field == field) {
            Some(existing) => {
                if !existing.has(marker) {
                    existing.markers.push(marker);
                }
            }
            None => lookups.push(FieldLookupSpec::new(field).marker(marker)),
        }
        self
    }

    pub fn fuzzy_field(mut self, field: &str) -> Self {
        self.schema.declarations.fuzzy_fields.push(field.to_string());
        self
    }

    pub fn fuzzy_search_fields<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.schema
            .declarations
            .fuzzy_search_fields
            .extend(names.into_iter().map(Into::into));
        self
    }

    /// Composes the supertype `B`, embedded in `T` and reached through the
    /// given projections.
    pub fn base<B: Record>(mut self, get: fn(&T) -> &B, get_mut: fn(&mut T) -> &mut B) -> Self {
        self.schema.supertype = Some(Box::new(B::schema().lifted::<T, B>(get, get_mut)));
        self
    }

    pub fn build(self) -> TypeSchema {
        self.schema
    }
}
