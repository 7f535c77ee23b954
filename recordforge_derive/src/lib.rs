use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::meta::ParseNestedMeta;
use syn::punctuated::Punctuated;
use syn::{
    Data, DeriveInput, Fields, Ident, LitBool, LitStr, Token, Type, parse_macro_input,
    spanned::Spanned,
};

/// Derives `recordforge::metadata::Record` from `#[record(...)]` attributes.
///
/// Type level: `entity`, `name = ".."`, `table = ".."`, `archivable`,
/// `default`, `non_updatable(".."..)`, `fuzzy_search_fields(".."..)` and
/// repeatable `resolver(name = "..", kind = "..", where_clause = "..",
/// args(".."..), order_by = "..")`.
///
/// Without `default`, the zero constructor is `Default::default` when the
/// type implements `Default` and absent otherwise.
///
/// Field level: `id`, `embedded_id`, `version`, `non_updatable`,
/// `non_nullable`, `element_collection`, `column(unique, nullable = false)`,
/// `many_to_one(optional = false)`, `one_to_one(optional = false)`,
/// `find_by`, `find_all_by`, `find_by_unique`, `fuzzy_search`,
/// `archive_flag`, `base` and `skip`.
#[proc_macro_derive(Record, attributes(record))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_record(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand_record(input: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            input.generics,
            "Record does not support generic structs",
        ));
    }

    let options = parse_record_options(&input.attrs)?;

    let data_struct = match input.data {
        Data::Struct(data) => data,
        _ => {
            return Err(syn::Error::new(
                struct_name.span(),
                "Record can only be derived for structs",
            ));
        }
    };

    let named_fields = match data_struct.fields {
        Fields::Named(fields) => fields,
        _ => {
            return Err(syn::Error::new(
                struct_name.span(),
                "Record requires named fields",
            ));
        }
    };

    let mut field_calls = Vec::<TokenStream2>::new();
    let mut base_calls = Vec::<TokenStream2>::new();
    for field in named_fields.named {
        let ident = field
            .ident
            .clone()
            .ok_or_else(|| syn::Error::new(field.span(), "Record requires named fields"))?;
        let field_options = parse_field_options(&field.attrs)?;
        if field_options.skip {
            continue;
        }
        if field_options.base {
            if !base_calls.is_empty() {
                return Err(syn::Error::new(
                    ident.span(),
                    "Record supports a single #[record(base)] field",
                ));
            }
            base_calls.push(expand_base_field(&ident, &field.ty));
            continue;
        }
        field_calls.push(expand_field(&ident, &field.ty, &field_options));
    }

    let type_name = struct_name.to_string();
    let type_calls = expand_type_options(&options)?;

    Ok(quote! {
        impl ::recordforge::metadata::Record for #struct_name {
            fn schema() -> ::recordforge::metadata::TypeSchema {
                ::recordforge::metadata::TypeSchema::builder::<Self>(#type_name)
                    #(#type_calls)*
                    #(#field_calls)*
                    #(#base_calls)*
                    .build()
            }
        }
    })
}

fn expand_type_options(options: &RecordOptions) -> syn::Result<Vec<TokenStream2>> {
    let mut calls = Vec::new();

    if options.entity {
        calls.push(quote! { .entity() });
    }
    if let Some(name) = &options.name {
        calls.push(quote! { .entity_name(#name) });
    }
    if let Some(table) = &options.table {
        calls.push(quote! { .table_name(#table) });
    }
    if options.archivable {
        calls.push(quote! { .archivable() });
    }
    if options.default {
        calls.push(quote! { .zero_with(<Self as ::core::default::Default>::default) });
    } else {
        // resolves to `Some(Default::default)` only when `Self: Default`
        calls.push(quote! {
            .zero_from({
                use ::recordforge::__private::{ZeroUnavailable as _, ZeroViaDefault as _};
                (&::recordforge::__private::ZeroSource::<Self>::new()).zero_constructor()
            })
        });
    }
    if !options.non_updatable.is_empty() {
        let names = &options.non_updatable;
        calls.push(quote! { .non_updatable([#(#names),*]) });
    }
    if !options.fuzzy_search_fields.is_empty() {
        let names = &options.fuzzy_search_fields;
        calls.push(quote! { .fuzzy_search_fields([#(#names),*]) });
    }

    for resolver in &options.resolvers {
        let method_name = &resolver.name;
        let mut chain = vec![quote! {
            ::recordforge::query::QuerySpecification::new(#method_name)
        }];
        if let Some(kind) = &resolver.kind {
            let variant = format_ident!("{}", to_pascal_case(kind));
            chain.push(quote! { .kind(::recordforge::query::QueryKind::#variant) });
        }
        if let Some(template) = &resolver.where_clause {
            chain.push(quote! { .where_template(#template) });
        }
        if !resolver.args.is_empty() {
            let args = &resolver.args;
            chain.push(quote! { .args([#(#args),*]) });
        }
        if let Some(order_by) = &resolver.order_by {
            chain.push(quote! { .order_by(#order_by) });
        }
        calls.push(quote! { .resolver(#(#chain)*) });
    }

    Ok(calls)
}

fn expand_field(ident: &Ident, ty: &Type, options: &FieldOptions) -> TokenStream2 {
    let name = ident.to_string();
    let mut markers = Vec::<TokenStream2>::new();

    if options.id {
        markers.push(quote! { .identity() });
    }
    if options.embedded_id {
        markers.push(quote! { .embedded_id() });
    }
    if options.version {
        markers.push(quote! { .version() });
    }
    if options.non_updatable {
        markers.push(quote! { .non_updatable() });
    }
    if options.non_nullable {
        markers.push(quote! { .non_nullable() });
    }
    if options.element_collection {
        markers.push(quote! { .element_collection() });
    }
    if options.archive_flag {
        markers.push(quote! { .archive_flag() });
    }
    if let Some(column) = &options.column {
        let nullable = column.nullable;
        let unique = column.unique;
        markers.push(quote! { .column(#nullable, #unique) });
    }
    if let Some(relation) = &options.relation {
        let kind = format_ident!("{}", relation.kind);
        let optional = relation.optional;
        markers.push(quote! {
            .relation(::recordforge::metadata::RelationKind::#kind, #optional)
        });
    }

    let mut lookups = Vec::<TokenStream2>::new();
    for (enabled, marker) in [
        (options.find_by, "FindBy"),
        (options.find_all_by, "FindAllBy"),
        (options.find_by_unique, "FindByUnique"),
    ] {
        if enabled {
            let marker = format_ident!("{}", marker);
            lookups.push(quote! {
                .lookup(#name, ::recordforge::query::LookupMarker::#marker)
            });
        }
    }
    if options.fuzzy_search {
        lookups.push(quote! { .fuzzy_field(#name) });
    }

    quote! {
        .field(::recordforge::metadata::FieldSchema::of::<#ty>(#name) #(#markers)*)
        .accessors::<#ty>(#name, |record| &record.#ident, |record| &mut record.#ident)
        #(#lookups)*
    }
}

fn expand_base_field(ident: &Ident, ty: &Type) -> TokenStream2 {
    quote! {
        .base::<#ty>(|record| &record.#ident, |record| &mut record.#ident)
    }
}

#[derive(Default)]
struct RecordOptions {
    entity: bool,
    name: Option<String>,
    table: Option<String>,
    archivable: bool,
    default: bool,
    non_updatable: Vec<String>,
    fuzzy_search_fields: Vec<String>,
    resolvers: Vec<ResolverOptions>,
}

struct ResolverOptions {
    name: String,
    kind: Option<String>,
    where_clause: Option<String>,
    args: Vec<String>,
    order_by: Option<String>,
}

#[derive(Default)]
struct FieldOptions {
    id: bool,
    embedded_id: bool,
    version: bool,
    non_updatable: bool,
    non_nullable: bool,
    element_collection: bool,
    column: Option<ColumnOptions>,
    relation: Option<RelationOptions>,
    find_by: bool,
    find_all_by: bool,
    find_by_unique: bool,
    fuzzy_search: bool,
    archive_flag: bool,
    base: bool,
    skip: bool,
}

impl FieldOptions {
    fn has_markers(&self) -> bool {
        self.id
            || self.embedded_id
            || self.version
            || self.non_updatable
            || self.non_nullable
            || self.element_collection
            || self.column.is_some()
            || self.relation.is_some()
            || self.find_by
            || self.find_all_by
            || self.find_by_unique
            || self.fuzzy_search
            || self.archive_flag
    }
}

struct ColumnOptions {
    nullable: bool,
    unique: bool,
}

struct RelationOptions {
    kind: &'static str,
    optional: bool,
}

const QUERY_KINDS: &[&str] = &[
    "select_by", "count", "avg", "max", "min", "sum", "update", "delete",
];

fn to_pascal_case(value: &str) -> String {
    let mut out = String::new();
    for chunk in value.split('_').filter(|part| !part.is_empty()) {
        let mut chars = chunk.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    if out.is_empty() {
        value.to_string()
    } else {
        out
    }
}

fn path_ends_with_ident(path: &syn::Path, ident: &str) -> bool {
    path.segments
        .last()
        .map(|segment| segment.ident == ident)
        .unwrap_or(false)
}

fn parse_string_list(meta: &ParseNestedMeta) -> syn::Result<Vec<String>> {
    let content;
    syn::parenthesized!(content in meta.input);
    let lits = Punctuated::<LitStr, Token![,]>::parse_terminated(&content)?;
    Ok(lits.iter().map(LitStr::value).collect())
}

fn parse_string_value(meta: &ParseNestedMeta) -> syn::Result<String> {
    let value = meta.value()?;
    let lit: LitStr = value.parse()?;
    Ok(lit.value())
}

fn parse_bool_value(meta: &ParseNestedMeta) -> syn::Result<bool> {
    let value = meta.value()?;
    let lit: LitBool = value.parse()?;
    Ok(lit.value)
}

fn parse_record_options(attrs: &[syn::Attribute]) -> syn::Result<RecordOptions> {
    let mut options = RecordOptions::default();

    for attr in attrs {
        if !attr.path().is_ident("record") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("entity") {
                options.entity = true;
                return Ok(());
            }

            if meta.path.is_ident("archivable") {
                options.archivable = true;
                return Ok(());
            }

            if meta.path.is_ident("default") {
                options.default = true;
                return Ok(());
            }

            if meta.path.is_ident("name") {
                options.name = Some(parse_string_value(&meta)?);
                return Ok(());
            }

            if meta.path.is_ident("table") {
                options.table = Some(parse_string_value(&meta)?);
                return Ok(());
            }

            if meta.path.is_ident("non_updatable") {
                options.non_updatable.extend(parse_string_list(&meta)?);
                return Ok(());
            }

            if meta.path.is_ident("fuzzy_search_fields") {
                options.fuzzy_search_fields.extend(parse_string_list(&meta)?);
                return Ok(());
            }

            if meta.path.is_ident("resolver") {
                options.resolvers.push(parse_resolver(&meta)?);
                return Ok(());
            }

            Err(meta.error(
                "Unsupported #[record(...)] type option. Supported: entity, name = \"...\", table = \"...\", archivable, default, non_updatable(...), fuzzy_search_fields(...), resolver(...)",
            ))
        })?;
    }

    Ok(options)
}

fn parse_resolver(meta: &ParseNestedMeta) -> syn::Result<ResolverOptions> {
    let mut name = None;
    let mut kind = None;
    let mut where_clause = None;
    let mut args = Vec::new();
    let mut order_by = None;

    meta.parse_nested_meta(|inner| {
        if inner.path.is_ident("name") {
            name = Some(parse_string_value(&inner)?);
            return Ok(());
        }

        if inner.path.is_ident("kind") {
            let value = parse_string_value(&inner)?;
            if !QUERY_KINDS.contains(&value.as_str()) {
                return Err(inner.error(format!(
                    "Unknown query kind \"{}\". Supported: {}",
                    value,
                    QUERY_KINDS.join(", ")
                )));
            }
            kind = Some(value);
            return Ok(());
        }

        if inner.path.is_ident("where_clause") {
            where_clause = Some(parse_string_value(&inner)?);
            return Ok(());
        }

        if inner.path.is_ident("args") {
            args.extend(parse_string_list(&inner)?);
            return Ok(());
        }

        if inner.path.is_ident("order_by") {
            order_by = Some(parse_string_value(&inner)?);
            return Ok(());
        }

        Err(inner.error(
            "Unsupported resolver option. Supported: name = \"...\", kind = \"...\", where_clause = \"...\", args(...), order_by = \"...\"",
        ))
    })?;

    let name = name.ok_or_else(|| meta.error("resolver requires name = \"...\""))?;
    Ok(ResolverOptions {
        name,
        kind,
        where_clause,
        args,
        order_by,
    })
}

fn parse_field_options(attrs: &[syn::Attribute]) -> syn::Result<FieldOptions> {
    let mut options = FieldOptions::default();

    for attr in attrs {
        if !path_ends_with_ident(attr.path(), "record") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            let flag = if meta.path.is_ident("id") {
                &mut options.id
            } else if meta.path.is_ident("embedded_id") {
                &mut options.embedded_id
            } else if meta.path.is_ident("version") {
                &mut options.version
            } else if meta.path.is_ident("non_updatable") {
                &mut options.non_updatable
            } else if meta.path.is_ident("non_nullable") {
                &mut options.non_nullable
            } else if meta.path.is_ident("element_collection") {
                &mut options.element_collection
            } else if meta.path.is_ident("find_by") {
                &mut options.find_by
            } else if meta.path.is_ident("find_all_by") {
                &mut options.find_all_by
            } else if meta.path.is_ident("find_by_unique") {
                &mut options.find_by_unique
            } else if meta.path.is_ident("fuzzy_search") {
                &mut options.fuzzy_search
            } else if meta.path.is_ident("archive_flag") {
                &mut options.archive_flag
            } else if meta.path.is_ident("base") {
                &mut options.base
            } else if meta.path.is_ident("skip") {
                &mut options.skip
            } else if meta.path.is_ident("column") {
                options.column = Some(parse_column(&meta)?);
                return Ok(());
            } else if meta.path.is_ident("many_to_one") {
                options.relation = Some(parse_relation(&meta, "ManyToOne")?);
                return Ok(());
            } else if meta.path.is_ident("one_to_one") {
                options.relation = Some(parse_relation(&meta, "OneToOne")?);
                return Ok(());
            } else {
                return Err(meta.error(
                    "Unsupported #[record(...)] field option. Supported: id, embedded_id, version, non_updatable, non_nullable, element_collection, column(...), many_to_one(...), one_to_one(...), find_by, find_all_by, find_by_unique, fuzzy_search, archive_flag, base, skip",
                ));
            };
            *flag = true;
            Ok(())
        })?;

        if (options.base || options.skip) && options.has_markers() {
            return Err(syn::Error::new(
                attr.span(),
                "#[record(base)] and #[record(skip)] cannot be combined with field markers",
            ));
        }
        if options.base && options.skip {
            return Err(syn::Error::new(
                attr.span(),
                "#[record(base)] cannot be combined with #[record(skip)]",
            ));
        }
    }

    Ok(options)
}

fn parse_column(meta: &ParseNestedMeta) -> syn::Result<ColumnOptions> {
    let mut column = ColumnOptions {
        nullable: true,
        unique: false,
    };
    if !meta.input.peek(syn::token::Paren) {
        return Ok(column);
    }

    meta.parse_nested_meta(|inner| {
        if inner.path.is_ident("unique") {
            column.unique = if inner.input.peek(Token![=]) {
                parse_bool_value(&inner)?
            } else {
                true
            };
            return Ok(());
        }

        if inner.path.is_ident("nullable") {
            column.nullable = parse_bool_value(&inner)?;
            return Ok(());
        }

        Err(inner.error("Unsupported column option. Supported: unique, nullable = <bool>"))
    })?;
    Ok(column)
}

fn parse_relation(meta: &ParseNestedMeta, kind: &'static str) -> syn::Result<RelationOptions> {
    let mut relation = RelationOptions {
        kind,
        optional: true,
    };
    if !meta.input.peek(syn::token::Paren) {
        return Ok(relation);
    }

    meta.parse_nested_meta(|inner| {
        if inner.path.is_ident("optional") {
            relation.optional = parse_bool_value(&inner)?;
            return Ok(());
        }

        Err(inner.error("Unsupported relation option. Supported: optional = <bool>"))
    })?;
    Ok(relation)
}
