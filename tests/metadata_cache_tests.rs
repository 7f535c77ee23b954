use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;

use recordforge::prelude::*;
use recordforge::{FieldValue, SpecificationError};

#[derive(Record, Debug, Clone, Default)]
#[record(non_updatable("owner"))]
struct Audited {
    #[record(id)]
    id: i64,
    #[record(version)]
    version: i64,
    owner: String,
}

#[derive(Record, Debug, Clone, Default)]
#[record(entity, name = "Customer", archivable)]
struct CustomerRecord {
    #[record(base)]
    audit: Audited,
    #[record(column(nullable = false))]
    email: String,
    #[record(non_nullable)]
    name: String,
    nickname: Option<String>,
    #[record(many_to_one(optional = false))]
    region_id: i64,
    #[record(one_to_one)]
    profile_id: Option<i64>,
    #[record(element_collection)]
    phones: Vec<String>,
    attributes: BTreeMap<String, String>,
    #[record(non_updatable)]
    signup_source: String,
    is_archived: bool,
    #[record(skip)]
    scratch: Vec<u8>,
}

#[derive(Record, Debug, Clone, Default)]
#[record(entity)]
struct Invoice {
    #[record(embedded_id)]
    number: String,
    total: f64,
}

#[derive(Record, Debug, Clone)]
#[record(entity)]
struct NoZero {
    #[record(id)]
    id: i64,
}

#[derive(Record, Debug, Clone, Default)]
#[record(entity)]
struct NoIdentity {
    label: String,
}

fn cache() -> EntityMetadataCache {
    EntityMetadataCache::build(
        DataLayerConfig::default(),
        vec![Audited::schema(), CustomerRecord::schema(), Invoice::schema()],
    )
    .unwrap()
}

#[test]
fn test_only_entities_are_cached() {
    let cache = cache();
    assert_eq!(cache.len(), 2);
    let names: Vec<&str> = cache.all_entities().map(|d| d.type_name()).collect();
    assert_eq!(names, vec!["CustomerRecord", "Invoice"]);
    assert!(matches!(cache.get("Audited"), Err(DataError::UnknownEntity(_))));
}

#[test]
fn test_field_classification() {
    let cache = cache();
    let customer = cache.get("CustomerRecord").unwrap();

    let email = customer.field("email").unwrap();
    assert!(email.is_non_nullable);
    assert!(!email.is_non_updatable);

    assert!(customer.field("name").unwrap().is_non_nullable);
    assert!(!customer.field("nickname").unwrap().is_non_nullable);
    assert!(customer.field("region_id").unwrap().is_non_nullable);
    assert!(!customer.field("profile_id").unwrap().is_non_nullable);

    let phones = customer.field("phones").unwrap();
    assert!(phones.is_collection_or_map);
    assert!(phones.is_non_updatable);
    assert!(customer.field("attributes").unwrap().is_collection_or_map);

    assert!(customer.field("signup_source").unwrap().is_non_updatable);
    assert!(customer.field("owner").unwrap().is_non_updatable);
    assert!(customer.field("version").unwrap().is_version);
    assert!(customer.field("scratch").is_none());

    assert_eq!(customer.identity_field().name, "id");
    assert_eq!(customer.identity_field().type_ref, i64::type_ref());
    assert_eq!(customer.entity_name(), "Customer");
    assert_eq!(customer.alias(), "c");
    assert_eq!(customer.archive_flag(), Some("is_archived"));
}

#[test]
fn test_cascade_updatable_never_contains_identity_or_collections() {
    let cache = cache();
    for descriptor in cache.all_entities() {
        let identity = &descriptor.identity_field().name;
        for name in descriptor.cascade_updatable_fields() {
            let field = descriptor.field(name).unwrap();
            assert_ne!(name, identity);
            assert!(!field.is_collection_or_map);
            assert!(!field.is_non_updatable);
        }
    }

    let customer = cache.get("CustomerRecord").unwrap();
    assert_eq!(
        customer.cascade_updatable_fields(),
        &[
            "email".to_string(),
            "name".to_string(),
            "nickname".to_string(),
            "region_id".to_string(),
            "profile_id".to_string(),
            "is_archived".to_string(),
        ]
    );
}

#[test]
fn test_embedded_identity() {
    let cache = cache();
    let invoice = cache.descriptor_of::<Invoice>().unwrap();
    assert_eq!(invoice.identity_field().name, "number");
    assert_eq!(invoice.cascade_updatable_fields(), &["total".to_string()]);

    let record = Invoice {
        number: "INV-7".into(),
        total: 12.5,
    };
    assert_eq!(invoice.identity_of(&record).unwrap(), Value::from("INV-7"));
}

#[test]
fn test_protected_archive_flag_policy() {
    let cache = EntityMetadataCache::build(
        DataLayerConfig::default().protect_archive_flag(true),
        vec![CustomerRecord::schema()],
    )
    .unwrap();
    let customer = cache.get("CustomerRecord").unwrap();
    assert!(customer.field("is_archived").unwrap().is_non_updatable);
    assert!(
        !customer
            .cascade_updatable_fields()
            .contains(&"is_archived".to_string())
    );
}

#[test]
fn test_rebuilding_is_identical() {
    let first = cache();
    let second = cache();
    for (a, b) in first.all_entities().zip(second.all_entities()) {
        assert_eq!(a.fields(), b.fields());
        assert_eq!(a.cascade_updatable_fields(), b.cascade_updatable_fields());
        assert_eq!(a.identity_field(), b.identity_field());
    }
}

#[test]
fn test_most_derived_field_wins_name_collision() {
    #[derive(Record, Debug, Clone, Default)]
    #[record(entity)]
    struct Reowned {
        #[record(base)]
        audit: Audited,
        owner: Option<String>,
    }

    let cache =
        EntityMetadataCache::build(DataLayerConfig::default(), vec![Reowned::schema()]).unwrap();
    let reowned = cache.descriptor_of::<Reowned>().unwrap();
    assert_eq!(reowned.fields().iter().filter(|f| f.name == "owner").count(), 1);
    assert_eq!(reowned.field("owner").unwrap().type_ref, Option::<String>::type_ref());

    let mut record = Reowned::default();
    reowned
        .invoke_setter(&mut record, "owner", Value::from("derived"))
        .unwrap();
    assert_eq!(record.owner.as_deref(), Some("derived"));
    assert!(record.audit.owner.is_empty());
}

#[test]
fn test_build_failures_are_fatal() {
    let err = EntityMetadataCache::build(
        DataLayerConfig::default(),
        vec![Invoice::schema(), NoZero::schema()],
    )
    .unwrap_err();
    assert!(matches!(err, DataError::NoDefaultConstructor(name) if name == "NoZero"));

    let err = EntityMetadataCache::build(DataLayerConfig::default(), vec![NoIdentity::schema()])
        .unwrap_err();
    assert!(matches!(err, DataError::MissingIdentityField(name) if name == "NoIdentity"));
}

#[test]
fn test_accessors_round_trip_through_base() {
    let cache = cache();
    let customer = cache.get("CustomerRecord").unwrap();
    let mut record = CustomerRecord::default();

    customer
        .invoke_setter(&mut record, "owner", Value::from("ops"))
        .unwrap();
    customer
        .invoke_setter(&mut record, "nickname", Value::from("kit"))
        .unwrap();
    assert_eq!(record.audit.owner, "ops");
    assert_eq!(record.nickname.as_deref(), Some("kit"));
    assert_eq!(
        customer.invoke_getter(&record, "nickname").unwrap(),
        Value::from("kit")
    );

    customer
        .invoke_setter(&mut record, "nickname", Value::Null)
        .unwrap();
    assert!(record.nickname.is_none());
}

#[test]
fn test_shared_cache_is_built_once() {
    static SHARED: SharedMetadataCache = SharedMetadataCache::new();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            thread::spawn(|| {
                SHARED
                    .get_or_init(DataLayerConfig::default(), || {
                        vec![CustomerRecord::schema(), Invoice::schema()]
                    })
                    .unwrap()
            })
        })
        .collect();
    let caches: Vec<Arc<EntityMetadataCache>> =
        handles.into_iter().map(|h| h.join().unwrap()).collect();

    for cache in &caches {
        assert!(Arc::ptr_eq(cache, &caches[0]));
    }
    assert_eq!(caches[0].len(), 2);
}

#[test]
fn test_invalid_archive_flag_is_a_specification_error() {
    #[derive(Record, Debug, Clone, Default)]
    #[record(entity, archivable)]
    struct Misflagged {
        #[record(id)]
        id: i64,
        #[record(archive_flag)]
        archived_on: String,
    }

    let err =
        EntityMetadataCache::build(DataLayerConfig::default(), vec![Misflagged::schema()])
            .unwrap_err();
    assert!(matches!(
        err,
        DataError::Specification(SpecificationError::Invalid { .. })
    ));
}
