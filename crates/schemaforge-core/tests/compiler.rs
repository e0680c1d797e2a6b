//! End-to-end reload passes over in-memory and sled-backed stores.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use schemaforge_core::catalog::PropertyType;
use schemaforge_core::emitter::PropertyKind;
use schemaforge_core::grants::GrantStore;
use schemaforge_core::{
    CompilerConfig, DynamicObject, GrantSynchronizer, LifecycleState, MemoryGrantStore,
    MemoryStore, Multiplicity, PropertyDef, RelationshipDef, ReloadWorker, SchemaChange,
    SchemaCompiler, SchemaExtension, SchemaStore, SledGrantStore, SnapshotArchive, TypeDef,
    TypeDescriptor,
};

fn shop_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.put_type(TypeDef::new("Customer")).unwrap();
    store.put_type(TypeDef::new("Order")).unwrap();
    store
        .put_property(
            PropertyDef::typed("email", PropertyType::String)
                .owned_by("Customer")
                .not_null(),
        )
        .unwrap();
    store
        .put_relationship(RelationshipDef::one_to_many("Customer", "OWNS", "Order"))
        .unwrap();
    store
}

fn with_grants(store: Arc<MemoryStore>) -> SchemaCompiler {
    SchemaCompiler::builder(store)
        .grants(GrantSynchronizer::new(Arc::new(MemoryGrantStore::new())))
        .build()
}

fn relationship(descriptor: &TypeDescriptor, name: &str) -> (Multiplicity, String) {
    match &descriptor.property(name).unwrap().kind {
        PropertyKind::Relationship {
            multiplicity,
            related_type,
            ..
        } => (*multiplicity, related_type.clone()),
        other => panic!("{name} is not a relationship: {other:?}"),
    }
}

#[test]
fn test_customer_owns_orders() {
    let compiler = with_grants(shop_store());
    let report = compiler.reload().unwrap();
    assert!(report.is_clean(), "{:?}", report.diagnostics);
    assert_eq!(compiler.state(), LifecycleState::Active);

    let generation = compiler.descriptors().unwrap().current();
    let customer = &generation.get("Customer").unwrap().descriptor;
    let order = &generation.get("Order").unwrap().descriptor;

    assert_eq!(
        relationship(customer, "orders"),
        (Multiplicity::Many, "Order".to_string())
    );
    assert_eq!(
        relationship(order, "customer"),
        (Multiplicity::One, "Customer".to_string())
    );

    let custom = customer.view("custom").unwrap();
    assert!(custom.members.contains(&"email".to_string()));
    assert!(custom.members.contains(&"orders".to_string()));

    let missing_email = DynamicObject::new("Customer", "c1");
    let failures = generation.validate(&missing_email, &[]).unwrap();
    assert!(failures.iter().any(|f| f.property == "email" && f.rule == "not_null"));

    let complete = missing_email.with("email", "ada@example.com");
    assert!(generation.validate(&complete, &[]).unwrap().is_empty());
}

#[test]
fn test_units_are_fingerprinted() {
    let store = shop_store();
    let compiler = SchemaCompiler::new(store.clone());
    let first = compiler.reload().unwrap();
    let second = compiler.reload().unwrap();

    let fingerprint = |r: &schemaforge_core::PassReport| r.unit("Customer").unwrap().fingerprint.clone();
    assert_eq!(fingerprint(&first), fingerprint(&second));

    store
        .put_property(PropertyDef::typed("name", PropertyType::String).owned_by("Customer"))
        .unwrap();
    let third = compiler.reload().unwrap();
    assert_ne!(fingerprint(&first), fingerprint(&third));
    assert_eq!(
        first.unit("Order").unwrap().fingerprint,
        third.unit("Order").unwrap().fingerprint
    );
}

#[test]
fn test_deleting_type_removes_its_grants() {
    let compiler = with_grants(shop_store());
    compiler.reload().unwrap();

    let grants = compiler.grants().unwrap().store().clone();
    for signature in ["Order", "_schema/Order", "Order/_Ui"] {
        assert!(grants.get(signature).unwrap().is_some(), "{signature}");
    }

    let report = compiler.delete_type("Order").unwrap().unwrap();
    assert!(report.unit("Order").is_none());
    assert!(report.unit("Customer").unwrap().descriptor.property("orders").is_none());

    // The type's own companions plus those of the relationship that went
    // with it.
    let mut removed = report.grants.removed.clone();
    removed.sort();
    assert_eq!(
        removed,
        vec![
            "Customer/_Orders",
            "Customer/_Orders/_Ui",
            "Order",
            "Order/_Customer",
            "Order/_Customer/_Ui",
            "Order/_Ui",
            "_schema/Customer/_Orders",
            "_schema/Order",
            "_schema/Order/_Customer",
        ]
    );

    let mut remaining: Vec<String> = grants.list().unwrap().into_iter().map(|g| g.signature).collect();
    remaining.sort();
    assert_eq!(remaining, vec!["Customer", "Customer/_Ui", "_schema/Customer"]);
    assert!(compiler.delete_type("Order").is_err());
}

#[test]
fn test_deleting_unrelated_type_removes_exactly_its_companions() {
    let store = shop_store();
    store.put_type(TypeDef::new("Coupon")).unwrap();
    let compiler = with_grants(store);
    compiler.reload().unwrap();

    let report = compiler.delete_type("Coupon").unwrap().unwrap();
    let mut removed = report.grants.removed.clone();
    removed.sort();
    assert_eq!(removed, vec!["Coupon", "Coupon/_Ui", "_schema/Coupon"]);
    assert!(report.grants.created.is_empty());

    let grants = compiler.grants().unwrap().store();
    assert_eq!(grants.list().unwrap().len(), 12);
}

#[test]
fn test_legacy_keys_migrate_once() {
    let store = Arc::new(MemoryStore::new());
    store
        .put_type(
            TypeDef::new("Customer")
                .with_legacy("_email", "+String!")
                .with_legacy("__public", "_emailProperty"),
        )
        .unwrap();

    let compiler = SchemaCompiler::new(store.clone());
    let first = compiler.reload().unwrap();
    assert_eq!(first.migration.migrated.len(), 2);

    let customer = &first.unit("Customer").unwrap().descriptor;
    assert!(customer.property("email").unwrap().not_null);
    assert_eq!(customer.view("public").unwrap().members, vec!["email"]);

    let second = compiler.reload().unwrap();
    assert!(second.migration.is_noop());
    assert_eq!(store.snapshot().unwrap().properties_of("Customer").len(), 1);
    assert_eq!(
        first.unit("Customer").unwrap().fingerprint,
        second.unit("Customer").unwrap().fingerprint
    );
}

#[test]
fn test_reserved_names_after_initialization() {
    let compiler = SchemaCompiler::builder(shop_store())
        .config(CompilerConfig::default().reserve("Session"))
        .build();

    // Nothing is protected until a generation is active.
    compiler.create_type(TypeDef::new("Session")).unwrap();
    assert!(compiler.create_type(TypeDef::new("Relation")).is_err());

    compiler.delete_type("Session").unwrap();
    assert!(compiler.create_type(TypeDef::new("Session")).is_err());

    let permissive = SchemaCompiler::builder(shop_store())
        .config(CompilerConfig::default().allow_type_override(true).reserve("Session"))
        .build();
    permissive.reload().unwrap();
    assert!(permissive.create_type(TypeDef::new("Session")).is_ok());
}

#[test]
fn test_strict_activation_keeps_previous_generation() {
    struct Tagging;

    impl SchemaExtension for Tagging {
        fn name(&self) -> &str {
            "tagging"
        }

        fn contribute_source(&self, descriptor: &TypeDescriptor) -> Option<String> {
            (descriptor.name == "Customer").then(|| "// tagged".to_string())
        }
    }

    let store = shop_store();
    let compiler = SchemaCompiler::builder(store.clone())
        .config(CompilerConfig::strict())
        .extension(Arc::new(Tagging))
        .build();

    let report = compiler.reload().unwrap();
    let generation = report.generation.unwrap();
    let customer = report.unit("Customer").unwrap();
    assert_eq!(customer.descriptor.extension_source, vec!["// tagged"]);
    assert!(customer.source.contains("// tagged"));

    store.put_type(TypeDef::new("Broken")).unwrap();
    store
        .put_property(PropertyDef::new("bad", "NoSuchTag").owned_by("Broken"))
        .unwrap();
    let report = compiler.reload().unwrap();
    assert_eq!(report.excluded, vec!["Broken"]);
    assert!(report.generation.unwrap() > generation);
}

#[test]
fn test_burst_of_changes_coalesces() {
    let store = shop_store();
    let compiler = Arc::new(
        SchemaCompiler::builder(store.clone())
            .config(CompilerConfig::default().reload_poll_interval(Duration::from_millis(5)))
            .build(),
    );
    for name in ["Invoice", "Payment", "Refund"] {
        store.put_type(TypeDef::new(name)).unwrap();
        assert!(compiler.request_for(&[SchemaChange::Type(name.to_string())]));
    }
    let worker = ReloadWorker::start(compiler.clone());

    let deadline = Instant::now() + Duration::from_secs(5);
    while compiler.passes_run() == 0 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    worker.stop();

    assert_eq!(compiler.passes_run(), 1);
    let generation = compiler.descriptors().unwrap().current();
    let names: HashSet<&str> = generation.type_names().collect();
    assert!(names.contains("Refund"));
    assert_eq!(names.len(), 5);
}

#[test]
fn test_sled_backed_grants_and_archive() {
    let dir = tempfile::tempdir().unwrap();

    {
        let db = sled::open(dir.path()).unwrap();
        let compiler = SchemaCompiler::builder(shop_store())
            .grants(GrantSynchronizer::new(Arc::new(SledGrantStore::open(&db).unwrap())))
            .archive(SnapshotArchive::open(&db).unwrap())
            .build();
        compiler.reload().unwrap();
        compiler.archive().unwrap().flush().unwrap();
        db.flush().unwrap();
    }

    let db = sled::open(dir.path()).unwrap();
    let grants = SledGrantStore::open(&db).unwrap();
    assert!(grants.get("_schema/Customer").unwrap().unwrap().dynamic);

    let archive = SnapshotArchive::open(&db).unwrap();
    assert_eq!(archive.current_generation(), 1);
    let archived = archive.current().unwrap();
    assert!(archived.get_type("Order").is_some());
    assert_eq!(archived.relationships.len(), 1);
    assert_eq!(archive.generations().unwrap(), vec![1]);
}
