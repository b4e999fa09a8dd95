//! End-to-end lifecycle tests: bootstrap, schema, writes, time travel,
//! entity navigation, and a durable flush read back through the merged
//! index.

use datalith::schema::{
    CARDINALITY_MANY, CARDINALITY_ONE, TYPE_LONG, TYPE_REF, TYPE_STRING, TYPE_UUID,
    UNIQUE_IDENTITY,
};
use datalith::{
    BincodeBlockCodec, Datom, Db, EntitySpec, Error, IndexKind, Keyword, MemoryContentStore,
    MemoryIndex, MergedIndex, NodeCache, Partition, SegmentConfig, SegmentedIndex, TxOp, Value,
};
use std::sync::{Arc, Once};
use uuid::Uuid;

static TRACING: Once = Once::new();

fn tempid(n: i64) -> i64 {
    Partition::User.tempid(n)
}

/// Bootstrap plus a small user schema
fn fixture() -> Db {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
    let db = Db::bootstrap().unwrap();
    let name = Partition::Db.tempid(1);
    let email = Partition::Db.tempid(2);
    let age = Partition::Db.tempid(3);
    let friend = Partition::Db.tempid(4);
    let external = Partition::Db.tempid(5);
    db.transact(vec![
        TxOp::add(name, "db/ident", Keyword::new("user/name")),
        TxOp::add(name, "db/valueType", Value::Ref(TYPE_STRING)),
        TxOp::add(name, "db/cardinality", Value::Ref(CARDINALITY_ONE)),
        TxOp::add(email, "db/ident", Keyword::new("user/email")),
        TxOp::add(email, "db/valueType", Value::Ref(TYPE_STRING)),
        TxOp::add(email, "db/cardinality", Value::Ref(CARDINALITY_ONE)),
        TxOp::add(email, "db/unique", Value::Ref(UNIQUE_IDENTITY)),
        TxOp::add(age, "db/ident", Keyword::new("user/age")),
        TxOp::add(age, "db/valueType", Value::Ref(TYPE_LONG)),
        TxOp::add(age, "db/cardinality", Value::Ref(CARDINALITY_ONE)),
        TxOp::add(friend, "db/ident", Keyword::new("user/friend")),
        TxOp::add(friend, "db/valueType", Value::Ref(TYPE_REF)),
        TxOp::add(friend, "db/cardinality", Value::Ref(CARDINALITY_MANY)),
        TxOp::add(external, "db/ident", Keyword::new("user/external-id")),
        TxOp::add(external, "db/valueType", Value::Ref(TYPE_UUID)),
        TxOp::add(external, "db/cardinality", Value::Ref(CARDINALITY_ONE)),
    ])
    .unwrap()
    .db_after
}

#[test]
fn bootstrap_then_query_builtins() {
    let db = Db::bootstrap().unwrap();
    assert_eq!(db.basis_t(), 0);

    // Built-in idents resolve through AVET out of the box
    let ident = db.resolve(&EntitySpec::from("db/ident")).unwrap();
    let attr = db.attribute(ident).unwrap();
    assert_eq!(attr.ident, Keyword::new("db/ident"));
}

#[test]
fn full_write_read_cycle() {
    let db = fixture();
    let report = db
        .transact(vec![
            TxOp::add(tempid(1), "user/name", "Jane"),
            TxOp::add(tempid(1), "user/age", 7i64),
            TxOp::add(tempid(1), "user/external-id", Uuid::new_v4()),
            TxOp::add(tempid(2), "user/name", "Alice"),
            TxOp::add(tempid(1), "user/friend", Value::Ref(tempid(2))),
        ])
        .unwrap();
    let jane = report.tempids[&tempid(1)];

    let entity = report.db_after.entity(jane);
    assert_eq!(
        entity.get(&Keyword::new("user/name")).unwrap().unwrap().as_value(),
        Some(&Value::String("Jane".into()))
    );
    let friends = entity.get(&Keyword::new("user/friend")).unwrap().unwrap();
    let alice_view = friends.as_many().unwrap()[0].as_entity().unwrap().clone();
    assert_eq!(
        alice_view
            .get(&Keyword::new("user/name"))
            .unwrap()
            .unwrap()
            .as_value(),
        Some(&Value::String("Alice".into()))
    );
}

#[test]
fn upsert_by_email_then_time_travel() {
    let db = fixture();
    let t1 = db
        .transact(vec![
            TxOp::add(tempid(1), "user/email", "jane@x.com"),
            TxOp::add(tempid(1), "user/name", "Jane"),
        ])
        .unwrap();
    let jane = t1.tempids[&tempid(1)];
    let t1_basis = t1.db_after.basis_t();

    // Upsert through the unique email; rename in the same batch
    let t2 = t1
        .db_after
        .transact(vec![
            TxOp::add(tempid(7), "user/email", "jane@x.com"),
            TxOp::add(tempid(7), "user/name", "Jane Lane"),
        ])
        .unwrap();
    assert_eq!(t2.tempids[&tempid(7)], jane);

    let name_attr = db.resolve(&"user/name".into()).unwrap();
    let now = t2.db_after.entity(jane);
    assert_eq!(
        now.get(&Keyword::new("user/name")).unwrap().unwrap().as_value(),
        Some(&Value::String("Jane Lane".into()))
    );

    // as_of rewinds to the first spelling
    let then = t2.db_after.as_of(t1_basis);
    assert_eq!(
        then.entity(jane)
            .get(&Keyword::new("user/name"))
            .unwrap()
            .unwrap()
            .as_value(),
        Some(&Value::String("Jane".into()))
    );

    // history exposes the auto-retraction
    let history: Vec<Datom> = t2
        .db_after
        .history()
        .datoms_range(
            IndexKind::Eavt,
            &Datom::ea_low(jane, name_attr),
            &Datom::ea_high(jane, name_attr),
        )
        .unwrap()
        .collect();
    assert_eq!(history.len(), 3);
    assert_eq!(history.iter().filter(|d| !d.added).count(), 1);

    // since sees only the second transaction's surviving facts
    let recent = t2.db_after.since(t2.db_after.basis_t());
    let recent_names: Vec<Datom> = recent
        .datoms_range(
            IndexKind::Eavt,
            &Datom::ea_low(jane, name_attr),
            &Datom::ea_high(jane, name_attr),
        )
        .unwrap()
        .collect();
    assert_eq!(recent_names.len(), 1);
    assert_eq!(recent_names[0].v, Value::String("Jane Lane".into()));
}

#[test]
fn lookup_ref_resolution() {
    let db = fixture();
    let report = db
        .transact(vec![
            TxOp::add(tempid(1), "user/email", "jane@x.com"),
            TxOp::add(tempid(1), "user/name", "Jane"),
        ])
        .unwrap();
    let jane = report.tempids[&tempid(1)];

    let spec = EntitySpec::lookup("user/email", "jane@x.com");
    assert_eq!(report.db_after.resolve(&spec).unwrap(), jane);

    let missing = EntitySpec::lookup("user/email", "nobody@x.com");
    assert!(matches!(
        report.db_after.resolve(&missing),
        Err(Error::NotFound(_))
    ));
}

#[test]
fn transaction_failure_leaves_base_usable() {
    let db = fixture();
    let report = db
        .transact(vec![TxOp::add(tempid(1), "user/name", "Jane")])
        .unwrap();
    let base = report.db_after;
    let basis = base.basis_t();

    let err = base
        .transact(vec![TxOp::add(tempid(1), "user/age", "not-a-number")])
        .unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { .. }));

    // Same snapshot transacts fine afterwards
    let ok = base
        .transact(vec![TxOp::add(tempid(1), "user/name", "Alice")])
        .unwrap();
    assert_eq!(ok.db_before.basis_t(), basis);
    assert_eq!(ok.db_after.basis_t(), basis + 1);
}

#[test]
fn flush_to_segments_and_merge_new_writes() {
    let db = fixture();
    let mut report = db
        .transact(vec![TxOp::add(tempid(1), "user/name", "Jane")])
        .unwrap();
    for i in 2..50 {
        report = report
            .db_after
            .transact(vec![TxOp::add(tempid(i), "user/name", format!("user-{}", i))])
            .unwrap();
    }

    // Flush everything the snapshot can see (history included) into the
    // durable tier, then layer a fresh memory tier on top.
    let all: Vec<Datom> = report
        .db_after
        .history()
        .datoms(IndexKind::Eavt)
        .unwrap()
        .collect();
    let segmented = SegmentedIndex::build(
        IndexKind::Eavt,
        all.clone(),
        Arc::new(MemoryContentStore::new()),
        Arc::new(BincodeBlockCodec),
        Arc::new(NodeCache::new()),
        &SegmentConfig {
            segment_size: 32,
            fanout: 8,
        },
    )
    .unwrap();
    let merged = MergedIndex::from_parts(MemoryIndex::new(IndexKind::Eavt), segmented);

    let durable: Vec<Datom> = merged.slice(&Datom::min(), &Datom::max()).unwrap().collect();
    assert_eq!(durable, all);

    // A write after the flush shadows nothing and merges in order
    let fresh = Datom::new(Partition::User.base() + 100_000, 1, "late", 1, true);
    let merged = merged.add_datoms([&fresh]);
    assert!(merged.find(&fresh).unwrap().is_some());
    assert_eq!(
        merged.slice(&Datom::min(), &Datom::max()).unwrap().count(),
        all.len() + 1
    );
}

#[test]
fn filtered_view_composes_with_time_travel() {
    let db = fixture();
    let report = db
        .transact(vec![
            TxOp::add(tempid(1), "user/name", "Jane"),
            TxOp::add(tempid(1), "user/age", 7i64),
        ])
        .unwrap();
    let jane = report.tempids[&tempid(1)];
    let name_attr = db.resolve(&"user/name".into()).unwrap();

    let filtered = report.db_after.filter(move |_, d| d.a == name_attr);
    let visible: Vec<Datom> = filtered
        .datoms_range(
            IndexKind::Eavt,
            &Datom::entity_low(jane),
            &Datom::entity_high(jane),
        )
        .unwrap()
        .collect();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].a, name_attr);
}
