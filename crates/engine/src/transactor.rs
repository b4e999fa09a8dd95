//! The transactor
//!
//! `transact` turns a batch of operations into datoms against a base
//! snapshot: resolve names and tempids, type-check, enforce uniqueness
//! (upserting identity tempids), drop no-ops, enforce cardinality with
//! auto-retraction, then commit through `Db::with_datoms`. Any failure
//! aborts the whole batch; the base snapshot is immutable, so there is
//! nothing to roll back.
//!
//! Writers are serialized externally (single writer); readers never
//! block.

use crate::bootstrap::TX_BASE;
use crate::db::Db;
use crate::lookup::EntitySpec;
use chrono::Utc;
use datalith_core::schema::DB_TX_INSTANT;
use datalith_core::{
    Attribute, Cardinality, Datom, Error, Partition, Result, Unique, Value, ValueType,
};
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;
use tracing::info;

/// One assertion or retraction to apply
#[derive(Debug, Clone)]
pub struct TxOp {
    /// The entity the fact is about
    pub entity: EntitySpec,
    /// The attribute, by id or ident
    pub attribute: EntitySpec,
    /// The value
    pub value: Value,
    /// true = assert, false = retract
    pub added: bool,
}

impl TxOp {
    /// Assert a fact
    pub fn add(
        entity: impl Into<EntitySpec>,
        attribute: impl Into<EntitySpec>,
        value: impl Into<Value>,
    ) -> TxOp {
        TxOp {
            entity: entity.into(),
            attribute: attribute.into(),
            value: value.into(),
            added: true,
        }
    }

    /// Retract a fact
    pub fn retract(
        entity: impl Into<EntitySpec>,
        attribute: impl Into<EntitySpec>,
        value: impl Into<Value>,
    ) -> TxOp {
        TxOp {
            entity: entity.into(),
            attribute: attribute.into(),
            value: value.into(),
            added: false,
        }
    }
}

/// What a committed transaction did
#[derive(Debug, Clone)]
pub struct TxReport {
    /// The snapshot the batch was applied to
    pub db_before: Db,
    /// The snapshot including the batch
    pub db_after: Db,
    /// The datoms written, including auto-retractions and `:db/txInstant`
    pub tx_data: Vec<Datom>,
    /// Resolution of every tempid in the batch
    pub tempids: FxHashMap<i64, i64>,
    /// The transaction's entity id
    pub tx_id: i64,
}

/// Per-batch tempid resolution and fresh-id allocation
struct IdAllocator<'a> {
    db: &'a Db,
    counters: FxHashMap<Partition, i64>,
    tempids: FxHashMap<i64, i64>,
}

impl<'a> IdAllocator<'a> {
    fn new(db: &'a Db) -> Self {
        IdAllocator {
            db,
            counters: FxHashMap::default(),
            tempids: FxHashMap::default(),
        }
    }

    /// Resolve a tempid, allocating a fresh id on first sight
    fn resolve(&mut self, tempid: i64) -> Result<i64> {
        if let Some(&id) = self.tempids.get(&tempid) {
            return Ok(id);
        }
        let partition = Partition::of_tempid(tempid)?;
        let next = match self.counters.get(&partition) {
            Some(&n) => n,
            None => self
                .db
                .max_entity_id(partition)?
                .map(|m| m + 1)
                .unwrap_or_else(|| partition.base()),
        };
        self.counters.insert(partition, next + 1);
        self.tempids.insert(tempid, next);
        Ok(next)
    }

    /// Pin a tempid onto an existing entity (identity upsert)
    fn merge(&mut self, tempid: i64, existing: i64) -> Result<()> {
        match self.tempids.get(&tempid) {
            Some(&id) if id != existing => Err(Error::InvalidSchema(format!(
                "tempid {} upserts onto both {} and {}",
                tempid, id, existing
            ))),
            _ => {
                self.tempids.insert(tempid, existing);
                Ok(())
            }
        }
    }
}

/// Apply a batch of operations to a snapshot
pub fn transact(db: &Db, ops: Vec<TxOp>) -> Result<TxReport> {
    let tx_id = TX_BASE + db.next_t();

    // Attribute resolution and type check. Every value's tag must match
    // the attribute's declared type; a tempid inside a ref keeps the Ref
    // tag, so this holds before tempids are resolved.
    let mut resolved_attrs: Vec<(TxOp, Arc<Attribute>)> = Vec::with_capacity(ops.len());
    for op in ops {
        let attr = match &op.attribute {
            EntitySpec::Id(a) if *a < 0 => {
                return Err(Error::InvalidSchema(format!(
                    "attribute position cannot hold tempid {}",
                    a
                )))
            }
            EntitySpec::Id(a) => db.attribute(*a)?,
            spec => db.attribute(db.resolve(spec)?)?,
        };
        match op.value.value_type() {
            Some(actual) if actual == attr.value_type => {}
            _ => {
                return Err(Error::TypeMismatch {
                    attribute: attr.id,
                    expected: attr.value_type,
                    actual: op.value,
                })
            }
        }
        resolved_attrs.push((op, attr));
    }

    // Identity upserts claim their tempids before any fresh allocation.
    let mut ids = IdAllocator::new(db);
    for (op, attr) in &resolved_attrs {
        if !op.added || attr.unique != Some(Unique::Identity) {
            continue;
        }
        let Some(tempid) = op.entity.as_tempid() else {
            continue;
        };
        // A ref value holding a tempid identifies nothing yet
        if matches!(op.value, Value::Ref(target) if target < 0) {
            continue;
        }
        if let Some(existing) = db.avet_entity(attr.id, &op.value)? {
            ids.merge(tempid, existing)?;
        }
    }

    // Entity and ref-value resolution.
    let mut candidates: Vec<(i64, Arc<Attribute>, Value, bool)> =
        Vec::with_capacity(resolved_attrs.len());
    for (op, attr) in resolved_attrs {
        let e = match op.entity.as_tempid() {
            Some(tempid) => ids.resolve(tempid)?,
            None => db.resolve(&op.entity)?,
        };
        let v = if attr.value_type == ValueType::Ref {
            match op.value {
                Value::Ref(target) if target < 0 => Value::Ref(ids.resolve(target)?),
                other => other,
            }
        } else {
            op.value
        };
        candidates.push((e, attr, v, op.added));
    }

    // Uniqueness, against the snapshot and within the batch.
    let mut batch_av: FxHashMap<(i64, Value), i64> = FxHashMap::default();
    for (e, attr, v, added) in &candidates {
        if !added || attr.unique.is_none() {
            continue;
        }
        if let Some(existing) = db.avet_entity(attr.id, v)? {
            if existing != *e {
                return Err(Error::UniquenessViolation {
                    attribute: attr.id,
                    value: v.clone(),
                    existing,
                    asserted: *e,
                });
            }
        }
        if let Some(&previous) = batch_av.get(&(attr.id, v.clone())) {
            if previous != *e {
                return Err(Error::UniquenessViolation {
                    attribute: attr.id,
                    value: v.clone(),
                    existing: previous,
                    asserted: *e,
                });
            }
        }
        batch_av.insert((attr.id, v.clone()), *e);
    }

    // No-op removal: already-true assertions, retractions of absent
    // facts, and exact in-batch duplicates.
    let mut seen: FxHashSet<(i64, i64, Value, bool)> = FxHashSet::default();
    let mut live: Vec<(i64, Arc<Attribute>, Value, bool)> = Vec::with_capacity(candidates.len());
    for (e, attr, v, added) in candidates {
        if !seen.insert((e, attr.id, v.clone(), added)) {
            continue;
        }
        if db.holds(e, attr.id, &v)? == added {
            continue;
        }
        live.push((e, attr, v, added));
    }

    // Cardinality: reject conflicting card-one assertions in one batch;
    // auto-retract a superseded current value unless the batch already
    // retracts it explicitly.
    let explicit_retracts: FxHashSet<(i64, i64, Value)> = live
        .iter()
        .filter(|(_, _, _, added)| !added)
        .map(|(e, attr, v, _)| (*e, attr.id, v.clone()))
        .collect();
    let mut card_one: FxHashMap<(i64, i64), Value> = FxHashMap::default();
    let mut tx_data: Vec<Datom> = Vec::with_capacity(live.len() + 1);
    for (e, attr, v, added) in live {
        if added && attr.cardinality == Cardinality::One {
            if let Some(prev) = card_one.get(&(e, attr.id)) {
                if *prev != v {
                    return Err(Error::CardinalityViolation {
                        entity: e,
                        attribute: attr.id,
                    });
                }
            }
            card_one.insert((e, attr.id), v.clone());
            for old in db.values(e, attr.id)? {
                if old != v && !explicit_retracts.contains(&(e, attr.id, old.clone())) {
                    tx_data.push(Datom::new(e, attr.id, old, tx_id, false));
                }
            }
        }
        tx_data.push(Datom::new(e, attr.id, v, tx_id, added));
    }

    // Commit: stamp the transaction entity and route the batch.
    tx_data.push(Datom::new(
        tx_id,
        DB_TX_INSTANT,
        Value::Instant(Utc::now()),
        tx_id,
        true,
    ));
    let db_after = db.with_datoms(&tx_data)?;
    info!(
        tx = tx_id,
        t = db_after.basis_t(),
        datoms = tx_data.len(),
        tempids = ids.tempids.len(),
        "committed"
    );
    Ok(TxReport {
        db_before: db.clone(),
        db_after,
        tx_data,
        tempids: ids.tempids,
        tx_id,
    })
}

impl Db {
    /// Apply a batch of operations, returning the report
    pub fn transact(&self, ops: Vec<TxOp>) -> Result<TxReport> {
        transact(self, ops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datalith_core::Keyword;

    fn tempid(n: i64) -> i64 {
        Partition::User.tempid(n)
    }

    fn schema_db() -> Db {
        let db = Db::bootstrap().unwrap();
        let name = Partition::Db.tempid(100);
        let email = Partition::Db.tempid(101);
        let age = Partition::Db.tempid(102);
        let friend = Partition::Db.tempid(103);
        db.transact(vec![
            TxOp::add(name, "db/ident", Keyword::new("user/name")),
            TxOp::add(name, "db/valueType", Value::Ref(datalith_core::schema::TYPE_STRING)),
            TxOp::add(name, "db/cardinality", Value::Ref(datalith_core::schema::CARDINALITY_ONE)),
            TxOp::add(email, "db/ident", Keyword::new("user/email")),
            TxOp::add(email, "db/valueType", Value::Ref(datalith_core::schema::TYPE_STRING)),
            TxOp::add(email, "db/cardinality", Value::Ref(datalith_core::schema::CARDINALITY_ONE)),
            TxOp::add(email, "db/unique", Value::Ref(datalith_core::schema::UNIQUE_IDENTITY)),
            TxOp::add(age, "db/ident", Keyword::new("user/age")),
            TxOp::add(age, "db/valueType", Value::Ref(datalith_core::schema::TYPE_LONG)),
            TxOp::add(age, "db/cardinality", Value::Ref(datalith_core::schema::CARDINALITY_ONE)),
            TxOp::add(friend, "db/ident", Keyword::new("user/friend")),
            TxOp::add(friend, "db/valueType", Value::Ref(datalith_core::schema::TYPE_REF)),
            TxOp::add(friend, "db/cardinality", Value::Ref(datalith_core::schema::CARDINALITY_MANY)),
        ])
        .unwrap()
        .db_after
    }

    #[test]
    fn test_schema_install_via_transact() {
        let db = schema_db();
        let name = db.resolve(&"user/name".into()).unwrap();
        let attr = db.attribute(name).unwrap();
        assert_eq!(attr.value_type, ValueType::String);
        assert!(Partition::Db.contains(attr.id));
    }

    #[test]
    fn test_tempid_resolution_and_report() {
        let db = schema_db();
        let report = db
            .transact(vec![
                TxOp::add(tempid(1), "user/name", "Jane"),
                TxOp::add(tempid(1), "user/age", 7i64),
            ])
            .unwrap();
        let &jane = report.tempids.get(&tempid(1)).unwrap();
        assert!(Partition::User.contains(jane));
        assert!(report.db_after.holds(jane, db.resolve(&"user/name".into()).unwrap(), &Value::String("Jane".into())).unwrap());
        // base snapshot untouched
        assert!(!db.entity_exists(jane).unwrap());
    }

    #[test]
    fn test_distinct_tempids_get_distinct_ids() {
        let db = schema_db();
        let report = db
            .transact(vec![
                TxOp::add(tempid(1), "user/name", "Jane"),
                TxOp::add(tempid(2), "user/name", "Alice"),
            ])
            .unwrap();
        assert_ne!(report.tempids[&tempid(1)], report.tempids[&tempid(2)]);
    }

    #[test]
    fn test_type_mismatch_aborts() {
        let db = schema_db();
        let err = db
            .transact(vec![TxOp::add(tempid(1), "user/age", "seven")])
            .unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
    }

    #[test]
    fn test_unknown_attribute_aborts() {
        let db = schema_db();
        let err = db
            .transact(vec![TxOp::add(tempid(1), "user/absent", "x")])
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_identity_upsert_merges_tempid() {
        let db = schema_db();
        let jane = db
            .transact(vec![TxOp::add(tempid(1), "user/email", "jane@x.com")])
            .unwrap();
        let jane_id = jane.tempids[&tempid(1)];

        // Same email through a fresh tempid lands on the same entity
        let report = jane
            .db_after
            .transact(vec![
                TxOp::add(tempid(9), "user/email", "jane@x.com"),
                TxOp::add(tempid(9), "user/name", "Jane"),
            ])
            .unwrap();
        assert_eq!(report.tempids[&tempid(9)], jane_id);
        let name = db.resolve(&"user/name".into()).unwrap();
        assert!(report.db_after.holds(jane_id, name, &Value::String("Jane".into())).unwrap());
    }

    #[test]
    fn test_unique_value_collision_is_error() {
        let db = schema_db();
        // user/email is unique-identity; concrete-entity collision still errors
        let jane = db
            .transact(vec![TxOp::add(tempid(1), "user/email", "jane@x.com")])
            .unwrap();
        let alice = jane
            .db_after
            .transact(vec![TxOp::add(tempid(1), "user/name", "Alice")])
            .unwrap();
        let alice_id = alice.tempids[&tempid(1)];

        let err = alice
            .db_after
            .transact(vec![TxOp::add(alice_id, "user/email", "jane@x.com")])
            .unwrap_err();
        assert!(matches!(err, Error::UniquenessViolation { .. }));
    }

    #[test]
    fn test_unique_value_tempid_errors_instead_of_upserting() {
        let db = schema_db();
        let handle = Partition::Db.tempid(110);
        let db = db
            .transact(vec![
                TxOp::add(handle, "db/ident", Keyword::new("user/handle")),
                TxOp::add(handle, "db/valueType", Value::Ref(datalith_core::schema::TYPE_STRING)),
                TxOp::add(handle, "db/cardinality", Value::Ref(datalith_core::schema::CARDINALITY_ONE)),
                TxOp::add(handle, "db/unique", Value::Ref(datalith_core::schema::UNIQUE_VALUE)),
            ])
            .unwrap()
            .db_after;

        let first = db
            .transact(vec![TxOp::add(tempid(1), "user/handle", "jdoe")])
            .unwrap();

        // Unlike unique-identity, a fresh tempid taking an existing value
        // does not merge onto the holder
        let err = first
            .db_after
            .transact(vec![TxOp::add(tempid(2), "user/handle", "jdoe")])
            .unwrap_err();
        match err {
            Error::UniquenessViolation { existing, .. } => {
                assert_eq!(existing, first.tempids[&tempid(1)]);
            }
            other => panic!("expected uniqueness violation, got {:?}", other),
        }
    }

    #[test]
    fn test_cardinality_one_auto_retracts() {
        let db = schema_db();
        let report = db
            .transact(vec![TxOp::add(tempid(1), "user/name", "Jane")])
            .unwrap();
        let jane = report.tempids[&tempid(1)];
        let name = db.resolve(&"user/name".into()).unwrap();

        let report = report
            .db_after
            .transact(vec![TxOp::add(jane, "user/name", "Jane Lane")])
            .unwrap();
        // retraction of the old value was inserted automatically
        assert!(report
            .tx_data
            .iter()
            .any(|d| !d.added && d.v == Value::String("Jane".into())));
        assert_eq!(
            report.db_after.values(jane, name).unwrap(),
            vec![Value::String("Jane Lane".into())]
        );
    }

    #[test]
    fn test_conflicting_card_one_assertions_abort() {
        let db = schema_db();
        let err = db
            .transact(vec![
                TxOp::add(tempid(1), "user/name", "Jane"),
                TxOp::add(tempid(1), "user/name", "Alice"),
            ])
            .unwrap_err();
        assert!(matches!(err, Error::CardinalityViolation { .. }));
    }

    #[test]
    fn test_cardinality_many_accepts_multiple() {
        let db = schema_db();
        let report = db
            .transact(vec![
                TxOp::add(tempid(1), "user/name", "Jane"),
                TxOp::add(tempid(2), "user/name", "Alice"),
            ])
            .unwrap();
        let (jane, alice) = (report.tempids[&tempid(1)], report.tempids[&tempid(2)]);
        let report = report
            .db_after
            .transact(vec![
                TxOp::add(jane, "user/friend", Value::Ref(alice)),
                TxOp::add(jane, "user/friend", Value::Ref(jane)),
            ])
            .unwrap();
        let friend = db.resolve(&"user/friend".into()).unwrap();
        assert_eq!(report.db_after.values(jane, friend).unwrap().len(), 2);
    }

    #[test]
    fn test_noop_elimination() {
        let db = schema_db();
        let report = db
            .transact(vec![TxOp::add(tempid(1), "user/name", "Jane")])
            .unwrap();
        let jane = report.tempids[&tempid(1)];

        // Re-asserting the same fact writes only the tx-instant datom
        let report = report
            .db_after
            .transact(vec![
                TxOp::add(jane, "user/name", "Jane"),
                TxOp::add(jane, "user/name", "Jane"),
            ])
            .unwrap();
        assert_eq!(report.tx_data.len(), 1);
        assert_eq!(report.tx_data[0].a, DB_TX_INSTANT);

        // Retracting an absent fact is also a no-op
        let report = report
            .db_after
            .transact(vec![TxOp::retract(jane, "user/name", "Nobody")])
            .unwrap();
        assert_eq!(report.tx_data.len(), 1);
    }

    #[test]
    fn test_ref_value_tempid_resolves() {
        let db = schema_db();
        let report = db
            .transact(vec![
                TxOp::add(tempid(1), "user/name", "Jane"),
                TxOp::add(tempid(2), "user/name", "Alice"),
                TxOp::add(tempid(1), "user/friend", Value::Ref(tempid(2))),
            ])
            .unwrap();
        let (jane, alice) = (report.tempids[&tempid(1)], report.tempids[&tempid(2)]);
        let friend = db.resolve(&"user/friend".into()).unwrap();
        assert!(report.db_after.holds(jane, friend, &Value::Ref(alice)).unwrap());
    }

    #[test]
    fn test_tx_instant_stamped() {
        let db = schema_db();
        let report = db
            .transact(vec![TxOp::add(tempid(1), "user/name", "Jane")])
            .unwrap();
        assert!(report
            .tx_data
            .iter()
            .any(|d| d.e == report.tx_id && d.a == DB_TX_INSTANT && d.tx == report.tx_id));
        assert!(Partition::Tx.contains(report.tx_id));
    }

    #[test]
    fn test_retraction() {
        let db = schema_db();
        let report = db
            .transact(vec![TxOp::add(tempid(1), "user/name", "Jane")])
            .unwrap();
        let jane = report.tempids[&tempid(1)];
        let name = db.resolve(&"user/name".into()).unwrap();

        let report = report
            .db_after
            .transact(vec![TxOp::retract(jane, "user/name", "Jane")])
            .unwrap();
        assert!(report.db_after.values(jane, name).unwrap().is_empty());
        // history still shows both sides
        let history_count = report
            .db_after
            .history()
            .datoms_range(
                datalith_core::IndexKind::Eavt,
                &Datom::ea_low(jane, name),
                &Datom::ea_high(jane, name),
            )
            .unwrap()
            .count();
        assert_eq!(history_count, 2);
    }

    #[test]
    fn test_malformed_tempid_partition() {
        let db = schema_db();
        // Magnitude in the unassigned gap between the Db and Tx bands
        let gap_tempid = -(datalith_core::PARTITION_WIDTH + 5);
        let err = db
            .transact(vec![TxOp::add(gap_tempid, "user/name", "x")])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSchema(_)));
    }
}
