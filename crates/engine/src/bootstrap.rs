//! Genesis schema
//!
//! The datoms installed in transaction zero: the built-in attributes with
//! their type/cardinality/uniqueness metadata, the ident entities backing
//! the schema enums, and the three partitions. Everything here is written
//! in terms of the constant id table in `datalith_core::schema`; the
//! bootstrap never allocates ids.

use chrono::Utc;
use datalith_core::schema::{
    CARDINALITY_MANY, CARDINALITY_ONE, DB_CARDINALITY, DB_IDENT, DB_INDEX, DB_INSTALL_ATTRIBUTE,
    DB_INSTALL_PARTITION, DB_NO_HISTORY, DB_TX_INSTANT, DB_UNIQUE, DB_VALUE_TYPE, PART_DB,
    PART_TX, PART_USER, TYPE_BOOLEAN, TYPE_INSTANT, TYPE_KEYWORD, TYPE_LONG, TYPE_REF,
    TYPE_STRING, TYPE_UUID, UNIQUE_IDENTITY, UNIQUE_VALUE,
};
use datalith_core::{Datom, Keyword, Partition, Value};

/// First transaction id
pub const TX_BASE: i64 = Partition::Tx.base();

/// Built-in attributes: (id, ident, value-type ident, cardinality ident)
const BUILTIN_ATTRIBUTES: [(i64, &str, i64, i64); 9] = [
    (DB_IDENT, "db/ident", TYPE_KEYWORD, CARDINALITY_ONE),
    (DB_INSTALL_PARTITION, "db.install/partition", TYPE_REF, CARDINALITY_MANY),
    (DB_INSTALL_ATTRIBUTE, "db.install/attribute", TYPE_REF, CARDINALITY_MANY),
    (DB_VALUE_TYPE, "db/valueType", TYPE_REF, CARDINALITY_ONE),
    (DB_CARDINALITY, "db/cardinality", TYPE_REF, CARDINALITY_ONE),
    (DB_UNIQUE, "db/unique", TYPE_REF, CARDINALITY_ONE),
    (DB_INDEX, "db/index", TYPE_BOOLEAN, CARDINALITY_ONE),
    (DB_NO_HISTORY, "db/noHistory", TYPE_BOOLEAN, CARDINALITY_ONE),
    (DB_TX_INSTANT, "db/txInstant", TYPE_INSTANT, CARDINALITY_ONE),
];

/// Ident entities backing the schema enums: (id, ident)
const BUILTIN_IDENTS: [(i64, &str); 11] = [
    (TYPE_REF, "db.type/ref"),
    (TYPE_KEYWORD, "db.type/keyword"),
    (TYPE_LONG, "db.type/long"),
    (TYPE_STRING, "db.type/string"),
    (TYPE_BOOLEAN, "db.type/boolean"),
    (TYPE_INSTANT, "db.type/instant"),
    (TYPE_UUID, "db.type/uuid"),
    (CARDINALITY_ONE, "db.cardinality/one"),
    (CARDINALITY_MANY, "db.cardinality/many"),
    (UNIQUE_VALUE, "db.unique/value"),
    (UNIQUE_IDENTITY, "db.unique/identity"),
];

/// Partition entities: (id, ident)
const BUILTIN_PARTITIONS: [(i64, &str); 3] = [
    (PART_DB, "db.part/db"),
    (PART_TX, "db.part/tx"),
    (PART_USER, "db.part/user"),
];

/// The datoms of transaction zero
pub fn genesis_datoms() -> Vec<Datom> {
    let tx = TX_BASE;
    let mut datoms = Vec::new();
    let mut put = |e: i64, a: i64, v: Value| datoms.push(Datom::new(e, a, v, tx, true));

    for (id, ident, vt, card) in BUILTIN_ATTRIBUTES {
        put(id, DB_IDENT, Value::Keyword(Keyword::new(ident)));
        put(id, DB_VALUE_TYPE, Value::Ref(vt));
        put(id, DB_CARDINALITY, Value::Ref(card));
        put(PART_DB, DB_INSTALL_ATTRIBUTE, Value::Ref(id));
    }
    // `:db/ident` is itself the identity attribute
    put(DB_IDENT, DB_UNIQUE, Value::Ref(UNIQUE_IDENTITY));

    for (id, ident) in BUILTIN_IDENTS {
        put(id, DB_IDENT, Value::Keyword(Keyword::new(ident)));
    }

    for (id, ident) in BUILTIN_PARTITIONS {
        put(id, DB_IDENT, Value::Keyword(Keyword::new(ident)));
        put(PART_DB, DB_INSTALL_PARTITION, Value::Ref(id));
    }

    put(tx, DB_TX_INSTANT, Value::Instant(Utc::now()));
    datoms
}
