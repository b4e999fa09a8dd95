//! Built-in schema constants and attribute metadata
//!
//! A small fixed table of attribute and ident entity ids is hard-coded and
//! shared between the snapshot layer (index routing) and the transactor
//! (validation). These ids are part of the on-disk contract: any
//! replacement engine must preserve them or supply a mapping table. They
//! are never inferred dynamically.

use crate::error::{Error, Result};
use crate::value::{Keyword, ValueType};
use serde::{Deserialize, Serialize};

// Built-in attribute ids (Db partition)

/// `:db/ident` — unique-identity keyword naming an entity
pub const DB_IDENT: i64 = 10;
/// `:db.install/partition` — registers a partition entity
pub const DB_INSTALL_PARTITION: i64 = 11;
/// `:db.install/attribute` — registers an attribute entity
pub const DB_INSTALL_ATTRIBUTE: i64 = 12;
/// `:db/valueType` — ref to a `:db.type/*` ident entity
pub const DB_VALUE_TYPE: i64 = 40;
/// `:db/cardinality` — ref to a `:db.cardinality/*` ident entity
pub const DB_CARDINALITY: i64 = 41;
/// `:db/unique` — ref to a `:db.unique/*` ident entity
pub const DB_UNIQUE: i64 = 42;
/// `:db/index` — boolean, include the attribute in AVET
pub const DB_INDEX: i64 = 44;
/// `:db/noHistory` — boolean, exclude the attribute from history views
pub const DB_NO_HISTORY: i64 = 45;
/// `:db/txInstant` — instant stamped on every transaction entity
pub const DB_TX_INSTANT: i64 = 50;

// Ident entities for `:db/valueType` values

/// `:db.type/ref`
pub const TYPE_REF: i64 = 20;
/// `:db.type/keyword`
pub const TYPE_KEYWORD: i64 = 21;
/// `:db.type/long`
pub const TYPE_LONG: i64 = 22;
/// `:db.type/string`
pub const TYPE_STRING: i64 = 23;
/// `:db.type/boolean`
pub const TYPE_BOOLEAN: i64 = 24;
/// `:db.type/instant`
pub const TYPE_INSTANT: i64 = 25;
/// `:db.type/uuid`
pub const TYPE_UUID: i64 = 26;

// Ident entities for `:db/cardinality` and `:db/unique` values

/// `:db.cardinality/one`
pub const CARDINALITY_ONE: i64 = 35;
/// `:db.cardinality/many`
pub const CARDINALITY_MANY: i64 = 36;
/// `:db.unique/value`
pub const UNIQUE_VALUE: i64 = 37;
/// `:db.unique/identity`
pub const UNIQUE_IDENTITY: i64 = 38;

// Partition entities

/// `:db.part/db`
pub const PART_DB: i64 = 0;
/// `:db.part/tx`
pub const PART_TX: i64 = 3;
/// `:db.part/user`
pub const PART_USER: i64 = 4;

/// Attributes always routed to AVET, schema or not
pub const BUILTIN_AVET: [i64; 3] = [DB_IDENT, DB_INSTALL_PARTITION, DB_INSTALL_ATTRIBUTE];

/// Schema-altering ref attributes always routed to VAET
pub const BUILTIN_VAET: [i64; 5] = [
    DB_INSTALL_PARTITION,
    DB_INSTALL_ATTRIBUTE,
    DB_VALUE_TYPE,
    DB_CARDINALITY,
    DB_UNIQUE,
];

/// Map a `:db.type/*` ident entity id to its `ValueType`
pub fn value_type_of_ident(id: i64) -> Result<ValueType> {
    match id {
        TYPE_REF => Ok(ValueType::Ref),
        TYPE_KEYWORD => Ok(ValueType::Keyword),
        TYPE_LONG => Ok(ValueType::Int),
        TYPE_STRING => Ok(ValueType::String),
        TYPE_BOOLEAN => Ok(ValueType::Bool),
        TYPE_INSTANT => Ok(ValueType::Instant),
        TYPE_UUID => Ok(ValueType::Uuid),
        other => Err(Error::InvalidSchema(format!(
            "{} is not a value-type ident",
            other
        ))),
    }
}

/// Map a `ValueType` to its `:db.type/*` ident entity id
pub fn ident_of_value_type(vt: ValueType) -> i64 {
    match vt {
        ValueType::Ref => TYPE_REF,
        ValueType::Keyword => TYPE_KEYWORD,
        ValueType::Int => TYPE_LONG,
        ValueType::String => TYPE_STRING,
        ValueType::Bool => TYPE_BOOLEAN,
        ValueType::Instant => TYPE_INSTANT,
        ValueType::Uuid => TYPE_UUID,
    }
}

/// How many values an attribute may hold per entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cardinality {
    /// At most one current value per entity
    One,
    /// Any number of current values per entity
    Many,
}

/// Uniqueness constraint on an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unique {
    /// A value may belong to at most one entity; collisions error
    Value,
    /// A value identifies an entity; tempid assertions upsert onto it
    Identity,
}

/// Schema metadata for one attribute
///
/// Derived by the snapshot layer from the attribute entity's own datoms
/// and cached per snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    /// Attribute entity id
    pub id: i64,
    /// `:db/ident` keyword
    pub ident: Keyword,
    /// Declared value type
    pub value_type: ValueType,
    /// Cardinality (defaults to one)
    pub cardinality: Cardinality,
    /// Uniqueness constraint, if any
    pub unique: Option<Unique>,
    /// Whether the attribute is AVET-indexed
    pub indexed: bool,
    /// Whether history is suppressed for the attribute
    pub no_history: bool,
}

impl Attribute {
    /// Whether datoms of this attribute belong in AVET
    pub fn avet_member(&self) -> bool {
        self.indexed || self.unique.is_some() || BUILTIN_AVET.contains(&self.id)
    }

    /// Whether datoms of this attribute belong in VAET
    pub fn vaet_member(&self) -> bool {
        self.value_type == ValueType::Ref || BUILTIN_VAET.contains(&self.id)
    }
}
