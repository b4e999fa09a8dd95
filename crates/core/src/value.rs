//! Value types for Datalith
//!
//! This module defines:
//! - Keyword: interned-style `:ns/name` identifier, distinct from String
//! - Value: the tagged union stored in the value position of a datom
//! - ValueType: the schema-side type tag for attribute declarations
//!
//! ## Total order
//!
//! `Value` carries a total order used by every index comparator. The
//! primary key is the variant's ordinal in declaration order (fixed,
//! documented below); the secondary key is the type-specific comparison.
//! `Min` and `Max` are sentinels that compare below/above everything and
//! exist only to build range bounds — the transactor never stores them.
//!
//! Ordinal order: Min < Bool < Int < Keyword < String < Instant < Ref
//! < Uuid < Max. Declaring the variants in this order lets the derived
//! `Ord` implement the contract exactly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A `:namespace/name` style identifier
///
/// Keywords name attributes, idents, and enum values. They are a distinct
/// type: `Keyword("a")` never equals `String("a")` in the value order.
/// The constructor strips a single leading `:` so `":db/ident"` and
/// `"db/ident"` build the same keyword; `Display` always prints the colon.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Keyword(String);

impl Keyword {
    /// Create a keyword, normalizing away a leading `:`
    pub fn new(name: impl AsRef<str>) -> Self {
        let name = name.as_ref();
        Keyword(name.strip_prefix(':').unwrap_or(name).to_string())
    }

    /// The name without the leading colon
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ":{}", self.0)
    }
}

impl From<&str> for Keyword {
    fn from(s: &str) -> Self {
        Keyword::new(s)
    }
}

/// The value position of a datom
///
/// Variant declaration order is the documented tag order; do not reorder.
/// The derived `Ord` compares the tag first, then the payload
/// (numeric diff, lexicographic, time-as-epoch, 128-bit UUID compare).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Value {
    /// Sentinel below every other value (range bounds only)
    Min,
    /// Boolean
    Bool(bool),
    /// 64-bit signed integer
    Int(i64),
    /// `:ns/name` identifier
    Keyword(Keyword),
    /// UTF-8 string
    String(String),
    /// Point in time (UTC)
    Instant(DateTime<Utc>),
    /// Reference to another entity by id
    Ref(i64),
    /// 128-bit UUID
    Uuid(Uuid),
    /// Sentinel above every other value (range bounds only)
    Max,
}

impl Value {
    /// Classify this value into its schema type tag
    ///
    /// Sentinels have no schema type and classify to `None`.
    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            Value::Bool(_) => Some(ValueType::Bool),
            Value::Int(_) => Some(ValueType::Int),
            Value::Keyword(_) => Some(ValueType::Keyword),
            Value::String(_) => Some(ValueType::String),
            Value::Instant(_) => Some(ValueType::Instant),
            Value::Ref(_) => Some(ValueType::Ref),
            Value::Uuid(_) => Some(ValueType::Uuid),
            Value::Min | Value::Max => None,
        }
    }

    /// Get the referenced entity id if this is a Ref value
    pub fn as_ref_id(&self) -> Option<i64> {
        match self {
            Value::Ref(id) => Some(*id),
            _ => None,
        }
    }

    /// Get as &str if this is a String value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as i64 if this is an Int value
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as &Keyword if this is a Keyword value
    pub fn as_keyword(&self) -> Option<&Keyword> {
        match self {
            Value::Keyword(k) => Some(k),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Keyword> for Value {
    fn from(k: Keyword) -> Self {
        Value::Keyword(k)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Value::Instant(t)
    }
}

impl From<Uuid> for Value {
    fn from(u: Uuid) -> Self {
        Value::Uuid(u)
    }
}

/// Schema-side type tag for attribute declarations
///
/// Mirrors the storable `Value` variants; sentinels are excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    /// Boolean values
    Bool,
    /// Integer values
    Int,
    /// Keyword values
    Keyword,
    /// String values
    String,
    /// Instant values
    Instant,
    /// Entity references
    Ref,
    /// UUID values
    Uuid,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Bool => "boolean",
            ValueType::Int => "long",
            ValueType::Keyword => "keyword",
            ValueType::String => "string",
            ValueType::Instant => "instant",
            ValueType::Ref => "ref",
            ValueType::Uuid => "uuid",
        };
        write!(f, "{}", name)
    }
}
