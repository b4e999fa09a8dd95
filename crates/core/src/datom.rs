//! Datoms and the four index orderings
//!
//! A datom is an immutable 5-tuple fact: `(entity, attribute, value,
//! transaction, added)`. The database keeps every datom in up to four
//! co-sorted indexes, each a different lexicographic composition of the
//! datom fields:
//!
//! - EAVT: entity, attribute, value, tx
//! - AEVT: attribute, entity, value, tx
//! - AVET: attribute, value, entity, tx
//! - VAET: value, attribute, entity, tx (reference-typed attributes only)
//!
//! Every composition finishes with the transaction id compared
//! **descending** (newest first) and then the `added` flag (retractions
//! first). This gives the adjacency invariant the current-view filter
//! depends on: within EAVT order, a retraction `(e,a,v,tx2,false)` sorts
//! immediately before the assertion `(e,a,v,tx1,true)` it cancels.

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// An atomic fact
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Datom {
    /// Entity id
    pub e: i64,
    /// Attribute id
    pub a: i64,
    /// Value
    pub v: Value,
    /// Transaction id (tx-partition entity)
    pub tx: i64,
    /// true = assertion, false = retraction
    pub added: bool,
}

impl Datom {
    /// Create a datom
    pub fn new(e: i64, a: i64, v: impl Into<Value>, tx: i64, added: bool) -> Self {
        Datom {
            e,
            a,
            v: v.into(),
            tx,
            added,
        }
    }

    /// Sentinel below every datom in every ordering
    pub fn min() -> Self {
        Datom::new(i64::MIN, i64::MIN, Value::Min, i64::MAX, false)
    }

    /// Sentinel above every datom in every ordering
    pub fn max() -> Self {
        Datom::new(i64::MAX, i64::MAX, Value::Max, i64::MIN, true)
    }

    /// Lowest datom for an entity (EAVT range start)
    pub fn entity_low(e: i64) -> Self {
        Datom::new(e, i64::MIN, Value::Min, i64::MAX, false)
    }

    /// Highest datom for an entity (EAVT range end)
    pub fn entity_high(e: i64) -> Self {
        Datom::new(e, i64::MAX, Value::Max, i64::MIN, true)
    }

    /// Lowest datom for an (entity, attribute) pair
    pub fn ea_low(e: i64, a: i64) -> Self {
        Datom::new(e, a, Value::Min, i64::MAX, false)
    }

    /// Highest datom for an (entity, attribute) pair
    pub fn ea_high(e: i64, a: i64) -> Self {
        Datom::new(e, a, Value::Max, i64::MIN, true)
    }

    /// Lowest datom for an attribute (AEVT/AVET range start)
    pub fn attr_low(a: i64) -> Self {
        Datom::new(i64::MIN, a, Value::Min, i64::MAX, false)
    }

    /// Highest datom for an attribute (AEVT/AVET range end)
    pub fn attr_high(a: i64) -> Self {
        Datom::new(i64::MAX, a, Value::Max, i64::MIN, true)
    }

    /// Lowest datom for an (attribute, value) pair (AVET range start)
    pub fn av_low(a: i64, v: Value) -> Self {
        Datom::new(i64::MIN, a, v, i64::MAX, false)
    }

    /// Highest datom for an (attribute, value) pair (AVET range end)
    pub fn av_high(a: i64, v: Value) -> Self {
        Datom::new(i64::MAX, a, v, i64::MIN, true)
    }

    /// Lowest datom for a value (VAET range start)
    pub fn value_low(v: Value) -> Self {
        Datom::new(i64::MIN, i64::MIN, v, i64::MAX, false)
    }

    /// Highest datom for a value (VAET range end)
    pub fn value_high(v: Value) -> Self {
        Datom::new(i64::MAX, i64::MAX, v, i64::MIN, true)
    }
}

impl fmt::Display for Datom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = if self.added { "+" } else { "-" };
        write!(f, "[{} {} {} {:?} {}]", op, self.e, self.a, self.v, self.tx)
    }
}

/// Which of the four sort orders an index uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexKind {
    /// entity, attribute, value, tx
    Eavt,
    /// attribute, entity, value, tx
    Aevt,
    /// attribute, value, entity, tx
    Avet,
    /// value, attribute, entity, tx
    Vaet,
}

impl IndexKind {
    /// Total order over datoms under this index's sort
    ///
    /// The trailing tx comparison is reversed (newer transactions sort
    /// first within an otherwise-equal tuple), then `added` with
    /// retractions first. Both are required by the current-view collapse.
    pub fn cmp(self, x: &Datom, y: &Datom) -> Ordering {
        let by_fields = match self {
            IndexKind::Eavt => x
                .e
                .cmp(&y.e)
                .then_with(|| x.a.cmp(&y.a))
                .then_with(|| x.v.cmp(&y.v)),
            IndexKind::Aevt => x
                .a
                .cmp(&y.a)
                .then_with(|| x.e.cmp(&y.e))
                .then_with(|| x.v.cmp(&y.v)),
            IndexKind::Avet => x
                .a
                .cmp(&y.a)
                .then_with(|| x.v.cmp(&y.v))
                .then_with(|| x.e.cmp(&y.e)),
            IndexKind::Vaet => x
                .v
                .cmp(&y.v)
                .then_with(|| x.a.cmp(&y.a))
                .then_with(|| x.e.cmp(&y.e)),
        };
        by_fields
            .then_with(|| y.tx.cmp(&x.tx))
            .then_with(|| x.added.cmp(&y.added))
    }

    /// Comparator as a plain function pointer, for the ordered set
    pub fn comparator(self) -> fn(&Datom, &Datom) -> Ordering {
        match self {
            IndexKind::Eavt => |x, y| IndexKind::Eavt.cmp(x, y),
            IndexKind::Aevt => |x, y| IndexKind::Aevt.cmp(x, y),
            IndexKind::Avet => |x, y| IndexKind::Avet.cmp(x, y),
            IndexKind::Vaet => |x, y| IndexKind::Vaet.cmp(x, y),
        }
    }

    /// All four kinds, in routing order
    pub fn all() -> [IndexKind; 4] {
        [
            IndexKind::Eavt,
            IndexKind::Aevt,
            IndexKind::Avet,
            IndexKind::Vaet,
        ]
    }
}
