//! Columnar datom storage
//!
//! Durable index nodes hold datoms transposed into parallel arrays, one
//! per field, instead of an array of structs. Hot scans over a single
//! field stay cache-dense, and a `Datom` is only materialized when a leaf
//! row is actually read. `cmp_row` compares a target datom against a row
//! in place, so level routing never builds the datoms it rejects.

use datalith_core::{Datom, IndexKind, Value};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Transposed datom arrays
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Columns {
    /// Entity ids
    pub entities: Vec<i64>,
    /// Attribute ids
    pub attributes: Vec<i64>,
    /// Values
    pub values: Vec<Value>,
    /// Transaction ids
    pub transactions: Vec<i64>,
    /// Assertion flags
    pub addeds: Vec<bool>,
}

impl Columns {
    /// Create empty columns
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether there are no rows
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Append a datom as a row
    pub fn push(&mut self, d: &Datom) {
        self.entities.push(d.e);
        self.attributes.push(d.a);
        self.values.push(d.v.clone());
        self.transactions.push(d.tx);
        self.addeds.push(d.added);
    }

    /// Materialize the datom at `row`
    pub fn datom_at(&self, row: usize) -> Datom {
        Datom {
            e: self.entities[row],
            a: self.attributes[row],
            v: self.values[row].clone(),
            tx: self.transactions[row],
            added: self.addeds[row],
        }
    }

    /// Compare row `row` against `target` under `kind`'s ordering
    ///
    /// Must agree exactly with `IndexKind::cmp(row_datom, target)`; the
    /// trailing tx comparison is reversed, then the added flag.
    pub fn cmp_row(&self, row: usize, target: &Datom, kind: IndexKind) -> Ordering {
        let by_fields = match kind {
            IndexKind::Eavt => self.entities[row]
                .cmp(&target.e)
                .then_with(|| self.attributes[row].cmp(&target.a))
                .then_with(|| self.values[row].cmp(&target.v)),
            IndexKind::Aevt => self.attributes[row]
                .cmp(&target.a)
                .then_with(|| self.entities[row].cmp(&target.e))
                .then_with(|| self.values[row].cmp(&target.v)),
            IndexKind::Avet => self.attributes[row]
                .cmp(&target.a)
                .then_with(|| self.values[row].cmp(&target.v))
                .then_with(|| self.entities[row].cmp(&target.e)),
            IndexKind::Vaet => self.values[row]
                .cmp(&target.v)
                .then_with(|| self.attributes[row].cmp(&target.a))
                .then_with(|| self.entities[row].cmp(&target.e)),
        };
        by_fields
            .then_with(|| target.tx.cmp(&self.transactions[row]))
            .then_with(|| self.addeds[row].cmp(&target.added))
    }

    /// First row not ordered before `target`
    pub fn lower_bound(&self, target: &Datom, kind: IndexKind) -> usize {
        let (mut lo, mut hi) = (0, self.len());
        while lo < hi {
            let mid = (lo + hi) / 2;
            if self.cmp_row(mid, target, kind) == Ordering::Less {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    /// First row ordered after `target`
    pub fn upper_bound(&self, target: &Datom, kind: IndexKind) -> usize {
        let (mut lo, mut hi) = (0, self.len());
        while lo < hi {
            let mid = (lo + hi) / 2;
            if self.cmp_row(mid, target, kind) != Ordering::Greater {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }
}
