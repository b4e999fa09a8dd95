//! Id partitions
//!
//! Entity, attribute, and transaction ids are dense integers carved into
//! disjoint power-of-two bands. Each partition owns one band:
//!
//! - `Db`   (schema entities):  `[0, 2^42)`
//! - `Tx`   (transactions):     `[3*2^42, 4*2^42)`
//! - `User` (application data): `[4*2^42, 5*2^42)`
//!
//! Tempids are negative ids whose magnitude falls inside the target
//! partition's band; the transactor resolves each distinct tempid to one
//! fresh real id in that band.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Width of every partition band (2^42 ids)
pub const PARTITION_WIDTH: i64 = 1 << 42;

/// A disjoint id band reserved for a class of entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Partition {
    /// Schema entities and built-in attributes
    Db,
    /// Transaction entities
    Tx,
    /// Application entities
    User,
}

impl Partition {
    /// First id of this partition's band
    pub const fn base(self) -> i64 {
        match self {
            Partition::Db => 0,
            Partition::Tx => 3 * PARTITION_WIDTH,
            Partition::User => 4 * PARTITION_WIDTH,
        }
    }

    /// One past the last id of this partition's band
    pub const fn end(self) -> i64 {
        self.base() + PARTITION_WIDTH
    }

    /// Whether a (positive) id falls in this partition's band
    pub fn contains(self, id: i64) -> bool {
        id >= self.base() && id < self.end()
    }

    /// The partition owning a positive id, if any
    pub fn of_id(id: i64) -> Option<Partition> {
        [Partition::Db, Partition::Tx, Partition::User]
            .into_iter()
            .find(|p| p.contains(id))
    }

    /// Build the nth tempid targeting this partition
    pub fn tempid(self, n: i64) -> i64 {
        -(self.base() + n)
    }

    /// Resolve the partition a tempid targets
    ///
    /// A tempid must be negative and its magnitude must land in a valid
    /// band; anything else is a malformed tempid.
    pub fn of_tempid(tempid: i64) -> Result<Partition> {
        if tempid >= 0 {
            return Err(Error::InvalidSchema(format!(
                "tempid must be negative, got {}",
                tempid
            )));
        }
        Partition::of_id(-tempid).ok_or_else(|| {
            Error::InvalidSchema(format!("tempid {} targets no known partition", tempid))
        })
    }
}
