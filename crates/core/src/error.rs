//! Error types for Datalith
//!
//! One taxonomy for the whole engine, with `thiserror` deriving the
//! `Display`/`Error` impls.
//!
//! Recoverable errors (`NotFound`, `TypeMismatch`, `UniquenessViolation`,
//! `CardinalityViolation`, `UnknownAttribute`) abort a single transaction;
//! the base snapshot stays valid for the next attempt. `InvalidSchema`
//! marks a defect in an upstream producer and is surfaced, never masked.
//! `Storage` and `Corruption` are fatal to the read in progress.

use crate::value::{Value, ValueType};
use thiserror::Error;

/// Result type alias for Datalith operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy for the storage, index, and transaction layers
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// An entity id, ident, or lookup ref did not resolve
    #[error("not found: {0}")]
    NotFound(String),

    /// Asserted value's type does not match the attribute's declared type
    #[error("type mismatch for attribute {attribute}: expected {expected}, got {actual:?}")]
    TypeMismatch {
        /// Attribute whose declaration was violated
        attribute: i64,
        /// Declared value type
        expected: ValueType,
        /// The offending value
        actual: Value,
    },

    /// A `:db.unique/value` attribute already holds this value elsewhere
    #[error(
        "uniqueness violation on attribute {attribute}: value {value:?} \
         already held by entity {existing}, asserted for {asserted}"
    )]
    UniquenessViolation {
        /// The unique attribute
        attribute: i64,
        /// The colliding value
        value: Value,
        /// Entity already holding the value
        existing: i64,
        /// Entity the batch tried to give the value to
        asserted: i64,
    },

    /// Two different values asserted for a cardinality-one pair in one batch
    #[error("cardinality-one violation: entity {entity}, attribute {attribute}")]
    CardinalityViolation {
        /// Entity of the conflicting pair
        entity: i64,
        /// Cardinality-one attribute
        attribute: i64,
    },

    /// Attribute id carries no installed schema
    #[error("unknown attribute: {0}")]
    UnknownAttribute(i64),

    /// Unclassifiable value, malformed tempid, or bad schema constant
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// Content-store miss or codec failure
    #[error("storage error: {0}")]
    Storage(String),

    /// Index-internal invariant violation; the persistent structure is bad
    #[error("index corruption: {0}")]
    Corruption(String),
}
