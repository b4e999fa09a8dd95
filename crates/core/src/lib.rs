//! Core types for Datalith
//!
//! This crate defines the foundational types used throughout the system:
//! - Keyword, Value, ValueType: the value model and its total order
//! - Datom: the immutable fact tuple
//! - IndexKind: the four sort orders (EAVT, AEVT, AVET, VAET)
//! - Partition: disjoint id bands for schema, tx, and user entities
//! - Attribute, Cardinality, Unique: schema metadata
//! - schema constants: the built-in attribute/ident id table
//! - Error: the error taxonomy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod datom;
pub mod error;
pub mod partition;
pub mod schema;
pub mod value;

pub use datom::{Datom, IndexKind};
pub use error::{Error, Result};
pub use partition::{Partition, PARTITION_WIDTH};
pub use schema::{Attribute, Cardinality, Unique};
pub use value::{Keyword, Value, ValueType};
