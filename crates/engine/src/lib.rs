//! Snapshot layer and transactor for Datalith
//!
//! - `Db`: the immutable snapshot value, its time-travel views
//!   (`as_of` / `since` / `history` / `filter`), and attribute metadata
//!   derivation
//! - `Entity`: lazy, memoized entity projection
//! - `EntitySpec`: ids, idents, and lookup refs
//! - `transact` / `TxOp` / `TxReport`: the write path
//! - `bootstrap`: the genesis schema

#![warn(missing_docs)]
#![warn(clippy::all)]

mod bootstrap;
mod db;
mod entity;
mod lookup;
mod transactor;

pub use bootstrap::{genesis_datoms, TX_BASE};
pub use db::{DatomFilter, DatomIter, Db};
pub use entity::{Entity, EntityValue};
pub use lookup::EntitySpec;
pub use transactor::{transact, TxOp, TxReport};
