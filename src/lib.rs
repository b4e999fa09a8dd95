//! Datalith: an embedded, immutable, Datomic-style fact database
//!
//! Facts are five-field datoms `(entity, attribute, value, tx, added)`
//! kept in four co-sorted indexes (EAVT, AEVT, AVET, VAET). Writes go
//! through a validating transactor and never mutate history; every
//! snapshot is an immutable value with free time-travel views.
//!
//! ```
//! use datalith::{Db, Keyword, Partition, TxOp, Value};
//!
//! # fn main() -> datalith::Result<()> {
//! let db = Db::bootstrap()?;
//!
//! // Install an attribute, then use it
//! let name = Partition::Db.tempid(1);
//! let db = db
//!     .transact(vec![
//!         TxOp::add(name, "db/ident", Keyword::new("user/name")),
//!         TxOp::add(name, "db/valueType", Value::Ref(datalith::schema::TYPE_STRING)),
//!         TxOp::add(name, "db/cardinality", Value::Ref(datalith::schema::CARDINALITY_ONE)),
//!     ])?
//!     .db_after;
//!
//! let report = db.transact(vec![TxOp::add(Partition::User.tempid(1), "user/name", "Jane")])?;
//! let jane = report.tempids[&Partition::User.tempid(1)];
//! let entity = report.db_after.entity(jane);
//! assert!(entity.get(&Keyword::new("user/name"))?.is_some());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub use datalith_core::schema;
pub use datalith_core::{
    Attribute, Cardinality, Datom, Error, IndexKind, Keyword, Partition, Result, Unique, Value,
    ValueType, PARTITION_WIDTH,
};
pub use datalith_engine::{
    genesis_datoms, transact, DatomIter, Db, Entity, EntitySpec, EntityValue, TxOp, TxReport,
    TX_BASE,
};
pub use datalith_index::{
    BincodeBlockCodec, BlockCodec, ContentStore, MemoryContentStore, MemoryIndex, MergedIndex,
    NodeCache, SegmentConfig, SegmentedIndex,
};
pub use datalith_set::Set;
