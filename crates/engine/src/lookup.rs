//! Entity resolution
//!
//! Anything that can name an entity resolves through `EntitySpec`: a raw
//! id, a `:db/ident` keyword, or a lookup ref pairing a unique attribute
//! with a value. All three resolve to a raw id or `NotFound`.

use crate::db::Db;
use datalith_core::schema::DB_IDENT;
use datalith_core::{Error, Keyword, Result, Value};

/// A reference to an entity, in any of the accepted spellings
#[derive(Debug, Clone, PartialEq)]
pub enum EntitySpec {
    /// A raw entity id (negative = tempid, resolved by the transactor)
    Id(i64),
    /// The entity whose `:db/ident` is this keyword
    Ident(Keyword),
    /// The entity holding this (unique attribute, value) pair
    Lookup(Box<EntitySpec>, Value),
}

impl EntitySpec {
    /// Build a lookup ref
    pub fn lookup(attribute: impl Into<EntitySpec>, value: impl Into<Value>) -> EntitySpec {
        EntitySpec::Lookup(Box::new(attribute.into()), value.into())
    }

    /// The tempid inside this spec, if it is one
    pub fn as_tempid(&self) -> Option<i64> {
        match self {
            EntitySpec::Id(id) if *id < 0 => Some(*id),
            _ => None,
        }
    }
}

impl From<i64> for EntitySpec {
    fn from(id: i64) -> Self {
        EntitySpec::Id(id)
    }
}

impl From<Keyword> for EntitySpec {
    fn from(kw: Keyword) -> Self {
        EntitySpec::Ident(kw)
    }
}

impl From<&str> for EntitySpec {
    fn from(name: &str) -> Self {
        EntitySpec::Ident(Keyword::new(name))
    }
}

impl Db {
    /// Resolve an entity spec to a raw id in this view
    ///
    /// Raw ids are validated to exist; idents and lookup refs scan AVET.
    /// Tempids are not resolvable here — they belong to the transactor.
    pub fn resolve(&self, spec: &EntitySpec) -> Result<i64> {
        match spec {
            EntitySpec::Id(id) => {
                if *id < 0 {
                    return Err(Error::InvalidSchema(format!(
                        "tempid {} outside a transaction",
                        id
                    )));
                }
                if self.entity_exists(*id)? {
                    Ok(*id)
                } else {
                    Err(Error::NotFound(format!("entity id {}", id)))
                }
            }
            EntitySpec::Ident(kw) => self
                .avet_entity(DB_IDENT, &Value::Keyword(kw.clone()))?
                .ok_or_else(|| Error::NotFound(kw.to_string())),
            EntitySpec::Lookup(attr_spec, v) => {
                let a = self.resolve(attr_spec)?;
                let attr = self.attribute(a)?;
                if attr.unique.is_none() {
                    return Err(Error::InvalidSchema(format!(
                        "lookup ref attribute {} is not unique",
                        attr.ident
                    )));
                }
                self.avet_entity(a, v)?
                    .ok_or_else(|| Error::NotFound(format!("[{} {:?}]", attr.ident, v)))
            }
        }
    }
}
