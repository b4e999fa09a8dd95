//! Lazy entity projection
//!
//! `Db::entity` wraps an id in an `Entity` without touching the indexes;
//! attribute values are read on first access and memoized per attribute.
//! Reference-typed values come back as nested `Entity` views, themselves
//! lazy, so cyclic references cost nothing until followed.

use crate::db::Db;
use datalith_core::schema::DB_IDENT;
use datalith_core::{Cardinality, Error, Keyword, Result, Value, ValueType};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

/// A projected attribute value
#[derive(Debug, Clone)]
pub enum EntityValue {
    /// A scalar value of a non-ref attribute
    Scalar(Value),
    /// A reference, resolved to a lazy view of the target
    Ref(Entity),
    /// All current values of a cardinality-many attribute
    Many(Vec<EntityValue>),
}

impl EntityValue {
    /// The scalar value, if this is one
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            EntityValue::Scalar(v) => Some(v),
            _ => None,
        }
    }

    /// The referenced entity, if this is a ref
    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            EntityValue::Ref(e) => Some(e),
            _ => None,
        }
    }

    /// The value collection, if this is cardinality-many
    pub fn as_many(&self) -> Option<&[EntityValue]> {
        match self {
            EntityValue::Many(vs) => Some(vs),
            _ => None,
        }
    }
}

/// A lazy, memoized view of one entity in one snapshot
#[derive(Clone)]
pub struct Entity {
    db: Db,
    id: i64,
    cache: Arc<Mutex<FxHashMap<i64, Option<EntityValue>>>>,
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity").field("id", &self.id).finish()
    }
}

impl Db {
    /// A lazy view of the entity with this id
    pub fn entity(&self, id: i64) -> Entity {
        Entity {
            db: self.clone(),
            id,
            cache: Arc::new(Mutex::new(FxHashMap::default())),
        }
    }
}

impl Entity {
    /// The entity's id
    pub fn id(&self) -> i64 {
        self.id
    }

    /// The snapshot this view reads from
    pub fn db(&self) -> &Db {
        &self.db
    }

    /// Current value(s) of the named attribute, or `None` when absent
    pub fn get(&self, attribute: &Keyword) -> Result<Option<EntityValue>> {
        let a = self
            .db
            .avet_entity(DB_IDENT, &Value::Keyword(attribute.clone()))?
            .ok_or_else(|| Error::NotFound(attribute.to_string()))?;
        if let Some(hit) = self.cache.lock().get(&a) {
            return Ok(hit.clone());
        }
        let attr = self.db.attribute(a)?;
        let values = self.db.values(self.id, a)?;
        let project = |v: Value| match (attr.value_type, v.as_ref_id()) {
            (ValueType::Ref, Some(target)) => EntityValue::Ref(self.db.entity(target)),
            _ => EntityValue::Scalar(v),
        };
        let out = match attr.cardinality {
            Cardinality::One => values.into_iter().next().map(project),
            Cardinality::Many => {
                if values.is_empty() {
                    None
                } else {
                    Some(EntityValue::Many(values.into_iter().map(project).collect()))
                }
            }
        };
        self.cache.lock().insert(a, out.clone());
        Ok(out)
    }
}
