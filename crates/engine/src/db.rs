//! Immutable database snapshots
//!
//! A `Db` is a value: four merged indexes, a basis time, and optional
//! view modifiers. Every accessor that looks like mutation (`as_of`,
//! `since`, `history`, `filter`, `with_datoms`) returns a new `Db`
//! sharing structure with the old one; a snapshot handed to a reader can
//! never change underneath it.
//!
//! Reads compose the view filters in a fixed order: the `since` window,
//! the `as_of` window, the retraction collapse (skipped for `history`
//! views), then the user filter. The collapse leans on the index
//! ordering: within one (e,a,v) group transactions sort newest-first
//! with retractions before assertions, so a retraction's partner is the
//! very next datom — but the partner is verified, not trusted, because
//! a window filter may have dropped it.

use crate::bootstrap::{genesis_datoms, TX_BASE};
use datalith_core::schema::{
    value_type_of_ident, BUILTIN_AVET, BUILTIN_VAET, CARDINALITY_MANY, CARDINALITY_ONE,
    DB_CARDINALITY, DB_IDENT, DB_INDEX, DB_INSTALL_ATTRIBUTE, DB_INSTALL_PARTITION,
    DB_NO_HISTORY, DB_UNIQUE, DB_VALUE_TYPE, UNIQUE_IDENTITY, UNIQUE_VALUE,
};
use datalith_core::{
    Attribute, Cardinality, Datom, Error, IndexKind, Partition, Result, Unique, Value,
};
use datalith_index::{MergeIter, MergedIndex};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::fmt;
use std::iter::Peekable;
use std::sync::Arc;
use tracing::debug;

/// User-supplied datom predicate for filtered views
pub type DatomFilter = dyn Fn(&Db, &Datom) -> bool + Send + Sync;

/// Attributes whose datoms change schema derivation
const SCHEMA_ATTRS: [i64; 8] = [
    DB_IDENT,
    DB_INSTALL_PARTITION,
    DB_INSTALL_ATTRIBUTE,
    DB_VALUE_TYPE,
    DB_CARDINALITY,
    DB_UNIQUE,
    DB_INDEX,
    DB_NO_HISTORY,
];

/// An immutable point-in-time view of the database
#[derive(Clone)]
pub struct Db {
    eavt: MergedIndex,
    aevt: MergedIndex,
    avet: MergedIndex,
    vaet: MergedIndex,
    basis_t: i64,
    next_t: i64,
    as_of: Option<i64>,
    since: Option<i64>,
    history: bool,
    filter: Option<Arc<DatomFilter>>,
    attrs: Arc<RwLock<FxHashMap<i64, Arc<Attribute>>>>,
}

impl fmt::Debug for Db {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Db")
            .field("basis_t", &self.basis_t)
            .field("next_t", &self.next_t)
            .field("as_of", &self.as_of)
            .field("since", &self.since)
            .field("history", &self.history)
            .field("filtered", &self.filter.is_some())
            .finish()
    }
}

impl Db {
    fn empty() -> Db {
        Db {
            eavt: MergedIndex::new(IndexKind::Eavt),
            aevt: MergedIndex::new(IndexKind::Aevt),
            avet: MergedIndex::new(IndexKind::Avet),
            vaet: MergedIndex::new(IndexKind::Vaet),
            basis_t: 0,
            next_t: 0,
            as_of: None,
            since: None,
            history: false,
            filter: None,
            attrs: Arc::new(RwLock::new(FxHashMap::default())),
        }
    }

    /// The genesis snapshot: built-in schema installed at t = 0
    pub fn bootstrap() -> Result<Db> {
        Db::empty().with_datoms(&genesis_datoms())
    }

    /// Basis time of this snapshot (the t of its last transaction)
    pub fn basis_t(&self) -> i64 {
        self.basis_t
    }

    /// The t the next transaction will get
    pub fn next_t(&self) -> i64 {
        self.next_t
    }

    /// The merged index sorted under `kind`
    pub fn index(&self, kind: IndexKind) -> &MergedIndex {
        match kind {
            IndexKind::Eavt => &self.eavt,
            IndexKind::Aevt => &self.aevt,
            IndexKind::Avet => &self.avet,
            IndexKind::Vaet => &self.vaet,
        }
    }

    /// View of the database as of time `t` (inclusive)
    pub fn as_of(&self, t: i64) -> Db {
        let mut db = self.clone();
        db.as_of = Some(t);
        // Schema may differ at t; don't inherit derived attributes
        db.attrs = Arc::new(RwLock::new(FxHashMap::default()));
        db
    }

    /// View keeping only datoms from time `t` (inclusive) onward
    pub fn since(&self, t: i64) -> Db {
        let mut db = self.clone();
        db.since = Some(t);
        db
    }

    /// View exposing retractions and superseded assertions
    pub fn history(&self) -> Db {
        let mut db = self.clone();
        db.history = true;
        db
    }

    /// View restricted by a datom predicate; chained filters AND
    pub fn filter(&self, f: impl Fn(&Db, &Datom) -> bool + Send + Sync + 'static) -> Db {
        let mut db = self.clone();
        db.filter = Some(match self.filter.clone() {
            Some(prev) => {
                let f = Arc::new(f);
                Arc::new(move |db: &Db, d: &Datom| prev(db, d) && f(db, d))
            }
            None => Arc::new(f),
        });
        db
    }

    /// All datoms visible through this view, in `kind`'s order
    pub fn datoms(&self, kind: IndexKind) -> Result<DatomIter<'_>> {
        self.datoms_range(kind, &Datom::min(), &Datom::max())
    }

    /// Datoms in `[start, end]` visible through this view
    pub fn datoms_range(&self, kind: IndexKind, start: &Datom, end: &Datom) -> Result<DatomIter<'_>> {
        Ok(DatomIter {
            db: self,
            inner: self.index(kind).slice(start, end)?.peekable(),
            since: self.since,
            as_of: self.as_of,
            history: self.history,
            use_filter: true,
        })
    }

    /// A new snapshot with a validated batch routed into the indexes
    ///
    /// Every datom lands in EAVT and AEVT; AVET and VAET membership
    /// follows the attribute's schema, falling back to the built-in
    /// routing sets while the attribute's own schema is still being
    /// installed. The batch is trusted — validation is the transactor's
    /// job.
    pub fn with_datoms(&self, datoms: &[Datom]) -> Result<Db> {
        let mut avet_rows: Vec<&Datom> = Vec::new();
        let mut vaet_rows: Vec<&Datom> = Vec::new();
        let mut touches_schema = false;
        for d in datoms {
            if SCHEMA_ATTRS.contains(&d.a) {
                touches_schema = true;
            }
            let (avet, vaet) = self.routes(d.a)?;
            if avet {
                avet_rows.push(d);
            }
            if vaet {
                vaet_rows.push(d);
            }
        }
        debug!(
            t = self.next_t,
            datoms = datoms.len(),
            avet = avet_rows.len(),
            vaet = vaet_rows.len(),
            "routing batch"
        );
        Ok(Db {
            eavt: self.eavt.add_datoms(datoms),
            aevt: self.aevt.add_datoms(datoms),
            avet: self.avet.add_datoms(avet_rows),
            vaet: self.vaet.add_datoms(vaet_rows),
            basis_t: self.next_t,
            next_t: self.next_t + 1,
            as_of: self.as_of,
            since: self.since,
            history: self.history,
            filter: self.filter.clone(),
            attrs: if touches_schema {
                Arc::new(RwLock::new(FxHashMap::default()))
            } else {
                self.attrs.clone()
            },
        })
    }

    fn routes(&self, a: i64) -> Result<(bool, bool)> {
        match self.attribute(a) {
            Ok(attr) => Ok((attr.avet_member(), attr.vaet_member())),
            Err(Error::UnknownAttribute(_)) => {
                Ok((BUILTIN_AVET.contains(&a), BUILTIN_VAET.contains(&a)))
            }
            Err(e) => Err(e),
        }
    }

    /// Schema metadata for an attribute, derived from its own datoms
    ///
    /// Cached per snapshot; the cache is shared by views that cannot
    /// change derivation (`since`, `history`, `filter`) and replaced by
    /// those that can (`as_of`, schema-touching transactions).
    pub fn attribute(&self, id: i64) -> Result<Arc<Attribute>> {
        if let Some(hit) = self.attrs.read().get(&id) {
            return Ok(hit.clone());
        }
        let attr = Arc::new(self.derive_attribute(id)?);
        self.attrs.write().insert(id, attr.clone());
        Ok(attr)
    }

    fn derive_attribute(&self, id: i64) -> Result<Attribute> {
        let mut ident = None;
        let mut value_type = None;
        let mut cardinality = Cardinality::One;
        let mut unique = None;
        let mut indexed = false;
        let mut no_history = false;
        // Current facts about the attribute entity: the snapshot's own
        // as_of applies, the other modifiers never do.
        let iter = DatomIter {
            db: self,
            inner: self
                .eavt
                .slice(&Datom::entity_low(id), &Datom::entity_high(id))?
                .peekable(),
            since: None,
            as_of: self.as_of,
            history: false,
            use_filter: false,
        };
        let mut seen = false;
        for d in iter {
            seen = true;
            match d.a {
                DB_IDENT => ident = d.v.as_keyword().cloned(),
                DB_VALUE_TYPE => {
                    let target = d.v.as_ref_id().ok_or_else(|| {
                        Error::InvalidSchema(format!("non-ref :db/valueType on {}", id))
                    })?;
                    value_type = Some(value_type_of_ident(target)?);
                }
                DB_CARDINALITY => {
                    cardinality = match d.v.as_ref_id() {
                        Some(CARDINALITY_ONE) => Cardinality::One,
                        Some(CARDINALITY_MANY) => Cardinality::Many,
                        _ => {
                            return Err(Error::InvalidSchema(format!(
                                "bad :db/cardinality on {}: {:?}",
                                id, d.v
                            )))
                        }
                    };
                }
                DB_UNIQUE => {
                    unique = match d.v.as_ref_id() {
                        Some(UNIQUE_VALUE) => Some(Unique::Value),
                        Some(UNIQUE_IDENTITY) => Some(Unique::Identity),
                        _ => {
                            return Err(Error::InvalidSchema(format!(
                                "bad :db/unique on {}: {:?}",
                                id, d.v
                            )))
                        }
                    };
                }
                DB_INDEX => indexed = matches!(d.v, Value::Bool(true)),
                DB_NO_HISTORY => no_history = matches!(d.v, Value::Bool(true)),
                _ => {}
            }
        }
        let Some(value_type) = value_type else {
            // No :db/valueType: the id is not an installed attribute
            return Err(Error::UnknownAttribute(id));
        };
        let Some(ident) = ident else {
            if !seen {
                return Err(Error::UnknownAttribute(id));
            }
            return Err(Error::InvalidSchema(format!(
                "attribute {} has :db/valueType but no :db/ident",
                id
            )));
        };
        Ok(Attribute {
            id,
            ident,
            value_type,
            cardinality,
            unique,
            indexed,
            no_history,
        })
    }

    /// The entity currently holding `(a, v)`, via AVET
    pub(crate) fn avet_entity(&self, a: i64, v: &Value) -> Result<Option<i64>> {
        let mut iter = self.datoms_range(
            IndexKind::Avet,
            &Datom::av_low(a, v.clone()),
            &Datom::av_high(a, v.clone()),
        )?;
        Ok(iter.next().map(|d| d.e))
    }

    /// Whether `(e, a, v)` is a current fact in this view
    pub(crate) fn holds(&self, e: i64, a: i64, v: &Value) -> Result<bool> {
        let mut iter = self.datoms_range(IndexKind::Eavt, &Datom::ea_low(e, a), &Datom::ea_high(e, a))?;
        Ok(iter.any(|d| d.v == *v))
    }

    /// Current values of `(e, a)` in this view
    pub(crate) fn values(&self, e: i64, a: i64) -> Result<Vec<Value>> {
        let iter = self.datoms_range(IndexKind::Eavt, &Datom::ea_low(e, a), &Datom::ea_high(e, a))?;
        Ok(iter.map(|d| d.v).collect())
    }

    /// Whether the entity has any current datoms in this view
    pub(crate) fn entity_exists(&self, e: i64) -> Result<bool> {
        let mut iter =
            self.datoms_range(IndexKind::Eavt, &Datom::entity_low(e), &Datom::entity_high(e))?;
        Ok(iter.next().is_some())
    }

    /// Highest entity id ever used in a partition, across all tiers
    ///
    /// Scans the raw index, not the view: retracted entities still
    /// reserve their ids.
    pub(crate) fn max_entity_id(&self, partition: Partition) -> Result<Option<i64>> {
        let last = self.eavt.last_in_range(
            &Datom::entity_low(partition.base()),
            &Datom::entity_high(partition.end() - 1),
        )?;
        Ok(last.map(|d| d.e))
    }
}

/// Iterator over the datoms visible through a view
pub struct DatomIter<'a> {
    db: &'a Db,
    inner: Peekable<MergeIter<'a>>,
    since: Option<i64>,
    as_of: Option<i64>,
    history: bool,
    use_filter: bool,
}

fn in_window(since: Option<i64>, as_of: Option<i64>, d: &Datom) -> bool {
    if let Some(t) = since {
        if d.tx < TX_BASE + t {
            return false;
        }
    }
    if let Some(t) = as_of {
        if d.tx > TX_BASE + t {
            return false;
        }
    }
    true
}

impl Iterator for DatomIter<'_> {
    type Item = Datom;

    fn next(&mut self) -> Option<Datom> {
        let (since, as_of) = (self.since, self.as_of);
        loop {
            let d = self.inner.next()?;
            if !in_window(since, as_of, &d) {
                continue;
            }
            if !self.history && !d.added {
                // Collapse the retraction with its partner assertion.
                // The partner must actually be there: equal (e,a,v) and
                // inside the window. A lone retraction is dropped alone.
                let partner = self.inner.peek().is_some_and(|nx| {
                    nx.added
                        && nx.e == d.e
                        && nx.a == d.a
                        && nx.v == d.v
                        && in_window(since, as_of, nx)
                });
                if partner {
                    self.inner.next();
                }
                continue;
            }
            if self.use_filter {
                if let Some(f) = &self.db.filter {
                    if !f(self.db, &d) {
                        continue;
                    }
                }
            }
            return Some(d);
        }
    }
}
