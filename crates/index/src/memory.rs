//! The in-memory index tier
//!
//! A persistent sorted set of datoms under one ordering. Holds everything
//! transacted since the last durable flush; updates return a new index
//! sharing structure with the old one, so snapshots stay cheap.
//!
//! Retractions live in the index as first-class datoms. A retraction is
//! not a deletion of its assertion: both rows are kept, sorted adjacent
//! by the tx-descending tail of the ordering, and the current view
//! cancels them pairwise at read time.

use datalith_core::{Datom, IndexKind};
use datalith_set::{Set, SetIter};

/// One ordering's in-memory datom set
#[derive(Debug, Clone)]
pub struct MemoryIndex {
    kind: IndexKind,
    set: Set<Datom>,
}

impl MemoryIndex {
    /// An empty index under `kind`'s ordering
    pub fn new(kind: IndexKind) -> Self {
        MemoryIndex {
            kind,
            set: Set::new(kind.comparator()),
        }
    }

    /// Which ordering this index is sorted under
    pub fn kind(&self) -> IndexKind {
        self.kind
    }

    /// Number of datoms held
    pub fn len(&self) -> usize {
        self.set.len()
    }

    /// Whether the index holds no datoms
    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// A new index with `datoms` added, leaving `self` untouched
    pub fn add_datoms<'a>(&self, datoms: impl IntoIterator<Item = &'a Datom>) -> MemoryIndex {
        let mut set = self.set.clone();
        for d in datoms {
            set = set.conj(d.clone());
        }
        MemoryIndex {
            kind: self.kind,
            set,
        }
    }

    /// Exact lookup of a datom equal to `target` under the ordering
    pub fn find(&self, target: &Datom) -> Option<&Datom> {
        self.set.lookup(target)
    }

    /// Ascending iterator over datoms in `[start, end]`
    pub fn slice(&self, start: &Datom, end: &Datom) -> SetIter<'_, Datom> {
        self.set.slice(start, end)
    }

    /// The largest datom in `[start, end]`, if any
    pub fn last_in_range(&self, start: &Datom, end: &Datom) -> Option<Datom> {
        self.set.slice(start, end).next_back().cloned()
    }
}
