//! Merged view over the memory and segmented tiers
//!
//! Readers see one logically sorted index per ordering. A merged scan
//! interleaves the in-memory set with the durable tree; when both sides
//! hold a datom at the same ordering position, the memory side wins and
//! the durable copy is skipped, so a re-transacted datom never appears
//! twice.

use crate::memory::MemoryIndex;
use crate::segment::{SegmentedIndex, SegmentedIter};
use datalith_core::{Datom, IndexKind, Result};
use datalith_set::SetIter;
use std::cmp::Ordering;
use std::iter::Peekable;

/// One ordering's full index: memory tier over durable tier
#[derive(Debug, Clone)]
pub struct MergedIndex {
    kind: IndexKind,
    memory: MemoryIndex,
    segmented: SegmentedIndex,
}

impl MergedIndex {
    /// An empty index under `kind`'s ordering
    pub fn new(kind: IndexKind) -> Self {
        MergedIndex {
            kind,
            memory: MemoryIndex::new(kind),
            segmented: SegmentedIndex::empty(kind),
        }
    }

    /// Assemble an index from its two tiers
    ///
    /// Both tiers must be sorted under the same ordering.
    pub fn from_parts(memory: MemoryIndex, segmented: SegmentedIndex) -> Self {
        debug_assert_eq!(memory.kind(), segmented.kind());
        MergedIndex {
            kind: memory.kind(),
            memory,
            segmented,
        }
    }

    /// Which ordering this index is sorted under
    pub fn kind(&self) -> IndexKind {
        self.kind
    }

    /// The in-memory tier
    pub fn memory(&self) -> &MemoryIndex {
        &self.memory
    }

    /// The durable tier
    pub fn segmented(&self) -> &SegmentedIndex {
        &self.segmented
    }

    /// Number of datoms in the memory tier
    pub fn memory_len(&self) -> usize {
        self.memory.len()
    }

    /// A new index with `datoms` added to the memory tier
    pub fn add_datoms<'a>(&self, datoms: impl IntoIterator<Item = &'a Datom>) -> MergedIndex {
        MergedIndex {
            kind: self.kind,
            memory: self.memory.add_datoms(datoms),
            segmented: self.segmented.clone(),
        }
    }

    /// Exact lookup of a datom equal to `target` under the ordering
    pub fn find(&self, target: &Datom) -> Result<Option<Datom>> {
        if let Some(d) = self.memory.find(target) {
            return Ok(Some(d.clone()));
        }
        self.segmented.find(target)
    }

    /// Ascending merged iterator over datoms in `[start, end]`
    pub fn slice(&self, start: &Datom, end: &Datom) -> Result<MergeIter<'_>> {
        Ok(MergeIter {
            kind: self.kind,
            memory: self.memory.slice(start, end).peekable(),
            segmented: self.segmented.slice(start, end)?.peekable(),
        })
    }

    /// The largest datom in `[start, end]` across both tiers, if any
    pub fn last_in_range(&self, start: &Datom, end: &Datom) -> Result<Option<Datom>> {
        let mem = self.memory.last_in_range(start, end);
        let seg = self.segmented.last_in_range(start, end)?;
        Ok(match (mem, seg) {
            (Some(m), Some(s)) => {
                if self.kind.cmp(&m, &s) == Ordering::Less {
                    Some(s)
                } else {
                    Some(m)
                }
            }
            (m, s) => m.or(s),
        })
    }
}

/// Sorted two-way merge of the memory and durable tiers
pub struct MergeIter<'a> {
    kind: IndexKind,
    memory: Peekable<SetIter<'a, Datom>>,
    segmented: Peekable<SegmentedIter>,
}

impl Iterator for MergeIter<'_> {
    type Item = Datom;

    fn next(&mut self) -> Option<Datom> {
        match (self.memory.peek(), self.segmented.peek()) {
            (Some(m), Some(s)) => match self.kind.cmp(m, s) {
                Ordering::Less => self.memory.next().cloned(),
                Ordering::Greater => self.segmented.next(),
                Ordering::Equal => {
                    // Memory shadows durable
                    self.segmented.next();
                    self.memory.next().cloned()
                }
            },
            (Some(_), None) => self.memory.next().cloned(),
            (None, Some(_)) => self.segmented.next(),
            (None, None) => None,
        }
    }
}
