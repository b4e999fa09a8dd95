//! The durable, segmented index tier
//!
//! Read-only and paged: `Root -> [Directory] -> [Segment]`, every level
//! columnar. Boundary rows are inclusive maxima — row `i` of a level's
//! boundary columns is the largest datom in child `i`'s subtree. Blocks
//! are fetched by content id through the injected store/codec pair and
//! memoized in the node cache.
//!
//! `SegmentedIndex::build` is the write path: it flushes an
//! already-sorted datom stream into content-addressed blocks and returns
//! the index that reads them back.

use crate::cache::NodeCache;
use crate::codec::{Block, BlockCodec};
use crate::columns::Columns;
use crate::store::{content_id, ContentStore};
use datalith_core::{Datom, Error, IndexKind, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Leaf block: columnar datom rows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    /// The datom rows, sorted under the index's ordering
    pub rows: Columns,
}

/// Mid-level block: boundary summary plus child segment ids
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Directory {
    /// Row `i` = maximum datom of `segments[i]`
    pub boundaries: Columns,
    /// Content ids of child segments
    pub segments: Vec<String>,
}

/// Top block: boundary summary plus child directory ids
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Root {
    /// Row `i` = maximum datom of `directories[i]`
    pub boundaries: Columns,
    /// Content ids of child directories
    pub directories: Vec<String>,
}

/// Shape of freshly built index trees
#[derive(Debug, Clone)]
pub struct SegmentConfig {
    /// Datom rows per segment
    pub segment_size: usize,
    /// Children per directory (and directories per root)
    pub fanout: usize,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        SegmentConfig {
            segment_size: 512,
            fanout: 512,
        }
    }
}

/// Approximate routing over inclusive-maximum boundary keys
///
/// A lower-bound search can land one node too far right when the target
/// falls between two boundaries; back up when the previous node's
/// boundary already satisfies the target. Returns `None` when every
/// boundary orders before the target.
fn find_approx(boundaries: &Columns, target: &Datom, kind: IndexKind) -> Option<usize> {
    let mut idx = boundaries.lower_bound(target, kind);
    if idx > 0 && boundaries.cmp_row(idx - 1, target, kind) != Ordering::Less {
        idx -= 1;
    }
    if idx < boundaries.len() {
        Some(idx)
    } else {
        None
    }
}

/// The durable index tier for one ordering
#[derive(Clone)]
pub struct SegmentedIndex {
    kind: IndexKind,
    root: Option<Arc<Root>>,
    root_id: Option<String>,
    store: Arc<dyn ContentStore>,
    codec: Arc<dyn BlockCodec>,
    cache: Arc<NodeCache>,
}

impl fmt::Debug for SegmentedIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentedIndex")
            .field("kind", &self.kind)
            .field("root_id", &self.root_id)
            .finish()
    }
}

impl SegmentedIndex {
    /// An index with no durable data
    pub fn empty(kind: IndexKind) -> Self {
        SegmentedIndex {
            kind,
            root: None,
            root_id: None,
            store: Arc::new(crate::store::MemoryContentStore::new()),
            codec: Arc::new(crate::codec::BincodeBlockCodec),
            cache: Arc::new(NodeCache::new()),
        }
    }

    /// Open an index from a stored root block
    pub fn open(
        kind: IndexKind,
        root_id: &str,
        store: Arc<dyn ContentStore>,
        codec: Arc<dyn BlockCodec>,
        cache: Arc<NodeCache>,
    ) -> Result<Self> {
        let bytes = store.get(root_id)?;
        let root = match codec.decode(&bytes)? {
            Block::Root(root) => root,
            other => {
                return Err(Error::Corruption(format!(
                    "block {} is not a root (got {:?})",
                    root_id,
                    std::mem::discriminant(&other)
                )))
            }
        };
        Ok(SegmentedIndex {
            kind,
            root: Some(Arc::new(root)),
            root_id: Some(root_id.to_string()),
            store,
            codec,
            cache,
        })
    }

    /// Which ordering this index is sorted under
    pub fn kind(&self) -> IndexKind {
        self.kind
    }

    /// Content id of the root block, if the index has durable data
    pub fn root_id(&self) -> Option<&str> {
        self.root_id.as_deref()
    }

    /// Whether the index holds no durable datoms
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    fn directory(&self, id: &str) -> Result<Arc<Directory>> {
        self.cache.directory(id, &*self.store, &*self.codec)
    }

    fn segment(&self, id: &str) -> Result<Arc<Segment>> {
        self.cache.segment(id, &*self.store, &*self.codec)
    }

    /// Exact lookup of a datom equal to `target` under the ordering
    pub fn find(&self, target: &Datom) -> Result<Option<Datom>> {
        let Some(root) = &self.root else {
            return Ok(None);
        };
        let Some(di) = find_approx(&root.boundaries, target, self.kind) else {
            return Ok(None);
        };
        let dir = self.directory(&root.directories[di])?;
        let Some(si) = find_approx(&dir.boundaries, target, self.kind) else {
            return Ok(None);
        };
        let seg = self.segment(&dir.segments[si])?;
        let row = seg.rows.lower_bound(target, self.kind);
        if row < seg.rows.len() && seg.rows.cmp_row(row, target, self.kind) == Ordering::Equal {
            Ok(Some(seg.rows.datom_at(row)))
        } else {
            Ok(None)
        }
    }

    /// Ascending iterator over datoms in `[start, end]`
    ///
    /// Resolves the blocks covering the range through the cache when the
    /// slice is opened; iteration itself cannot fail.
    pub fn slice(&self, start: &Datom, end: &Datom) -> Result<SegmentedIter> {
        let mut segments = Vec::new();
        if let Some(root) = &self.root {
            let first_dir = find_approx(&root.boundaries, start, self.kind);
            if let Some(first_dir) = first_dir {
                'dirs: for di in first_dir..root.directories.len() {
                    // Everything in directory di orders after boundary
                    // di-1; once that boundary reaches `end` we are done.
                    if di > first_dir
                        && root.boundaries.cmp_row(di - 1, end, self.kind) != Ordering::Less
                    {
                        break;
                    }
                    let dir = self.directory(&root.directories[di])?;
                    let first_seg = if di == first_dir {
                        match find_approx(&dir.boundaries, start, self.kind) {
                            Some(si) => si,
                            None => continue,
                        }
                    } else {
                        0
                    };
                    for si in first_seg..dir.segments.len() {
                        if si > first_seg
                            && dir.boundaries.cmp_row(si - 1, end, self.kind) != Ordering::Less
                        {
                            break 'dirs;
                        }
                        segments.push(self.segment(&dir.segments[si])?);
                    }
                }
            }
        }
        Ok(SegmentedIter::new(self.kind, segments, start, end.clone()))
    }

    /// The largest datom in `[start, end]`, if any
    ///
    /// The reverse bound query: used to seed id counters from the tail
    /// of a partition's range without scanning it.
    pub fn last_in_range(&self, start: &Datom, end: &Datom) -> Result<Option<Datom>> {
        let Some(root) = &self.root else {
            return Ok(None);
        };
        // Candidate = last directory whose subtree may hold rows <= end.
        let di_cap = root.boundaries.lower_bound(end, self.kind);
        let mut di = di_cap.min(root.directories.len().saturating_sub(1));
        loop {
            let dir = self.directory(&root.directories[di])?;
            let si_cap = dir.boundaries.lower_bound(end, self.kind);
            let mut si = si_cap.min(dir.segments.len().saturating_sub(1));
            loop {
                let seg = self.segment(&dir.segments[si])?;
                let after = seg.rows.upper_bound(end, self.kind);
                if after > 0 {
                    let datom = seg.rows.datom_at(after - 1);
                    if self.kind.cmp(&datom, start) == Ordering::Less {
                        return Ok(None);
                    }
                    return Ok(Some(datom));
                }
                if si == 0 {
                    break;
                }
                si -= 1;
            }
            if di == 0 {
                return Ok(None);
            }
            di -= 1;
        }
    }

    /// Flush a sorted datom stream into content-addressed blocks
    ///
    /// The stream must already be sorted under `kind`'s ordering. Returns
    /// the index reading the freshly written tree; an empty stream yields
    /// an empty index.
    pub fn build(
        kind: IndexKind,
        datoms: impl IntoIterator<Item = Datom>,
        store: Arc<dyn ContentStore>,
        codec: Arc<dyn BlockCodec>,
        cache: Arc<NodeCache>,
        config: &SegmentConfig,
    ) -> Result<SegmentedIndex> {
        let mut seg_ids: Vec<String> = Vec::new();
        let mut seg_bounds: Vec<Datom> = Vec::new();
        let mut rows = Columns::new();

        let flush = |rows: &mut Columns,
                     seg_ids: &mut Vec<String>,
                     seg_bounds: &mut Vec<Datom>|
         -> Result<()> {
            if rows.is_empty() {
                return Ok(());
            }
            let bound = rows.datom_at(rows.len() - 1);
            let block = Block::Segment(Segment {
                rows: std::mem::take(rows),
            });
            let bytes = codec.encode(&block)?;
            let id = content_id(&bytes);
            store.put(&id, bytes)?;
            seg_ids.push(id);
            seg_bounds.push(bound);
            Ok(())
        };

        for d in datoms {
            rows.push(&d);
            if rows.len() >= config.segment_size {
                flush(&mut rows, &mut seg_ids, &mut seg_bounds)?;
            }
        }
        flush(&mut rows, &mut seg_ids, &mut seg_bounds)?;

        if seg_ids.is_empty() {
            return Ok(SegmentedIndex {
                kind,
                root: None,
                root_id: None,
                store,
                codec,
                cache,
            });
        }

        let mut dir_ids: Vec<String> = Vec::new();
        let mut dir_bounds: Vec<Datom> = Vec::new();
        for group_start in (0..seg_ids.len()).step_by(config.fanout) {
            let group_end = (group_start + config.fanout).min(seg_ids.len());
            let mut boundaries = Columns::new();
            for bound in &seg_bounds[group_start..group_end] {
                boundaries.push(bound);
            }
            let dir = Directory {
                boundaries,
                segments: seg_ids[group_start..group_end].to_vec(),
            };
            let bytes = codec.encode(&Block::Directory(dir))?;
            let id = content_id(&bytes);
            store.put(&id, bytes)?;
            dir_ids.push(id);
            dir_bounds.push(seg_bounds[group_end - 1].clone());
        }

        let mut boundaries = Columns::new();
        for bound in &dir_bounds {
            boundaries.push(bound);
        }
        let root = Root {
            boundaries,
            directories: dir_ids,
        };
        let bytes = codec.encode(&Block::Root(root.clone()))?;
        let root_id = content_id(&bytes);
        store.put(&root_id, bytes)?;

        debug!(
            kind = ?kind,
            segments = seg_ids.len(),
            root = %root_id,
            "built segmented index"
        );

        Ok(SegmentedIndex {
            kind,
            root: Some(Arc::new(root)),
            root_id: Some(root_id),
            store,
            codec,
            cache,
        })
    }
}

/// Ascending iterator over a resolved block range
pub struct SegmentedIter {
    kind: IndexKind,
    segments: Vec<Arc<Segment>>,
    seg: usize,
    row: usize,
    end: Datom,
    done: bool,
}

impl SegmentedIter {
    fn new(kind: IndexKind, segments: Vec<Arc<Segment>>, start: &Datom, end: Datom) -> Self {
        // Only the first segment can hold rows before `start`.
        let row = segments
            .first()
            .map(|seg| seg.rows.lower_bound(start, kind))
            .unwrap_or(0);
        SegmentedIter {
            kind,
            segments,
            seg: 0,
            row,
            end,
            done: false,
        }
    }
}

impl Iterator for SegmentedIter {
    type Item = Datom;

    fn next(&mut self) -> Option<Datom> {
        if self.done {
            return None;
        }
        loop {
            let seg = self.segments.get(self.seg)?;
            if self.row >= seg.rows.len() {
                self.seg += 1;
                self.row = 0;
                continue;
            }
            if seg.rows.cmp_row(self.row, &self.end, self.kind) == Ordering::Greater {
                self.done = true;
                return None;
            }
            let datom = seg.rows.datom_at(self.row);
            self.row += 1;
            return Some(datom);
        }
    }
}
