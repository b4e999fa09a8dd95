//! Read-through node cache
//!
//! Decoded directory and segment blocks are cached by content id. The
//! cache is an explicit object owned by whoever opens segmented indexes
//! (not a process-wide singleton), with an injectable backing store and
//! codec at each fetch. Entries are immutable once inserted and never
//! invalidated — segments never change after being written. Eviction is
//! an extension point; the current policy is to keep everything.

use crate::codec::{Block, BlockCodec};
use crate::segment::{Directory, Segment};
use crate::store::ContentStore;
use dashmap::DashMap;
use datalith_core::{Error, Result};
use std::sync::Arc;
use tracing::trace;

/// A decoded, cacheable block
#[derive(Debug, Clone)]
pub enum CachedBlock {
    /// Mid-level directory node
    Directory(Arc<Directory>),
    /// Leaf segment node
    Segment(Arc<Segment>),
}

/// Concurrent id → decoded-node memo
#[derive(Debug, Default)]
pub struct NodeCache {
    entries: DashMap<String, CachedBlock>,
}

impl NodeCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached nodes
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fetch a directory by id, loading through the store on a miss
    pub fn directory(
        &self,
        id: &str,
        store: &dyn ContentStore,
        codec: &dyn BlockCodec,
    ) -> Result<Arc<Directory>> {
        match self.load(id, store, codec)? {
            CachedBlock::Directory(dir) => Ok(dir),
            CachedBlock::Segment(_) => Err(Error::Corruption(format!(
                "block {} is a segment where a directory was expected",
                id
            ))),
        }
    }

    /// Fetch a segment by id, loading through the store on a miss
    pub fn segment(
        &self,
        id: &str,
        store: &dyn ContentStore,
        codec: &dyn BlockCodec,
    ) -> Result<Arc<Segment>> {
        match self.load(id, store, codec)? {
            CachedBlock::Segment(seg) => Ok(seg),
            CachedBlock::Directory(_) => Err(Error::Corruption(format!(
                "block {} is a directory where a segment was expected",
                id
            ))),
        }
    }

    fn load(
        &self,
        id: &str,
        store: &dyn ContentStore,
        codec: &dyn BlockCodec,
    ) -> Result<CachedBlock> {
        if let Some(hit) = self.entries.get(id) {
            return Ok(hit.value().clone());
        }
        trace!(id, "node cache miss");
        let bytes = store.get(id)?;
        let cached = match codec.decode(&bytes)? {
            Block::Directory(dir) => CachedBlock::Directory(Arc::new(dir)),
            Block::Segment(seg) => CachedBlock::Segment(Arc::new(seg)),
            Block::Root(_) => {
                return Err(Error::Corruption(format!(
                    "root block {} referenced below the root level",
                    id
                )))
            }
        };
        self.entries.insert(id.to_string(), cached.clone());
        Ok(cached)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::BincodeBlockCodec;
    use crate::columns::Columns;
    use crate::store::{content_id, MemoryContentStore};
    use datalith_core::Datom;

    fn store_segment(store: &MemoryContentStore, datoms: &[Datom]) -> String {
        let mut rows = Columns::new();
        for d in datoms {
            rows.push(d);
        }
        let bytes = BincodeBlockCodec
            .encode(&Block::Segment(Segment { rows }))
            .unwrap();
        let id = content_id(&bytes);
        store.put(&id, bytes).unwrap();
        id
    }

    #[test]
    fn test_read_through_and_memo() {
        let store = MemoryContentStore::new();
        let id = store_segment(&store, &[Datom::new(1, 1, "x", 100, true)]);

        let cache = NodeCache::new();
        assert!(cache.is_empty());
        let seg = cache.segment(&id, &store, &BincodeBlockCodec).unwrap();
        assert_eq!(seg.rows.len(), 1);
        assert_eq!(cache.len(), 1);

        // Second fetch is a hit; same underlying node
        let again = cache.segment(&id, &store, &BincodeBlockCodec).unwrap();
        assert!(Arc::ptr_eq(&seg, &again));
    }

    #[test]
    fn test_wrong_kind_is_corruption() {
        let store = MemoryContentStore::new();
        let id = store_segment(&store, &[Datom::new(1, 1, "x", 100, true)]);
        let cache = NodeCache::new();
        assert!(matches!(
            cache.directory(&id, &store, &BincodeBlockCodec),
            Err(Error::Corruption(_))
        ));
    }

    #[test]
    fn test_missing_block_is_fatal() {
        let cache = NodeCache::new();
        let store = MemoryContentStore::new();
        assert!(matches!(
            cache.segment("nope", &store, &BincodeBlockCodec),
            Err(Error::Storage(_))
        ));
    }
}
