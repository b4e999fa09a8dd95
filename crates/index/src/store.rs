//! Content-addressed block storage
//!
//! The segmented index fetches serialized nodes by content id through the
//! `ContentStore` trait. A miss is fatal to the read in progress: the id
//! was derived from bytes that were written, so absence means the backing
//! store lost data.

use dashmap::DashMap;
use datalith_core::{Error, Result};
use xxhash_rust::xxh3::xxh3_64;

/// Key/value store addressed by content id
///
/// Implementations must be `Send + Sync`; blocks are immutable once
/// written, so no invalidation protocol exists.
pub trait ContentStore: Send + Sync {
    /// Fetch the bytes stored under `id`
    fn get(&self, id: &str) -> Result<Vec<u8>>;

    /// Store bytes under `id`
    fn put(&self, id: &str, bytes: Vec<u8>) -> Result<()>;
}

/// Derive the content id for a block of bytes
pub fn content_id(bytes: &[u8]) -> String {
    format!("{:016x}", xxh3_64(bytes))
}

/// In-process content store backed by a concurrent map
#[derive(Debug, Default)]
pub struct MemoryContentStore {
    blocks: DashMap<String, Vec<u8>>,
}

impl MemoryContentStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blocks held
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the store holds no blocks
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

impl ContentStore for MemoryContentStore {
    fn get(&self, id: &str) -> Result<Vec<u8>> {
        self.blocks
            .get(id)
            .map(|e| e.value().clone())
            .ok_or_else(|| Error::Storage(format!("content store miss: {}", id)))
    }

    fn put(&self, id: &str, bytes: Vec<u8>) -> Result<()> {
        self.blocks.insert(id.to_string(), bytes);
        Ok(())
    }
}
