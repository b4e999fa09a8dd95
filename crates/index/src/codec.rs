//! Block codec seam
//!
//! Durable nodes cross the storage boundary as opaque tagged records.
//! The engine depends only on this trait; the wire format is pluggable.
//! `BincodeBlockCodec` is the default implementation.

use crate::segment::{Directory, Root, Segment};
use datalith_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// A self-tagged durable record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Block {
    /// Leaf of the segmented index: columnar datom rows
    Segment(Segment),
    /// Mid level: columnar boundary summary plus child segment ids
    Directory(Directory),
    /// Top level: columnar boundary summary plus child directory ids
    Root(Root),
}

/// Encode/decode for durable blocks
///
/// Implementations must be `Send + Sync`; blocks are encoded once and
/// decoded read-only, so no versioning handshake exists beyond the tag.
pub trait BlockCodec: Send + Sync {
    /// Serialize a block
    fn encode(&self, block: &Block) -> Result<Vec<u8>>;

    /// Deserialize a block
    fn decode(&self, bytes: &[u8]) -> Result<Block>;
}

/// Default codec: bincode over the serde derives
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeBlockCodec;

impl BlockCodec for BincodeBlockCodec {
    fn encode(&self, block: &Block) -> Result<Vec<u8>> {
        bincode::serialize(block).map_err(|e| Error::Storage(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Block> {
        bincode::deserialize(bytes).map_err(|e| Error::Storage(e.to_string()))
    }
}
