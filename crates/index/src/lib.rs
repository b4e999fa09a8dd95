//! Three-tier datom indexes for Datalith
//!
//! Each of the four orderings is served by a `MergedIndex`: a persistent
//! in-memory set of recent datoms layered over a durable, content-
//! addressed segment tree. Durable nodes are columnar, fetched through
//! the `ContentStore`/`BlockCodec` seams, and memoized in a `NodeCache`.
//!
//! - `MemoryIndex`: the mutable-in-spirit tier, one persistent set
//! - `SegmentedIndex`: the read-only tier plus its bulk builder
//! - `MergedIndex`: the sorted two-way merge readers actually scan

#![warn(missing_docs)]
#![warn(clippy::all)]

mod cache;
mod codec;
mod columns;
mod memory;
mod merged;
mod segment;
mod store;

pub use cache::{CachedBlock, NodeCache};
pub use codec::{BincodeBlockCodec, Block, BlockCodec};
pub use columns::Columns;
pub use memory::MemoryIndex;
pub use merged::{MergeIter, MergedIndex};
pub use segment::{Directory, Root, Segment, SegmentConfig, SegmentedIndex, SegmentedIter};
pub use store::{content_id, ContentStore, MemoryContentStore};
