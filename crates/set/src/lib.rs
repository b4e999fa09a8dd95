//! Persistent ordered set for Datalith
//!
//! The physical structure behind every index: an immutable B+-tree keyed
//! by a caller-supplied comparator. All operations are O(log n) and
//! non-mutating; writes share untouched subtrees with the previous
//! version, so a snapshot holds its view of the tree for free.
//!
//! - `Set`: conj / disj / lookup / iter / slice
//! - `Node`: the closed leaf/branch sum type
//! - `SetIter`: double-ended, path-encoded cursor iterator

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::cmp::Ordering;

mod iter;
mod node;
mod set;

pub use iter::SetIter;
pub use node::Node;
pub use set::Set;

/// Comparator the tree is keyed by
pub type Cmp<K> = fn(&K, &K) -> Ordering;

/// Minimum occupancy of a non-root node; at or below this a delete
/// rebalances
pub const MIN_LEN: usize = 64;

/// Maximum node occupancy; above this an insert splits
pub const MAX_LEN: usize = 128;

/// Bits of cursor path per tree level
pub const LEVEL_SHIFT: u32 = 8;

/// Maximum tree depth expressible in a cursor path
pub const MAX_HEIGHT: usize = 8;
