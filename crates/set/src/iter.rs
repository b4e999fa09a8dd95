//! Path-encoded cursors and range iteration
//!
//! An iterator position is a `u64` encoding the root-to-leaf descent as
//! base-256 digits, one per tree level (`LEVEL_SHIFT` = 8 bits per level,
//! at most `MAX_HEIGHT` = 8 levels — a hard invariant of the chosen
//! width). The leaf offset lives in the lowest digit, the root's child
//! index in the highest used digit, so paths within one tree compare
//! numerically in key order.
//!
//! `next_path`/`prev_path` advance a cursor one key at a time by
//! incrementing the lowest digit and cascading a carry/borrow upward,
//! re-descending to the leftmost/rightmost leaf of a newly entered
//! subtree. The iterator caches the current leaf's key slice so
//! consecutive steps stay inside the leaf until it is exhausted.

use crate::node::Node;
use crate::set::Set;
use crate::LEVEL_SHIFT;

#[inline]
fn digit(path: u64, level: usize) -> usize {
    ((path >> (level as u32 * LEVEL_SHIFT)) & 0xFF) as usize
}

#[inline]
fn with_digit(path: u64, level: usize, idx: usize) -> u64 {
    let shift = level as u32 * LEVEL_SHIFT;
    (path & !(0xFFu64 << shift)) | ((idx as u64) << shift)
}

/// Mask covering the lowest `levels` digits
#[inline]
fn low_mask(levels: usize) -> u64 {
    if levels >= 8 {
        u64::MAX
    } else {
        (1u64 << (levels as u32 * LEVEL_SHIFT)) - 1
    }
}

impl<K: Clone> Set<K> {
    /// The leaf key slice containing `path`
    pub(crate) fn leaf_slice(&self, path: u64) -> &[K] {
        let mut node = self.root.as_ref();
        let mut level = self.height - 1;
        loop {
            match node {
                Node::Branch { children, .. } => {
                    node = children[digit(path, level)].as_ref();
                    level -= 1;
                }
                Node::Leaf(keys) => return keys,
            }
        }
    }

    /// Path of the first key, if any
    pub(crate) fn first_path(&self) -> Option<u64> {
        if self.len == 0 {
            None
        } else {
            Some(0)
        }
    }

    /// Path of the last key, if any
    pub(crate) fn last_path(&self) -> Option<u64> {
        if self.len == 0 {
            return None;
        }
        Some(rightmost_under(self.root.as_ref(), 0, self.height - 1))
    }

    /// Advance a path one key forward
    pub(crate) fn next_path(&self, path: u64) -> Option<u64> {
        next_path_in(self.root.as_ref(), path, self.height - 1)
    }

    /// Advance a path one key backward
    pub(crate) fn prev_path(&self, path: u64) -> Option<u64> {
        prev_path_in(self.root.as_ref(), path, self.height - 1)
    }

    /// Leftmost position with key >= `key` (or > when `strict`)
    pub(crate) fn seek(&self, key: &K, strict: bool) -> Option<u64> {
        if self.len == 0 {
            return None;
        }
        let mut node = self.root.as_ref();
        let mut path = 0u64;
        let mut level = self.height - 1;
        loop {
            match node {
                Node::Branch { keys, children } => {
                    let idx = if strict {
                        Node::upper_bound(keys, key, self.cmp)
                    } else {
                        Node::lower_bound(keys, key, self.cmp)
                    };
                    if idx >= children.len() {
                        return None;
                    }
                    path = with_digit(path, level, idx);
                    node = children[idx].as_ref();
                    level -= 1;
                }
                Node::Leaf(keys) => {
                    let idx = if strict {
                        Node::upper_bound(keys, key, self.cmp)
                    } else {
                        Node::lower_bound(keys, key, self.cmp)
                    };
                    if idx >= keys.len() {
                        return None;
                    }
                    return Some(with_digit(path, 0, idx));
                }
            }
        }
    }

    /// Rightmost position with key <= `key`
    pub(crate) fn rseek(&self, key: &K) -> Option<u64> {
        match self.seek(key, true) {
            Some(after) => self.prev_path(after),
            None => self.last_path(),
        }
    }
}

fn next_path_in<K: Clone>(node: &Node<K>, path: u64, level: usize) -> Option<u64> {
    match node {
        Node::Leaf(keys) => {
            let idx = digit(path, 0);
            if idx + 1 < keys.len() {
                Some(with_digit(path, 0, idx + 1))
            } else {
                None
            }
        }
        Node::Branch { children, .. } => {
            let idx = digit(path, level);
            if let Some(p) = next_path_in(children[idx].as_ref(), path, level - 1) {
                return Some(p);
            }
            if idx + 1 < children.len() {
                // Carry into this level; lower digits reset to the
                // leftmost leaf of the newly entered subtree.
                Some((path & !low_mask(level + 1)) | with_digit(0, level, idx + 1))
            } else {
                None
            }
        }
    }
}

fn prev_path_in<K: Clone>(node: &Node<K>, path: u64, level: usize) -> Option<u64> {
    match node {
        Node::Leaf(_) => {
            let idx = digit(path, 0);
            if idx > 0 {
                Some(with_digit(path, 0, idx - 1))
            } else {
                None
            }
        }
        Node::Branch { children, .. } => {
            let idx = digit(path, level);
            if let Some(p) = prev_path_in(children[idx].as_ref(), path, level - 1) {
                return Some(p);
            }
            if idx > 0 {
                let base = (path & !low_mask(level + 1)) | with_digit(0, level, idx - 1);
                Some(rightmost_under(children[idx - 1].as_ref(), base, level - 1))
            } else {
                None
            }
        }
    }
}

/// Fill digits `level..0` of `path` with the rightmost descent of `node`
fn rightmost_under<K: Clone>(node: &Node<K>, path: u64, level: usize) -> u64 {
    match node {
        Node::Leaf(keys) => with_digit(path, 0, keys.len() - 1),
        Node::Branch { children, .. } => {
            let last = children.len() - 1;
            rightmost_under(
                children[last].as_ref(),
                with_digit(path, level, last),
                level - 1,
            )
        }
    }
}

/// Double-ended cursor iterator over a [`Set`]
///
/// Bounds are inclusive paths; the iterator is exhausted once the front
/// cursor passes the back cursor. Both ends cache their current leaf.
pub struct SetIter<'a, K> {
    set: &'a Set<K>,
    front: Option<u64>,
    back: Option<u64>,
    front_leaf: Option<(u64, &'a [K])>,
    back_leaf: Option<(u64, &'a [K])>,
}

impl<'a, K: Clone> SetIter<'a, K> {
    pub(crate) fn full(set: &'a Set<K>) -> Self {
        SetIter {
            set,
            front: set.first_path(),
            back: set.last_path(),
            front_leaf: None,
            back_leaf: None,
        }
    }

    pub(crate) fn range(set: &'a Set<K>, from: &K, to: &K) -> Self {
        let front = set.seek(from, false);
        let back = set.rseek(to);
        match (front, back) {
            (Some(f), Some(b)) if f <= b => SetIter {
                set,
                front: Some(f),
                back: Some(b),
                front_leaf: None,
                back_leaf: None,
            },
            _ => SetIter {
                set,
                front: None,
                back: None,
                front_leaf: None,
                back_leaf: None,
            },
        }
    }
}

impl<'a, K: Clone> Iterator for SetIter<'a, K> {
    type Item = &'a K;

    fn next(&mut self) -> Option<&'a K> {
        let f = self.front?;
        let b = self.back?;
        if f > b {
            self.front = None;
            return None;
        }
        let base = f & !0xFF;
        if self.front_leaf.map_or(true, |(cached, _)| cached != base) {
            self.front_leaf = Some((base, self.set.leaf_slice(f)));
        }
        let keys = self.front_leaf.expect("leaf cached above").1;
        let off = (f & 0xFF) as usize;
        let item = &keys[off];
        if off + 1 < keys.len() {
            self.front = Some(f + 1);
        } else {
            self.front = self.set.next_path(f);
            self.front_leaf = None;
        }
        Some(item)
    }
}

impl<'a, K: Clone> DoubleEndedIterator for SetIter<'a, K> {
    fn next_back(&mut self) -> Option<&'a K> {
        let f = self.front?;
        let b = self.back?;
        if f > b {
            self.back = None;
            return None;
        }
        let base = b & !0xFF;
        if self.back_leaf.map_or(true, |(cached, _)| cached != base) {
            self.back_leaf = Some((base, self.set.leaf_slice(b)));
        }
        let keys = self.back_leaf.expect("leaf cached above").1;
        let off = (b & 0xFF) as usize;
        let item = &keys[off];
        if off > 0 {
            self.back = Some(b - 1);
        } else {
            self.back = self.set.prev_path(b);
            self.back_leaf = None;
        }
        Some(item)
    }
}
