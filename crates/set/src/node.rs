//! B+-tree nodes
//!
//! A node is a closed two-variant sum type: a leaf holding a sorted run
//! of keys, or a branch holding parallel `keys`/`children` arrays where
//! `keys[i]` is the maximum key in `children[i]`'s subtree. The node kind
//! set is fixed; split/merge logic exhaustively matches both cases.
//!
//! Nodes are immutable once built. A write clones only the nodes along
//! the touched root-to-leaf path; untouched subtrees are shared between
//! the old and new tree through `Arc`.

use crate::{Cmp, MAX_LEN, MIN_LEN};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;

/// One tree node: sorted leaf or branch with per-child maxima
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Node<K> {
    /// Sorted array of keys
    Leaf(Vec<K>),
    /// Parallel arrays: `keys[i]` = max key of `children[i]`
    Branch {
        /// Maximum key of each child subtree
        keys: Vec<K>,
        /// Child nodes, shared via Arc
        children: Vec<Arc<Node<K>>>,
    },
}

/// Outcome of a node-level insert
pub(crate) enum Inserted<K> {
    /// An equal key already exists; the tree is unchanged
    Present,
    /// The node was replaced by one new node
    One(Node<K>),
    /// The node overflowed and split into two
    Two(Node<K>, Node<K>),
}

impl<K: Clone> Node<K> {
    /// Number of keys (leaf) or children (branch)
    pub fn len(&self) -> usize {
        match self {
            Node::Leaf(keys) => keys.len(),
            Node::Branch { children, .. } => children.len(),
        }
    }

    /// Whether the node holds nothing
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum key of the subtree rooted here
    pub fn max_key(&self) -> Option<&K> {
        match self {
            Node::Leaf(keys) => keys.last(),
            Node::Branch { keys, .. } => keys.last(),
        }
    }

    /// Index of the first slot whose key is not less than `key`
    pub(crate) fn lower_bound(keys: &[K], key: &K, cmp: Cmp<K>) -> usize {
        keys.partition_point(|k| cmp(k, key) == Ordering::Less)
    }

    /// Index of the first slot whose key is greater than `key`
    pub(crate) fn upper_bound(keys: &[K], key: &K, cmp: Cmp<K>) -> usize {
        keys.partition_point(|k| cmp(k, key) != Ordering::Greater)
    }

    /// Insert `key` into the subtree, returning the replacement node(s)
    pub(crate) fn insert(&self, key: &K, cmp: Cmp<K>) -> Inserted<K> {
        match self {
            Node::Leaf(keys) => {
                let idx = Self::lower_bound(keys, key, cmp);
                if idx < keys.len() && cmp(&keys[idx], key) == Ordering::Equal {
                    return Inserted::Present;
                }
                let mut new_keys = Vec::with_capacity(keys.len() + 1);
                new_keys.extend_from_slice(&keys[..idx]);
                new_keys.push(key.clone());
                new_keys.extend_from_slice(&keys[idx..]);
                if new_keys.len() > MAX_LEN {
                    let right = new_keys.split_off(new_keys.len() / 2);
                    Inserted::Two(Node::Leaf(new_keys), Node::Leaf(right))
                } else {
                    Inserted::One(Node::Leaf(new_keys))
                }
            }
            Node::Branch { keys, children } => {
                // Descend into the first child whose max covers the key;
                // a key beyond every max goes into the last child.
                let idx = Self::lower_bound(keys, key, cmp).min(children.len() - 1);
                match children[idx].insert(key, cmp) {
                    Inserted::Present => Inserted::Present,
                    Inserted::One(child) => {
                        let mut new_keys = keys.clone();
                        let mut new_children = children.clone();
                        new_keys[idx] = child
                            .max_key()
                            .expect("insert cannot produce an empty node")
                            .clone();
                        new_children[idx] = Arc::new(child);
                        Inserted::One(Node::Branch {
                            keys: new_keys,
                            children: new_children,
                        })
                    }
                    Inserted::Two(left, right) => {
                        let mut new_keys = keys.clone();
                        let mut new_children = children.clone();
                        new_keys[idx] = right
                            .max_key()
                            .expect("split cannot produce an empty node")
                            .clone();
                        new_children[idx] = Arc::new(right);
                        new_keys.insert(
                            idx,
                            left.max_key()
                                .expect("split cannot produce an empty node")
                                .clone(),
                        );
                        new_children.insert(idx, Arc::new(left));
                        if new_children.len() > MAX_LEN {
                            let mid = new_children.len() / 2;
                            let right_keys = new_keys.split_off(mid);
                            let right_children = new_children.split_off(mid);
                            Inserted::Two(
                                Node::Branch {
                                    keys: new_keys,
                                    children: new_children,
                                },
                                Node::Branch {
                                    keys: right_keys,
                                    children: right_children,
                                },
                            )
                        } else {
                            Inserted::One(Node::Branch {
                                keys: new_keys,
                                children: new_children,
                            })
                        }
                    }
                }
            }
        }
    }

    /// Remove `key` from the subtree
    ///
    /// Returns `None` when the key is absent. Underflow of a child is
    /// repaired here, at the parent: the shrunken child rebalances against
    /// an adjacent sibling, merging when the two fit in one node and
    /// otherwise redistributing evenly (`merge_n_split`).
    pub(crate) fn remove(&self, key: &K, cmp: Cmp<K>) -> Option<Node<K>> {
        match self {
            Node::Leaf(keys) => {
                let idx = Self::lower_bound(keys, key, cmp);
                if idx >= keys.len() || cmp(&keys[idx], key) != Ordering::Equal {
                    return None;
                }
                let mut new_keys = Vec::with_capacity(keys.len() - 1);
                new_keys.extend_from_slice(&keys[..idx]);
                new_keys.extend_from_slice(&keys[idx + 1..]);
                Some(Node::Leaf(new_keys))
            }
            Node::Branch { keys, children } => {
                let idx = Self::lower_bound(keys, key, cmp);
                if idx >= children.len() {
                    return None;
                }
                let child = children[idx].remove(key, cmp)?;

                let mut new_keys = keys.clone();
                let mut new_children = children.clone();

                if child.len() > MIN_LEN || children.len() == 1 {
                    new_keys[idx] = match child.max_key() {
                        Some(k) => k.clone(),
                        // Only a lone child may drain completely; keep the
                        // stale boundary, the caller collapses the root.
                        None => return Some(Node::Leaf(Vec::new())),
                    };
                    new_children[idx] = Arc::new(child);
                    return Some(Node::Branch {
                        keys: new_keys,
                        children: new_children,
                    });
                }

                // Rebalance against the smaller adjacent sibling.
                let sib = pick_sibling(children, idx);
                let (lo, hi) = if sib < idx { (sib, idx) } else { (idx, sib) };
                let (left, right) = if sib < idx {
                    (children[sib].as_ref(), &child)
                } else {
                    (&child, children[sib].as_ref())
                };

                if left.len() + right.len() <= MAX_LEN {
                    let merged = Node::merge(left, right);
                    new_keys[lo] = merged
                        .max_key()
                        .expect("merge of a non-empty pair cannot be empty")
                        .clone();
                    new_children[lo] = Arc::new(merged);
                    new_keys.remove(hi);
                    new_children.remove(hi);
                } else {
                    let (a, b) = Node::merge_n_split(left, right);
                    new_keys[lo] = a
                        .max_key()
                        .expect("redistribution cannot produce an empty node")
                        .clone();
                    new_keys[hi] = b
                        .max_key()
                        .expect("redistribution cannot produce an empty node")
                        .clone();
                    new_children[lo] = Arc::new(a);
                    new_children[hi] = Arc::new(b);
                }
                Some(Node::Branch {
                    keys: new_keys,
                    children: new_children,
                })
            }
        }
    }

    /// Concatenate two same-level siblings into one node
    fn merge(left: &Node<K>, right: &Node<K>) -> Node<K> {
        match (left, right) {
            (Node::Leaf(a), Node::Leaf(b)) => {
                let mut keys = Vec::with_capacity(a.len() + b.len());
                keys.extend_from_slice(a);
                keys.extend_from_slice(b);
                Node::Leaf(keys)
            }
            (
                Node::Branch { keys: ak, children: ac },
                Node::Branch { keys: bk, children: bc },
            ) => {
                let mut keys = Vec::with_capacity(ak.len() + bk.len());
                keys.extend_from_slice(ak);
                keys.extend_from_slice(bk);
                let mut children = Vec::with_capacity(ac.len() + bc.len());
                children.extend_from_slice(ac);
                children.extend_from_slice(bc);
                Node::Branch { keys, children }
            }
            _ => unreachable!("siblings at the same level must share a kind"),
        }
    }

    /// Concatenate two siblings and re-split the result evenly
    fn merge_n_split(left: &Node<K>, right: &Node<K>) -> (Node<K>, Node<K>) {
        let merged = Node::merge(left, right);
        match merged {
            Node::Leaf(mut keys) => {
                let tail = keys.split_off(keys.len() / 2);
                (Node::Leaf(keys), Node::Leaf(tail))
            }
            Node::Branch {
                mut keys,
                mut children,
            } => {
                let mid = children.len() / 2;
                let tail_keys = keys.split_off(mid);
                let tail_children = children.split_off(mid);
                (
                    Node::Branch { keys, children },
                    Node::Branch {
                        keys: tail_keys,
                        children: tail_children,
                    },
                )
            }
        }
    }

    /// Find the stored key equal to `key`, if present
    pub(crate) fn get<'a>(&'a self, key: &K, cmp: Cmp<K>) -> Option<&'a K> {
        match self {
            Node::Leaf(keys) => {
                let idx = Self::lower_bound(keys, key, cmp);
                if idx < keys.len() && cmp(&keys[idx], key) == Ordering::Equal {
                    Some(&keys[idx])
                } else {
                    None
                }
            }
            Node::Branch { keys, children } => {
                let idx = Self::lower_bound(keys, key, cmp);
                if idx >= children.len() {
                    return None;
                }
                children[idx].get(key, cmp)
            }
        }
    }
}

/// Choose the adjacent sibling to rebalance with (the smaller one when
/// both exist)
fn pick_sibling<K: Clone>(children: &[Arc<Node<K>>], idx: usize) -> usize {
    match (idx.checked_sub(1), idx + 1 < children.len()) {
        (Some(l), true) => {
            if children[l].len() <= children[idx + 1].len() {
                l
            } else {
                idx + 1
            }
        }
        (Some(l), false) => l,
        (None, true) => idx + 1,
        (None, false) => unreachable!("rebalance requires at least two children"),
    }
}
