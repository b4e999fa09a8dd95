//! The persistent ordered set
//!
//! An immutable B+-tree keyed by a caller-supplied comparator. Every
//! write returns a new `Set` sharing all untouched subtrees with the
//! previous version; a previously returned `Set` is never mutated, so any
//! number of threads may read old and new versions concurrently without
//! locks.

use crate::iter::SetIter;
use crate::node::{Inserted, Node};
use crate::{Cmp, MAX_HEIGHT};
use datalith_core::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Immutable ordered set backed by a persistent B+-tree
#[derive(Debug, Clone)]
pub struct Set<K> {
    pub(crate) root: Arc<Node<K>>,
    pub(crate) cmp: Cmp<K>,
    pub(crate) len: usize,
    /// Tree levels; 1 = the root is a leaf
    pub(crate) height: usize,
}

/// Wire form of a set: level shift, count, root
#[derive(Serialize)]
struct SetDataRef<'a, K: Serialize> {
    shift: u8,
    len: u64,
    root: &'a Node<K>,
}

#[derive(Deserialize)]
#[serde(bound = "K: DeserializeOwned")]
struct SetData<K> {
    shift: u8,
    len: u64,
    root: Node<K>,
}

impl<K: Clone> Set<K> {
    /// Create an empty set ordered by `cmp`
    pub fn new(cmp: Cmp<K>) -> Self {
        Set {
            root: Arc::new(Node::Leaf(Vec::new())),
            cmp,
            len: 0,
            height: 1,
        }
    }

    /// Number of keys in the set
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The comparator this set orders by
    pub fn comparator(&self) -> Cmp<K> {
        self.cmp
    }

    /// Insert a key, returning the new set
    ///
    /// No-op (returns a shallow clone) when an equal key already exists.
    /// A split that reaches the root grows the tree one level; the root
    /// is the only node exempt from minimum occupancy.
    pub fn conj(&self, key: K) -> Set<K> {
        match self.root.insert(&key, self.cmp) {
            Inserted::Present => self.clone(),
            Inserted::One(root) => Set {
                root: Arc::new(root),
                cmp: self.cmp,
                len: self.len + 1,
                height: self.height,
            },
            Inserted::Two(left, right) => {
                let keys = vec![
                    left.max_key().expect("split half cannot be empty").clone(),
                    right.max_key().expect("split half cannot be empty").clone(),
                ];
                let root = Node::Branch {
                    keys,
                    children: vec![Arc::new(left), Arc::new(right)],
                };
                debug_assert!(self.height + 1 <= MAX_HEIGHT, "path width exhausted");
                Set {
                    root: Arc::new(root),
                    cmp: self.cmp,
                    len: self.len + 1,
                    height: self.height + 1,
                }
            }
        }
    }

    /// Remove a key if present, returning the new set
    ///
    /// A branch root left with a single child drops a tree level.
    pub fn disj(&self, key: &K) -> Set<K> {
        let Some(mut root) = self.root.remove(key, self.cmp) else {
            return self.clone();
        };
        let mut height = self.height;
        loop {
            match root {
                Node::Branch { ref children, .. } if children.len() == 1 => {
                    let child = children[0].as_ref().clone();
                    root = child;
                    height -= 1;
                }
                _ => break,
            }
        }
        Set {
            root: Arc::new(root),
            cmp: self.cmp,
            len: self.len - 1,
            height,
        }
    }

    /// Find the stored key equal to `key` under the set's comparator
    pub fn lookup(&self, key: &K) -> Option<&K> {
        self.root.get(key, self.cmp)
    }

    /// Whether an equal key is present
    pub fn contains(&self, key: &K) -> bool {
        self.lookup(key).is_some()
    }

    /// Ascending iterator over every key
    pub fn iter(&self) -> SetIter<'_, K> {
        SetIter::full(self)
    }

    /// Ascending iterator over keys in `[from, to]`
    ///
    /// Positions are resolved with `seek`/`rseek`; no data is copied.
    pub fn slice(&self, from: &K, to: &K) -> SetIter<'_, K> {
        SetIter::range(self, from, to)
    }
}

impl<K: Clone + Serialize> Set<K> {
    /// Serialize the tree (shift, count, root)
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let data = SetDataRef {
            shift: ((self.height - 1) * 8) as u8,
            len: self.len as u64,
            root: self.root.as_ref(),
        };
        bincode::serialize(&data).map_err(|e| Error::Storage(e.to_string()))
    }
}

impl<K: Clone + DeserializeOwned> Set<K> {
    /// Deserialize a tree written by [`Set::to_bytes`]
    ///
    /// The comparator is not part of the wire form; the caller supplies
    /// the same ordering the set was built with.
    pub fn from_bytes(bytes: &[u8], cmp: Cmp<K>) -> Result<Set<K>> {
        let data: SetData<K> =
            bincode::deserialize(bytes).map_err(|e| Error::Storage(e.to_string()))?;
        let height = (data.shift / 8) as usize + 1;
        if height > MAX_HEIGHT {
            return Err(Error::Corruption(format!(
                "set height {} exceeds the {}-level path width",
                height, MAX_HEIGHT
            )));
        }
        Ok(Set {
            root: Arc::new(data.root),
            cmp,
            len: data.len as usize,
            height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    fn int_cmp(a: &i64, b: &i64) -> Ordering {
        a.cmp(b)
    }

    fn set_of(keys: impl IntoIterator<Item = i64>) -> Set<i64> {
        let mut s = Set::new(int_cmp);
        for k in keys {
            s = s.conj(k);
        }
        s
    }

    #[test]
    fn test_empty() {
        let s: Set<i64> = Set::new(int_cmp);
        assert_eq!(s.len(), 0);
        assert!(s.is_empty());
        assert_eq!(s.iter().count(), 0);
        assert!(s.lookup(&1).is_none());
    }

    #[test]
    fn test_conj_dedups() {
        let s = set_of([3, 1, 2, 1, 3]);
        assert_eq!(s.len(), 3);
        let collected: Vec<i64> = s.iter().copied().collect();
        assert_eq!(collected, vec![1, 2, 3]);
    }

    #[test]
    fn test_conj_is_nonmutating() {
        let s1 = set_of([1, 2, 3]);
        let s2 = s1.conj(4);
        assert!(s1.lookup(&4).is_none());
        assert!(s2.lookup(&4).is_some());
        assert_eq!(s1.len(), 3);
        assert_eq!(s2.len(), 4);
    }

    #[test]
    fn test_disj_is_nonmutating() {
        let s1 = set_of([1, 2, 3]);
        let s2 = s1.disj(&2);
        assert!(s1.lookup(&2).is_some());
        assert!(s2.lookup(&2).is_none());
        assert_eq!(s2.len(), 2);
    }

    #[test]
    fn test_conj_disj_inverse() {
        let s = set_of(0..500);
        let round = s.conj(1000).disj(&1000);
        assert_eq!(round.len(), s.len());
        let a: Vec<i64> = s.iter().copied().collect();
        let b: Vec<i64> = round.iter().copied().collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_large_ascending_insert_splits() {
        let n = 10_000i64;
        let s = set_of(0..n);
        assert_eq!(s.len(), n as usize);
        assert!(s.height > 1, "tree must have split");
        let collected: Vec<i64> = s.iter().copied().collect();
        assert_eq!(collected, (0..n).collect::<Vec<_>>());
    }

    #[test]
    fn test_large_descending_insert() {
        let n = 5_000i64;
        let s = set_of((0..n).rev());
        assert_eq!(s.len(), n as usize);
        let collected: Vec<i64> = s.iter().copied().collect();
        assert_eq!(collected, (0..n).collect::<Vec<_>>());
    }

    #[test]
    fn test_delete_down_to_empty() {
        let mut s = set_of(0..1_000);
        for k in 0..1_000 {
            s = s.disj(&k);
        }
        assert_eq!(s.len(), 0);
        assert_eq!(s.iter().count(), 0);
        assert_eq!(s.height, 1);
    }

    #[test]
    fn test_delete_triggers_rebalance() {
        // Grow past several splits, then delete every other key so
        // underflow forces merges and redistributions.
        let n = 4_096i64;
        let mut s = set_of(0..n);
        for k in (0..n).step_by(2) {
            s = s.disj(&k);
        }
        assert_eq!(s.len(), (n / 2) as usize);
        let collected: Vec<i64> = s.iter().copied().collect();
        assert_eq!(collected, (1..n).step_by(2).collect::<Vec<_>>());
    }

    #[test]
    fn test_disj_absent_key_is_noop() {
        let s = set_of([1, 2, 3]);
        let s2 = s.disj(&99);
        assert_eq!(s2.len(), 3);
        assert_eq!(
            s.iter().copied().collect::<Vec<_>>(),
            s2.iter().copied().collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_slice() {
        let s = set_of(0..1_000);
        let got: Vec<i64> = s.slice(&100, &199).copied().collect();
        assert_eq!(got, (100..200).collect::<Vec<_>>());
    }

    #[test]
    fn test_slice_bounds_between_keys() {
        let s = set_of((0..100).map(|i| i * 10));
        // Neither bound is present in the set
        let got: Vec<i64> = s.slice(&15, &44).copied().collect();
        assert_eq!(got, vec![20, 30, 40]);
    }

    #[test]
    fn test_slice_empty_range() {
        let s = set_of((0..100).map(|i| i * 10));
        assert_eq!(s.slice(&11, &19).count(), 0);
        assert_eq!(s.slice(&2_000, &3_000).count(), 0);
    }

    #[test]
    fn test_reverse_iteration() {
        let s = set_of(0..2_000);
        let rev: Vec<i64> = s.iter().rev().copied().collect();
        assert_eq!(rev, (0..2_000).rev().collect::<Vec<_>>());
    }

    #[test]
    fn test_reverse_slice() {
        let s = set_of(0..1_000);
        let rev: Vec<i64> = s.slice(&10, &20).rev().copied().collect();
        assert_eq!(rev, (10..=20).rev().collect::<Vec<_>>());
    }

    #[test]
    fn test_meet_in_the_middle() {
        let s = set_of(0..10);
        let mut it = s.iter();
        assert_eq!(it.next(), Some(&0));
        assert_eq!(it.next_back(), Some(&9));
        assert_eq!(it.next(), Some(&1));
        assert_eq!(it.next_back(), Some(&8));
        let rest: Vec<i64> = it.copied().collect();
        assert_eq!(rest, vec![2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_structural_sharing_keeps_old_version_alive() {
        let s1 = set_of(0..3_000);
        let mut s2 = s1.clone();
        for k in 0..1_500 {
            s2 = s2.disj(&k);
        }
        // Old version still sees everything
        assert_eq!(s1.len(), 3_000);
        assert_eq!(s1.iter().count(), 3_000);
        assert_eq!(s2.iter().count(), 1_500);
    }

    #[test]
    fn test_serialize_roundtrip() {
        let s = set_of(0..2_500);
        let bytes = s.to_bytes().unwrap();
        let back = Set::from_bytes(&bytes, int_cmp).unwrap();
        assert_eq!(back.len(), s.len());
        let a: Vec<i64> = s.iter().copied().collect();
        let b: Vec<i64> = back.iter().copied().collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_serialize_empty() {
        let s: Set<i64> = Set::new(int_cmp);
        let bytes = s.to_bytes().unwrap();
        let back = Set::from_bytes(&bytes, int_cmp).unwrap();
        assert_eq!(back.len(), 0);
        assert_eq!(back.iter().count(), 0);
    }
}
