use core::iter::FusedIterator;

use crate::error::TreeError;
use crate::raw::{Handle, MIN_ORDER, RawTree};

/// A B+-tree keyed by any totally ordered type.
///
/// Shares its engine with [`LongBPlusTree`](crate::LongBPlusTree); the
/// differences are the key type and the range contract: bounds are
/// optional, and the upper bound is exclusive.
///
/// # Examples
///
/// ```
/// use treedex::BPlusTree;
///
/// let mut tree = BPlusTree::new(8).unwrap();
/// tree.put("b", 2);
/// tree.put("a", 1);
/// tree.put("c", 3);
///
/// // unbounded start, exclusive end
/// let low: Vec<_> = tree.range(None, Some(&"c")).unwrap().collect();
/// assert_eq!(low, [&1, &2]);
/// ```
pub struct BPlusTree<K, V> {
    raw: RawTree<K, V>,
}

impl<K: Ord + Clone, V> BPlusTree<K, V> {
    /// Creates a tree of the given branching factor.
    ///
    /// # Errors
    ///
    /// [`TreeError::OrderTooSmall`] when `order < 3`.
    pub fn new(order: usize) -> Result<Self, TreeError> {
        if order < MIN_ORDER {
            return Err(TreeError::OrderTooSmall(order));
        }
        Ok(Self { raw: RawTree::new(order) })
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.raw.get(key)
    }

    /// Stores `value` under `key`, returning the displaced value when the
    /// key was already present.
    pub fn put(&mut self, key: K, value: V) -> Option<V> {
        self.raw.put(key, value)
    }

    /// Returns the value stored under `key`, inserting `supplier()` first
    /// when the key is absent. The supplier is not called on a hit.
    pub fn compute_if_absent(&mut self, key: K, supplier: impl FnOnce() -> V) -> &mut V {
        self.raw.compute_if_absent(key, supplier)
    }

    /// Removes `key`, returning its value. Absent keys are a no-op.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.raw.remove(key)
    }

    /// Iterates values in ascending key order, starting at `start` (or at
    /// the first leaf when `None`) and stopping before `end` (unbounded
    /// when `None`; the upper bound is exclusive).
    ///
    /// # Errors
    ///
    /// [`TreeError::InvalidRange`] when both bounds are given and
    /// `start > end`.
    pub fn range(&self, start: Option<&K>, end: Option<&K>) -> Result<Range<'_, K, V>, TreeError> {
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(TreeError::InvalidRange);
            }
        }
        let (leaf, index) = match start {
            Some(start) => self.raw.seek(start),
            None => (self.raw.level0(), 0),
        };
        Ok(Range { tree: &self.raw, leaf: Some(leaf), index, end: end.cloned() })
    }

    /// Every value in key order.
    pub fn get_all(&self) -> Vec<&V> {
        self.raw.get_all()
    }

    /// Removes all entries.
    pub fn clear(&mut self) {
        self.raw.clear();
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Height of the root above the leaves; 0 means the root is a leaf.
    pub fn height(&self) -> usize {
        self.raw.height()
    }

    /// The branching factor chosen at construction.
    pub fn order(&self) -> usize {
        self.raw.order()
    }
}

/// Forward cursor over the leaf chain produced by [`BPlusTree::range`].
/// The upper end is exclusive.
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct Range<'a, K, V> {
    tree: &'a RawTree<K, V>,
    leaf: Option<Handle>,
    index: usize,
    end: Option<K>,
}

impl<'a, K: Ord + Clone, V> Iterator for Range<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<&'a V> {
        let handle = self.leaf?;
        let leaf = self.tree.node(handle).as_leaf();
        let in_bound = self.index < leaf.count()
            && self.end.as_ref().is_none_or(|end| leaf.key(self.index) < end);
        if !in_bound {
            self.leaf = None;
            return None;
        }
        let value = leaf.value(self.index);
        self.index += 1;
        if self.index >= leaf.count() {
            // hop to the next leaf, skipping any drained ones
            self.index = 0;
            let mut next = leaf.next();
            while let Some(h) = next {
                if self.tree.node(h).count() > 0 {
                    break;
                }
                next = self.tree.node(h).as_leaf().next();
            }
            self.leaf = next;
        }
        Some(value)
    }
}

impl<K: Ord + Clone, V> FusedIterator for Range<'_, K, V> {}

#[cfg(test)]
mod tests {
    use rand::seq::SliceRandom;

    use super::*;
    use crate::error::TreeError;

    #[test]
    fn unbounded_start_exclusive_end() {
        let mut keys: Vec<i64> = (0..64).collect();
        keys.shuffle(&mut rand::thread_rng());

        let mut tree = BPlusTree::new(8).unwrap();
        for &key in &keys {
            tree.put(key, key);
        }
        assert_eq!(tree.len(), 64);

        // keys 0..15 inclusive: the upper bound itself is excluded
        let low: Vec<i64> = tree.range(None, Some(&16)).unwrap().copied().collect();
        assert_eq!(low, (0..16).collect::<Vec<_>>());
    }

    #[test]
    fn unbounded_end_runs_to_maximum() {
        let mut tree = BPlusTree::new(3).unwrap();
        for key in 0..32 {
            tree.put(key, key * 2);
        }
        let tail: Vec<i64> = tree.range(Some(&24), None).unwrap().copied().collect();
        assert_eq!(tail, (24..32).map(|k| k * 2).collect::<Vec<_>>());

        let all: Vec<i64> = tree.range(None, None).unwrap().copied().collect();
        assert_eq!(all.len(), 32);
    }

    #[test]
    fn string_keys() {
        let mut tree: BPlusTree<String, usize> = BPlusTree::new(4).unwrap();
        for word in ["pear", "apple", "quince", "fig", "date", "banana"] {
            tree.put(word.to_string(), word.len());
        }
        assert_eq!(tree.get(&"fig".to_string()), Some(&3));
        assert_eq!(tree.remove(&"apple".to_string()), Some(5));
        let lengths: Vec<usize> = tree.range(None, None).unwrap().copied().collect();
        // banana, date, fig, pear, quince
        assert_eq!(lengths, [6, 4, 3, 4, 6]);
    }

    #[test]
    fn invalid_arguments() {
        let mut tree: BPlusTree<i64, i64> = BPlusTree::new(4).unwrap();
        tree.put(1, 1);
        assert_eq!(tree.range(Some(&5), Some(&3)).err(), Some(TreeError::InvalidRange));
        assert_eq!(tree.len(), 1);
        assert_eq!(BPlusTree::<i64, i64>::new(0).err(), Some(TreeError::OrderTooSmall(0)));
    }

    #[test]
    fn compute_if_absent_round_trip() {
        let mut tree: BPlusTree<i64, String> = BPlusTree::new(5).unwrap();
        tree.compute_if_absent(999, || "zzz".into());
        assert_eq!(tree.get(&999).map(String::as_str), Some("zzz"));
        tree.compute_if_absent(999, || unreachable!("key already present"));
    }
}
