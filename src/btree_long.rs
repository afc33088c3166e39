use core::iter::FusedIterator;

use crate::error::TreeError;
use crate::raw::{Handle, MIN_ORDER, RawTree};

/// A B+-tree keyed by primitive 64-bit integers.
///
/// Values live in the leaves; leaves chain forward in key order, so range
/// scans are a binary descent followed by a linear walk. The branching
/// factor is chosen at construction.
///
/// # Examples
///
/// ```
/// use treedex::LongBPlusTree;
///
/// let mut tree = LongBPlusTree::new(8).unwrap();
/// tree.put(3, "three");
/// tree.put(1, "one");
/// tree.put(2, "two");
///
/// assert_eq!(tree.get(2), Some(&"two"));
/// let in_order: Vec<_> = tree.range(1, 2).unwrap().collect();
/// assert_eq!(in_order, [&"one", &"two"]);
/// ```
pub struct LongBPlusTree<V> {
    raw: RawTree<i64, V>,
}

impl<V> LongBPlusTree<V> {
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
    pub fn get(&self, key: i64) -> Option<&V> {
        self.raw.get(&key)
    }

    /// Stores `value` under `key`, returning the displaced value when the
    /// key was already present.
    pub fn put(&mut self, key: i64, value: V) -> Option<V> {
        self.raw.put(key, value)
    }

    /// Returns the value stored under `key`, inserting `supplier()` first
    /// when the key is absent. The supplier is not called on a hit.
    pub fn compute_if_absent(&mut self, key: i64, supplier: impl FnOnce() -> V) -> &mut V {
        self.raw.compute_if_absent(key, supplier)
    }

    /// Removes `key`, returning its value. Absent keys are a no-op.
    pub fn remove(&mut self, key: i64) -> Option<V> {
        self.raw.remove(&key)
    }

    /// Iterates the values whose keys fall within `start..=end` (both ends
    /// inclusive), in ascending key order.
    ///
    /// # Errors
    ///
    /// [`TreeError::InvalidRange`] when `start > end`.
    pub fn range(&self, start: i64, end: i64) -> Result<Range<'_, V>, TreeError> {
        if start > end {
            return Err(TreeError::InvalidRange);
        }
        let (leaf, index) = self.raw.seek(&start);
        Ok(Range { tree: &self.raw, leaf: Some(leaf), index, end })
    }

    /// Every value in key order.
    pub fn get_all(&self) -> Vec<&V> {
        self.raw.get_all()
    }

    /// First entry at or after `key`. Backs the lock-per-step iterator of
    /// the concurrent wrapper.
    pub(crate) fn lower_bound(&self, key: i64) -> Option<(i64, &V)> {
        self.raw.lower_bound(&key).map(|(key, value)| (*key, value))
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

/// Forward cursor over the leaf chain produced by
/// [`LongBPlusTree::range`]. The upper end is inclusive.
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct Range<'a, V> {
    tree: &'a RawTree<i64, V>,
    leaf: Option<Handle>,
    index: usize,
    end: i64,
}

impl<'a, V> Iterator for Range<'a, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<&'a V> {
        let handle = self.leaf?;
        let leaf = self.tree.node(handle).as_leaf();
        if self.index >= leaf.count() || *leaf.key(self.index) > self.end {
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

impl<V> FusedIterator for Range<'_, V> {}
