use core::iter::FusedIterator;

use parking_lot::RwLock;

use crate::btree_long::LongBPlusTree;
use crate::error::TreeError;

/// A thread-safe [`LongBPlusTree`]: every operation runs under a
/// readers/writer lock, so writers are serialized and exclude readers
/// while readers run concurrently.
///
/// Lookups return owned clones because the lock is released before the
/// call returns. [`range`](Self::range) is the exception to whole-call
/// locking: its iterator takes the read lock once per step and holds
/// nothing in between, so entries present for the whole iteration are
/// yielded exactly once while concurrent inserts and removes may be seen
/// or skipped.
pub struct ConcurrentLongBPlusTree<V> {
    inner: RwLock<LongBPlusTree<V>>,
}

impl<V> ConcurrentLongBPlusTree<V> {
    /// Creates a tree of the given branching factor.
    ///
    /// # Errors
    ///
    /// [`TreeError::OrderTooSmall`] when `order < 3`.
    pub fn new(order: usize) -> Result<Self, TreeError> {
        Ok(Self { inner: RwLock::new(LongBPlusTree::new(order)?) })
    }

    /// Returns a clone of the value stored under `key`.
    pub fn get(&self, key: i64) -> Option<V>
    where
        V: Clone,
    {
        self.inner.read().get(key).cloned()
    }

    /// Stores `value` under `key`, returning the displaced value when the
    /// key was already present.
    pub fn put(&self, key: i64, value: V) -> Option<V> {
        self.inner.write().put(key, value)
    }

    /// Returns a clone of the value stored under `key`, inserting
    /// `supplier()` first when the key is absent. The supplier runs under
    /// the write lock and is not called on a hit.
    pub fn compute_if_absent(&self, key: i64, supplier: impl FnOnce() -> V) -> V
    where
        V: Clone,
    {
        self.inner.write().compute_if_absent(key, supplier).clone()
    }

    /// Removes `key`, returning its value. Absent keys are a no-op.
    pub fn remove(&self, key: i64) -> Option<V> {
        self.inner.write().remove(key)
    }

    /// Clones of every value, in key order, under one read lock.
    pub fn get_all(&self) -> Vec<V>
    where
        V: Clone,
    {
        self.inner.read().get_all().into_iter().cloned().collect()
    }

    /// Iterates the values whose keys fall within `start..=end`, locking
    /// per step as described on [`ConcurrentLongBPlusTree`].
    ///
    /// # Errors
    ///
    /// [`TreeError::InvalidRange`] when `start > end`.
    pub fn range(&self, start: i64, end: i64) -> Result<LockedRange<'_, V>, TreeError> {
        if start > end {
            return Err(TreeError::InvalidRange);
        }
        Ok(LockedRange { tree: self, cursor: Some(start), end })
    }

    /// Removes all entries.
    pub fn clear(&self) {
        self.inner.write().clear();
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Height of the root above the leaves; 0 means the root is a leaf.
    pub fn height(&self) -> usize {
        self.inner.read().height()
    }

    /// The branching factor chosen at construction.
    pub fn order(&self) -> usize {
        self.inner.read().order()
    }
}

/// Lock-per-step range iterator produced by
/// [`ConcurrentLongBPlusTree::range`].
///
/// Each step takes the read lock and repositions on the first key at or
/// beyond the cursor, so the iterator never dangles into nodes a writer
/// has reshaped between steps.
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct LockedRange<'a, V> {
    tree: &'a ConcurrentLongBPlusTree<V>,
    cursor: Option<i64>,
    end: i64,
}

impl<V: Clone> Iterator for LockedRange<'_, V> {
    type Item = V;

    fn next(&mut self) -> Option<V> {
        let cursor = self.cursor?;
        let guard = self.tree.inner.read();
        match guard.lower_bound(cursor) {
            Some((key, value)) if key <= self.end => {
                self.cursor = key.checked_add(1);
                Some(value.clone())
            }
            _ => {
                self.cursor = None;
                None
            }
        }
    }
}

impl<V: Clone> FusedIterator for LockedRange<'_, V> {}
