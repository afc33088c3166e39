mod node;

use node::SpatialNode;

use crate::error::TreeError;
use crate::raw::{Arena, Handle, MIN_ORDER, RawTree};
use crate::rbox::{Intersection, RBox};

/// An R-tree over values of type `V`, keyed two ways at once: spatially by
/// the bounding box `to_box` projects from each value, and by the primary
/// key `to_key` projects, which a side B+-tree maps to the leaf currently
/// holding the value.
///
/// The secondary index makes `get`/`remove` by key logarithmic instead of
/// a spatial scan, at the cost of rewriting index entries whenever a
/// split, merge or redistribution relocates values.
///
/// # Examples
///
/// ```
/// use treedex::{Intersection, RBox, RTree};
///
/// #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
/// struct Span { s: i32, e: i32 }
///
/// impl RBox for Span {
///     fn union(&self, other: &mut Self) {
///         other.s = other.s.min(self.s);
///         other.e = other.e.max(self.e);
///     }
///     fn intersect(&self, other: &Self) -> Intersection {
///         if other.s >= self.s && other.e <= self.e {
///             Intersection::Contains
///         } else if other.e < self.s || other.s > self.e {
///             Intersection::NoCollision
///         } else {
///             Intersection::Intersects
///         }
///     }
/// }
///
/// #[derive(Clone, Debug, PartialEq)]
/// struct Reservation { id: i64, from: i32, to: i32 }
///
/// let mut tree = RTree::new(
///     4,
///     |r: &Reservation| r.id,
///     |r: &Reservation| Span { s: r.from, e: r.to },
/// )
/// .unwrap();
///
/// tree.add(Reservation { id: 1, from: 0, to: 10 });
/// tree.add(Reservation { id: 2, from: 20, to: 30 });
///
/// let mut hits = Vec::new();
/// tree.intersect(&Span { s: 15, e: 40 }, |r| hits.push(r.id));
/// assert_eq!(hits, [2]);
/// ```
pub struct RTree<K, V, B, KF, BF> {
    order: usize,
    to_key: KF,
    to_box: BF,
    nodes: Arena<SpatialNode<B>>,
    values: Arena<V>,
    root: Handle,
    height: usize,
    index: RawTree<K, IndexRef>,
}

/// Where a stored value currently lives: its slot in the value arena and
/// the leaf node holding it. Rewritten, not uniquified, whenever the
/// value relocates.
#[derive(Clone, Copy)]
struct IndexRef {
    value: Handle,
    node: Handle,
}

struct InsertCtx<B> {
    bbox: B,
    value: Handle,
}

impl<K, V, B, KF, BF> RTree<K, V, B, KF, BF>
where
    K: Ord + Clone,
    B: RBox,
    KF: Fn(&V) -> K,
    BF: Fn(&V) -> B,
{
    /// Creates a tree of the given branching factor with the caller's key
    /// and bounding-box projections.
    ///
    /// # Errors
    ///
    /// [`TreeError::OrderTooSmall`] when `order < 3`.
    pub fn new(order: usize, to_key: KF, to_box: BF) -> Result<Self, TreeError> {
        if order < MIN_ORDER {
            return Err(TreeError::OrderTooSmall(order));
        }
        let mut nodes = Arena::new();
        let root = nodes.alloc(SpatialNode::new());
        Ok(Self {
            order,
            to_key,
            to_box,
            nodes,
            values: Arena::new(),
            root,
            height: 0,
            index: RawTree::new(order),
        })
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Height of the root above the leaves; 0 means the root is a leaf.
    pub fn height(&self) -> usize {
        self.height
    }

    /// The branching factor chosen at construction.
    pub fn order(&self) -> usize {
        self.order
    }

    /// Removes all values.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.values.clear();
        self.root = self.nodes.alloc(SpatialNode::new());
        self.height = 0;
        self.index.clear();
    }

    /// Returns the value stored under the given primary key.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.index.get(key).map(|index_ref| self.values.get(index_ref.value))
    }

    /// Stores `value` under its projected key and box. A value already
    /// stored under the same key is removed first and returned.
    pub fn add(&mut self, value: V) -> Option<V> {
        let key = (self.to_key)(&value);
        let displaced = self.remove(&key);
        let bbox = (self.to_box)(&value);
        let ctx = InsertCtx { bbox, value: self.values.alloc(value) };
        if let Some(sibling) = self.insert_rec(self.root, self.height, &ctx) {
            // the root itself split; grow a new root over both halves
            let root_bounds = self.nodes.get(self.root).bounds();
            let sibling_bounds = self.nodes.get(sibling).bounds();
            let mut new_root = SpatialNode::new();
            new_root.append(root_bounds, self.root);
            new_root.append(sibling_bounds, sibling);
            let new_root_h = self.nodes.alloc(new_root);
            self.nodes.get_mut(self.root).set_parent(Some(new_root_h));
            self.nodes.get_mut(sibling).set_parent(Some(new_root_h));
            self.root = new_root_h;
            self.height += 1;
        }
        displaced
    }

    /// Removes the value stored under `key`. Absent keys are a no-op.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let index_ref = self.index.remove(key)?;
        self.nodes.get_mut(index_ref.node).delete_by_identity(index_ref.value);
        if let Some(parent) = self.nodes.get(index_ref.node).parent() {
            self.remove_empty_and_merge(parent, 1);
        }
        while self.height > 0 && self.nodes.get(self.root).count() == 1 {
            let child = self.nodes.get(self.root).child(0);
            self.nodes.free(self.root);
            self.nodes.get_mut(child).set_parent(None);
            self.root = child;
            self.height -= 1;
        }
        let value = self.values.take(index_ref.value);
        // removing the last value drops the whole node structure; the
        // merge pass alone can strand drained nodes under a wider root
        if self.index.is_empty() {
            self.clear();
        }
        Some(value)
    }

    /// Removes the stored value whose projected key matches `value`'s.
    pub fn remove_by_value(&mut self, value: &V) -> Option<V> {
        let key = (self.to_key)(value);
        self.remove(&key)
    }

    /// Feeds every stored value whose box the query box covers or touches
    /// to `sink`, in traversal order.
    pub fn intersect(&self, query: &B, mut sink: impl FnMut(&V)) {
        self.search_rec(self.root, self.height, query, &mut sink);
    }

    /// Feeds every stored value to `sink`.
    pub fn get_all(&self, mut sink: impl FnMut(&V)) {
        self.search_all_rec(self.root, self.height, &mut sink);
    }

    fn insert_rec(&mut self, node_h: Handle, level: usize, ctx: &InsertCtx<B>) -> Option<Handle> {
        if level == 0 {
            if self.nodes.get(node_h).count() < self.order {
                self.nodes.get_mut(node_h).append(ctx.bbox.clone(), ctx.value);
                self.update_index(ctx.value, node_h);
                if let Some(parent) = self.nodes.get(node_h).parent() {
                    self.update_upward(parent);
                }
                None
            } else {
                Some(self.split_and_add(node_h, ctx, None))
            }
        } else {
            let ix = self.choose_child(node_h, &ctx.bbox);
            let child_h = self.nodes.get(node_h).child(ix);
            let sibling = self.insert_rec(child_h, level - 1, ctx)?;
            if self.nodes.get(node_h).count() < self.order {
                let bounds = self.nodes.get(sibling).bounds();
                self.nodes.get_mut(node_h).append(bounds, sibling);
                self.update_upward(node_h);
                None
            } else {
                // the split child's slot still carries its pre-split box;
                // refresh it before the slots are redistributed
                let child_bounds = self.nodes.get(child_h).bounds();
                self.nodes.get_mut(node_h).set_box(ix, child_bounds);
                Some(self.split_and_add(node_h, ctx, Some(sibling)))
            }
        }
    }

    /// Child slot to descend into: the first slot whose box covers the new
    /// box, otherwise the clamped insertion point in box order.
    fn choose_child(&self, node_h: Handle, bbox: &B) -> usize {
        let node = self.nodes.get(node_h);
        for ix in 0..node.count() {
            if node.box_at(ix).intersect(bbox) == Intersection::Contains {
                return ix;
            }
        }
        let ix = node.search(bbox);
        if ix >= node.count() { node.count() - 1 } else { ix }
    }

    /// Splits a full node that must also take one more entry: the node's
    /// `order` slots plus the incoming one are ordered by descending box
    /// order and cut at `(order + 2) / 2`; the first half stays, the rest
    /// moves to a fresh right sibling.
    ///
    /// With `append_node` set the incoming entry is a child node from a
    /// lower-level split; otherwise it is the value being inserted.
    fn split_and_add(&mut self, node_h: Handle, ctx: &InsertCtx<B>, append_node: Option<Handle>) -> Handle {
        let parent = self.nodes.get(node_h).parent();
        let (boxes, children) = self.nodes.get_mut(node_h).take_slots();
        let mut boxes = boxes.into_vec();
        let mut children = children.into_vec();
        match append_node {
            Some(sibling) => {
                boxes.push(self.nodes.get(sibling).bounds());
                children.push(sibling);
            }
            None => {
                boxes.push(ctx.bbox.clone());
                children.push(ctx.value);
            }
        }
        let total = boxes.len();

        let mut order_ix: Vec<usize> = (0..total).collect();
        order_ix.sort_by(|&a, &b| boxes[b].cmp(&boxes[a]));
        let incoming_pos = order_ix
            .iter()
            .position(|&slot| slot == total - 1)
            .expect("incoming entry missing from split");

        let pivot = (self.order + 2) / 2;
        let mut slots: Vec<Option<(B, Handle)>> = boxes.into_iter().zip(children).map(Some).collect();
        let mut right = SpatialNode::new();
        right.set_parent(parent);
        for (pos, &slot) in order_ix.iter().enumerate() {
            let (bounds, child) = slots[slot].take().expect("slot distributed twice");
            if pos < pivot {
                self.nodes.get_mut(node_h).append(bounds, child);
            } else {
                right.append(bounds, child);
            }
        }
        let right_h = self.nodes.alloc(right);
        let right_count = self.nodes.get(right_h).count();
        if append_node.is_some() {
            // moved children hang off the new node now
            for ix in 0..right_count {
                let child = self.nodes.get(right_h).child(ix);
                self.nodes.get_mut(child).set_parent(Some(right_h));
            }
        } else {
            // leaf split: every relocated value needs its index entry
            // rewritten, as does the incoming value when it stayed left
            for ix in 0..right_count {
                let value = self.nodes.get(right_h).child(ix);
                self.update_index(value, right_h);
            }
            if incoming_pos < pivot {
                self.update_index(ctx.value, node_h);
            }
        }
        right_h
    }

    /// Bottom-up cleanup after a point deletion. At each node on the path
    /// to the root, one right-to-left pass over adjacent child pairs:
    /// merge when both fit into one node, otherwise top the left child
    /// back up to `order / 2` from the front of the right one. Level-0
    /// relocations rewrite index entries; higher ones re-parent the moved
    /// children. The node's covering boxes are refreshed afterwards.
    fn remove_empty_and_merge(&mut self, node_h: Handle, level: usize) {
        let count = self.nodes.get(node_h).count();
        if count > 1 {
            let mut i = count - 2;
            loop {
                let first_h = self.nodes.get(node_h).child(i);
                let second_h = self.nodes.get(node_h).child(i + 1);
                let first_count = self.nodes.get(first_h).count();
                let second_count = self.nodes.get(second_h).count();
                if first_count + second_count <= self.order {
                    let second = self.nodes.take(second_h);
                    self.nodes.get_mut(first_h).merge_from(second);
                    self.nodes.get_mut(node_h).delete(i + 1);
                    let merged_count = self.nodes.get(first_h).count();
                    for slot in first_count..merged_count {
                        let moved = self.nodes.get(first_h).child(slot);
                        if level == 1 {
                            self.update_index(moved, first_h);
                        } else {
                            self.nodes.get_mut(moved).set_parent(Some(first_h));
                        }
                    }
                } else if first_count < self.order / 2 {
                    let pivot = self.order / 2;
                    while self.nodes.get(first_h).count() < pivot {
                        let (bounds, moved) = self.nodes.get_mut(second_h).delete_front();
                        self.nodes.get_mut(first_h).append(bounds, moved);
                        if level == 1 {
                            self.update_index(moved, first_h);
                        } else {
                            self.nodes.get_mut(moved).set_parent(Some(first_h));
                        }
                    }
                }
                if i == 0 {
                    break;
                }
                i -= 1;
            }
            self.update_boxes(node_h);
        }
        if let Some(parent) = self.nodes.get(node_h).parent() {
            self.remove_empty_and_merge(parent, level + 1);
        }
    }

    fn update_index(&mut self, value: Handle, node: Handle) {
        let key = (self.to_key)(self.values.get(value));
        self.index.put(key, IndexRef { value, node });
    }

    /// Rewrites each slot box from the matching child's covering box. A
    /// fully drained child has no box to offer; its slot keeps the stale
    /// (over-wide) one until the child is merged away.
    fn update_boxes(&mut self, node_h: Handle) {
        for ix in 0..self.nodes.get(node_h).count() {
            let child = self.nodes.get(node_h).child(ix);
            if self.nodes.get(child).count() > 0 {
                let bounds = self.nodes.get(child).bounds();
                self.nodes.get_mut(node_h).set_box(ix, bounds);
            }
        }
    }

    /// Refreshes covering boxes from this node up to the root.
    fn update_upward(&mut self, mut node_h: Handle) {
        loop {
            self.update_boxes(node_h);
            match self.nodes.get(node_h).parent() {
                Some(parent) => node_h = parent,
                None => break,
            }
        }
    }

    fn search_rec<F: FnMut(&V)>(&self, node_h: Handle, level: usize, query: &B, sink: &mut F) {
        let node = self.nodes.get(node_h);
        if level == 0 {
            for ix in 0..node.count() {
                match query.intersect(node.box_at(ix)) {
                    Intersection::Contains | Intersection::Intersects => sink(self.values.get(node.child(ix))),
                    Intersection::NoCollision => {}
                }
            }
        } else {
            for ix in 0..node.count() {
                match query.intersect(node.box_at(ix)) {
                    Intersection::Contains => self.search_all_rec(node.child(ix), level - 1, sink),
                    Intersection::Intersects => self.search_rec(node.child(ix), level - 1, query, sink),
                    Intersection::NoCollision => {}
                }
            }
        }
    }

    fn search_all_rec<F: FnMut(&V)>(&self, node_h: Handle, level: usize, sink: &mut F) {
        let node = self.nodes.get(node_h);
        if level == 0 {
            for ix in 0..node.count() {
                sink(self.values.get(node.child(ix)));
            }
        } else {
            for ix in 0..node.count() {
                self.search_all_rec(node.child(ix), level - 1, sink);
            }
        }
    }
}

/// Parallel traversals. Subtree recursions become scoped tasks on a rayon
/// pool, so the sink must tolerate concurrent invocation.
impl<K, V, B, KF, BF> RTree<K, V, B, KF, BF>
where
    K: Ord + Clone + Sync,
    V: Sync,
    B: RBox + Sync,
    KF: Fn(&V) -> K + Sync,
    BF: Fn(&V) -> B + Sync,
{
    /// [`intersect`](Self::intersect) with per-subtree recursions fanned
    /// out on the global rayon pool.
    pub fn intersect_parallel<F: Fn(&V) + Sync>(&self, query: &B, sink: F) {
        rayon::scope(|scope| self.search_par(scope, self.root, self.height, query, &sink));
    }

    /// [`intersect_parallel`](Self::intersect_parallel) on a caller-owned
    /// pool, bounding how many subtree tasks run at once.
    pub fn intersect_parallel_in<F: Fn(&V) + Sync>(&self, pool: &rayon::ThreadPool, query: &B, sink: F) {
        pool.scope(|scope| self.search_par(scope, self.root, self.height, query, &sink));
    }

    /// [`get_all`](Self::get_all) with per-subtree recursions fanned out
    /// on the global rayon pool.
    pub fn get_all_parallel<F: Fn(&V) + Sync>(&self, sink: F) {
        rayon::scope(|scope| self.search_all_par(scope, self.root, self.height, &sink));
    }

    /// [`get_all_parallel`](Self::get_all_parallel) on a caller-owned
    /// pool.
    pub fn get_all_parallel_in<F: Fn(&V) + Sync>(&self, pool: &rayon::ThreadPool, sink: F) {
        pool.scope(|scope| self.search_all_par(scope, self.root, self.height, &sink));
    }

    fn search_par<'s, F: Fn(&V) + Sync>(
        &'s self,
        scope: &rayon::Scope<'s>,
        node_h: Handle,
        level: usize,
        query: &'s B,
        sink: &'s F,
    ) {
        let node = self.nodes.get(node_h);
        if level == 0 {
            for ix in 0..node.count() {
                match query.intersect(node.box_at(ix)) {
                    Intersection::Contains | Intersection::Intersects => sink(self.values.get(node.child(ix))),
                    Intersection::NoCollision => {}
                }
            }
        } else {
            for ix in 0..node.count() {
                let child = node.child(ix);
                match query.intersect(node.box_at(ix)) {
                    Intersection::Contains => {
                        scope.spawn(move |scope| self.search_all_par(scope, child, level - 1, sink));
                    }
                    Intersection::Intersects => {
                        scope.spawn(move |scope| self.search_par(scope, child, level - 1, query, sink));
                    }
                    Intersection::NoCollision => {}
                }
            }
        }
    }

    fn search_all_par<'s, F: Fn(&V) + Sync>(
        &'s self,
        scope: &rayon::Scope<'s>,
        node_h: Handle,
        level: usize,
        sink: &'s F,
    ) {
        let node = self.nodes.get(node_h);
        if level == 0 {
            for ix in 0..node.count() {
                sink(self.values.get(node.child(ix)));
            }
        } else {
            for ix in 0..node.count() {
                let child = node.child(ix);
                scope.spawn(move |scope| self.search_all_par(scope, child, level - 1, sink));
            }
        }
    }
}

#[cfg(test)]
impl<K, V, B, KF, BF> RTree<K, V, B, KF, BF>
where
    K: Ord + Clone,
    B: RBox,
    KF: Fn(&V) -> K,
    BF: Fn(&V) -> B,
{
    /// Asserts that every index entry still points at the leaf holding its
    /// value, and that the index population matches the stored values.
    pub(crate) fn validate_index(&self) {
        let refs = self.index.get_all();
        assert_eq!(refs.len(), self.values.len(), "index population diverges from stored values");
        for index_ref in refs {
            assert!(
                self.nodes.get(index_ref.node).children().contains(&index_ref.value),
                "index entry points at a leaf that no longer holds its value"
            );
        }
    }

    /// Asserts that every internal slot box covers its child's slots.
    pub(crate) fn validate_boxes(&self) {
        if self.height > 0 {
            self.validate_boxes_rec(self.root, self.height);
        }
    }

    fn validate_boxes_rec(&self, node_h: Handle, level: usize) {
        let node = self.nodes.get(node_h);
        for ix in 0..node.count() {
            let child = node.child(ix);
            // a drained leaf under a single-child parent has no covering
            // box of its own; its stale slot box is harmless
            if self.nodes.get(child).count() > 0 {
                let child_bounds = self.nodes.get(child).bounds();
                assert_eq!(
                    node.box_at(ix).intersect(&child_bounds),
                    Intersection::Contains,
                    "slot box does not cover its child"
                );
            }
            if level > 1 {
                self.validate_boxes_rec(child, level - 1);
            }
        }
    }

    pub(crate) fn root_count(&self) -> usize {
        self.nodes.get(self.root).count()
    }
}
