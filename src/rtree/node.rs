use smallvec::SmallVec;

use crate::raw::{Handle, INLINE_SLOTS};
use crate::rbox::RBox;

/// An R-tree node. One shape serves both levels: at level 0 the children
/// index the value arena, above it they index the node arena, so every
/// traversal carries its level explicitly. The parent link enables
/// bottom-up covering-box refreshes after point updates.
pub(super) struct SpatialNode<B> {
    parent: Option<Handle>,
    boxes: SmallVec<[B; INLINE_SLOTS]>,
    children: SmallVec<[Handle; INLINE_SLOTS]>,
}

impl<B: RBox> SpatialNode<B> {
    pub(super) fn new() -> Self {
        Self { parent: None, boxes: SmallVec::new(), children: SmallVec::new() }
    }

    pub(super) fn count(&self) -> usize {
        self.boxes.len()
    }

    pub(super) fn parent(&self) -> Option<Handle> {
        self.parent
    }

    pub(super) fn set_parent(&mut self, parent: Option<Handle>) {
        self.parent = parent;
    }

    #[inline]
    pub(super) fn box_at(&self, ix: usize) -> &B {
        &self.boxes[ix]
    }

    pub(super) fn set_box(&mut self, ix: usize, bounds: B) {
        self.boxes[ix] = bounds;
    }

    #[inline]
    pub(super) fn child(&self, ix: usize) -> Handle {
        self.children[ix]
    }

    pub(super) fn children(&self) -> &[Handle] {
        &self.children
    }

    /// Insertion point of `bounds` in this node's box order.
    pub(super) fn search(&self, bounds: &B) -> usize {
        match self.boxes.binary_search(bounds) {
            Ok(ix) | Err(ix) => ix,
        }
    }

    pub(super) fn append(&mut self, bounds: B, child: Handle) {
        self.boxes.push(bounds);
        self.children.push(child);
    }

    pub(super) fn delete(&mut self, ix: usize) -> (B, Handle) {
        (self.boxes.remove(ix), self.children.remove(ix))
    }

    pub(super) fn delete_front(&mut self) -> (B, Handle) {
        self.delete(0)
    }

    /// Drops the slot holding exactly this child handle. A miss means the
    /// primary-key index disagrees with the node contents, which is an
    /// engine bug.
    pub(super) fn delete_by_identity(&mut self, child: Handle) {
        for ix in 0..self.children.len() {
            if self.children[ix] == child {
                self.delete(ix);
                return;
            }
        }
        panic!("index is not consistent with node contents");
    }

    /// Covering box of every slot: a clone of slot 0 widened by the rest.
    pub(super) fn bounds(&self) -> B {
        let mut covering = self.boxes[0].clone();
        for bounds in &self.boxes[1..] {
            bounds.union(&mut covering);
        }
        covering
    }

    pub(super) fn merge_from(&mut self, mut other: SpatialNode<B>) {
        self.boxes.append(&mut other.boxes);
        self.children.append(&mut other.children);
    }

    /// Empties the node, handing back its slots for redistribution.
    pub(super) fn take_slots(&mut self) -> (SmallVec<[B; INLINE_SLOTS]>, SmallVec<[Handle; INLINE_SLOTS]>) {
        (core::mem::take(&mut self.boxes), core::mem::take(&mut self.children))
    }
}
