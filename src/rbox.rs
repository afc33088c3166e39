/// Outcome of the asymmetric box test [`RBox::intersect`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Intersection {
    /// The receiver fully covers the argument.
    Contains,
    /// The receiver touches the argument without covering it.
    Intersects,
    /// The receiver and the argument do not overlap.
    NoCollision,
}

/// Bounding box supplied by the user of an [`RTree`](crate::RTree).
///
/// The `Ord` supertrait provides the total order the tree uses to place
/// boxes and to cut splits; `Clone` provides independent copies for the
/// covering boxes stored in internal slots.
pub trait RBox: Ord + Clone {
    /// Widens `other` until it also covers `self`.
    ///
    /// Note the direction: the *argument* is mutated, not the receiver.
    /// The tree folds a node's covering box by cloning the first slot and
    /// calling `slot.union(&mut accumulator)` for every further slot, so
    /// implementations must write the result into `other`.
    fn union(&self, other: &mut Self);

    /// Tests how `self` relates to `other`. Asymmetric: `Contains` means
    /// `self` covers `other`, not the reverse.
    fn intersect(&self, other: &Self) -> Intersection;
}
