//! In-memory index collections built over one B+-tree engine.
//!
//! This crate provides four containers:
//!
//! - [`LongBPlusTree`] - a B+-tree keyed by primitive 64-bit integers
//! - [`ConcurrentLongBPlusTree`] - the same tree behind a readers/writer
//!   lock
//! - [`BPlusTree`] - a B+-tree keyed by any totally ordered type
//! - [`RTree`] - an R-tree over user values, with caller-supplied key and
//!   bounding-box projections and a built-in B+-tree index from primary
//!   key to the leaf holding each value
//!
//! All four share the same node algebra: fixed-capacity nodes of a
//! branching factor chosen at construction (`order >= 3`), with parallel
//! key/child arrays shifted in place on insert and delete. B+-tree leaves
//! chain forward in key order, so range scans are a descent followed by a
//! linear walk; the R-tree propagates covering boxes upward through parent
//! links and answers intersection queries by pruned traversal, optionally
//! fanned out over a rayon pool.
//!
//! # Example
//!
//! ```
//! use treedex::LongBPlusTree;
//!
//! let mut tree = LongBPlusTree::new(16).unwrap();
//! for key in 0..100 {
//!     tree.put(key, key * key);
//! }
//!
//! assert_eq!(tree.get(9), Some(&81));
//! assert_eq!(tree.range(10, 12).unwrap().count(), 3);
//! assert_eq!(tree.remove(9), Some(81));
//! ```
//!
//! # Trade-offs
//!
//! Trees are not thread-safe unless wrapped; [`ConcurrentLongBPlusTree`]
//! serializes writers and admits concurrent readers, and its range
//! iterator locks per step, trading snapshot consistency for writer
//! progress during long scans. Nodes live in a slab arena addressed by
//! 32-bit handles, which keeps sibling and parent references plain
//! indices instead of reference-counted pointers.

#![forbid(unsafe_code)]
#![forbid(keyword_idents)]
#![forbid(non_ascii_idents)]
#![forbid(unreachable_pub)]
#![warn(clippy::all)]
#![warn(clippy::cargo)]
#![warn(clippy::pedantic)]

mod error;
mod raw;

pub mod btree;
pub mod btree_long;
pub mod concurrent;
pub mod rtree;

mod rbox;

pub use btree::BPlusTree;
pub use btree_long::LongBPlusTree;
pub use concurrent::ConcurrentLongBPlusTree;
pub use error::TreeError;
pub use rbox::{Intersection, RBox};
pub use rtree::RTree;
