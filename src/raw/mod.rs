mod arena;
mod handle;
mod node;
mod tree;

pub(crate) use arena::Arena;
pub(crate) use handle::Handle;
pub(crate) use node::INLINE_SLOTS;
pub(crate) use tree::{MIN_ORDER, RawTree};
