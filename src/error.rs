use thiserror::Error;

/// Caller faults reported by tree constructors and range queries.
///
/// These are surfaced before any mutation; a tree that returns an error is
/// observably unchanged. Internal consistency violations are engine bugs
/// and panic instead.
#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
pub enum TreeError {
    /// The requested branching factor is below the supported minimum.
    #[error("order must be at least 3, got {0}")]
    OrderTooSmall(usize),
    /// A range query was given a start bound above its end bound.
    #[error("range start is greater than range end")]
    InvalidRange,
}
