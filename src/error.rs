//! Errors reported by the containers in this crate.
//!
//! A weakly held element that has been collected is not an error; accessors report it as
//! `None`.

use thiserror::Error;

/// Result type alias for fallible operations in this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong when building or walking a weak identity container.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum Error {
    /// The load factor was zero, negative, infinite or NaN.
    #[error("illegal load factor: {0}")]
    IllegalLoadFactor(f32),

    /// A pair was constructed with an absent element.
    #[error("weak identity pair cannot hold an absent element")]
    NullElement,

    /// The map was structurally modified after the iterator was created, by something other
    /// than the iterator's own `remove`.
    #[error("map was structurally modified during iteration")]
    ConcurrentModification,

    /// `remove` was called on an iterator before any element was returned, or twice in a row.
    #[error("iterator has no current element to remove")]
    IllegalIteratorState,

    /// The iterator is exhausted.
    #[error("iterator has no more elements")]
    NoSuchElement,
}
