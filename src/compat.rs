//! Default hasher selection.

// If we depend on `ahash`, use its hasher for identity hashes.
#[cfg(feature = "ahash")]
pub use ahash::RandomState;

// Otherwise fall back to the `std` hasher.
#[cfg(not(feature = "ahash"))]
pub use std::collections::hash_map::RandomState;
