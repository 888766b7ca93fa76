//! This library offers weak containers keyed on object identity:
//!
//!   - For a hash map where the keys are held by weak pointers and compared by identity, see
//!     [`WeakIdentityMap`](struct.WeakIdentityMap.html).
//!
//!   - For an immutable pair whose elements are held by weak pointers and compared by
//!     identity, see [`WeakIdentityPair`](struct.WeakIdentityPair.html).
//!
//! Keys are any weak pointer implementing [`IdentityKey`](traits/trait.IdentityKey.html),
//! which covers `std::rc::Weak<T>` and `std::sync::Weak<T>`. Identity is the address of the
//! shared allocation, so two distinct objects that compare equal are still different keys.
//!
//! Entries whose keys have died are removed lazily. Every operation starts by draining the
//! map's reference queue and unlinking the entries it reports, so callers never see an
//! entry whose key is known to be gone.
//!
//! # Examples
//!
//! ```
//! use weak_identity_table::WeakIdentityMap;
//! use std::rc::{Rc, Weak};
//!
//! struct Node { name: &'static str }
//!
//! let annotations: WeakIdentityMap<Weak<Node>, &str> = WeakIdentityMap::new();
//!
//! let a = Rc::new(Node { name: "a" });
//! let b = Rc::new(Node { name: "b" });
//!
//! annotations.insert(a.clone(), "visited");
//! annotations.insert(b.clone(), "pending");
//!
//! assert_eq!( annotations.get(&a), Some("visited") );
//! assert_eq!( annotations.len(), 2 );
//!
//! drop(a);
//!
//! assert_eq!( annotations.len(), 1 );
//! assert_eq!( b.name, "b" );
//! ```

pub mod config;
pub mod error;
pub mod traits;
pub mod views;
pub mod weak_identity_map;
pub mod weak_identity_pair;

mod compat;
mod reference_queue;
mod table;
mod util;

pub use self::config::Config;
pub use self::error::{Error, Result};
pub use self::traits::{Identity, IdentityKey, WeakElement};
pub use self::views::{EntrySet, Iter, KeySet, Keys, Values, ValuesIter};
pub use self::weak_identity_map::WeakIdentityMap;
pub use self::weak_identity_pair::WeakIdentityPair;
