//! An immutable pair that holds both of its elements weakly and compares them by identity.

use std::collections::hash_map::DefaultHasher;
use std::fmt::{self, Debug, Formatter};
use std::hash::{Hash, Hasher};

use crate::error::{Error, Result};
use crate::traits::{IdentityKey, WeakElement};

/// Two weakly held objects, compared by identity.
///
/// Either element may be collected at any time, after which its accessor returns `None`.
/// Two pairs are equal only while all four elements are alive and the corresponding elements
/// are the same objects; in particular a pair with a collected element is not even equal to
/// itself. The hash code is computed from the elements' own hashes at construction and then
/// fixed, so a pair does not move between buckets of a hash-based container when its
/// elements die.
///
/// # Examples
///
/// ```
/// use weak_identity_table::WeakIdentityPair;
/// use std::rc::{Rc, Weak};
///
/// type Pair = WeakIdentityPair<Weak<str>, Weak<u32>>;
///
/// let x: Rc<str> = Rc::from("x");
/// let y = Rc::new(1);
///
/// let p = Pair::of(&x, &y);
/// assert_eq!( p, Pair::of(&x, &y) );
/// assert_ne!( p, Pair::of(&Rc::from("x"), &y) );
///
/// drop(y);
/// assert_eq!( p.second(), None );
/// assert_ne!( p, Pair::of(&x, &Rc::new(1)) );
/// ```
#[derive(Clone)]
pub struct WeakIdentityPair<A, B> {
    a:          A,
    b:          B,
    hash_code:  u64,
}

fn value_hash<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

impl<A, B> WeakIdentityPair<A, B>
    where A: IdentityKey,
          A::Strong: Hash,
          B: IdentityKey,
          B::Strong: Hash
{
    /// Makes a pair of `a` and `b`.
    pub fn of(a: &A::Strong, b: &B::Strong) -> Self {
        let hash_code = value_hash(a).wrapping_add(value_hash(b));
        WeakIdentityPair {
            a: A::new(a),
            b: B::new(b),
            hash_code,
        }
    }

    /// Makes a pair, rejecting an absent element.
    pub fn new(a: Option<&A::Strong>, b: Option<&B::Strong>) -> Result<Self> {
        match (a, b) {
            (Some(a), Some(b)) => Ok(Self::of(a, b)),
            _ => Err(Error::NullElement),
        }
    }
}

impl<A: IdentityKey, B: IdentityKey> WeakIdentityPair<A, B> {
    /// The first element, or `None` if it has been collected.
    pub fn first(&self) -> Option<A::Strong> {
        self.a.view()
    }

    /// The second element, or `None` if it has been collected.
    pub fn second(&self) -> Option<B::Strong> {
        self.b.view()
    }
}

impl<A: IdentityKey, B: IdentityKey> PartialEq for WeakIdentityPair<A, B> {
    fn eq(&self, other: &Self) -> bool {
        if self.hash_code != other.hash_code {
            return false;
        }
        match (self.first(), self.second(), other.first(), other.second()) {
            (Some(a), Some(b), Some(oa), Some(ob)) =>
                A::identity(&a) == A::identity(&oa) && B::identity(&b) == B::identity(&ob),
            _ => false,
        }
    }
}

/// Equality is reflexive only while both elements are alive.
impl<A: IdentityKey, B: IdentityKey> Eq for WeakIdentityPair<A, B> { }

impl<A, B> Hash for WeakIdentityPair<A, B> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash_code)
    }
}

impl<A, B> Debug for WeakIdentityPair<A, B>
    where A: WeakElement,
          A::Strong: Debug,
          B: WeakElement,
          B::Strong: Debug
{
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "<{:?},{:?}>", self.a.view(), self.b.view())
    }
}
