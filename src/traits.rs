//! Traits for describing weak and shared pointers and their use as identity keys.

use std::hash::{Hash, Hasher};
use std::{rc, sync};

/// Interface for elements that can be stored in a weak identity table.
pub trait WeakElement {
    /// The type at which a weak element can be viewed.
    ///
    /// For example, for `std::rc::Weak<T>`, this will be `std::rc::Rc<T>`.
    type Strong;

    /// Constructs a new weak element from a strong view.
    fn new(view: &Self::Strong) -> Self;

    /// Acquires a strong version of the weak element.
    fn view(&self) -> Option<Self::Strong>;

    /// Is the given weak element expired?
    fn expired(&self) -> bool {
        self.view().is_none()
    }

    /// Clones a strong view.
    fn clone(view: &Self::Strong) -> Self::Strong
        where Self: Sized
    {
        Self::new(view).view().expect("WeakElement::clone")
    }
}

/// Interface for weak elements that are compared and hashed by the identity of their
/// referent rather than by its value.
pub trait IdentityKey : WeakElement {
    /// The identity of the object a strong view points at.
    fn identity(view: &Self::Strong) -> Identity;
}

/// The address of a shared allocation, with any fat-pointer metadata discarded.
///
/// Two strong pointers have the same `Identity` exactly when they point at the same object.
/// Because a live weak pointer keeps its allocation reserved, an identity is never reused by
/// a different object while any table still holds a weak pointer to the first one.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Identity(usize);

impl Identity {
    /// The identity of whatever `ptr` points at.
    pub fn of<T: ?Sized>(ptr: *const T) -> Self {
        Identity(ptr as *const () as usize)
    }

    /// The raw address.
    pub fn addr(self) -> usize {
        self.0
    }

    pub(crate) fn hash_with<S: std::hash::BuildHasher>(self, hash_builder: &S) -> u64 {
        let mut hasher = hash_builder.build_hasher();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

impl<T: ?Sized> WeakElement for rc::Weak<T> {
    type Strong = rc::Rc<T>;

    fn new(view: &Self::Strong) -> Self {
        rc::Rc::<T>::downgrade(view)
    }

    fn view(&self) -> Option<Self::Strong> {
        self.upgrade()
    }

    fn expired(&self) -> bool {
        self.strong_count() == 0
    }

    fn clone(view: &Self::Strong) -> Self::Strong {
        view.clone()
    }
}

impl<T: ?Sized> IdentityKey for rc::Weak<T> {
    fn identity(view: &Self::Strong) -> Identity {
        Identity::of(rc::Rc::as_ptr(view))
    }
}

impl<T: ?Sized> WeakElement for sync::Weak<T> {
    type Strong = sync::Arc<T>;

    fn new(view: &Self::Strong) -> Self {
        sync::Arc::<T>::downgrade(view)
    }

    fn view(&self) -> Option<Self::Strong> {
        self.upgrade()
    }

    fn expired(&self) -> bool {
        self.strong_count() == 0
    }

    fn clone(view: &Self::Strong) -> Self::Strong {
        view.clone()
    }
}

impl<T: ?Sized> IdentityKey for sync::Weak<T> {
    fn identity(view: &Self::Strong) -> Identity {
        Identity::of(sync::Arc::as_ptr(view))
    }
}
