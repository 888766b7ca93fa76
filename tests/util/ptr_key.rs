use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// A strong key that hashes and compares by pointer, as the weak map does.
#[derive(Clone, Debug)]
pub struct PtrKey<K>(pub Rc<K>);

impl<K> PartialEq for PtrKey<K> {
    fn eq(&self, other: &PtrKey<K>) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<K> Eq for PtrKey<K> { }

impl<K> Hash for PtrKey<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Rc::as_ptr(&self.0).hash(state);
    }
}
