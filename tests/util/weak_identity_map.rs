use std::collections::HashMap;
use std::fmt::Debug;
use std::rc::{Rc, Weak};

use quickcheck::{Arbitrary, Gen};

use weak_identity_table::WeakIdentityMap;

use super::ptr_key::PtrKey;
use self::Cmd::*;

#[derive(Clone, Debug)]
pub enum Cmd<K, V>
{
    Insert(K, V),
    Reinsert(usize, V),
    InsertNull(V),
    RemoveInserted(usize),
    RemoveOther(K),
    RemoveNull,
    ForgetInserted(usize),
    Clear,
}

#[derive(Clone, Debug)]
pub struct Script<K, V>(Vec<Cmd<K, V>>);

/// Runs the same commands against a weak identity map and a strong map keyed by pointer.
/// Dropping a key from the strong map is the only strong reference going away, so the weak
/// map must forget it too.
pub struct Tester<K, V> {
    weak:   WeakIdentityMap<Weak<K>, V>,
    strong: HashMap<PtrKey<K>, V>,
    null:   Option<V>,
    log:    Vec<Weak<K>>,
    ok:     bool,
}

impl<K, V> Tester<K, V>
    where K: Debug,
          V: Eq + Clone + Debug
{
    pub fn new() -> Self {
        Tester::with_capacity(16)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Tester {
            weak:   WeakIdentityMap::with_capacity(capacity),
            strong: HashMap::new(),
            null:   None,
            log:    Vec::new(),
            ok:     true,
        }
    }

    pub fn check(&self) -> bool {
        let mut copy = HashMap::new();
        let mut null = None;
        for entry in self.weak.iter() {
            match entry {
                Ok((Some(key), value)) => { copy.insert(PtrKey(key), value); }
                Ok((None, value)) => null = Some(value),
                Err(err) => {
                    eprintln!("Tester::check: iteration failed: {}", err);
                    return false;
                }
            }
        }

        let expected_len = self.strong.len() + self.null.is_some() as usize;
        if self.ok && self.strong == copy && self.null == null && self.weak.len() == expected_len {
            true
        } else {
            eprintln!("Tester::check: failed: {:?} ≠ {:?} (null {:?} ≠ {:?})",
                      self.strong, copy, self.null, null);
            false
        }
    }

    pub fn execute_script(&mut self, script: &Script<K, V>)
        where K: Clone
    {
        for cmd in &script.0 {
            self.execute_command(cmd);
        }
    }

    pub fn execute_command(&mut self, cmd: &Cmd<K, V>)
        where K: Clone
    {
        match *cmd {
            Insert(ref k, ref v)    => self.insert(k, v),
            Reinsert(index, ref v)  => self.reinsert(index, v),
            InsertNull(ref v)       => self.insert_null(v),
            RemoveInserted(index)   => self.remove_inserted(index),
            RemoveOther(ref k)      => self.remove_other(k),
            RemoveNull              => self.remove_null(),
            ForgetInserted(index)   => self.forget_inserted(index),
            Clear                   => self.clear(),
        }
    }

    pub fn insert(&mut self, key: &K, value: &V)
        where K: Clone
    {
        let key_ptr = Rc::new(key.clone());
        self.ok &= self.weak.insert(key_ptr.clone(), value.clone()).is_none();
        self.log.push(Rc::downgrade(&key_ptr));
        self.strong.insert(PtrKey(key_ptr), value.clone());
    }

    pub fn reinsert(&mut self, index: usize, value: &V) {
        if let Some(key) = self.nth_live_key(index) {
            let old = self.weak.insert(key.clone(), value.clone());
            self.ok &= old == self.strong.insert(PtrKey(key), value.clone());
        }
    }

    pub fn insert_null(&mut self, value: &V) {
        let old = self.weak.insert(None, value.clone());
        self.ok &= old == self.null.replace(value.clone());
    }

    pub fn remove_inserted(&mut self, index: usize) {
        if let Some(key) = self.nth_live_key(index) {
            let old = self.weak.remove(&key);
            self.ok &= old == self.strong.remove(&PtrKey(key));
        }
    }

    pub fn remove_other(&mut self, key: &K)
        where K: Clone
    {
        let other = Rc::new(key.clone());
        self.ok &= self.weak.remove(&other).is_none();
    }

    pub fn remove_null(&mut self) {
        let old = self.weak.remove(None);
        self.ok &= old == self.null.take();
    }

    pub fn forget_inserted(&mut self, index: usize) {
        if let Some(key) = self.nth_live_key(index) {
            self.strong.remove(&PtrKey(key));
        }
    }

    pub fn clear(&mut self) {
        self.weak.clear();
        self.strong.clear();
        self.null = None;
    }

    fn nth_live_key(&self, n: usize) -> Option<Rc<K>> {
        if self.log.is_empty() {
            None
        } else {
            self.log[n % self.log.len()].upgrade()
        }
    }
}

impl<K: Arbitrary, V: Arbitrary> Arbitrary for Cmd<K, V> {
    fn arbitrary(g: &mut Gen) -> Self {
        let choice = u8::arbitrary(g) % 100;

        match choice {
            00..=34 => Insert(K::arbitrary(g), V::arbitrary(g)),
            35..=44 => Reinsert(usize::arbitrary(g), V::arbitrary(g)),
            45..=49 => InsertNull(V::arbitrary(g)),
            50..=64 => RemoveInserted(usize::arbitrary(g)),
            65..=72 => RemoveOther(K::arbitrary(g)),
            73..=75 => RemoveNull,
            76..=98 => ForgetInserted(usize::arbitrary(g)),
            _       => Clear,
        }
    }
}

impl<K: Arbitrary, V: Arbitrary> Arbitrary for Script<K, V> {
    fn arbitrary(g: &mut Gen) -> Self {
        Script(Vec::<Cmd<K, V>>::arbitrary(g))
    }

    fn shrink(&self) -> Box<dyn Iterator<Item=Self>> {
        Box::new(self.0.shrink().map(Script))
    }
}
