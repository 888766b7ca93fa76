//! Live views of a [`WeakIdentityMap`](crate::WeakIdentityMap) and their fail-fast iterators.
//!
//! Views share the map's table: removing through a view removes from the map, and changes to
//! the map show up in the view. Views never insert.
//!
//! Iterators do not borrow the map. Instead they remember the map's modification count when
//! they are created, and report [`Error::ConcurrentModification`] once if the map is
//! structurally changed by anything other than their own `remove`. Detection is best-effort
//! and meant for catching bugs. After reporting an error an iterator yields nothing more.

use std::hash::BuildHasher;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::table::{with_table, SharedTable};
use crate::traits::{IdentityKey, WeakElement};

/// The position-tracking engine shared by the three iterator types.
struct HashIter<K: IdentityKey, V, S> {
    table:              SharedTable<K, V, S>,
    /// Buckets still to visit, counting down.
    index:              usize,
    /// Slot to examine next within the current chain.
    entry:              Option<usize>,
    last_returned:      Option<usize>,
    expected_mod_count: usize,
    /// Strong hold on the key found by `has_next`, so it cannot die before `next` returns it.
    next_key:           Option<Option<K::Strong>>,
    /// Strong hold on the key last returned, for `remove`.
    current_key:        Option<Option<K::Strong>>,
    failed:             bool,
}

impl<K: IdentityKey, V, S: BuildHasher> HashIter<K, V, S> {
    fn new(table: &SharedTable<K, V, S>) -> Self {
        let (index, expected_mod_count) = with_table(table, |inner| {
            let index = if inner.len() != 0 { inner.capacity() } else { 0 };
            (index, inner.mod_count())
        });
        HashIter {
            table:          Rc::clone(table),
            entry:          None,
            last_returned:  None,
            next_key:       None,
            current_key:    None,
            failed:         false,
            index,
            expected_mod_count,
        }
    }

    fn has_next(&mut self) -> bool {
        let table = self.table.borrow();
        if table.mod_count() != self.expected_mod_count {
            // Let the following `next` report it.
            return true;
        }
        while self.next_key.is_none() {
            let mut e = self.entry;
            let mut i = self.index;
            while e.is_none() && i > 0 {
                i -= 1;
                e = table.bucket(i);
            }
            self.entry = e;
            self.index = i;

            let pos = match e {
                Some(pos) => pos,
                None => return false,
            };
            match table.slot(pos) {
                Some(slot) => match slot.resolve().into_key() {
                    Some(key) => self.next_key = Some(key),
                    None => self.entry = slot.next(),
                },
                // Reclaimed since we stepped onto it; its old link still leads down the chain.
                None => self.entry = table.successor(pos),
            }
        }
        true
    }

    fn advance<T, F>(&mut self, f: F) -> Result<T>
        where F: FnOnce(Option<K::Strong>, &V) -> T
    {
        if self.table.borrow().mod_count() != self.expected_mod_count {
            return Err(Error::ConcurrentModification);
        }
        if self.next_key.is_none() && !self.has_next() {
            return Err(Error::NoSuchElement);
        }

        let table = self.table.borrow();
        let pos = self.entry.ok_or(Error::NoSuchElement)?;
        let slot = table.slot(pos).ok_or(Error::ConcurrentModification)?;
        let key = self.next_key.take().ok_or(Error::NoSuchElement)?;

        self.last_returned = Some(pos);
        self.entry = slot.next();
        let previous = self.current_key.replace(key.as_ref().map(<K as WeakElement>::clone));
        let item = f(key, slot.value());
        drop(table);
        drop(previous);
        Ok(item)
    }

    fn next_item<T, F>(&mut self, f: F) -> Option<Result<T>>
        where F: FnOnce(Option<K::Strong>, &V) -> T
    {
        if self.failed {
            return None;
        }
        match self.advance(f) {
            Ok(item) => Some(Ok(item)),
            Err(Error::NoSuchElement) => None,
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }

    fn remove(&mut self) -> Result<()> {
        if self.last_returned.is_none() {
            return Err(Error::IllegalIteratorState);
        }
        let current_key = &mut self.current_key;
        let expected_mod_count = &mut self.expected_mod_count;
        // The key and the removed value are dropped only after the table is released.
        let _removed = with_table(&self.table, |table| {
            if table.mod_count() != *expected_mod_count {
                return Err(Error::ConcurrentModification);
            }
            let key = current_key.take().ok_or(Error::IllegalIteratorState)?;
            let value = table.remove(key.as_ref());
            *expected_mod_count = table.mod_count();
            Ok((key, value))
        })?;
        self.last_returned = None;
        Ok(())
    }
}

macro_rules! iterator_methods {
    () => {
        /// Is there another element? A `true` answer holds the element's key strongly, so the
        /// following `next` cannot lose it to collection. Once the map has been modified behind
        /// the iterator's back this answers `true` until `next` has reported the error.
        pub fn has_next(&mut self) -> bool {
            !self.0.failed && self.0.has_next()
        }

        /// Removes the element most recently returned by `next` from the map.
        ///
        /// Fails with [`Error::IllegalIteratorState`] if nothing has been returned since the
        /// last `remove`, or with [`Error::ConcurrentModification`] if the map was changed
        /// behind the iterator's back.
        pub fn remove(&mut self) -> Result<()> {
            self.0.remove()
        }
    };
}

/// Iterator over the entries of a map, as `(key, value)` pairs. The absent key shows up as
/// `None`.
pub struct Iter<K: IdentityKey, V, S>(HashIter<K, V, S>);

impl<K: IdentityKey, V, S: BuildHasher> Iter<K, V, S> {
    pub(crate) fn new(table: &SharedTable<K, V, S>) -> Self {
        Iter(HashIter::new(table))
    }

    iterator_methods!();
}

impl<K: IdentityKey, V: Clone, S: BuildHasher> Iterator for Iter<K, V, S> {
    type Item = Result<(Option<K::Strong>, V)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next_item(|key, value| (key, value.clone()))
    }
}

/// Iterator over the keys of a map.
pub struct Keys<K: IdentityKey, V, S>(HashIter<K, V, S>);

impl<K: IdentityKey, V, S: BuildHasher> Keys<K, V, S> {
    iterator_methods!();
}

impl<K: IdentityKey, V, S: BuildHasher> Iterator for Keys<K, V, S> {
    type Item = Result<Option<K::Strong>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next_item(|key, _| key)
    }
}

/// Iterator over the values of a map.
pub struct ValuesIter<K: IdentityKey, V, S>(HashIter<K, V, S>);

impl<K: IdentityKey, V, S: BuildHasher> ValuesIter<K, V, S> {
    iterator_methods!();
}

impl<K: IdentityKey, V: Clone, S: BuildHasher> Iterator for ValuesIter<K, V, S> {
    type Item = Result<V>;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next_item(|_, value| value.clone())
    }
}

/// The keys of a map, as a live set.
pub struct KeySet<K, V, S> {
    table: SharedTable<K, V, S>,
}

impl<K: IdentityKey, V, S: BuildHasher> KeySet<K, V, S> {
    pub(crate) fn new(table: &SharedTable<K, V, S>) -> Self {
        KeySet { table: Rc::clone(table) }
    }

    /// Gets a fail-fast iterator over the keys.
    pub fn iter(&self) -> Keys<K, V, S> {
        Keys(HashIter::new(&self.table))
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        with_table(&self.table, |table| table.len())
    }

    /// Is the set empty?
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Is `key` in the map?
    pub fn contains<'q>(&self, key: impl Into<Option<&'q K::Strong>>) -> bool
        where K::Strong: 'q
    {
        with_table(&self.table, |table| table.contains_key(key.into()))
    }

    /// Removes `key` from the map, returning whether it was present.
    pub fn remove<'q>(&self, key: impl Into<Option<&'q K::Strong>>) -> bool
        where K::Strong: 'q
    {
        with_table(&self.table, |table| table.remove(key.into())).is_some()
    }

    /// Removes every entry from the map.
    pub fn clear(&self) {
        with_table(&self.table, |table| table.clear())
    }

    /// A detached copy of the live keys.
    pub fn to_vec(&self) -> Vec<Option<K::Strong>> {
        with_table(&self.table, |table| table.snapshot(|key, _| key))
    }
}

/// The values of a map, as a live collection.
pub struct Values<K, V, S> {
    table: SharedTable<K, V, S>,
}

impl<K: IdentityKey, V, S: BuildHasher> Values<K, V, S> {
    pub(crate) fn new(table: &SharedTable<K, V, S>) -> Self {
        Values { table: Rc::clone(table) }
    }

    /// Gets a fail-fast iterator over the values.
    pub fn iter(&self) -> ValuesIter<K, V, S> {
        ValuesIter(HashIter::new(&self.table))
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        with_table(&self.table, |table| table.len())
    }

    /// Is the collection empty?
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Is some live key mapped to a value equal to `value`?
    pub fn contains(&self, value: &V) -> bool
        where V: PartialEq
    {
        with_table(&self.table, |table| table.contains_value(value))
    }

    /// Removes every entry from the map.
    pub fn clear(&self) {
        with_table(&self.table, |table| table.clear())
    }

    /// A detached copy of the live values.
    pub fn to_vec(&self) -> Vec<V>
        where V: Clone
    {
        with_table(&self.table, |table| table.snapshot(|_, value| value.clone()))
    }
}

/// The entries of a map, as a live set of `(key, value)` pairs.
pub struct EntrySet<K, V, S> {
    table: SharedTable<K, V, S>,
}

impl<K: IdentityKey, V, S: BuildHasher> EntrySet<K, V, S> {
    pub(crate) fn new(table: &SharedTable<K, V, S>) -> Self {
        EntrySet { table: Rc::clone(table) }
    }

    /// Gets a fail-fast iterator over the entries.
    pub fn iter(&self) -> Iter<K, V, S> {
        Iter::new(&self.table)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        with_table(&self.table, |table| table.len())
    }

    /// Is the set empty?
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Is `key` (by identity) mapped to a value equal to `value`?
    pub fn contains<'q>(&self, key: impl Into<Option<&'q K::Strong>>, value: &V) -> bool
        where K::Strong: 'q,
              V: PartialEq
    {
        with_table(&self.table, |table| table.contains_mapping(key.into(), value))
    }

    /// Removes the entry for `key` if it maps to a value equal to `value`.
    pub fn remove<'q>(&self, key: impl Into<Option<&'q K::Strong>>, value: &V) -> bool
        where K::Strong: 'q,
              V: PartialEq
    {
        with_table(&self.table, |table| table.remove_mapping(key.into(), value))
    }

    /// Removes every entry from the map.
    pub fn clear(&self) {
        with_table(&self.table, |table| table.clear())
    }

    /// A detached copy of the live entries. Later changes to the map do not affect it.
    pub fn to_vec(&self) -> Vec<(Option<K::Strong>, V)>
        where V: Clone
    {
        with_table(&self.table, |table| table.snapshot(|key, value| (key, value.clone())))
    }
}

impl<'a, K: IdentityKey, V, S: BuildHasher> IntoIterator for &'a KeySet<K, V, S> {
    type Item = Result<Option<K::Strong>>;
    type IntoIter = Keys<K, V, S>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K: IdentityKey, V: Clone, S: BuildHasher> IntoIterator for &'a Values<K, V, S> {
    type Item = Result<V>;
    type IntoIter = ValuesIter<K, V, S>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K: IdentityKey, V: Clone, S: BuildHasher> IntoIterator for &'a EntrySet<K, V, S> {
    type Item = Result<(Option<K::Strong>, V)>;
    type IntoIter = Iter<K, V, S>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

