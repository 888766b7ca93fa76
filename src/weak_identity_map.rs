//! A hash map whose keys are held by weak pointers and compared by identity.

use std::cell::{OnceCell, RefCell};
use std::fmt::{self, Debug, Formatter};
use std::hash::BuildHasher;
use std::iter::FromIterator;
use std::rc::Rc;

use crate::compat::RandomState;
use crate::config::{Config, DEFAULT_INITIAL_CAPACITY, DEFAULT_LOAD_FACTOR};
use crate::error::Result;
use crate::table::{with_table, SharedTable, Table};
use crate::traits::IdentityKey;
use crate::views::{EntrySet, Iter, KeySet, Values};

/// A hash map with weak keys, hashed and compared on key identity.
///
/// Two keys are the same key only if they point at the same object; equal values in
/// different allocations are different keys. The map never keeps a key alive. Once the last
/// strong pointer to a key is dropped, its entry disappears, lazily: the next operation that
/// reclaims stale entries unlinks it. Values are held strongly, so a value that points back
/// at its own key keeps that entry alive.
///
/// Key arguments take either a strong pointer or `None`, which stands for the absent key and
/// is stored like any other identity. Keys come back from iteration as `Option`s for the
/// same reason.
///
/// The map uses interior mutability and is not thread-safe; every method takes `&self`. Its
/// [views](#method.keys) and iterators share the same storage. Closures passed to
/// [`with_value`](#method.with_value) and friends must not call back into the map. A value's
/// `Drop` may: values unlinked by reclamation or [`clear`](#method.clear) are dropped only
/// after the map has let go of its storage.
///
/// `len`, `is_empty` and membership answers are snapshots: they can shrink between two calls
/// with no mutation in between, as keys die.
///
/// # Examples
///
/// ```
/// use weak_identity_table::WeakIdentityMap;
/// use std::rc::{Rc, Weak};
///
/// let map: WeakIdentityMap<Weak<String>, u32> = WeakIdentityMap::new();
/// let a = Rc::new("same".to_string());
/// let b = Rc::new("same".to_string());
///
/// map.insert(a.clone(), 1);
/// assert_eq!( map.get(&a), Some(1) );
/// assert_eq!( map.get(&b), None );
///
/// map.insert(b.clone(), 2);
/// assert_eq!( map.len(), 2 );
///
/// drop(a);
/// assert_eq!( map.len(), 1 );
/// assert_eq!( map.get(&b), Some(2) );
/// ```
pub struct WeakIdentityMap<K, V, S = RandomState> {
    table:      SharedTable<K, V, S>,
    key_set:    OnceCell<KeySet<K, V, S>>,
    values:     OnceCell<Values<K, V, S>>,
    entry_set:  OnceCell<EntrySet<K, V, S>>,
}

impl<K: IdentityKey, V> WeakIdentityMap<K, V, RandomState> {
    /// Creates an empty `WeakIdentityMap` with 16 buckets and load factor 0.75.
    pub fn new() -> Self {
        Self::with_hasher(RandomState::default())
    }

    /// Creates an empty `WeakIdentityMap` sized for at least `capacity` buckets.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, RandomState::default())
    }

    /// Creates an empty `WeakIdentityMap` from `config`, failing on an illegal load factor.
    pub fn with_config(config: Config) -> Result<Self> {
        Self::with_config_and_hasher(config, RandomState::default())
    }

    /// Creates an empty `WeakIdentityMap` with the given capacity and load factor.
    pub fn with_capacity_and_load_factor(capacity: usize, load_factor: f32) -> Result<Self> {
        Self::with_config(Config { initial_capacity: capacity, load_factor })
    }

    /// Creates a map holding the given entries, sized so loading them needs no resize.
    pub fn from_entries<I, Q>(entries: I) -> Self
        where I: IntoIterator<Item = (Q, V)>,
              Q: Into<Option<K::Strong>>
    {
        entries.into_iter().collect()
    }
}

impl<K: IdentityKey, V, S: BuildHasher> WeakIdentityMap<K, V, S> {
    /// Creates an empty `WeakIdentityMap` with the given hasher.
    pub fn with_hasher(hash_builder: S) -> Self {
        Self::with_capacity_and_hasher(DEFAULT_INITIAL_CAPACITY, hash_builder)
    }

    /// Creates an empty `WeakIdentityMap` with the given capacity and hasher.
    pub fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> Self {
        let config = Config { initial_capacity: capacity, load_factor: DEFAULT_LOAD_FACTOR };
        Self::from_table(Table::new(config, hash_builder))
    }

    /// Creates an empty `WeakIdentityMap` from `config` and a hasher.
    pub fn with_config_and_hasher(config: Config, hash_builder: S) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_table(Table::new(config, hash_builder)))
    }

    fn from_table(table: Table<K, V, S>) -> Self {
        WeakIdentityMap {
            table:      Rc::new(RefCell::new(table)),
            key_set:    OnceCell::new(),
            values:     OnceCell::new(),
            entry_set:  OnceCell::new(),
        }
    }

    /// Returns the number of buckets.
    pub fn capacity(&self) -> usize {
        self.table.borrow().capacity()
    }

    /// Returns the configured load factor.
    pub fn load_factor(&self) -> f32 {
        self.table.borrow().load_factor()
    }

    /// Returns the number of entries at which the table next grows.
    pub fn threshold(&self) -> usize {
        self.table.borrow().threshold()
    }

    /// Returns the number of live entries, after reclaiming every entry whose key has died.
    pub fn len(&self) -> usize {
        with_table(&self.table, |table| table.len())
    }

    /// Is the map empty?
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a clone of the value mapped to `key`.
    ///
    /// `None` is ambiguous when `V` itself can be absent; use
    /// [`contains_key`](#method.contains_key) to tell the cases apart.
    pub fn get<'q>(&self, key: impl Into<Option<&'q K::Strong>>) -> Option<V>
        where K::Strong: 'q,
              V: Clone
    {
        self.with_value(key, V::clone)
    }

    /// Applies `f` to the value mapped to `key`.
    pub fn with_value<'q, R, F>(&self, key: impl Into<Option<&'q K::Strong>>, f: F) -> Option<R>
        where K::Strong: 'q,
              F: FnOnce(&V) -> R
    {
        with_table(&self.table, |table| table.get(key.into()).map(f))
    }

    /// Applies `f` to a mutable reference to the value mapped to `key`.
    pub fn with_value_mut<'q, R, F>(&self, key: impl Into<Option<&'q K::Strong>>, f: F) -> Option<R>
        where K::Strong: 'q,
              F: FnOnce(&mut V) -> R
    {
        with_table(&self.table, |table| table.get_mut(key.into()).map(f))
    }

    /// Is `key` mapped to anything?
    pub fn contains_key<'q>(&self, key: impl Into<Option<&'q K::Strong>>) -> bool
        where K::Strong: 'q
    {
        with_table(&self.table, |table| table.contains_key(key.into()))
    }

    /// Is some live key mapped to a value equal to `value`? This is a linear scan.
    pub fn contains_value(&self, value: &V) -> bool
        where V: PartialEq
    {
        with_table(&self.table, |table| table.contains_value(value))
    }

    /// Maps `key` to `value`, returning the previous value. The map keeps only a weak
    /// pointer to `key`.
    pub fn insert(&self, key: impl Into<Option<K::Strong>>, value: V) -> Option<V> {
        with_table(&self.table, |table| table.insert(key.into(), value))
    }

    /// Removes the mapping for `key`, returning its value.
    pub fn remove<'q>(&self, key: impl Into<Option<&'q K::Strong>>) -> Option<V>
        where K::Strong: 'q
    {
        with_table(&self.table, |table| table.remove(key.into()))
    }

    /// Removes the mapping for `key` only if it maps to a value equal to `value`.
    pub fn remove_entry<'q>(&self, key: impl Into<Option<&'q K::Strong>>, value: &V) -> bool
        where K::Strong: 'q,
              V: PartialEq
    {
        with_table(&self.table, |table| table.remove_mapping(key.into(), value))
    }

    /// Removes all associations from the map.
    pub fn clear(&self) {
        with_table(&self.table, |table| table.clear())
    }

    /// Inserts every entry of `entries`.
    ///
    /// The table is grown once up front for the source's size hint, so the load causes at
    /// most one further resize even when many keys are already present.
    pub fn put_all<I, Q>(&self, entries: I)
        where I: IntoIterator<Item = (Q, V)>,
              Q: Into<Option<K::Strong>>
    {
        let entries = entries.into_iter();
        let (additional, _) = entries.size_hint();
        if additional > 0 {
            with_table(&self.table, |table| table.reserve_for(additional));
        }
        for (key, value) in entries {
            with_table(&self.table, |table| table.insert(key.into(), value));
        }
    }

    /// The keys, as a live set. The same view is returned on every call.
    pub fn keys(&self) -> &KeySet<K, V, S> {
        self.key_set.get_or_init(|| KeySet::new(&self.table))
    }

    /// The values, as a live collection. The same view is returned on every call.
    pub fn values(&self) -> &Values<K, V, S> {
        self.values.get_or_init(|| Values::new(&self.table))
    }

    /// The entries, as a live set. The same view is returned on every call.
    pub fn entries(&self) -> &EntrySet<K, V, S> {
        self.entry_set.get_or_init(|| EntrySet::new(&self.table))
    }

    /// Gets a fail-fast iterator over the entries.
    pub fn iter(&self) -> Iter<K, V, S> {
        Iter::new(&self.table)
    }
}

impl<K: IdentityKey, V, S: BuildHasher + Default> Default for WeakIdentityMap<K, V, S> {
    fn default() -> Self {
        WeakIdentityMap::with_hasher(Default::default())
    }
}

impl<K, V, S, Q> FromIterator<(Q, V)> for WeakIdentityMap<K, V, S>
    where K: IdentityKey,
          S: BuildHasher + Default,
          Q: Into<Option<K::Strong>>
{
    fn from_iter<T: IntoIterator<Item=(Q, V)>>(iter: T) -> Self {
        let iter = iter.into_iter();
        let (len, _) = iter.size_hint();
        let capacity = ((len as f64 / DEFAULT_LOAD_FACTOR as f64) as usize + 1)
            .max(DEFAULT_INITIAL_CAPACITY);
        let map = WeakIdentityMap::with_capacity_and_hasher(capacity, Default::default());
        map.put_all(iter);
        map
    }
}

impl<K, V, S, Q> Extend<(Q, V)> for WeakIdentityMap<K, V, S>
    where K: IdentityKey,
          S: BuildHasher,
          Q: Into<Option<K::Strong>>
{
    fn extend<T: IntoIterator<Item=(Q, V)>>(&mut self, iter: T) {
        self.put_all(iter)
    }
}

impl<'a, K: IdentityKey, V: Clone, S: BuildHasher> IntoIterator for &'a WeakIdentityMap<K, V, S> {
    type Item = Result<(Option<K::Strong>, V)>;
    type IntoIter = Iter<K, V, S>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, V, S> Debug for WeakIdentityMap<K, V, S>
    where K: IdentityKey,
          K::Strong: Debug,
          V: Debug
{
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self.table.try_borrow() {
            Ok(table) => table.fmt(f),
            Err(_) => write!(f, "{{ <borrowed> }}"),
        }
    }
}
