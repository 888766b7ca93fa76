//! The bucket array behind [`WeakIdentityMap`](crate::WeakIdentityMap).
//!
//! Buckets are singly linked chains of slots. Slots live in an arena and are linked by
//! index, so iterators can remember a position without borrowing the table. A slot holds
//! its key weakly; when the key dies the slot stays linked until the next reclamation pass
//! drains the [`ReferenceQueue`] and unlinks it.

use std::cell::RefCell;
use std::fmt::{self, Debug, Formatter};
use std::hash::BuildHasher;
use std::mem;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::config::{threshold_for, Config, MAXIMUM_CAPACITY};
use crate::reference_queue::{ReferenceQueue, Stale};
use crate::traits::{Identity, IdentityKey, WeakElement};
use crate::util::{index_for, new_boxed_option_slice};

/// Stands in for the absent key, so that it hashes and compares like any other identity.
static NULL_KEY: u8 = 0;

fn null_identity() -> Identity {
    Identity::of(&NULL_KEY as *const u8)
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Growth {
    /// An insertion reached the threshold.
    Load,
    /// A bulk load asked for room up front.
    Reserve,
}

enum SlotKey<K> {
    Null,
    Weak(K),
}

/// What a slot's key currently resolves to.
pub(crate) enum Resolved<S> {
    Collected,
    Null,
    Live(S),
}

impl<S> Resolved<S> {
    /// `None` if collected, otherwise the caller-facing key (`None` for the absent key).
    pub fn into_key(self) -> Option<Option<S>> {
        match self {
            Resolved::Collected => None,
            Resolved::Null      => Some(None),
            Resolved::Live(key) => Some(Some(key)),
        }
    }
}

pub(crate) struct Slot<K, V> {
    key:        SlotKey<K>,
    hash_code:  u64,
    ticket:     u64,
    value:      V,
    next:       Option<usize>,
}

impl<K: WeakElement, V> Slot<K, V> {
    pub fn resolve(&self) -> Resolved<K::Strong> {
        match self.key {
            SlotKey::Null => Resolved::Null,
            SlotKey::Weak(ref weak) => match weak.view() {
                Some(key) => Resolved::Live(key),
                None      => Resolved::Collected,
            },
        }
    }

    fn is_live(&self) -> bool {
        match self.key {
            SlotKey::Null => true,
            SlotKey::Weak(ref weak) => !weak.expired(),
        }
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn next(&self) -> Option<usize> {
        self.next
    }
}

impl<K: IdentityKey, V> Slot<K, V> {
    fn matches(&self, hash_code: u64, identity: Identity) -> bool {
        if self.hash_code != hash_code {
            return false;
        }
        match self.key {
            SlotKey::Null => identity == null_identity(),
            SlotKey::Weak(ref weak) =>
                weak.view().map_or(false, |key| K::identity(&key) == identity),
        }
    }
}

/// An arena cell. A vacated cell remembers the link its slot had when it was unlinked, so an
/// iterator standing on it can still reach the rest of the chain.
enum ArenaEntry<K, V> {
    Occupied(Slot<K, V>),
    Vacant(Option<usize>),
}

/// A table shared between a map and its views and iterators.
pub(crate) type SharedTable<K, V, S> = Rc<RefCell<Table<K, V, S>>>;

pub(crate) struct Table<K, V, S> {
    hash_builder:   S,
    buckets:        Box<[Option<usize>]>,
    slots:          Vec<ArenaEntry<K, V>>,
    free:           Vec<usize>,
    len:            usize,
    threshold:      usize,
    load_factor:    f32,
    queue:          ReferenceQueue<K>,
    mod_count:      usize,
    next_ticket:    u64,
    /// Values unlinked by reclamation or `clear`, dropped by `with_table` once the table is no
    /// longer borrowed.
    released:       Vec<V>,
}

/// Runs `f` on the shared table, then drops the values it released after the borrow ends,
/// so a value's `Drop` may use the map again.
pub(crate) fn with_table<K, V, S, R, F>(table: &SharedTable<K, V, S>, f: F) -> R
    where F: FnOnce(&mut Table<K, V, S>) -> R
{
    let (result, released) = {
        let mut table = table.borrow_mut();
        let result = f(&mut table);
        (result, mem::take(&mut table.released))
    };
    drop(released);
    result
}

impl<K, V, S> Table<K, V, S> {
    /// Head of the chain in bucket `index`.
    pub fn bucket(&self, index: usize) -> Option<usize> {
        self.buckets.get(index).copied().flatten()
    }

    /// The slot at arena position `pos`, if it has not been freed.
    pub fn slot(&self, pos: usize) -> Option<&Slot<K, V>> {
        match self.slots.get(pos) {
            Some(ArenaEntry::Occupied(slot)) => Some(slot),
            _ => None,
        }
    }

    fn slot_mut(&mut self, pos: usize) -> Option<&mut Slot<K, V>> {
        match self.slots.get_mut(pos) {
            Some(ArenaEntry::Occupied(slot)) => Some(slot),
            _ => None,
        }
    }

    /// The position after `pos` in the chain `pos` belongs to, or belonged to when it was
    /// freed.
    pub fn successor(&self, pos: usize) -> Option<usize> {
        match self.slots.get(pos) {
            Some(ArenaEntry::Occupied(slot)) => slot.next,
            Some(ArenaEntry::Vacant(next)) => *next,
            None => None,
        }
    }
}

impl<K: IdentityKey, V, S: BuildHasher> Table<K, V, S> {
    /// Builds an empty table. `config` must already be validated.
    pub fn new(config: Config, hash_builder: S) -> Self {
        let capacity = config.bucket_count();
        Table {
            hash_builder,
            buckets:        new_boxed_option_slice(capacity),
            slots:          Vec::new(),
            free:           Vec::new(),
            len:            0,
            threshold:      threshold_for(capacity, config.load_factor),
            load_factor:    config.load_factor,
            queue:          ReferenceQueue::new(),
            mod_count:      0,
            next_ticket:    0,
            released:       Vec::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn load_factor(&self) -> f32 {
        self.load_factor
    }

    pub fn mod_count(&self) -> usize {
        self.mod_count
    }

    fn locate(&self, key: Option<&K::Strong>) -> (u64, Identity) {
        let identity = match key {
            Some(key) => K::identity(key),
            None      => null_identity(),
        };
        (identity.hash_with(&self.hash_builder), identity)
    }

    /// Drains the reference queue, unlinking every slot whose key it reports dead.
    pub fn reclaim_stale(&mut self) {
        let mut expunged = 0usize;
        while let Some(stale) = self.queue.poll() {
            if self.expunge(stale) {
                expunged += 1;
            }
        }
        if expunged > 0 {
            trace!(expunged, len = self.len, "reclaimed stale slots");
        }
    }

    /// Like `reclaim_stale`, but first makes the queue look at every registration.
    pub fn reclaim_all(&mut self) {
        self.queue.sweep();
        self.reclaim_stale();
    }

    fn expunge(&mut self, stale: Stale) -> bool {
        let bucket = index_for(stale.hash, self.buckets.len());
        let mut prev = None;
        let mut cur = self.buckets[bucket];

        while let Some(pos) = cur {
            let (ticket, next) = match self.slot(pos) {
                Some(slot) => (slot.ticket, slot.next),
                None => break,
            };
            if ticket == stale.ticket {
                self.unlink(bucket, prev, next);
                self.retire(pos);
                self.len -= 1;
                return true;
            }
            prev = cur;
            cur = next;
        }

        false
    }

    fn unlink(&mut self, bucket: usize, prev: Option<usize>, next: Option<usize>) {
        match prev {
            None => self.buckets[bucket] = next,
            Some(prev) => if let Some(slot) = self.slot_mut(prev) {
                slot.next = next;
            },
        }
    }

    fn allocate(&mut self, slot: Slot<K, V>) -> usize {
        match self.free.pop() {
            Some(pos) => {
                self.slots[pos] = ArenaEntry::Occupied(slot);
                pos
            }
            None => {
                self.slots.push(ArenaEntry::Occupied(slot));
                self.slots.len() - 1
            }
        }
    }

    fn release(&mut self, pos: usize) -> Option<Slot<K, V>> {
        let next = self.successor(pos);
        match mem::replace(&mut self.slots[pos], ArenaEntry::Vacant(next)) {
            ArenaEntry::Occupied(slot) => {
                self.free.push(pos);
                self.queue.cancel(slot.ticket);
                Some(slot)
            }
            ArenaEntry::Vacant(_) => None,
        }
    }

    /// Frees the slot at `pos`, deferring the drop of its value.
    fn retire(&mut self, pos: usize) {
        if let Some(slot) = self.release(pos) {
            self.released.push(slot.value);
        }
    }

    fn find(&self, hash_code: u64, identity: Identity) -> Option<usize> {
        let mut cur = self.buckets[index_for(hash_code, self.buckets.len())];
        while let Some(pos) = cur {
            let slot = self.slot(pos)?;
            if slot.matches(hash_code, identity) {
                return Some(pos);
            }
            cur = slot.next;
        }
        None
    }

    pub fn get(&mut self, key: Option<&K::Strong>) -> Option<&V> {
        self.reclaim_stale();
        let (hash_code, identity) = self.locate(key);
        let pos = self.find(hash_code, identity)?;
        self.slot(pos).map(Slot::value)
    }

    pub fn get_mut(&mut self, key: Option<&K::Strong>) -> Option<&mut V> {
        self.reclaim_stale();
        let (hash_code, identity) = self.locate(key);
        let pos = self.find(hash_code, identity)?;
        self.slot_mut(pos).map(|slot| &mut slot.value)
    }

    pub fn contains_key(&mut self, key: Option<&K::Strong>) -> bool {
        self.reclaim_stale();
        let (hash_code, identity) = self.locate(key);
        self.find(hash_code, identity).is_some()
    }

    /// Maps `key` to `value`, returning the value it replaces.
    pub fn insert(&mut self, key: Option<K::Strong>, value: V) -> Option<V> {
        self.reclaim_stale();
        let (hash_code, identity) = self.locate(key.as_ref());

        if let Some(pos) = self.find(hash_code, identity) {
            if let Some(slot) = self.slot_mut(pos) {
                return Some(mem::replace(&mut slot.value, value));
            }
        }

        self.mod_count = self.mod_count.wrapping_add(1);
        let ticket = self.next_ticket;
        self.next_ticket += 1;

        let slot_key = match key {
            Some(ref strong) => {
                self.queue.enroll(K::new(strong), hash_code, ticket);
                SlotKey::Weak(K::new(strong))
            }
            None => SlotKey::Null,
        };
        let bucket = index_for(hash_code, self.buckets.len());
        let next = self.buckets[bucket];
        let pos = self.allocate(Slot {
            key:    slot_key,
            next,
            hash_code,
            ticket,
            value,
        });
        self.buckets[bucket] = Some(pos);

        self.len += 1;
        if self.len >= self.threshold {
            let capacity = self.buckets.len() * 2;
            self.resize(capacity, Growth::Load);
        }
        None
    }

    pub fn remove(&mut self, key: Option<&K::Strong>) -> Option<V> {
        self.reclaim_stale();
        let (hash_code, identity) = self.locate(key);
        self.remove_where(hash_code, |slot| slot.matches(hash_code, identity))
    }

    /// Removes `key` only if it is currently mapped to a value equal to `value`.
    pub fn remove_mapping(&mut self, key: Option<&K::Strong>, value: &V) -> bool
        where V: PartialEq
    {
        self.reclaim_stale();
        let (hash_code, identity) = self.locate(key);
        let removed = self.remove_where(hash_code, |slot| {
            slot.matches(hash_code, identity) && slot.value == *value
        });
        match removed {
            Some(removed) => {
                self.released.push(removed);
                true
            }
            None => false,
        }
    }

    fn remove_where<F>(&mut self, hash_code: u64, mut pred: F) -> Option<V>
        where F: FnMut(&Slot<K, V>) -> bool
    {
        let bucket = index_for(hash_code, self.buckets.len());
        let mut prev = None;
        let mut cur = self.buckets[bucket];

        while let Some(pos) = cur {
            let slot = self.slot(pos)?;
            let next = slot.next;
            if pred(slot) {
                self.mod_count = self.mod_count.wrapping_add(1);
                self.len -= 1;
                self.unlink(bucket, prev, next);
                return self.release(pos).map(|slot| slot.value);
            }
            prev = cur;
            cur = next;
        }

        None
    }

    /// Is `key` mapped to a value equal to `value`?
    pub fn contains_mapping(&mut self, key: Option<&K::Strong>, value: &V) -> bool
        where V: PartialEq
    {
        self.get(key).map_or(false, |v| v == value)
    }

    /// Linear scan for a value equal to `value`.
    pub fn contains_value(&mut self, value: &V) -> bool
        where V: PartialEq
    {
        self.reclaim_all();
        for head in self.buckets.iter().rev() {
            let mut cur = *head;
            while let Some(pos) = cur {
                let slot = match self.slot(pos) {
                    Some(slot) => slot,
                    None => break,
                };
                if slot.value == *value {
                    return true;
                }
                cur = slot.next;
            }
        }
        false
    }

    /// Applies `f` to every live entry, in iteration order, after a full reclamation pass.
    pub fn snapshot<T, F>(&mut self, mut f: F) -> Vec<T>
        where F: FnMut(Option<K::Strong>, &V) -> T
    {
        self.reclaim_all();
        let mut out = Vec::with_capacity(self.len);
        for head in self.buckets.iter().rev() {
            let mut cur = *head;
            while let Some(pos) = cur {
                let slot = match self.slot(pos) {
                    Some(slot) => slot,
                    None => break,
                };
                if let Some(key) = slot.resolve().into_key() {
                    out.push(f(key, &slot.value));
                }
                cur = slot.next;
            }
        }
        out
    }

    /// The number of live entries, after a full reclamation pass.
    pub fn len(&mut self) -> usize {
        if self.len == 0 {
            return 0;
        }
        self.reclaim_all();
        self.len
    }

    pub fn clear(&mut self) {
        self.mod_count = self.mod_count.wrapping_add(1);
        for bucket in self.buckets.iter_mut() {
            *bucket = None;
        }
        let dropped = self.len;
        for entry in mem::take(&mut self.slots) {
            if let ArenaEntry::Occupied(slot) = entry {
                self.released.push(slot.value);
            }
        }
        self.free.clear();
        self.len = 0;
        // No bookkeeping is needed for pending notifications when the whole table goes.
        self.queue.clear();
        debug!(dropped, capacity = self.buckets.len(), "cleared table");
    }

    /// Grows ahead of a bulk load of `additional` entries, so that the load itself causes at
    /// most one more resize even if many of its keys are already present.
    pub fn reserve_for(&mut self, additional: usize) {
        if additional == 0 || additional <= self.threshold {
            return;
        }
        let target = (additional as f64 / self.load_factor as f64 + 1.0) as usize;
        let target = target.min(MAXIMUM_CAPACITY);
        let mut capacity = self.buckets.len();
        while capacity < target {
            capacity <<= 1;
        }
        if capacity > self.buckets.len() {
            self.resize(capacity, Growth::Reserve);
        }
    }

    /// Moves every live slot into a bucket array of `new_capacity` buckets.
    ///
    /// For load-driven growth, if the live entries turn out to fill less than half of the old
    /// threshold, the growth was caused by dead keys and the old array is kept instead.
    fn resize(&mut self, new_capacity: usize, growth: Growth) {
        self.reclaim_all();
        let old_capacity = self.buckets.len();
        if old_capacity == MAXIMUM_CAPACITY {
            self.threshold = usize::MAX;
            debug!(capacity = old_capacity, "table at maximum capacity, growth disabled");
            return;
        }

        self.mod_count = self.mod_count.wrapping_add(1);
        let mut old_buckets = mem::replace(&mut self.buckets,
                                           new_boxed_option_slice(new_capacity));
        self.transfer(&mut old_buckets);

        if growth == Growth::Reserve || self.len >= self.threshold / 2 {
            self.threshold = threshold_for(new_capacity, self.load_factor);
            debug!(old_capacity, new_capacity, len = self.len, "resized table");
        } else {
            self.reclaim_all();
            let mut new_buckets = mem::replace(&mut self.buckets, old_buckets);
            self.transfer(&mut new_buckets);
            debug!(old_capacity, new_capacity, len = self.len,
                   "resize was driven by dead keys, kept old table");
        }
    }

    /// Relinks every slot chained from `src` into `self.buckets`, freeing dead ones.
    fn transfer(&mut self, src: &mut [Option<usize>]) {
        let capacity = self.buckets.len();
        for head in src.iter_mut() {
            let mut cur = head.take();
            while let Some(pos) = cur {
                let (next, live, hash_code) = match self.slot(pos) {
                    Some(slot) => (slot.next, slot.is_live(), slot.hash_code),
                    None => break,
                };
                if live {
                    let bucket = index_for(hash_code, capacity);
                    let head = self.buckets[bucket];
                    if let Some(slot) = self.slot_mut(pos) {
                        slot.next = head;
                    }
                    self.buckets[bucket] = Some(pos);
                } else {
                    self.retire(pos);
                    self.len -= 1;
                }
                cur = next;
            }
        }
    }
}

impl<K, V, S> Debug for Table<K, V, S>
    where K: WeakElement,
          K::Strong: Debug,
          V: Debug
{
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{{ ")?;
        for (i, head) in self.buckets.iter().enumerate() {
            let mut cur = *head;
            while let Some(pos) = cur {
                let slot = match self.slot(pos) {
                    Some(slot) => slot,
                    None => break,
                };
                match slot.resolve() {
                    Resolved::Live(key) =>
                        write!(f, "[{}] {:?} => {:?} ({:x}), ", i, key, slot.value, slot.hash_code)?,
                    Resolved::Null =>
                        write!(f, "[{}] <null> => {:?} ({:x}), ", i, slot.value, slot.hash_code)?,
                    Resolved::Collected => (),
                }
                cur = slot.next;
            }
        }
        write!(f, "}}")
    }
}
