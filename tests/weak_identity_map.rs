mod util;

use std::cell::Cell;
use std::rc::{Rc, Weak};
use std::sync::{self, Arc};

use quickcheck::quickcheck;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use weak_identity_table::{Config, Error, WeakIdentityMap};

use util::weak_identity_map::{Script, Tester};

type Map<T, V> = WeakIdentityMap<Weak<T>, V>;

fn test_script<K, V>(script: &Script<K, V>) -> bool
    where K: Clone + std::fmt::Debug,
          V: Clone + std::fmt::Debug + Eq
{
    let mut tester = Tester::with_capacity(4);
    tester.execute_script(script);
    tester.check()
}

quickcheck! {
    fn prop_u8_u8(script: Script<u8, u8>) -> bool {
        test_script(&script)
    }

    fn prop_string_usize(script: Script<String, usize>) -> bool {
        test_script(&script)
    }
}

#[test]
fn keys_compare_by_identity_not_equality() {
    let map: Map<String, u32> = WeakIdentityMap::new();
    let a = Rc::new("key".to_string());
    let b = Rc::new("key".to_string());
    assert_eq!(a, b);

    map.insert(a.clone(), 1);
    assert!(map.contains_key(&a));
    assert!(!map.contains_key(&b));
    assert_eq!(map.get(&b), None);

    map.insert(b.clone(), 2);
    assert_eq!(map.get(&a), Some(1));
    assert_eq!(map.get(&b), Some(2));
    assert_eq!(map.get(&a.clone()), Some(1));
    assert_eq!(map.len(), 2);
}

#[test]
fn insert_replaces_and_returns_previous() {
    let map: Map<u32, &str> = WeakIdentityMap::new();
    let k = Rc::new(0);
    assert_eq!(map.insert(k.clone(), "first"), None);
    assert_eq!(map.get(&k), Some("first"));
    assert_eq!(map.insert(k.clone(), "second"), Some("first"));
    assert_eq!(map.get(&k), Some("second"));
    assert_eq!(map.len(), 1);
}

#[test]
fn remove_then_get_is_absent_and_len_drops_by_one() {
    let map: Map<u32, u32> = WeakIdentityMap::new();
    let keys: Vec<_> = (0 .. 5).map(Rc::new).collect();
    for key in &keys {
        map.insert(key.clone(), **key * 10);
    }
    assert_eq!(map.len(), 5);

    assert_eq!(map.remove(&keys[2]), Some(20));
    assert_eq!(map.get(&keys[2]), None);
    assert!(!map.contains_key(&keys[2]));
    assert_eq!(map.len(), 4);
    assert_eq!(map.remove(&keys[2]), None);
    assert_eq!(map.len(), 4);
}

#[test]
fn clear_twice_leaves_it_empty() {
    let map: Map<u32, u32> = WeakIdentityMap::new();
    let keys: Vec<_> = (0 .. 20).map(Rc::new).collect();
    for key in &keys {
        map.insert(key.clone(), **key);
    }
    map.clear();
    assert_eq!(map.len(), 0);
    assert!(map.is_empty());
    map.clear();
    assert_eq!(map.len(), 0);
    assert_eq!(map.get(&keys[0]), None);
}

#[test]
fn dropped_keys_are_reclaimed() {
    let map: Map<String, u32> = WeakIdentityMap::new();
    let keep = Rc::new("keep".to_string());
    let lose = Rc::new("lose".to_string());
    map.insert(keep.clone(), 1);
    map.insert(lose.clone(), 2);
    assert_eq!(map.len(), 2);

    drop(lose);
    assert_eq!(map.len(), 1);
    assert!(map.contains_key(&keep));
    assert!(!map.contains_key(&Rc::new("lose".to_string())));
}

#[test]
fn randomly_dropped_keys_are_reclaimed() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let map: Map<u32, u32> = WeakIdentityMap::with_capacity(4);
    let mut keys: Vec<_> = (0 .. 500).map(Rc::new).collect();
    for key in &keys {
        map.insert(key.clone(), **key);
    }

    keys.shuffle(&mut rng);
    let kept = keys.split_off(200);
    drop(keys);

    assert_eq!(map.len(), kept.len());
    for key in &kept {
        assert_eq!(map.get(key), Some(**key));
    }
}

#[test]
fn growth_keeps_every_live_entry() {
    let map: Map<u32, u32> = WeakIdentityMap::with_capacity(4);
    let keys: Vec<_> = (0 .. 1000).map(Rc::new).collect();
    for key in &keys {
        map.insert(key.clone(), **key + 1);
    }
    assert_eq!(map.len(), 1000);
    assert!(map.capacity() >= 1024);
    for key in &keys {
        assert_eq!(map.get(key), Some(**key + 1));
    }
}

#[test]
fn thirteen_keys_in_sixteen_buckets_grow_to_thirty_two() {
    let map: Map<u32, u32> = WeakIdentityMap::with_capacity_and_load_factor(16, 0.75).unwrap();
    assert_eq!(map.capacity(), 16);
    assert_eq!(map.threshold(), 12);

    let keys: Vec<_> = (0 .. 13).map(Rc::new).collect();
    for key in &keys {
        map.insert(key.clone(), **key);
    }
    assert_eq!(map.capacity(), 32);
    assert_eq!(map.threshold(), 24);
    assert_eq!(map.len(), 13);
    for key in &keys {
        assert_eq!(map.get(key), Some(**key));
    }
}

#[test]
fn growth_driven_by_dead_keys_is_undone() {
    let map: Map<u32, u32> = WeakIdentityMap::new();
    for i in 0 .. 200 {
        map.insert(Rc::new(i), i);
    }
    let live = Rc::new(1000);
    map.insert(live.clone(), 1000);

    assert_eq!(map.capacity(), 16);
    assert_eq!(map.len(), 1);
    assert_eq!(map.get(&live), Some(1000));
}

#[test]
fn constructor_rejects_bad_load_factor() {
    let err = Map::<u32, u32>::with_capacity_and_load_factor(16, 0.0).err();
    assert_eq!(err, Some(Error::IllegalLoadFactor(0.0)));

    let err = Map::<u32, u32>::with_config(Config::default().load_factor(f32::NAN)).err();
    assert!(matches!(err, Some(Error::IllegalLoadFactor(lf)) if lf.is_nan()));

    let map = Map::<u32, u32>::with_config(Config::default().initial_capacity(0)).unwrap();
    assert_eq!(map.capacity(), 1);
}

#[test]
fn capacity_hint_is_capped() {
    let config = Config::default().initial_capacity(usize::MAX);
    assert_eq!(config.bucket_count(), 1 << 30);
}

#[test]
fn absent_key_and_absent_values() {
    let map: Map<u32, Option<u32>> = WeakIdentityMap::new();
    let k = Rc::new(1);

    map.insert(k.clone(), None);
    assert_eq!(map.get(&k), Some(None));
    assert!(map.contains_key(&k));

    assert!(!map.contains_key(None));
    map.insert(None, Some(5));
    assert!(map.contains_key(None));
    assert_eq!(map.get(None), Some(Some(5)));
    assert_eq!(map.len(), 2);

    drop(k);
    assert_eq!(map.len(), 1);
    assert_eq!(map.remove(None), Some(Some(5)));
    assert!(map.is_empty());
}

#[test]
fn contains_value_uses_equality() {
    let map: Map<u32, String> = WeakIdentityMap::new();
    let k = Rc::new(1);
    map.insert(k.clone(), "one".to_string());
    assert!(map.contains_value(&"one".to_string()));
    assert!(!map.contains_value(&"two".to_string()));

    drop(k);
    assert!(!map.contains_value(&"one".to_string()));
}

#[test]
fn remove_entry_needs_matching_value() {
    let map: Map<u32, u32> = WeakIdentityMap::new();
    let k = Rc::new(1);
    map.insert(k.clone(), 10);
    assert!(!map.remove_entry(&k, &11));
    assert!(map.contains_key(&k));
    assert!(map.remove_entry(&k, &10));
    assert!(!map.contains_key(&k));
}

#[test]
fn with_value_mut_updates_in_place() {
    let map: Map<u32, Vec<u32>> = WeakIdentityMap::new();
    let k = Rc::new(1);
    map.insert(k.clone(), vec![]);
    map.with_value_mut(&k, |v| v.push(7));
    map.with_value_mut(&k, |v| v.push(8));
    assert_eq!(map.with_value(&k, |v| v.len()), Some(2));
    assert_eq!(map.get(&k), Some(vec![7, 8]));
}

#[test]
fn values_are_held_strongly() {
    struct Annotated {
        _owner: Rc<u32>,
    }

    let map: Map<u32, Annotated> = WeakIdentityMap::new();
    let k = Rc::new(1);
    map.insert(k.clone(), Annotated { _owner: k.clone() });
    let weak = Rc::downgrade(&k);
    drop(k);

    // The value points back at its own key, so the entry cannot die.
    assert_eq!(map.len(), 1);
    assert!(weak.upgrade().is_some());

    map.clear();
    assert!(weak.upgrade().is_none());
}

#[test]
fn put_all_sizes_up_front() {
    let map: Map<u32, u32> = WeakIdentityMap::new();
    let keys: Vec<_> = (0 .. 100).map(Rc::new).collect();
    map.put_all(keys.iter().map(|k| (k.clone(), **k)));
    assert_eq!(map.capacity(), 256);
    assert_eq!(map.len(), 100);

    // Overlapping keys do not grow the table again.
    map.put_all(keys.iter().map(|k| (k.clone(), **k + 1)));
    assert_eq!(map.capacity(), 256);
    assert_eq!(map.get(&keys[99]), Some(100));
}

#[test]
fn from_entries_and_collect() {
    let keys: Vec<_> = (0 .. 30).map(Rc::new).collect();
    let map: Map<u32, u32> =
        WeakIdentityMap::from_entries(keys.iter().map(|k| (k.clone(), **k)));
    assert_eq!(map.capacity(), 64);
    assert_eq!(map.len(), 30);

    let mut collected: Map<u32, u32> = keys.iter().take(3).map(|k| (k.clone(), 0)).collect();
    assert_eq!(collected.len(), 3);
    collected.extend(vec![(None::<Rc<u32>>, 9)]);
    assert_eq!(collected.get(None), Some(9));
    assert_eq!(collected.len(), 4);
}

#[test]
fn arc_keys_work_too() {
    let map: WeakIdentityMap<sync::Weak<str>, i32> = WeakIdentityMap::new();
    let a: Arc<str> = Arc::from("a");
    let a2: Arc<str> = Arc::from("a");
    map.insert(a.clone(), 1);
    assert_eq!(map.get(&a), Some(1));
    assert_eq!(map.get(&a2), None);
    drop(a);
    assert!(map.is_empty());
}

#[test]
fn debug_lists_live_entries() {
    let map: Map<u32, &str> = WeakIdentityMap::new();
    let k = Rc::new(42);
    map.insert(k.clone(), "answer");
    let rendered = format!("{:?}", map);
    assert!(rendered.contains("42 => \"answer\""), "{}", rendered);

    drop(k);
    assert_eq!(format!("{:?}", map), "{ }");
}

/// A value that looks at its own map while it is being dropped.
struct Reentrant {
    map:  Weak<WeakIdentityMap<Weak<u32>, Reentrant>>,
    seen: Rc<Cell<Option<usize>>>,
}

impl Drop for Reentrant {
    fn drop(&mut self) {
        if let Some(map) = self.map.upgrade() {
            self.seen.set(Some(map.len()));
        }
    }
}

#[test]
fn dropped_values_may_use_the_map() {
    let map: Rc<WeakIdentityMap<Weak<u32>, Reentrant>> = Rc::new(WeakIdentityMap::new());
    let seen = Rc::new(Cell::new(None));
    let value = || Reentrant { map: Rc::downgrade(&map), seen: seen.clone() };

    let keys: Vec<_> = (0 .. 4).map(Rc::new).collect();
    for key in &keys {
        map.insert(key.clone(), value());
    }

    // Reclamation of a dead key.
    let mut keys = keys.into_iter();
    drop(keys.next());
    assert_eq!(map.len(), 3);
    assert_eq!(seen.get(), Some(3));

    // Removal through an iterator.
    let mut it = map.keys().iter();
    assert!(matches!(it.next(), Some(Ok(Some(_)))));
    it.remove().unwrap();
    drop(it);
    assert_eq!(seen.get(), Some(2));
    assert_eq!(map.len(), 2);

    // Clearing the whole map.
    seen.set(None);
    map.clear();
    assert_eq!(seen.get(), Some(0));
    assert!(map.is_empty());
    drop(keys);
}
