//! Backing Store Module
//!
//! The concurrent key/value capability the expiring map is layered on, plus
//! two implementations: a sharded `DashMap` store and a single-lock store.

use std::collections::hash_map;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use dashmap::mapref::entry::Entry as SlotEntry;
use dashmap::DashMap;
use parking_lot::RwLock;

// == Backing Store Trait ==
/// Internally synchronized key/value store with per-key atomic operations.
///
/// No atomicity is promised across keys or across two calls. `range` must
/// tolerate the store being mutated from inside `visit`, including removal
/// of the key being visited, and must not hold a lock while `visit` runs.
pub trait ConcurrentKeyValueStore<K, V>: Send + Sync {
    /// Returns a copy of the value stored under `key`.
    fn get(&self, key: &K) -> Option<V>;

    /// Upserts `value`, returning true if the key already had a value.
    fn set(&self, key: K, value: V) -> bool;

    /// Inserts `value` only if the key is vacant. Returns true if inserted.
    fn set_if_absent(&self, key: K, value: V) -> bool;

    /// Atomically returns the existing value, or stores `value` if vacant.
    ///
    /// The flag is true when an existing value was loaded.
    fn load_or_store(&self, key: K, value: V) -> (V, bool);

    /// Removes the key, returning true if it was present.
    fn delete(&self, key: &K) -> bool;

    /// Alias removal primitive; forwards to [`delete`](Self::delete) unless overridden.
    fn remove(&self, key: &K) -> bool {
        self.delete(key)
    }

    /// Removes the key only if its current value satisfies `predicate`.
    fn remove_if<P>(&self, key: &K, predicate: P) -> bool
    where
        P: FnOnce(&V) -> bool;

    /// Overwrites the key only if it is present and its value satisfies `predicate`.
    fn replace_if<P>(&self, key: &K, value: V, predicate: P) -> bool
    where
        P: FnOnce(&V) -> bool;

    /// Visits every stored pair until `visit` returns false.
    fn range<F>(&self, visit: F)
    where
        F: FnMut(&K, &V) -> bool;

    /// Removes every key.
    fn clear(&self);

    /// Number of stored keys.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// == DashMap Store ==
/// Sharded lock-per-shard store built on `DashMap`.
///
/// Operations on keys in different shards never contend.
pub struct DashMapStore<K, V> {
    inner: DashMap<K, V>,
}

impl<K, V> fmt::Debug for DashMapStore<K, V>
where
    K: Eq + Hash,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DashMapStore")
            .field("len", &self.inner.len())
            .finish()
    }
}

impl<K, V> Default for DashMapStore<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> DashMapStore<K, V>
where
    K: Eq + Hash,
{
    /// Create a new empty store
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }

    /// Create with room for `capacity` entries
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: DashMap::with_capacity(capacity),
        }
    }

    /// Create with an explicit shard count.
    ///
    /// `shard_amount` must be a power of two greater than 1; callers validate
    /// it first (see [`MapConfig::validate`](crate::MapConfig::validate)).
    pub fn with_capacity_and_shard_amount(capacity: usize, shard_amount: usize) -> Self {
        Self {
            inner: DashMap::with_capacity_and_shard_amount(capacity, shard_amount),
        }
    }
}

impl<K, V> ConcurrentKeyValueStore<K, V> for DashMapStore<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    #[inline]
    fn get(&self, key: &K) -> Option<V> {
        self.inner.get(key).map(|slot| slot.value().clone())
    }

    #[inline]
    fn set(&self, key: K, value: V) -> bool {
        self.inner.insert(key, value).is_some()
    }

    fn set_if_absent(&self, key: K, value: V) -> bool {
        match self.inner.entry(key) {
            SlotEntry::Occupied(_) => false,
            SlotEntry::Vacant(slot) => {
                slot.insert(value);
                true
            }
        }
    }

    fn load_or_store(&self, key: K, value: V) -> (V, bool) {
        match self.inner.entry(key) {
            SlotEntry::Occupied(slot) => (slot.get().clone(), true),
            SlotEntry::Vacant(slot) => {
                slot.insert(value.clone());
                (value, false)
            }
        }
    }

    #[inline]
    fn delete(&self, key: &K) -> bool {
        self.inner.remove(key).is_some()
    }

    fn remove_if<P>(&self, key: &K, predicate: P) -> bool
    where
        P: FnOnce(&V) -> bool,
    {
        self.inner
            .remove_if(key, |_, value| predicate(value))
            .is_some()
    }

    fn replace_if<P>(&self, key: &K, value: V, predicate: P) -> bool
    where
        P: FnOnce(&V) -> bool,
    {
        let Some(mut slot) = self.inner.get_mut(key) else {
            return false;
        };
        if !predicate(slot.value()) {
            return false;
        }
        *slot.value_mut() = value;
        true
    }

    fn range<F>(&self, mut visit: F)
    where
        F: FnMut(&K, &V) -> bool,
    {
        // Shard guards must be released before `visit` runs, since it may
        // write to the same shard.
        let keys: Vec<K> = self.inner.iter().map(|slot| slot.key().clone()).collect();
        for key in keys {
            let Some(value) = self.get(&key) else {
                continue;
            };
            if !visit(&key, &value) {
                break;
            }
        }
    }

    fn clear(&self) {
        self.inner.clear();
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}

// == Locked Store ==
/// Single `RwLock` around a `HashMap`.
///
/// Simple in-memory double for the sharded store; also fine for small maps.
#[derive(Debug)]
pub struct LockedStore<K, V> {
    inner: RwLock<HashMap<K, V>>,
}

impl<K, V> Default for LockedStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> LockedStore<K, V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> ConcurrentKeyValueStore<K, V> for LockedStore<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    fn get(&self, key: &K) -> Option<V> {
        self.inner.read().get(key).cloned()
    }

    fn set(&self, key: K, value: V) -> bool {
        self.inner.write().insert(key, value).is_some()
    }

    fn set_if_absent(&self, key: K, value: V) -> bool {
        match self.inner.write().entry(key) {
            hash_map::Entry::Occupied(_) => false,
            hash_map::Entry::Vacant(slot) => {
                slot.insert(value);
                true
            }
        }
    }

    fn load_or_store(&self, key: K, value: V) -> (V, bool) {
        match self.inner.write().entry(key) {
            hash_map::Entry::Occupied(slot) => (slot.get().clone(), true),
            hash_map::Entry::Vacant(slot) => {
                slot.insert(value.clone());
                (value, false)
            }
        }
    }

    fn delete(&self, key: &K) -> bool {
        self.inner.write().remove(key).is_some()
    }

    fn remove_if<P>(&self, key: &K, predicate: P) -> bool
    where
        P: FnOnce(&V) -> bool,
    {
        let mut guard = self.inner.write();
        let matches = guard.get(key).is_some_and(predicate);
        matches && guard.remove(key).is_some()
    }

    fn replace_if<P>(&self, key: &K, value: V, predicate: P) -> bool
    where
        P: FnOnce(&V) -> bool,
    {
        let mut guard = self.inner.write();
        let Some(current) = guard.get_mut(key) else {
            return false;
        };
        if !predicate(current) {
            return false;
        }
        *current = value;
        true
    }

    fn range<F>(&self, mut visit: F)
    where
        F: FnMut(&K, &V) -> bool,
    {
        let keys: Vec<K> = self.inner.read().keys().cloned().collect();
        for key in keys {
            let Some(value) = self.get(&key) else {
                continue;
            };
            if !visit(&key, &value) {
                break;
            }
        }
    }

    fn clear(&self) {
        self.inner.write().clear();
    }

    fn len(&self) -> usize {
        self.inner.read().len()
    }
}
