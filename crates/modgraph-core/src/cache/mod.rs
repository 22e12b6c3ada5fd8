//! Single-initialization concurrent cache.
//!
//! `OnceMap` memoizes one value per key across threads: the first caller for a
//! key runs its factory, every concurrent caller for the same key blocks until
//! that value exists, and all of them observe the identical result. Callers
//! for different keys never wait on each other's factories.

use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::OnceCell;

/// Concurrent memoizing map with first-initializer-wins semantics
pub struct OnceMap<K, V> {
    cells: DashMap<K, Arc<OnceCell<V>>>,
}

impl<K, V> OnceMap<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Create an empty map
    pub fn new() -> Self {
        Self {
            cells: DashMap::new(),
        }
    }

    /// Return the value for `key`, running `init` if no caller has yet.
    ///
    /// `init` must not request the same key again.
    pub fn get_or_init<F>(&self, key: K, init: F) -> V
    where
        F: FnOnce() -> V,
    {
        // The shard lock is released before `init` runs.
        let cell = self
            .cells
            .entry(key)
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();
        cell.get_or_init(init).clone()
    }

    /// Return the value for `key` if it has finished initializing
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.cells.get(key).and_then(|cell| cell.get().cloned())
    }

    /// Check if a finished value exists for `key`
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).is_some()
    }

    /// Number of keys ever requested
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Snapshot of every finished value, in no particular order
    pub fn values(&self) -> Vec<V> {
        self.cells
            .iter()
            .filter_map(|entry| entry.value().get().cloned())
            .collect()
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.cells.clear();
    }
}

impl<K, V> Default for OnceMap<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for OnceMap<K, V>
where
    K: Eq + Hash,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnceMap").field("len", &self.cells.len()).finish()
    }
}
