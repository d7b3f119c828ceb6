//! Ordered map wrapper that never creates entries implicitly.
//!
//! Resource tables are keyed by id and iterated in key order, which gives
//! listings a stable default order. Every write is explicit:
//! - `get()` returns `Option`
//! - `replace()` fails instead of inserting when the key is missing
//!
//! Between `begin()` and `commit()` every write records the previous value,
//! so `rollback()` restores the map without copying it up front.

use std::collections::BTreeMap;
use thiserror::Error;

/// Error type for SyncMap operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncMapError {
    #[error("Key not found")]
    KeyNotFound,
}

/// An ordered map that never auto-vivifies entries.
///
/// # Example
///
/// ```
/// use sfc_orch_common::SyncMap;
///
/// let mut map: SyncMap<u32, &str> = SyncMap::new();
///
/// assert!(map.get(&1).is_none());
/// assert!(map.replace(1, "chain").is_err());
///
/// map.insert(1, "chain");
/// assert_eq!(map.replace(1, "group"), Ok("chain"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SyncMap<K, V> {
    inner: BTreeMap<K, V>,
    /// Previous value per write, oldest first; `None` when not journaling.
    journal: Option<Vec<(K, Option<V>)>>,
}

impl<K, V> SyncMap<K, V>
where
    K: Ord,
{
    /// Creates a new empty map.
    pub fn new() -> Self {
        Self {
            inner: BTreeMap::new(),
            journal: None,
        }
    }

    /// Returns the number of entries in the map.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns true if the map is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns a reference to the value for the given key.
    ///
    /// **This never creates entries.**
    pub fn get(&self, key: &K) -> Option<&V> {
        self.inner.get(key)
    }

    /// Returns an iterator over values in key order.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.inner.values()
    }
}

impl<K, V> SyncMap<K, V>
where
    K: Ord + Clone,
    V: Clone,
{
    /// Inserts a key-value pair, returning the old value if present.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        match self.journal.as_mut() {
            Some(journal) => {
                let previous = self.inner.insert(key.clone(), value);
                journal.push((key, previous.clone()));
                previous
            }
            None => self.inner.insert(key, value),
        }
    }

    /// Replaces the value of an existing key and returns the previous value.
    ///
    /// Fails with [`SyncMapError::KeyNotFound`] rather than inserting.
    pub fn replace(&mut self, key: K, value: V) -> Result<V, SyncMapError> {
        let slot = self.inner.get_mut(&key).ok_or(SyncMapError::KeyNotFound)?;
        let previous = std::mem::replace(slot, value);
        if let Some(journal) = self.journal.as_mut() {
            journal.push((key, Some(previous.clone())));
        }
        Ok(previous)
    }

    /// Removes a key from the map.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let previous = self.inner.remove(key);
        if let (Some(journal), Some(value)) = (self.journal.as_mut(), previous.as_ref()) {
            journal.push((key.clone(), Some(value.clone())));
        }
        previous
    }

    /// Starts recording writes; a journal already open is discarded.
    pub fn begin(&mut self) {
        self.journal = Some(Vec::new());
    }

    /// Keeps every write since `begin()`.
    pub fn commit(&mut self) {
        self.journal = None;
    }

    /// Undoes every write since `begin()`, newest first. No-op without a journal.
    pub fn rollback(&mut self) {
        let Some(journal) = self.journal.take() else {
            return;
        };
        for (key, previous) in journal.into_iter().rev() {
            match previous {
                Some(value) => {
                    self.inner.insert(key, value);
                }
                None => {
                    self.inner.remove(&key);
                }
            }
        }
    }
}

impl<K, V> Default for SyncMap<K, V>
where
    K: Ord,
{
    fn default() -> Self {
        Self::new()
    }
}
