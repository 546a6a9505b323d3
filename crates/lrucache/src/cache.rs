//! LruCache: thread-safe handle over the LRU core

use std::fmt;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Arc;
use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::lru::Lru;

/// Fixed-capacity LRU cache shared between threads
///
/// Every operation takes one reader/writer lock around the index and the
/// recency list, so concurrent calls are serialized and never observe a
/// half-applied mutation. Cloning the handle is cheap; clones share the same
/// entries.
///
/// Note that [`get`](Self::get) is not a read-only operation: a hit promotes
/// the entry, so it needs the write lock. Use [`peek`](Self::peek) when shared
/// access without promotion is enough.
pub struct LruCache<K, V> {
    /// Index + recency list, guarded as one unit
    inner: Arc<RwLock<Lru<K, V>>>,

    /// Maximum number of resident entries
    capacity: usize,
}

impl<K, V> LruCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Create a new empty cache
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of entries kept resident
    ///
    /// # Returns
    /// * `Result<LruCache>` - `Error::ZeroCapacity` if `capacity` is 0
    pub fn new(capacity: usize) -> Result<Self> {
        let capacity = NonZeroUsize::new(capacity).ok_or(Error::ZeroCapacity)?;
        Ok(Self::with_capacity(capacity))
    }

    /// Create a new empty cache from a capacity that is known to be positive
    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        debug!(capacity = capacity.get(), "Creating LRU cache");

        Self {
            inner: Arc::new(RwLock::new(Lru::new(capacity))),
            capacity: capacity.get(),
        }
    }

    /// Get a copy of the value stored for `key` and mark it most recently used
    ///
    /// Takes the exclusive lock even though it looks like a read.
    ///
    /// # Returns
    /// * `Option<V>` - `None` if the key is not resident; ordering is then untouched
    pub fn get(&self, key: &K) -> Option<V> {
        let mut lru = self.inner.write();
        lru.get(key).cloned()
    }

    /// Get a copy of the value stored for `key` without promoting it
    pub fn peek(&self, key: &K) -> Option<V> {
        self.inner.read().peek(key).cloned()
    }

    /// Check whether `key` is resident, without promoting it
    pub fn contains(&self, key: &K) -> bool {
        self.inner.read().contains(key)
    }

    /// Insert or update a value and mark it most recently used
    ///
    /// Updating a resident key replaces its value and never evicts. Inserting
    /// a new key into a full cache first evicts the least recently used entry.
    pub fn set(&self, key: K, value: V) {
        let evicted = {
            let mut lru = self.inner.write();
            lru.put(key, value)
        };

        // The evicted pair is dropped here, outside the lock.
        if evicted.is_some() {
            trace!(capacity = self.capacity, "Evicted least recently used entry");
        }
    }

    /// Remove `key` if resident; absent keys are a no-op
    pub fn delete(&self, key: &K) {
        self.remove(key);
    }

    /// Remove `key` and hand back its value
    pub fn remove(&self, key: &K) -> Option<V> {
        let mut lru = self.inner.write();
        lru.remove(key)
    }

    /// Get the number of resident entries
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Check if the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Get the cache capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Snapshot of resident keys, most recently used first
    pub fn keys(&self) -> Vec<K> {
        self.inner.read().keys().cloned().collect()
    }

    /// Drop every entry; capacity is unchanged
    pub fn clear(&self) {
        let mut lru = self.inner.write();
        let dropped = lru.len();
        lru.clear();
        drop(lru);

        debug!(dropped, "Cleared LRU cache");
    }
}

impl<K, V> Clone for LruCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            capacity: self.capacity,
        }
    }
}

impl<K, V> fmt::Debug for LruCache<K, V>
where
    K: Hash + Eq + Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruCache")
            .field("capacity", &self.capacity)
            .field("len", &self.inner.read().len())
            .finish()
    }
}
