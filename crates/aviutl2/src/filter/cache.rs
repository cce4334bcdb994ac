//! Per-object state for filters.
//!
//! Filter item values are inputs refreshed before every call; anything a
//! filter derives from them and wants to keep across frames belongs here,
//! keyed by the effect instance ID.

use std::collections::HashMap;

use parking_lot::Mutex;

/// Cache of derived state keyed by [`aviutl2_sys::ObjectInfo::effect_id`].
#[derive(Debug)]
pub struct ObjectCache<T> {
    entries: Mutex<HashMap<i64, T>>,
    capacity: usize,
}

impl<T> Default for ObjectCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ObjectCache<T> {
    /// Default number of entries kept before the cache is flushed.
    pub const DEFAULT_CAPACITY: usize = 1024;

    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Create an empty cache holding at most `capacity` entries.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Run `f` on the entry for `effect_id`, creating it with `init` first if
    /// needed. When a new entry would exceed the capacity the cache is
    /// flushed; effect IDs of deleted objects are never reported.
    pub fn with<R>(&self, effect_id: i64, init: impl FnOnce() -> T, f: impl FnOnce(&mut T) -> R) -> R {
        let mut entries = self.entries.lock();
        if !entries.contains_key(&effect_id) && entries.len() >= self.capacity {
            tracing::debug!(capacity = self.capacity, "object cache full, flushing");
            entries.clear();
        }
        f(entries.entry(effect_id).or_insert_with(init))
    }

    /// Remove and return the entry for `effect_id`.
    pub fn remove(&self, effect_id: i64) -> Option<T> {
        self.entries.lock().remove(&effect_id)
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
