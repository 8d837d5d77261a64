//! Bounded caches for extraction, parsing and analysis results.
//!
//! A cache accepts entries until it holds `max_size` of them and then stops
//! inserting. There is no eviction; size the caches through
//! [`CacheConfig`](crate::config::CacheConfig).

use std::{collections::HashMap, hash::Hash, sync::RwLock};

use tracing::trace;

/// Insert-until-full map guarded by a read/write lock
#[derive(Debug)]
pub struct BoundedCache<K, V> {
    name:     &'static str,
    entries:  RwLock<HashMap<K, V>>,
    max_size: usize
}

impl<K: Hash + Eq, V: Clone> BoundedCache<K, V> {
    pub fn new(name: &'static str, max_size: usize) -> Self {
        Self {
            name,
            entries: RwLock::new(HashMap::with_capacity(max_size.min(1024))),
            max_size
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.read().ok()?.get(key).cloned()
    }

    /// Store a value; returns `false` when the cache is full or disabled
    pub fn insert(&self, key: K, value: V) -> bool {
        let Ok(mut entries) = self.entries.write() else {
            return false;
        };
        if entries.contains_key(&key) {
            entries.insert(key, value);
            return true;
        }
        if entries.len() >= self.max_size {
            trace!(cache = self.name, max_size = self.max_size, "cache full, skipping insert");
            return false;
        }
        entries.insert(key, value);
        true
    }

    /// Return the cached value or compute and store it
    pub fn get_or_insert_with(&self, key: K, compute: impl FnOnce() -> V) -> V {
        if let Some(hit) = self.get(&key) {
            return hit;
        }
        let value = compute();
        self.insert(key, value.clone());
        value
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }
}
