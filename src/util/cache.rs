//! Bounded LRU cache with hit and miss counters.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::time::Instant;

/// A small LRU cache keyed by string.
///
/// Clones share the same storage.
#[derive(Clone)]
pub struct LruCache<V> {
    inner: Arc<RwLock<CacheInner<V>>>,
}

struct CacheInner<V> {
    entries: HashMap<String, CacheEntry<V>>,
    max_entries: usize,
    hits: u64,
    misses: u64,
}

struct CacheEntry<V> {
    value: V,
    last_accessed: Instant,
}

/// Counters reported by [`LruCache::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

impl<V: Clone> LruCache<V> {
    pub fn new(max_entries: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(CacheInner {
                entries: HashMap::new(),
                max_entries,
                hits: 0,
                misses: 0,
            })),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheInner<V>> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read(&self) -> RwLockReadGuard<'_, CacheInner<V>> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Get a cached value and mark it recently used.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut inner = self.write();
        match inner.entries.get_mut(key) {
            Some(entry) => {
                entry.last_accessed = Instant::now();
                let value = entry.value.clone();
                inner.hits += 1;
                Some(value)
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Insert a value, evicting the least recently used entry at capacity.
    pub fn insert(&self, key: String, value: V) {
        let mut inner = self.write();
        if inner.max_entries == 0 {
            return;
        }

        if !inner.entries.contains_key(&key) && inner.entries.len() >= inner.max_entries {
            if let Some(lru_key) = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_accessed)
                .map(|(k, _)| k.clone())
            {
                inner.entries.remove(&lru_key);
            }
        }

        inner.entries.insert(
            key,
            CacheEntry {
                value,
                last_accessed: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.read();
        CacheStats {
            entries: inner.entries.len(),
            hits: inner.hits,
            misses: inner.misses,
        }
    }
}
