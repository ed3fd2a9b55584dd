//! Bounded per-caller cache with idle expiry.
//!
//! Entries idle for longer than the TTL are dropped on every access. When
//! the cache is still over capacity, the least recently used entry goes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use stratagate_types::config::ManagerCacheConfig;

struct Entry<V> {
    value: Arc<V>,
    last_used: Instant,
}

/// Values keyed by optional caller id (`None` is the anonymous caller).
pub struct ManagerCache<V> {
    entries: Mutex<HashMap<Option<String>, Entry<V>>>,
    capacity: usize,
    ttl: Duration,
}

impl<V> ManagerCache<V> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
            ttl,
        }
    }

    pub fn from_config(config: &ManagerCacheConfig) -> Self {
        Self::new(config.capacity, config.ttl())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Option<String>, Entry<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The cached value for `key`, or a fresh one from `make`.
    ///
    /// `make` runs under the cache lock and must not touch the cache.
    pub fn get_or_insert_with(&self, key: Option<&str>, make: impl FnOnce() -> V) -> Arc<V> {
        let now = Instant::now();
        let mut entries = self.lock();
        let ttl = self.ttl;
        entries.retain(|_, entry| now.duration_since(entry.last_used) < ttl);

        let owned = key.map(str::to_string);
        if let Some(entry) = entries.get_mut(&owned) {
            entry.last_used = now;
            return entry.value.clone();
        }

        while entries.len() >= self.capacity {
            let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(key, _)| key.clone())
            else {
                break;
            };
            debug!(caller = ?oldest, "evicting least recently used manager");
            entries.remove(&oldest);
        }

        let value = Arc::new(make());
        entries.insert(
            owned,
            Entry {
                value: value.clone(),
                last_used: now,
            },
        );
        value
    }

    pub fn remove(&self, key: Option<&str>) -> Option<Arc<V>> {
        self.lock()
            .remove(&key.map(str::to_string))
            .map(|entry| entry.value)
    }

    /// Number of entries, counting ones that have expired but not yet
    /// been swept.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl<V> std::fmt::Debug for ManagerCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagerCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .field("ttl", &self.ttl)
            .finish()
    }
}
