//! Cache backend abstraction and the in-process implementation.

use std::{
    sync::RwLock,
    time::{Duration, Instant},
};

use lru::LruCache;

use crate::domain::settings::SettingValue;

use super::config::CacheConfig;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::backend";

/// Process-shared cache holding setting values under namespaced keys.
pub trait CacheBackend: Send + Sync {
    fn get(&self, namespace: &str, key: &str) -> Option<SettingValue>;

    fn set(&self, namespace: &str, key: &str, value: SettingValue);

    fn delete(&self, namespace: &str, key: &str);

    /// Drop every entry stored under `namespace`.
    fn clear_namespace(&self, namespace: &str);
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct EntryKey {
    namespace: String,
    key: String,
}

impl EntryKey {
    fn new(namespace: &str, key: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            key: key.to_string(),
        }
    }
}

#[derive(Clone)]
struct Entry {
    value: SettingValue,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

/// In-memory LRU backend with an optional per-entry TTL.
pub struct MemoryCacheBackend {
    entries: RwLock<LruCache<EntryKey, Entry>>,
    ttl: Option<Duration>,
}

impl MemoryCacheBackend {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.capacity_non_zero())),
            ttl: config.ttl,
        }
    }

    /// Number of live and not-yet-purged entries across all namespaces.
    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryCacheBackend {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}

impl CacheBackend for MemoryCacheBackend {
    fn get(&self, namespace: &str, key: &str) -> Option<SettingValue> {
        let entry_key = EntryKey::new(namespace, key);
        let mut entries = rw_write(&self.entries, SOURCE, "get");
        let expired = entries
            .peek(&entry_key)
            .is_some_and(|entry| entry.is_expired(Instant::now()));
        if expired {
            entries.pop(&entry_key);
            return None;
        }
        entries.get(&entry_key).map(|entry| entry.value.clone())
    }

    fn set(&self, namespace: &str, key: &str, value: SettingValue) {
        let entry = Entry {
            value,
            expires_at: self.ttl.map(|ttl| Instant::now() + ttl),
        };
        rw_write(&self.entries, SOURCE, "set").put(EntryKey::new(namespace, key), entry);
    }

    fn delete(&self, namespace: &str, key: &str) {
        rw_write(&self.entries, SOURCE, "delete").pop(&EntryKey::new(namespace, key));
    }

    fn clear_namespace(&self, namespace: &str) {
        let mut entries = rw_write(&self.entries, SOURCE, "clear_namespace");
        let doomed: Vec<EntryKey> = entries
            .iter()
            .filter(|(entry_key, _)| entry_key.namespace == namespace)
            .map(|(entry_key, _)| entry_key.clone())
            .collect();
        for entry_key in doomed {
            entries.pop(&entry_key);
        }
    }
}
