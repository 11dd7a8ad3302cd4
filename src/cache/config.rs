//! Settings cache configuration.
//!
//! Controlled through the `[settings_cache]` section of `quire.toml`.

use std::{num::NonZeroUsize, time::Duration};

use serde::Deserialize;

const DEFAULT_CAPACITY: usize = 1024;

/// Settings cache configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of entries kept in memory (path and category entries combined).
    pub capacity: usize,
    /// Entry lifetime; `None` keeps entries until evicted or cleared.
    pub ttl: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            ttl: None,
        }
    }
}

impl From<&crate::config::SettingsCacheSettings> for CacheConfig {
    fn from(settings: &crate::config::SettingsCacheSettings) -> Self {
        Self {
            capacity: settings.capacity.get() as usize,
            ttl: settings.ttl,
        }
    }
}

impl CacheConfig {
    /// Returns the capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.capacity).unwrap_or(NonZeroUsize::MIN)
    }
}
