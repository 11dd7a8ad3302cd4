//! Quire settings cache.
//!
//! A read-through / write-through cache in front of the settings store:
//!
//! - **Path entries** hold one decoded setting (`setting_{category}_{key}`)
//! - **Category entries** hold a whole category as a map (`setting_{category}`)
//!
//! ## Configuration
//!
//! Cache behavior is controlled via `quire.toml`:
//!
//! ```toml
//! [settings_cache]
//! capacity = 1024
//! ttl_seconds = 300
//! ```

mod backend;
mod config;
mod keys;
pub(crate) mod lock;
mod settings;

pub use backend::{CacheBackend, MemoryCacheBackend};
pub use config::CacheConfig;
pub use keys::{
    SETTINGS_CACHE_NAMESPACE, category_entry_key, is_cacheable_category, path_entry_key,
};
pub use settings::{SettingsCache, SettingsError};
