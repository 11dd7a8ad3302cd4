//! Read-through / write-through cache over the settings store.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use metrics::counter;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::application::repos::{ConfigStore, RepoError};
use crate::domain::{key_path::KeyPath, settings::SettingValue};

use super::backend::CacheBackend;
use super::keys::{
    SETTINGS_CACHE_NAMESPACE, category_entry_key, is_cacheable_category, path_entry_key,
};
use super::lock::mutex_lock;

const SOURCE: &str = "cache::settings";

const METRIC_CACHE_HIT: &str = "quire_settings_cache_hit_total";
const METRIC_CACHE_MISS: &str = "quire_settings_cache_miss_total";
const METRIC_WRITE: &str = "quire_settings_write_total";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Invalid path format `{path}`: expected `category.key_name` with no `_` in the category")]
    InvalidPath { path: String },
    #[error("Setting not found: `{category}.{key_name}`")]
    SettingNotFound { category: String, key_name: String },
    #[error(transparent)]
    Store(#[from] RepoError),
}

/// Settings access for the whole process.
///
/// Reads consult the cache first and fall through to the store on a miss,
/// populating the cache with what they found. Missing settings are never
/// cached. Writes go to the store first, then overwrite the setting's path
/// entry with the written value and delete its category entry so the next
/// category read rebuilds the aggregate from the store.
///
/// Every write bumps a generation per cache key. A read only fills the cache
/// when no write to that key completed while it was waiting on the store.
#[derive(Clone)]
pub struct SettingsCache {
    store: Arc<dyn ConfigStore>,
    backend: Arc<dyn CacheBackend>,
    generations: Arc<Mutex<HashMap<String, u64>>>,
}

impl SettingsCache {
    pub fn new(store: Arc<dyn ConfigStore>, backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            store,
            backend,
            generations: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Namespace holding every entry managed by this cache.
    pub fn cache_config(&self) -> &'static str {
        SETTINGS_CACHE_NAMESPACE
    }

    /// Resolve `path`, falling back to `default` when nothing is stored.
    ///
    /// Accepts `category`, `category.key` and `category.key.field`; the last
    /// form reads one field out of a structured value. The result is coerced
    /// toward the shape of `default`. Never fails: store errors are logged
    /// and answered with `default`.
    #[instrument(skip(self, default), fields(path = %path))]
    pub async fn read(&self, path: &str, default: SettingValue) -> SettingValue {
        let key_path = KeyPath::parse(path);
        if key_path.has_blank_segment()
            || key_path.len() > 3
            || !is_cacheable_category(key_path.category())
        {
            debug!(
                target = "cache::settings::read",
                segments = key_path.len(),
                "unsupported settings path; using default"
            );
            return default;
        }

        let category = key_path.category();
        let Some(key_name) = key_path.key_name() else {
            return self.read_category(category, default).await;
        };

        let Some(value) = self.read_setting(category, key_name).await else {
            return default;
        };

        match key_path.field() {
            None => value.coerce_like(&default),
            Some(field) => match value.get(field) {
                Some(nested) => nested.clone().coerce_like(&default),
                None => default,
            },
        }
    }

    /// Like [`read`](Self::read), but only returns a stored value that is one of `allowed`.
    pub async fn read_validated(
        &self,
        path: &str,
        default: SettingValue,
        allowed: &[SettingValue],
    ) -> SettingValue {
        let value = self.read(path, default.clone()).await;
        if allowed.is_empty() || allowed.contains(&value) {
            return value;
        }

        warn!(
            target = "cache::settings::read_validated",
            path,
            value = ?value,
            "setting value is not allowed; using default"
        );
        default
    }

    /// Update an existing setting addressed by `category.key_name`.
    ///
    /// The path entry then holds `value` exactly as given, so an immediate
    /// read returns it unchanged. Returns `Ok(false)` when the new value fails
    /// validation or the store refuses to persist it; the cache is left
    /// untouched in that case. Categories containing `_` are rejected as
    /// invalid paths.
    #[instrument(skip(self, value), fields(path = %path))]
    pub async fn write(&self, path: &str, value: SettingValue) -> Result<bool, SettingsError> {
        let key_path = KeyPath::parse(path);
        let Some((category, key_name)) = key_path
            .as_pair()
            .filter(|(category, _)| is_cacheable_category(category))
        else {
            return Err(SettingsError::InvalidPath {
                path: path.to_string(),
            });
        };

        let Some(mut setting) = self
            .store
            .find_by_category_and_key(category, key_name)
            .await?
        else {
            return Err(SettingsError::SettingNotFound {
                category: category.to_string(),
                key_name: key_name.to_string(),
            });
        };

        setting.assign(&value);

        if let Err(err) = setting.validate() {
            warn!(
                target = "cache::settings::write",
                error = %err,
                "setting value rejected by validation"
            );
            counter!(METRIC_WRITE, "result" => "invalid").increment(1);
            return Ok(false);
        }

        if let Err(err) = self.store.persist(&setting).await {
            warn!(
                target = "cache::settings::write",
                error = %err,
                "failed to persist setting"
            );
            counter!(METRIC_WRITE, "result" => "failed").increment(1);
            return Ok(false);
        }

        let path_key = path_entry_key(category, key_name);
        let category_key = category_entry_key(category);
        {
            let mut generations = mutex_lock(&self.generations, SOURCE, "write");
            *generations.entry(path_key.clone()).or_default() += 1;
            *generations.entry(category_key.clone()).or_default() += 1;
            self.backend.set(SETTINGS_CACHE_NAMESPACE, &path_key, value);
            self.backend.delete(SETTINGS_CACHE_NAMESPACE, &category_key);
        }

        counter!(METRIC_WRITE, "result" => "ok").increment(1);
        info!(
            target = "cache::settings::write",
            category, key_name, "setting updated"
        );

        Ok(true)
    }

    /// Drop every cached setting. The store is not touched.
    pub fn clear_cache(&self) {
        self.backend.clear_namespace(SETTINGS_CACHE_NAMESPACE);
        info!(target = "cache::settings::clear_cache", "settings cache cleared");
    }

    async fn read_setting(&self, category: &str, key_name: &str) -> Option<SettingValue> {
        let cache_key = path_entry_key(category, key_name);
        if let Some(value) = self.backend.get(SETTINGS_CACHE_NAMESPACE, &cache_key) {
            counter!(METRIC_CACHE_HIT, "kind" => "path").increment(1);
            return Some(value);
        }
        counter!(METRIC_CACHE_MISS, "kind" => "path").increment(1);

        let seen = self.generation(&cache_key);
        match self.store.find_by_category_and_key(category, key_name).await {
            Ok(Some(setting)) => {
                let value = setting.typed_value();
                self.fill_unless_written(&cache_key, seen, value.clone());
                Some(value)
            }
            Ok(None) => None,
            Err(err) => {
                warn!(
                    target = "cache::settings::read",
                    category,
                    key_name,
                    error = %err,
                    "failed to load setting"
                );
                None
            }
        }
    }

    async fn read_category(&self, category: &str, default: SettingValue) -> SettingValue {
        let cache_key = category_entry_key(category);
        if let Some(value) = self.backend.get(SETTINGS_CACHE_NAMESPACE, &cache_key) {
            counter!(METRIC_CACHE_HIT, "kind" => "category").increment(1);
            return value.coerce_like(&default);
        }
        counter!(METRIC_CACHE_MISS, "kind" => "category").increment(1);

        let seen = self.generation(&cache_key);
        match self.store.find_all_by_category(category).await {
            Ok(values) if values.is_empty() => default,
            Ok(values) => {
                let value = SettingValue::Map(values);
                self.fill_unless_written(&cache_key, seen, value.clone());
                value.coerce_like(&default)
            }
            Err(err) => {
                warn!(
                    target = "cache::settings::read",
                    category,
                    error = %err,
                    "failed to load settings category"
                );
                default
            }
        }
    }

    fn generation(&self, cache_key: &str) -> u64 {
        mutex_lock(&self.generations, SOURCE, "generation")
            .get(cache_key)
            .copied()
            .unwrap_or(0)
    }

    /// Store a value loaded from the store unless a write to `cache_key`
    /// completed after `seen` was taken.
    fn fill_unless_written(&self, cache_key: &str, seen: u64, value: SettingValue) {
        let generations = mutex_lock(&self.generations, SOURCE, "fill");
        if generations.get(cache_key).copied().unwrap_or(0) != seen {
            debug!(
                target = "cache::settings::fill",
                cache_key, "entry written during load; keeping the newer value"
            );
            return;
        }
        self.backend.set(SETTINGS_CACHE_NAMESPACE, cache_key, value);
    }
}
