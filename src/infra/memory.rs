//! In-process adapters for the repository traits.
//!
//! Used by tests and by deployments that keep settings in memory. Each
//! adapter exposes a few probes (call counts, recorded submissions, failure
//! switches) so callers can observe how the store was exercised.

use std::{
    collections::BTreeMap,
    sync::{
        Mutex, RwLock,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{
    application::repos::{ConfigStore, EntityStore, QueueSubmitter, RepoError},
    cache::lock::{mutex_lock, rw_read, rw_write},
    domain::{
        jobs::JobMessage,
        settings::{Setting, SettingValue},
        types::JobType,
    },
};

const SOURCE: &str = "infra::memory";

type SettingKey = (String, String);

/// Settings rows held in a map keyed by `(category, key_name)`.
#[derive(Default)]
pub struct MemoryConfigStore {
    rows: RwLock<BTreeMap<SettingKey, Setting>>,
    lookups: AtomicUsize,
    category_lookups: AtomicUsize,
    persists: AtomicUsize,
    fail_reads: AtomicBool,
    fail_persist: AtomicBool,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: impl IntoIterator<Item = Setting>) -> Self {
        let store = Self::new();
        for setting in settings {
            store.insert(setting);
        }
        store
    }

    /// Seed a row without counting it as a persist call.
    pub fn insert(&self, setting: Setting) {
        let key = (setting.category.clone(), setting.key_name.clone());
        rw_write(&self.rows, SOURCE, "insert").insert(key, setting);
    }

    pub fn get(&self, category: &str, key_name: &str) -> Option<Setting> {
        rw_read(&self.rows, SOURCE, "get")
            .get(&(category.to_string(), key_name.to_string()))
            .cloned()
    }

    /// Number of single-setting lookups served so far.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Number of whole-category lookups served so far.
    pub fn category_lookups(&self) -> usize {
        self.category_lookups.load(Ordering::SeqCst)
    }

    pub fn persists(&self) -> usize {
        self.persists.load(Ordering::SeqCst)
    }

    /// Make every read fail with a persistence error.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every persist call fail with a persistence error.
    pub fn fail_persist(&self, fail: bool) {
        self.fail_persist.store(fail, Ordering::SeqCst);
    }

    fn check_reads(&self) -> Result<(), RepoError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(RepoError::from_persistence("settings store unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn find_by_category_and_key(
        &self,
        category: &str,
        key_name: &str,
    ) -> Result<Option<Setting>, RepoError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.check_reads()?;
        Ok(self.get(category, key_name))
    }

    async fn find_all_by_category(
        &self,
        category: &str,
    ) -> Result<BTreeMap<String, SettingValue>, RepoError> {
        self.category_lookups.fetch_add(1, Ordering::SeqCst);
        self.check_reads()?;

        let rows = rw_read(&self.rows, SOURCE, "find_all_by_category");
        Ok(rows
            .values()
            .filter(|setting| setting.category == category)
            .map(|setting| (setting.key_name.clone(), setting.typed_value()))
            .collect())
    }

    async fn persist(&self, setting: &Setting) -> Result<(), RepoError> {
        self.persists.fetch_add(1, Ordering::SeqCst);
        if self.fail_persist.load(Ordering::SeqCst) {
            return Err(RepoError::from_persistence("settings store rejected write"));
        }
        self.insert(setting.clone());
        Ok(())
    }
}

/// A message accepted by [`MemoryQueue`].
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedJob {
    pub id: String,
    pub job_type: JobType,
    pub message: JobMessage,
    pub delay: Duration,
}

/// Queue that records submissions instead of delivering them.
#[derive(Default)]
pub struct MemoryQueue {
    submissions: Mutex<Vec<QueuedJob>>,
    refuse: AtomicBool,
}

impl MemoryQueue {
    pub fn submissions(&self) -> Vec<QueuedJob> {
        mutex_lock(&self.submissions, SOURCE, "submissions").clone()
    }

    /// Remove and return everything submitted so far.
    pub fn drain(&self) -> Vec<QueuedJob> {
        std::mem::take(&mut *mutex_lock(&self.submissions, SOURCE, "drain"))
    }

    pub fn refuse_submissions(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }
}

#[async_trait]
impl QueueSubmitter for MemoryQueue {
    async fn submit(
        &self,
        job_type: JobType,
        message: JobMessage,
        delay: Duration,
    ) -> Result<String, RepoError> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(RepoError::from_persistence("queue refused submission"));
        }

        let id = Uuid::new_v4().to_string();
        mutex_lock(&self.submissions, SOURCE, "submit").push(QueuedJob {
            id: id.clone(),
            job_type,
            message,
            delay,
        });
        Ok(id)
    }
}

/// JSON records matched by exact field equality.
#[derive(Default)]
pub struct MemoryEntityStore {
    records: Mutex<Vec<Map<String, Value>>>,
}

impl MemoryEntityStore {
    pub fn len(&self) -> usize {
        mutex_lock(&self.records, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl EntityStore for MemoryEntityStore {
    type Entity = Map<String, Value>;

    async fn find_one(
        &self,
        criteria: &Map<String, Value>,
    ) -> Result<Option<Self::Entity>, RepoError> {
        let records = mutex_lock(&self.records, SOURCE, "find_one");
        Ok(records
            .iter()
            .find(|record| {
                criteria
                    .iter()
                    .all(|(field, expected)| record.get(field) == Some(expected))
            })
            .cloned())
    }

    async fn create(&self, mut data: Map<String, Value>) -> Result<Self::Entity, RepoError> {
        data.entry("id")
            .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
        mutex_lock(&self.records, SOURCE, "create").push(data.clone());
        Ok(data)
    }
}
