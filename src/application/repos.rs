//! Repository traits describing persistence adapters.

use std::{collections::BTreeMap, time::Duration};

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::{
    jobs::JobMessage,
    settings::{Setting, SettingValue},
    types::JobType,
};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Durable key/value store holding settings rows.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn find_by_category_and_key(
        &self,
        category: &str,
        key_name: &str,
    ) -> Result<Option<Setting>, RepoError>;

    /// Every row of `category` as `key_name -> typed value`; empty when the category is unknown.
    async fn find_all_by_category(
        &self,
        category: &str,
    ) -> Result<BTreeMap<String, SettingValue>, RepoError>;

    async fn persist(&self, setting: &Setting) -> Result<(), RepoError>;
}

/// Accepts messages for delivery after a delay. Returns the queue's job id.
#[async_trait]
pub trait QueueSubmitter: Send + Sync {
    async fn submit(
        &self,
        job_type: JobType,
        message: JobMessage,
        delay: Duration,
    ) -> Result<String, RepoError>;
}

/// Store addressed by exact-match field criteria.
#[async_trait]
pub trait EntityStore: Send + Sync {
    type Entity: Send;

    async fn find_one(&self, criteria: &Map<String, Value>)
    -> Result<Option<Self::Entity>, RepoError>;

    async fn create(&self, data: Map<String, Value>) -> Result<Self::Entity, RepoError>;
}
