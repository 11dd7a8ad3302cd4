use std::sync::Arc;

use apalis::prelude::Error as ApalisError;
use thiserror::Error;

use crate::{application::repos::QueueSubmitter, cache::SettingsCache, domain::types::JobType};

use super::{executor::JobExecutor, retry::RetryPolicy};

/// Shared context passed to job workers.
#[derive(Clone)]
pub struct JobWorkerContext {
    pub settings: SettingsCache,
    pub queue: Arc<dyn QueueSubmitter>,
    pub retry: RetryPolicy,
}

impl JobWorkerContext {
    pub fn new(settings: SettingsCache, queue: Arc<dyn QueueSubmitter>, retry: RetryPolicy) -> Self {
        Self {
            settings,
            queue,
            retry,
        }
    }

    pub fn executor(&self, job_type: JobType) -> JobExecutor {
        JobExecutor::new(job_type, self.queue.clone(), self.retry)
    }
}

/// A delivery the executor rejected; surfaced to the worker runtime as a failure.
#[derive(Debug, Error)]
#[error("job rejected: {reason}")]
pub struct JobRejected {
    pub reason: String,
}

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Convert any error into an [`ApalisError::Failed`].
pub fn job_failed<E>(err: E) -> ApalisError
where
    E: std::error::Error + Send + Sync + 'static,
{
    let boxed: BoxError = Box::new(err);
    ApalisError::Failed(Arc::new(boxed))
}
