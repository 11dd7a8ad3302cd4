use std::{any::Any, fmt::Display, future::Future, panic::AssertUnwindSafe, sync::Arc};

use futures::FutureExt;
use metrics::{counter, histogram};
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::{
    application::repos::{EntityStore, QueueSubmitter, RepoError},
    domain::{jobs::JobMessage, types::JobType},
};

use super::retry::{RetryDecision, RetryPolicy};

const METRIC_JOB_OUTCOME: &str = "quire_job_outcome_total";
const METRIC_JOB_REQUEUE: &str = "quire_job_requeue_total";
const METRIC_JOB_REQUEUE_DELAY: &str = "quire_job_requeue_delay_seconds";

/// Signal returned to the queue runtime for the current delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Acknowledge,
    Reject { reason: String },
}

impl Outcome {
    pub fn reject(reason: impl Into<String>) -> Self {
        Self::Reject {
            reason: reason.into(),
        }
    }

    pub fn is_acknowledge(&self) -> bool {
        matches!(self, Self::Acknowledge)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Acknowledge => "acknowledge",
            Self::Reject { .. } => "reject",
        }
    }
}

/// Entities whose named fields can be overwritten in bulk.
pub trait FieldPatch {
    fn set_field(&mut self, name: &str, value: Value);
}

impl FieldPatch for Map<String, Value> {
    fn set_field(&mut self, name: &str, value: Value) {
        self.insert(name.to_string(), value);
    }
}

/// Shared machinery for queue-driven jobs.
///
/// Concrete jobs hold one of these and route every delivery through it:
/// argument checks, failure classification and bounded redelivery.
#[derive(Clone)]
pub struct JobExecutor {
    queue: Arc<dyn QueueSubmitter>,
    policy: RetryPolicy,
    job_type: JobType,
}

impl JobExecutor {
    pub fn new(job_type: JobType, queue: Arc<dyn QueueSubmitter>, policy: RetryPolicy) -> Self {
        Self {
            queue,
            policy,
            job_type,
        }
    }

    pub fn job_type(&self) -> JobType {
        self.job_type
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Returns `false` when any of `names` is absent or null. A `false` result is terminal.
    pub fn validate_required_arguments(&self, message: &JobMessage, names: &[&str]) -> bool {
        let missing: Vec<&str> = names
            .iter()
            .copied()
            .filter(|name| message.argument(name).is_none())
            .collect();

        for name in &missing {
            error!(
                target = "application::jobs::executor::validate_required_arguments",
                job = self.job_type.as_str(),
                identity = %message.identity(),
                argument = name,
                "required job argument missing"
            );
        }

        missing.is_empty()
    }

    /// Run `work` and classify what happened.
    ///
    /// `Ok(true)` acknowledges the delivery. `Ok(false)`, an error or a panic
    /// rejects it. Nothing escapes: errors are reported through the log and
    /// the returned reason.
    pub async fn execute_with_error_handling<F, Fut, E>(
        &self,
        identity: &str,
        description: &str,
        work: F,
    ) -> Outcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<bool, E>>,
        E: Display,
    {
        let result = AssertUnwindSafe(async move { work().await })
            .catch_unwind()
            .await;

        match result {
            Ok(Ok(true)) => {
                debug!(
                    target = "application::jobs::executor::execute_with_error_handling",
                    job = self.job_type.as_str(),
                    identity,
                    description,
                    "job work completed"
                );
                Outcome::Acknowledge
            }
            Ok(Ok(false)) => {
                warn!(
                    target = "application::jobs::executor::execute_with_error_handling",
                    job = self.job_type.as_str(),
                    identity,
                    description,
                    "job work reported failure"
                );
                Outcome::reject(format!("{description} failed"))
            }
            Ok(Err(err)) => {
                let reason = err.to_string();
                error!(
                    target = "application::jobs::executor::execute_with_error_handling",
                    job = self.job_type.as_str(),
                    identity,
                    description,
                    error = %reason,
                    "job work errored"
                );
                Outcome::Reject { reason }
            }
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                error!(
                    target = "application::jobs::executor::execute_with_error_handling",
                    job = self.job_type.as_str(),
                    identity,
                    description,
                    error = %reason,
                    "job work panicked"
                );
                Outcome::Reject { reason }
            }
        }
    }

    /// Schedule another delivery of `message`, or give up once `max_attempts` is reached.
    ///
    /// Requeueing acknowledges the current delivery; the retry is a new
    /// message with `attempt + 1`.
    pub async fn requeue_with_backoff(
        &self,
        message: &JobMessage,
        reason: &str,
        max_attempts: u32,
    ) -> Outcome {
        let identity = message.identity();

        match self.policy.decide(message.attempt, max_attempts) {
            RetryDecision::Abandon => {
                error!(
                    target = "application::jobs::executor::requeue_with_backoff",
                    job = self.job_type.as_str(),
                    identity = %identity,
                    attempt = message.attempt,
                    max_attempts,
                    reason,
                    "job abandoned after exhausting attempts"
                );
                Outcome::reject(format!("retries exhausted: {reason}"))
            }
            RetryDecision::RequeueWithDelay(delay) => {
                let next = message.next_attempt();
                let attempt = next.attempt;
                match self.queue.submit(self.job_type, next, delay).await {
                    Ok(job_id) => {
                        warn!(
                            target = "application::jobs::executor::requeue_with_backoff",
                            job = self.job_type.as_str(),
                            identity = %identity,
                            attempt,
                            delay_seconds = delay.as_secs(),
                            job_id = %job_id,
                            reason,
                            "job requeued with backoff"
                        );
                        counter!(METRIC_JOB_REQUEUE, "job" => self.job_type.as_str())
                            .increment(1);
                        histogram!(METRIC_JOB_REQUEUE_DELAY, "job" => self.job_type.as_str())
                            .record(delay.as_secs_f64());
                        Outcome::Acknowledge
                    }
                    Err(err) => {
                        error!(
                            target = "application::jobs::executor::requeue_with_backoff",
                            job = self.job_type.as_str(),
                            identity = %identity,
                            attempt,
                            error = %err,
                            reason,
                            "failed to submit retry"
                        );
                        Outcome::reject(format!("requeue failed: {err}"))
                    }
                }
            }
        }
    }

    /// Copy each `(source, target)` pair present in `result_fields` onto `entity`.
    pub fn apply_bulk_field_updates<T: FieldPatch>(
        &self,
        mut entity: T,
        result_fields: &Map<String, Value>,
        field_map: &[(&str, &str)],
    ) -> T {
        for (source, target) in field_map {
            if let Some(value) = result_fields.get(*source) {
                entity.set_field(target, value.clone());
            }
        }
        entity
    }

    /// Return the entity matching `criteria`, creating it from `data` when none exists.
    ///
    /// Not exclusive: concurrent callers may both create. Uniqueness belongs to the store.
    pub async fn find_or_create_entity<S>(
        &self,
        store: &S,
        criteria: &Map<String, Value>,
        data: Map<String, Value>,
    ) -> Result<S::Entity, RepoError>
    where
        S: EntityStore + ?Sized,
    {
        if let Some(entity) = store.find_one(criteria).await? {
            return Ok(entity);
        }

        let entity = store.create(data).await?;
        info!(
            target = "application::jobs::executor::find_or_create_entity",
            job = self.job_type.as_str(),
            "created entity"
        );
        Ok(entity)
    }

    /// Count the final outcome of one delivery.
    ///
    /// Call once per delivery, after any requeue decision; the executor's
    /// other operations do not record outcomes themselves.
    pub fn record_outcome(&self, outcome: &Outcome) {
        counter!(
            METRIC_JOB_OUTCOME,
            "job" => self.job_type.as_str(),
            "outcome" => outcome.as_str()
        )
        .increment(1);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "job work panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::infra::memory::MemoryQueue;

    fn executor() -> (JobExecutor, Arc<MemoryQueue>) {
        let queue = Arc::new(MemoryQueue::default());
        let executor = JobExecutor::new(
            JobType::WarmSettings,
            queue.clone(),
            RetryPolicy::default(),
        );
        (executor, queue)
    }

    #[test]
    fn missing_and_null_arguments_fail_validation() {
        let (executor, _) = executor();
        let message = JobMessage::default()
            .with_argument("id", "a")
            .with_argument("categories", Value::Null);

        assert!(executor.validate_required_arguments(&message, &["id"]));
        assert!(!executor.validate_required_arguments(&message, &["id", "categories"]));
        assert!(!executor.validate_required_arguments(&message, &["title"]));
    }

    #[tokio::test]
    async fn panicking_work_is_rejected() {
        let (executor, _) = executor();
        let outcome = executor
            .execute_with_error_handling("a", "explode", || async {
                if true {
                    panic!("kaboom");
                }
                Ok::<bool, RepoError>(true)
            })
            .await;

        assert_eq!(outcome, Outcome::reject("kaboom"));
    }

    #[tokio::test]
    async fn refused_submission_rejects() {
        let (executor, queue) = executor();
        queue.refuse_submissions(true);

        let outcome = executor
            .requeue_with_backoff(&JobMessage::default().with_argument("id", "a"), "stale", 3)
            .await;

        assert!(matches!(outcome, Outcome::Reject { .. }));
        assert!(queue.submissions().is_empty());
    }

    #[test]
    fn bulk_apply_leaves_unmapped_fields() {
        let (executor, _) = executor();
        let entity = json!({"x": 0, "keep": true})
            .as_object()
            .cloned()
            .expect("object");
        let results = json!({"a": 1, "b": 2}).as_object().cloned().expect("object");

        let entity = executor.apply_bulk_field_updates(entity, &results, &[("a", "x"), ("c", "z")]);

        assert_eq!(Value::Object(entity), json!({"x": 1, "keep": true}));
    }
}
