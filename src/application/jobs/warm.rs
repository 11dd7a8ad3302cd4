use std::time::Duration;

use apalis::prelude::{Data, Error as ApalisError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    application::repos::{QueueSubmitter, RepoError},
    domain::{jobs::JobMessage, settings::SettingValue, types::JobType},
};

use super::{
    context::{JobRejected, JobWorkerContext, job_failed},
    executor::{JobExecutor, Outcome},
    queue::enqueue_job,
};

const REQUIRED_ARGUMENTS: &[&str] = &["id", "categories"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarmSettingsJobPayload {
    pub id: String,
    pub categories: Vec<String>,
}

#[derive(Debug, Error)]
enum WarmSettingsError {
    #[error("no settings stored for categories: {}", .0.join(", "))]
    EmptyCategories(Vec<String>),
}

/// Enqueue a job that repopulates the cached aggregates of `categories`.
pub async fn enqueue_warm_settings_job<Q: QueueSubmitter + ?Sized>(
    queue: &Q,
    categories: Vec<String>,
) -> Result<String, RepoError> {
    let payload = WarmSettingsJobPayload {
        id: Uuid::new_v4().to_string(),
        categories,
    };
    enqueue_job(queue, JobType::WarmSettings, &payload, Duration::ZERO).await
}

/// Handle one delivery of a warm job.
///
/// Malformed messages are rejected outright. Categories that come back
/// empty fail the delivery, which is retried with backoff until the
/// attempt limit is reached. The outcome is counted once per delivery.
pub async fn warm_settings(ctx: &JobWorkerContext, message: &JobMessage) -> Outcome {
    let executor = ctx.executor(JobType::WarmSettings);
    let outcome = handle_delivery(ctx, &executor, message).await;
    executor.record_outcome(&outcome);
    outcome
}

async fn handle_delivery(
    ctx: &JobWorkerContext,
    executor: &JobExecutor,
    message: &JobMessage,
) -> Outcome {
    if !executor.validate_required_arguments(message, REQUIRED_ARGUMENTS) {
        return Outcome::reject("missing required arguments");
    }

    let Some(categories) = categories_argument(message) else {
        error!(
            target = "application::jobs::warm_settings",
            identity = %message.identity(),
            "`categories` must be a list of strings"
        );
        return Outcome::reject("malformed `categories` argument");
    };

    let identity = message.identity();
    let settings = &ctx.settings;
    let wanted = &categories;
    let outcome = executor
        .execute_with_error_handling(&identity, "warm settings categories", move || async move {
            let mut empty = Vec::new();
            for category in wanted {
                let value = settings.read(category, SettingValue::Null).await;
                if value.is_null() {
                    empty.push(category.clone());
                }
            }

            if empty.is_empty() {
                Ok(true)
            } else {
                Err(WarmSettingsError::EmptyCategories(empty))
            }
        })
        .await;

    match outcome {
        Outcome::Acknowledge => {
            info!(
                target = "application::jobs::warm_settings",
                identity = %identity,
                categories = categories.len(),
                "settings categories warmed"
            );
            Outcome::Acknowledge
        }
        Outcome::Reject { reason } => {
            executor
                .requeue_with_backoff(message, &reason, executor.policy().max_attempts)
                .await
        }
    }
}

/// Worker entry point for `warm_settings` deliveries.
pub async fn process_warm_settings_job(
    message: JobMessage,
    context: Data<JobWorkerContext>,
) -> Result<(), ApalisError> {
    match warm_settings(&context, &message).await {
        Outcome::Acknowledge => Ok(()),
        Outcome::Reject { reason } => Err(job_failed(JobRejected { reason })),
    }
}

fn categories_argument(message: &JobMessage) -> Option<Vec<String>> {
    let Value::Array(items) = message.argument("categories")? else {
        return None;
    };

    items
        .iter()
        .map(|item| item.as_str().filter(|s| !s.is_empty()).map(str::to_string))
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn categories_must_be_non_empty_strings() {
        let ok = JobMessage::default().with_argument("categories", json!(["AI", "SEO"]));
        assert_eq!(
            categories_argument(&ok),
            Some(vec!["AI".to_string(), "SEO".to_string()])
        );

        let mixed = JobMessage::default().with_argument("categories", json!(["AI", 3]));
        assert_eq!(categories_argument(&mixed), None);

        let blank = JobMessage::default().with_argument("categories", json!([""]));
        assert_eq!(categories_argument(&blank), None);

        let scalar = JobMessage::default().with_argument("categories", "AI");
        assert_eq!(categories_argument(&scalar), None);
    }
}
