use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{
    application::repos::{QueueSubmitter, RepoError},
    domain::{jobs::JobMessage, types::JobType},
};

use super::{PostgresRepositories, map_sqlx_error};

/// Deliveries per queued row. Redelivery is driven by the job executor, not the worker runtime.
const QUEUE_MAX_ATTEMPTS: i32 = 1;
const QUEUE_PRIORITY: i32 = 0;

#[async_trait]
impl QueueSubmitter for PostgresRepositories {
    async fn submit(
        &self,
        job_type: JobType,
        message: JobMessage,
        delay: Duration,
    ) -> Result<String, RepoError> {
        let payload = serde_json::to_value(&message).map_err(RepoError::from_persistence)?;
        let run_at = OffsetDateTime::now_utc() + delay;

        let id: String = sqlx::query_scalar(
            r#"
            SELECT (apalis.push_job($1, $2::json, $3, $4, $5, $6)).id
            "#,
        )
        .bind(job_type.as_str())
        .bind(payload)
        .bind("Pending")
        .bind(run_at)
        .bind(QUEUE_MAX_ATTEMPTS)
        .bind(QUEUE_PRIORITY)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(id)
    }
}
