use std::time::Duration;

use crate::{
    application::repos::{QueueSubmitter, RepoError},
    domain::{jobs::JobMessage, types::JobType},
};

/// Enqueue a first delivery of `payload`, returning the queue's job id.
pub async fn enqueue_job<Q, P>(
    queue: &Q,
    job_type: JobType,
    payload: &P,
    delay: Duration,
) -> Result<String, RepoError>
where
    Q: QueueSubmitter + ?Sized,
    P: serde::Serialize,
{
    let message = JobMessage::from_payload(payload).map_err(|err| RepoError::InvalidInput {
        message: format!("job payload must serialise to an object: {err}"),
    })?;

    queue.submit(job_type, message.with_attempt(0), delay).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::memory::MemoryQueue;

    #[tokio::test]
    async fn scalar_payload_is_rejected() {
        let queue = MemoryQueue::default();
        let result = enqueue_job(&queue, JobType::WarmSettings, &42, Duration::ZERO).await;

        assert!(matches!(result, Err(RepoError::InvalidInput { .. })));
        assert!(queue.submissions().is_empty());
    }
}
