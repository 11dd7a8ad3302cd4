mod context;
mod executor;
mod queue;
mod retry;
mod warm;

pub use context::{JobRejected, JobWorkerContext, job_failed};
pub use executor::{FieldPatch, JobExecutor, Outcome};
pub use queue::enqueue_job;
pub use retry::{
    DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY, RetryDecision, RetryPolicy,
};
pub use warm::{
    WarmSettingsJobPayload, enqueue_warm_settings_job, process_warm_settings_job, warm_settings,
};
