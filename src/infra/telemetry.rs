use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
///
/// Logs go to stderr so command output on stdout stays machine-readable.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .with_writer(std::io::stderr)
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .with_writer(std::io::stderr)
            .compact()
            .with_target(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

/// Register descriptions for every metric this crate emits. Idempotent.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "quire_settings_cache_hit_total",
            Unit::Count,
            "Settings reads answered from the cache, labelled by entry kind."
        );
        describe_counter!(
            "quire_settings_cache_miss_total",
            Unit::Count,
            "Settings reads that fell through to the store, labelled by entry kind."
        );
        describe_counter!(
            "quire_settings_write_total",
            Unit::Count,
            "Settings writes by result (ok, invalid, failed)."
        );
        describe_counter!(
            "quire_job_outcome_total",
            Unit::Count,
            "Job deliveries by job type and outcome."
        );
        describe_counter!(
            "quire_job_requeue_total",
            Unit::Count,
            "Job deliveries scheduled for another attempt."
        );
        describe_histogram!(
            "quire_job_requeue_delay_seconds",
            Unit::Seconds,
            "Backoff delay applied to requeued jobs."
        );
    });
}
