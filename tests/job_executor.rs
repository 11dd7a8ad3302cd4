use std::{
    io,
    sync::{Arc, Mutex},
    time::Duration,
};

use quire::{
    application::{
        jobs::{
            JobExecutor, JobWorkerContext, Outcome, RetryDecision, RetryPolicy,
            enqueue_warm_settings_job, warm_settings,
        },
        repos::RepoError,
    },
    cache::{
        CacheBackend, MemoryCacheBackend, SETTINGS_CACHE_NAMESPACE, SettingsCache,
        category_entry_key,
    },
    domain::{
        jobs::JobMessage,
        settings::{Setting, ValueType},
        types::JobType,
    },
    infra::memory::{MemoryConfigStore, MemoryEntityStore, MemoryQueue},
};
use serde_json::{Map, Value, json};
use tracing::{Level, subscriber::DefaultGuard};
use tracing_subscriber::fmt::MakeWriter;

#[derive(Clone, Default)]
struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    fn contents(&self) -> String {
        let bytes = self.0.lock().expect("log buffer").clone();
        String::from_utf8(bytes).expect("utf8 logs")
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("log buffer").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn capture_logs() -> (LogCapture, DefaultGuard) {
    let capture = LogCapture::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(capture.clone())
        .with_ansi(false)
        .with_max_level(Level::TRACE)
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (capture, guard)
}

fn executor() -> (JobExecutor, Arc<MemoryQueue>) {
    let queue = Arc::new(MemoryQueue::default());
    let executor = JobExecutor::new(JobType::WarmSettings, queue.clone(), RetryPolicy::default());
    (executor, queue)
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

#[test]
fn retry_is_bounded_and_delays_grow() {
    let policy = RetryPolicy::default();

    let delays: Vec<Duration> = (0..3)
        .map(|attempt| match policy.decide(attempt, 3) {
            RetryDecision::RequeueWithDelay(delay) => delay,
            RetryDecision::Abandon => panic!("attempt {attempt} abandoned early"),
        })
        .collect();

    assert!(delays.windows(2).all(|pair| pair[0] < pair[1]));
    for attempt in [3, 4, 100] {
        assert_eq!(policy.decide(attempt, 3), RetryDecision::Abandon);
    }
}

#[tokio::test]
async fn requeue_submits_next_attempt_until_abandoned() {
    let (executor, queue) = executor();
    let mut message = JobMessage::default()
        .with_argument("id", "post-7")
        .with_argument("categories", json!(["AI"]));

    let outcome = executor.requeue_with_backoff(&message, "transient", 3).await;
    assert_eq!(outcome, Outcome::Acknowledge);

    let first = queue.submissions();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].message.attempt, 1);
    assert_eq!(first[0].message.arguments, message.arguments);
    assert_eq!(first[0].delay, Duration::from_secs(30));
    assert_eq!(first[0].job_type, JobType::WarmSettings);

    let mut outcomes = vec![outcome];
    loop {
        let Some(next) = queue.submissions().last().map(|job| job.message.clone()) else {
            break;
        };
        if next.attempt == message.attempt {
            break;
        }
        message = next;
        let outcome = executor.requeue_with_backoff(&message, "transient", 3).await;
        let stop = !outcome.is_acknowledge();
        outcomes.push(outcome);
        if stop {
            break;
        }
    }

    let attempts: Vec<u32> = queue.submissions().iter().map(|job| job.message.attempt).collect();
    assert_eq!(attempts, vec![1, 2, 3]);
    assert!(matches!(outcomes.last(), Some(Outcome::Reject { .. })));
    assert_eq!(
        queue.submissions().iter().map(|job| job.delay).collect::<Vec<_>>(),
        vec![
            Duration::from_secs(30),
            Duration::from_secs(60),
            Duration::from_secs(120)
        ]
    );
}

#[tokio::test]
async fn abandon_is_logged_with_identity() {
    let (capture, _guard) = capture_logs();
    let (executor, queue) = executor();

    let message = JobMessage::default().with_argument("id", "page-3").with_attempt(3);
    let outcome = executor.requeue_with_backoff(&message, "upstream down", 3).await;

    assert!(matches!(outcome, Outcome::Reject { .. }));
    assert!(queue.submissions().is_empty());

    let logs = capture.contents();
    assert!(logs.contains("ERROR"), "logs: {logs}");
    assert!(logs.contains("page-3"), "logs: {logs}");
    assert!(logs.contains("upstream down"), "logs: {logs}");
}

#[tokio::test]
async fn work_results_map_to_outcomes() {
    let (capture, _guard) = capture_logs();
    let (executor, _) = executor();

    let ok = executor
        .execute_with_error_handling("id-1", "succeeds", || async { Ok::<bool, RepoError>(true) })
        .await;
    assert_eq!(ok, Outcome::Acknowledge);

    let handled = executor
        .execute_with_error_handling("id-2", "declines", || async { Ok::<bool, RepoError>(false) })
        .await;
    assert!(matches!(handled, Outcome::Reject { .. }));

    let failed = executor
        .execute_with_error_handling("id-3", "explodes", || async {
            Err::<bool, _>(RepoError::from_persistence("database exploded"))
        })
        .await;
    assert_eq!(
        failed,
        Outcome::Reject {
            reason: "persistence error: database exploded".to_string()
        }
    );

    let logs = capture.contents();
    assert!(logs.contains("database exploded"), "logs: {logs}");
    assert!(logs.contains("id-3"), "logs: {logs}");
}

#[tokio::test]
async fn missing_arguments_are_logged() {
    let (capture, _guard) = capture_logs();
    let (executor, _) = executor();

    let message = JobMessage::default().with_argument("id", "a");
    assert!(!executor.validate_required_arguments(&message, &["id", "categories"]));
    assert!(executor.validate_required_arguments(&message, &["id"]));

    let logs = capture.contents();
    assert!(logs.contains("categories"), "logs: {logs}");
}

#[test]
fn bulk_field_apply_only_touches_present_sources() {
    let (executor, _) = executor();
    let entity = object(json!({"x": 0, "z": "keep", "unrelated": [1, 2]}));
    let results = object(json!({"a": 1, "b": 2}));

    let updated = executor.apply_bulk_field_updates(entity, &results, &[("a", "x"), ("c", "z")]);

    assert_eq!(
        Value::Object(updated),
        json!({"x": 1, "z": "keep", "unrelated": [1, 2]})
    );
}

#[tokio::test]
async fn find_or_create_returns_the_same_entity() {
    let (executor, _) = executor();
    let store = MemoryEntityStore::default();
    let criteria = object(json!({"slug": "about"}));
    let data = object(json!({"slug": "about", "title": "About"}));

    let first = executor
        .find_or_create_entity(&store, &criteria, data.clone())
        .await
        .expect("create");
    let second = executor
        .find_or_create_entity(&store, &criteria, data)
        .await
        .expect("find");

    assert_eq!(first, second);
    assert_eq!(store.len(), 1);
}

type WarmFixture = (JobWorkerContext, Arc<MemoryQueue>, Arc<MemoryCacheBackend>);

fn warm_context(settings: impl IntoIterator<Item = Setting>) -> WarmFixture {
    let store = Arc::new(MemoryConfigStore::with_settings(settings));
    let backend = Arc::new(MemoryCacheBackend::default());
    let queue = Arc::new(MemoryQueue::default());
    let context = JobWorkerContext::new(
        SettingsCache::new(store, backend.clone()),
        queue.clone(),
        RetryPolicy::default(),
    );
    (context, queue, backend)
}

#[tokio::test]
async fn warm_job_populates_category_entries() {
    let (context, queue, backend) = warm_context([
        Setting::new("AI", "dailyCostLimit", ValueType::Numeric, "2.50"),
        Setting::new("SEO", "title", ValueType::Text, "Home"),
    ]);

    let message = JobMessage::default()
        .with_argument("id", "warm-1")
        .with_argument("categories", json!(["AI", "SEO"]));

    assert_eq!(warm_settings(&context, &message).await, Outcome::Acknowledge);
    assert!(backend.get(SETTINGS_CACHE_NAMESPACE, &category_entry_key("AI")).is_some());
    assert!(backend.get(SETTINGS_CACHE_NAMESPACE, &category_entry_key("SEO")).is_some());
    assert!(queue.submissions().is_empty());
}

#[tokio::test]
async fn warm_job_requeues_empty_categories() {
    let (context, queue, _) = warm_context([]);

    let message = JobMessage::default()
        .with_argument("id", "warm-2")
        .with_argument("categories", json!(["Missing"]));

    assert_eq!(warm_settings(&context, &message).await, Outcome::Acknowledge);
    let submitted = queue.drain();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].message.attempt, 1);

    let exhausted = message.with_attempt(3);
    assert!(matches!(
        warm_settings(&context, &exhausted).await,
        Outcome::Reject { .. }
    ));
    assert!(queue.submissions().is_empty());
}

#[tokio::test]
async fn malformed_warm_job_is_rejected_without_retry() {
    let (context, queue, _) = warm_context([]);

    let missing = JobMessage::default().with_argument("id", "warm-3");
    assert!(matches!(
        warm_settings(&context, &missing).await,
        Outcome::Reject { .. }
    ));

    let malformed = JobMessage::default()
        .with_argument("id", "warm-4")
        .with_argument("categories", "AI");
    assert!(matches!(
        warm_settings(&context, &malformed).await,
        Outcome::Reject { .. }
    ));

    assert!(queue.submissions().is_empty());
}

#[tokio::test]
async fn enqueue_warm_job_submits_first_attempt() {
    let queue = MemoryQueue::default();

    let job_id = enqueue_warm_settings_job(&queue, vec!["AI".to_string()])
        .await
        .expect("enqueue");

    let submitted = queue.submissions();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].id, job_id);
    assert_eq!(submitted[0].message.attempt, 0);
    assert_eq!(submitted[0].delay, Duration::ZERO);
    assert_eq!(submitted[0].message.argument("categories"), Some(&json!(["AI"])));
    assert_ne!(submitted[0].message.identity(), "unknown");
}
