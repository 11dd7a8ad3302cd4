use std::{process, sync::Arc};

use apalis::{
    layers::WorkerBuilderExt,
    prelude::{Monitor, WorkerBuilder, WorkerFactoryFn},
};
use apalis_sql::{Config as ApalisSqlConfig, postgres::PostgresStorage};
use quire::{
    application::{
        error::AppError,
        jobs::{
            JobWorkerContext, RetryPolicy, enqueue_warm_settings_job, process_warm_settings_job,
        },
    },
    cache::{CacheConfig, MemoryCacheBackend, SettingsCache},
    config,
    domain::{settings::SettingValue, types::JobType},
    infra::{db::PostgresRepositories, error::InfraError, telemetry},
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(error.exit_code());
    }
}

fn report_application_error(error: &AppError) {
    let report = error.report();
    let log = || {
        error!(
            error = %error,
            chain = ?report.messages,
            source = report.source,
            "application error"
        );
    };

    if dispatcher::has_been_set() {
        log();
        return;
    }

    let subscriber = tracing_fmt()
        .with_writer(std::io::stderr)
        .with_max_level(Level::ERROR)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, log);
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::from(InfraError::configuration(err.to_string())))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Work(Box::<config::WorkArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Work(_) => run_work(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
        config::Command::Settings(args) => run_settings(settings, args.command).await,
        config::Command::Jobs(args) => run_jobs(settings, args.command).await,
    }
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    PostgresRepositories::run_migrations(repositories.pool())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    info!(target = "quire::migrate", "Migrations applied");
    Ok(())
}

async fn run_settings(
    settings: config::Settings,
    command: config::SettingsCommand,
) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let cache = build_settings_cache(repositories, &settings);

    match command {
        config::SettingsCommand::Get(args) => {
            let default = match args.default.as_deref() {
                Some(raw) => parse_json_argument("--default", raw)?,
                None => SettingValue::Null,
            };
            let value = cache.read(&args.path, default).await;
            println!("{}", value.to_json());
        }
        config::SettingsCommand::Set(args) => {
            let value = parse_value_argument(&args.value);
            if !cache.write(&args.path, value).await? {
                return Err(AppError::validation(format!(
                    "setting `{}` was not updated",
                    args.path
                )));
            }
            info!(target = "quire::settings", path = %args.path, "Setting updated");
        }
    }

    Ok(())
}

async fn run_jobs(settings: config::Settings, command: config::JobsCommand) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;

    match command {
        config::JobsCommand::Warm(args) => {
            let job_id = enqueue_warm_settings_job(repositories.as_ref(), args.categories).await?;
            info!(target = "quire::jobs", job_id = %job_id, "Warm job enqueued");
            println!("{job_id}");
        }
    }

    Ok(())
}

async fn run_work(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    PostgresRepositories::run_migrations(repositories.pool())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    let context = JobWorkerContext::new(
        build_settings_cache(repositories.clone(), &settings),
        repositories.clone(),
        RetryPolicy::from(&settings.jobs),
    );

    info!(
        target = "quire::work",
        warm_concurrency = settings.jobs.warm_concurrency.get(),
        max_attempts = settings.jobs.max_attempts,
        "Starting job worker"
    );

    spawn_job_monitor(repositories, context, &settings.jobs)
        .await
        .map_err(|err| AppError::unexpected(format!("job monitor task failed: {err}")))
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn build_settings_cache(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> SettingsCache {
    let backend = MemoryCacheBackend::new(&CacheConfig::from(&settings.settings_cache));
    SettingsCache::new(repositories, Arc::new(backend))
}

fn spawn_job_monitor(
    repositories: Arc<PostgresRepositories>,
    context: JobWorkerContext,
    jobs: &config::JobsSettings,
) -> tokio::task::JoinHandle<()> {
    let warm_storage = PostgresStorage::new_with_config(
        repositories.pool().clone(),
        ApalisSqlConfig::new(JobType::WarmSettings.as_str()),
    );

    let warm_worker = WorkerBuilder::new("warm-settings-worker")
        .concurrency(jobs.warm_concurrency.get() as usize)
        .data(context)
        .backend(warm_storage)
        .build_fn(process_warm_settings_job);

    let monitor = Monitor::new().register(warm_worker);

    tokio::spawn(async move {
        if let Err(err) = monitor.run().await {
            error!(error = %err, "job monitor stopped");
        }
    })
}

fn parse_json_argument(name: &str, raw: &str) -> Result<SettingValue, AppError> {
    serde_json::from_str::<serde_json::Value>(raw)
        .map(SettingValue::from)
        .map_err(|err| AppError::validation(format!("{name} must be JSON: {err}")))
}

/// JSON when it parses, otherwise the raw text.
fn parse_value_argument(raw: &str) -> SettingValue {
    serde_json::from_str::<serde_json::Value>(raw)
        .map(SettingValue::from)
        .unwrap_or_else(|_| SettingValue::from(raw))
}
