//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;
#[cfg(test)]
mod tests;

use std::{num::NonZeroU32, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

pub use cli::{
    CliArgs, Command, DatabaseOverride, JobsArgs, JobsCommand, JobsWarmArgs, MigrateArgs,
    SettingsArgs, SettingsCommand, SettingsGetArgs, SettingsSetArgs, WorkArgs, WorkOverrides,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "quire";
const ENV_PREFIX: &str = "QUIRE";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_SETTINGS_CACHE_CAPACITY: u32 = 1024;
const DEFAULT_SETTINGS_CACHE_TTL_SECS: u64 = 300;
const DEFAULT_JOB_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_JOB_BASE_DELAY_SECS: u64 = 30;
const DEFAULT_JOB_MAX_DELAY_SECS: u64 = 3600;
const DEFAULT_JOB_WARM_CONCURRENCY: u32 = 1;

#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub settings_cache: SettingsCacheSettings,
    pub jobs: JobsSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct SettingsCacheSettings {
    pub capacity: NonZeroU32,
    /// `None` keeps entries until evicted or cleared.
    pub ttl: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct JobsSettings {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub warm_concurrency: NonZeroU32,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Work(args)) => raw.apply_work_overrides(&args.overrides),
        Some(Command::Migrate(args)) => raw.apply_database_override(&args.database),
        Some(Command::Settings(args)) => raw.apply_database_override(&args.database),
        Some(Command::Jobs(args)) => raw.apply_database_override(&args.database),
        None => raw.apply_work_overrides(&WorkOverrides::default()),
    }

    Settings::from_raw(raw)
}

pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    settings_cache: RawSettingsCacheSettings,
    jobs: RawJobsSettings,
}

impl RawSettings {
    fn apply_work_overrides(&mut self, overrides: &WorkOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(capacity) = overrides.settings_cache_capacity {
            self.settings_cache.capacity = Some(capacity);
        }
        if let Some(ttl) = overrides.settings_cache_ttl_seconds {
            self.settings_cache.ttl_seconds = Some(ttl);
        }
        if let Some(value) = overrides.jobs_max_attempts {
            self.jobs.max_attempts = Some(value);
        }
        if let Some(value) = overrides.jobs_warm_concurrency {
            self.jobs.warm_concurrency = Some(value);
        }
    }

    fn apply_database_override(&mut self, overrides: &DatabaseOverride) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            database,
            settings_cache,
            jobs,
        } = raw;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            settings_cache: build_settings_cache_settings(settings_cache)?,
            jobs: build_jobs_settings(jobs)?,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = database.url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let max_connections = non_zero_u32(
        database
            .max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
            .into(),
        "database.max_connections",
    )?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_settings_cache_settings(
    cache: RawSettingsCacheSettings,
) -> Result<SettingsCacheSettings, LoadError> {
    let capacity = non_zero_u32(
        cache
            .capacity
            .unwrap_or(DEFAULT_SETTINGS_CACHE_CAPACITY)
            .into(),
        "settings_cache.capacity",
    )?;

    let ttl = match cache.ttl_seconds.unwrap_or(DEFAULT_SETTINGS_CACHE_TTL_SECS) {
        0 => None,
        seconds => Some(Duration::from_secs(seconds)),
    };

    Ok(SettingsCacheSettings { capacity, ttl })
}

fn build_jobs_settings(jobs: RawJobsSettings) -> Result<JobsSettings, LoadError> {
    let base_secs = jobs.base_delay_seconds.unwrap_or(DEFAULT_JOB_BASE_DELAY_SECS);
    if base_secs == 0 {
        return Err(LoadError::invalid(
            "jobs.base_delay_seconds",
            "must be greater than zero",
        ));
    }

    let max_secs = jobs.max_delay_seconds.unwrap_or(DEFAULT_JOB_MAX_DELAY_SECS);
    if max_secs < base_secs {
        return Err(LoadError::invalid(
            "jobs.max_delay_seconds",
            "must not be smaller than jobs.base_delay_seconds",
        ));
    }

    let warm = jobs
        .warm_concurrency
        .unwrap_or(DEFAULT_JOB_WARM_CONCURRENCY);

    Ok(JobsSettings {
        max_attempts: jobs.max_attempts.unwrap_or(DEFAULT_JOB_MAX_ATTEMPTS),
        base_delay: Duration::from_secs(base_secs),
        max_delay: Duration::from_secs(max_secs),
        warm_concurrency: non_zero_u32(warm.into(), "jobs.warm_concurrency")?,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettingsCacheSettings {
    capacity: Option<u32>,
    ttl_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawJobsSettings {
    max_attempts: Option<u32>,
    base_delay_seconds: Option<u64>,
    max_delay_seconds: Option<u64>,
    warm_concurrency: Option<u32>,
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}
