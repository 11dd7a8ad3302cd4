use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the Quire binary.
#[derive(Debug, Parser)]
#[command(name = "quire", version, about = "Quire settings and job administration")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "QUIRE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the job worker.
    Work(Box<WorkArgs>),
    /// Apply database migrations, including the job queue schema.
    Migrate(MigrateArgs),
    /// Read and update stored settings.
    Settings(SettingsArgs),
    /// Enqueue background jobs.
    Jobs(JobsArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct DatabaseOverride {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct WorkArgs {
    #[command(flatten)]
    pub overrides: WorkOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct WorkOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Override the number of settings entries kept in memory.
    #[arg(long = "settings-cache-capacity", value_name = "COUNT")]
    pub settings_cache_capacity: Option<u32>,

    /// Override the settings cache entry lifetime; 0 disables expiry.
    #[arg(long = "settings-cache-ttl-seconds", value_name = "SECONDS")]
    pub settings_cache_ttl_seconds: Option<u64>,

    /// Override the number of deliveries allowed per job.
    #[arg(long = "jobs-max-attempts", value_name = "COUNT")]
    pub jobs_max_attempts: Option<u32>,

    /// Override the warm-settings worker concurrency.
    #[arg(long = "jobs-warm-concurrency", value_name = "COUNT")]
    pub jobs_warm_concurrency: Option<u32>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,
}

#[derive(Debug, Args, Clone)]
pub struct SettingsArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    #[command(subcommand)]
    pub command: SettingsCommand,
}

#[derive(Debug, Subcommand, Clone)]
pub enum SettingsCommand {
    /// Print the value stored at a dotted path (`category`, `category.key` or `category.key.field`).
    Get(SettingsGetArgs),
    /// Update an existing setting at `category.key`.
    Set(SettingsSetArgs),
}

#[derive(Debug, Args, Clone)]
pub struct SettingsGetArgs {
    #[arg(value_name = "PATH")]
    pub path: String,

    /// JSON value printed when nothing is stored at PATH.
    #[arg(long, value_name = "JSON")]
    pub default: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct SettingsSetArgs {
    #[arg(value_name = "PATH")]
    pub path: String,

    /// New value as JSON; bare words are taken as strings.
    #[arg(value_name = "VALUE")]
    pub value: String,
}

#[derive(Debug, Args, Clone)]
pub struct JobsArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    #[command(subcommand)]
    pub command: JobsCommand,
}

#[derive(Debug, Subcommand, Clone)]
pub enum JobsCommand {
    /// Enqueue a job that repopulates cached settings categories.
    Warm(JobsWarmArgs),
}

#[derive(Debug, Args, Clone)]
pub struct JobsWarmArgs {
    #[arg(value_name = "CATEGORY", required = true, num_args = 1..)]
    pub categories: Vec<String>,
}
