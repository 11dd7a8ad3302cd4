use super::*;

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.database.max_connections = Some(4);
    raw.logging.level = Some("info".to_string());

    let overrides = WorkOverrides {
        database_max_connections: Some(12),
        log_level: Some("debug".to_string()),
        ..Default::default()
    };

    raw.apply_work_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.database.max_connections.get(), 12);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn defaults_match_retry_policy() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.jobs.max_attempts, 3);
    assert_eq!(settings.jobs.base_delay, Duration::from_secs(30));
    assert_eq!(settings.jobs.max_delay, Duration::from_secs(3600));
    assert_eq!(settings.settings_cache.capacity.get(), 1024);
    assert_eq!(settings.settings_cache.ttl, Some(Duration::from_secs(300)));
    assert!(settings.database.url.is_none());
}

#[test]
fn zero_ttl_disables_expiry() {
    let mut raw = RawSettings::default();
    raw.settings_cache.ttl_seconds = Some(0);

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.settings_cache.ttl.is_none());
}

#[test]
fn max_delay_below_base_is_rejected() {
    let mut raw = RawSettings::default();
    raw.jobs.base_delay_seconds = Some(60);
    raw.jobs.max_delay_seconds = Some(10);

    let err = Settings::from_raw(raw).expect_err("invalid delays");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "jobs.max_delay_seconds",
            ..
        }
    ));
}

#[test]
fn zero_capacity_is_rejected() {
    let mut raw = RawSettings::default();
    raw.settings_cache.capacity = Some(0);

    let err = Settings::from_raw(raw).expect_err("invalid capacity");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "settings_cache.capacity",
            ..
        }
    ));
}

#[test]
fn blank_database_url_is_treated_as_missing() {
    let mut raw = RawSettings::default();
    raw.database.url = Some("   ".to_string());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.database.url.is_none());
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = WorkOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_work_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn no_subcommand_parses() {
    let args = CliArgs::parse_from(["quire"]);
    assert!(args.command.is_none());
}

#[test]
fn parse_settings_get_arguments() {
    let args = CliArgs::parse_from([
        "quire",
        "settings",
        "--database-url",
        "postgres://example",
        "get",
        "AI.dailyCostLimit",
        "--default",
        "0",
    ]);

    match args.command.expect("settings command") {
        Command::Settings(settings) => {
            assert_eq!(
                settings.database.database_url.as_deref(),
                Some("postgres://example")
            );
            match settings.command {
                SettingsCommand::Get(get) => {
                    assert_eq!(get.path, "AI.dailyCostLimit");
                    assert_eq!(get.default.as_deref(), Some("0"));
                }
                _ => panic!("wrong settings command parsed"),
            }
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_jobs_warm_arguments() {
    let args = CliArgs::parse_from(["quire", "jobs", "warm", "AI", "SEO"]);

    match args.command.expect("jobs command") {
        Command::Jobs(jobs) => match jobs.command {
            JobsCommand::Warm(warm) => assert_eq!(warm.categories, vec!["AI", "SEO"]),
        },
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn jobs_warm_requires_a_category() {
    assert!(CliArgs::try_parse_from(["quire", "jobs", "warm"]).is_err());
}

#[test]
fn parse_work_overrides() {
    let args = CliArgs::parse_from([
        "quire",
        "work",
        "--jobs-warm-concurrency",
        "4",
        "--settings-cache-ttl-seconds",
        "0",
    ]);

    match args.command.expect("work command") {
        Command::Work(work) => {
            assert_eq!(work.overrides.jobs_warm_concurrency, Some(4));
            assert_eq!(work.overrides.settings_cache_ttl_seconds, Some(0));
        }
        _ => panic!("wrong command parsed"),
    }
}
