//! Postgres adapter tests. Run with `DATABASE_URL` set and `--ignored`.

use std::{sync::Arc, time::Duration};

use quire::{
    application::repos::{ConfigStore, QueueSubmitter},
    cache::{MemoryCacheBackend, SettingsCache},
    domain::{
        jobs::JobMessage,
        settings::{Setting, SettingValue, ValueType},
        types::JobType,
    },
    infra::db::PostgresRepositories,
};
use sqlx::PgPool;

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn settings_round_trip_through_postgres(pool: PgPool) {
    let repositories = Arc::new(PostgresRepositories::new(pool));
    repositories
        .persist(&Setting::new("AI", "dailyCostLimit", ValueType::Text, "2.50"))
        .await
        .expect("seed setting");
    repositories
        .persist(&Setting::new("AI", "enabled", ValueType::Bool, "1"))
        .await
        .expect("seed setting");

    let cache = SettingsCache::new(repositories.clone(), Arc::new(MemoryCacheBackend::default()));
    assert_eq!(
        cache.read("AI.dailyCostLimit", SettingValue::Null).await,
        SettingValue::from("2.50")
    );

    assert!(
        cache
            .write("AI.dailyCostLimit", SettingValue::from("5.00"))
            .await
            .expect("write")
    );

    let stored = repositories
        .find_by_category_and_key("AI", "dailyCostLimit")
        .await
        .expect("lookup")
        .expect("row exists");
    assert_eq!(stored.value, "5.00");

    let category = repositories
        .find_all_by_category("AI")
        .await
        .expect("category");
    assert_eq!(category.get("enabled"), Some(&SettingValue::Bool(true)));
    assert_eq!(category.get("dailyCostLimit"), Some(&SettingValue::from("5.00")));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn submissions_land_in_the_job_table(pool: PgPool) {
    PostgresRepositories::run_migrations(&pool)
        .await
        .expect("job schema");
    let repositories = PostgresRepositories::new(pool);

    let message = JobMessage::default()
        .with_argument("id", "warm-1")
        .with_argument("categories", serde_json::json!(["AI"]))
        .with_attempt(2);
    let job_id = repositories
        .submit(JobType::WarmSettings, message, Duration::from_secs(60))
        .await
        .expect("submit");

    let (job_type, attempt, max_attempts): (String, i64, i32) = sqlx::query_as(
        "SELECT job_type, (job->>'_attempt')::bigint, max_attempts FROM apalis.jobs WHERE id = $1",
    )
    .bind(&job_id)
    .fetch_one(repositories.pool())
    .await
    .expect("job row");

    assert_eq!(job_type, "warm_settings");
    assert_eq!(attempt, 2);
    assert_eq!(max_attempts, 1);
}
