use std::collections::BTreeMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{ConfigStore, RepoError},
    domain::settings::{Setting, SettingValue, ValueType},
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct SettingRow {
    id: Uuid,
    category: String,
    key_name: String,
    value: String,
    value_type: String,
    created: OffsetDateTime,
    modified: OffsetDateTime,
}

impl TryFrom<SettingRow> for Setting {
    type Error = RepoError;

    fn try_from(row: SettingRow) -> Result<Self, Self::Error> {
        let value_type = row
            .value_type
            .parse::<ValueType>()
            .map_err(|err| RepoError::Integrity {
                message: err.to_string(),
            })?;

        Ok(Self {
            id: row.id,
            category: row.category,
            key_name: row.key_name,
            value: row.value,
            value_type,
            created: row.created,
            modified: row.modified,
        })
    }
}

#[async_trait]
impl ConfigStore for PostgresRepositories {
    async fn find_by_category_and_key(
        &self,
        category: &str,
        key_name: &str,
    ) -> Result<Option<Setting>, RepoError> {
        let row = sqlx::query_as::<_, SettingRow>(
            r#"
            SELECT id, category, key_name, value, value_type, created, modified
            FROM settings
            WHERE category = $1 AND key_name = $2
            "#,
        )
        .bind(category)
        .bind(key_name)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(Setting::try_from).transpose()
    }

    async fn find_all_by_category(
        &self,
        category: &str,
    ) -> Result<BTreeMap<String, SettingValue>, RepoError> {
        let rows = sqlx::query_as::<_, SettingRow>(
            r#"
            SELECT id, category, key_name, value, value_type, created, modified
            FROM settings
            WHERE category = $1
            ORDER BY key_name
            "#,
        )
        .bind(category)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(|row| {
                let setting = Setting::try_from(row)?;
                let value = setting.typed_value();
                Ok((setting.key_name, value))
            })
            .collect()
    }

    async fn persist(&self, setting: &Setting) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO settings (id, category, key_name, value, value_type, created, modified)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (category, key_name) DO UPDATE
            SET value = EXCLUDED.value,
                value_type = EXCLUDED.value_type,
                modified = EXCLUDED.modified
            "#,
        )
        .bind(setting.id)
        .bind(&setting.category)
        .bind(&setting.key_name)
        .bind(&setting.value)
        .bind(setting.value_type.as_str())
        .bind(setting.created)
        .bind(setting.modified)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }
}
