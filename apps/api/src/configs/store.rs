//! Persistence for configurations, the current pointer, and backups.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::config::{ApiConfig, ApiConfigRow};

/// Backups kept after pruning.
pub const BACKUP_RETENTION: i64 = 5;

pub async fn list_configs(pool: &PgPool) -> Result<Vec<ApiConfig>> {
    let rows =
        sqlx::query_as::<_, ApiConfigRow>("SELECT * FROM api_configs ORDER BY created_at ASC")
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().map(ApiConfigRow::into_config).collect())
}

pub async fn get_config(pool: &PgPool, id: &str) -> Result<Option<ApiConfig>> {
    let row = sqlx::query_as::<_, ApiConfigRow>("SELECT * FROM api_configs WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(ApiConfigRow::into_config))
}

pub async fn insert_config(pool: &PgPool, config: &ApiConfig) -> Result<()> {
    sqlx::query(
        "INSERT INTO api_configs (id, name, api_url, api_key, dingtalk) VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(&config.id)
    .bind(&config.name)
    .bind(&config.api_url)
    .bind(&config.api_key)
    .bind(dingtalk_json(config)?)
    .execute(pool)
    .await?;
    Ok(())
}

/// Returns false when the id did not exist.
pub async fn update_config(pool: &PgPool, config: &ApiConfig) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE api_configs
        SET name = $2, api_url = $3, api_key = $4, dingtalk = $5, updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(&config.id)
    .bind(&config.name)
    .bind(&config.api_url)
    .bind(&config.api_key)
    .bind(dingtalk_json(config)?)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Returns false when the id did not exist. The current pointer clears
/// itself through the foreign key when it referenced this config.
pub async fn delete_config(pool: &PgPool, id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM api_configs WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn get_current_id(pool: &PgPool) -> Result<Option<String>> {
    let id: Option<Option<String>> =
        sqlx::query_scalar("SELECT config_id FROM current_config WHERE singleton")
            .fetch_optional(pool)
            .await?;
    Ok(id.flatten())
}

pub async fn set_current_id(pool: &PgPool, id: Option<&str>) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO current_config (singleton, config_id) VALUES (TRUE, $1)
        ON CONFLICT (singleton) DO UPDATE SET config_id = EXCLUDED.config_id
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Replaces the whole config set and the current pointer in one transaction.
/// `current_id`, when set, must be one of `configs`.
pub async fn replace_all(
    pool: &PgPool,
    configs: &[ApiConfig],
    current_id: Option<&str>,
) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM api_configs").execute(&mut *tx).await?;
    for config in configs {
        sqlx::query(
            "INSERT INTO api_configs (id, name, api_url, api_key, dingtalk) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&config.id)
        .bind(&config.name)
        .bind(&config.api_url)
        .bind(&config.api_key)
        .bind(dingtalk_json(config)?)
        .execute(&mut *tx)
        .await?;
    }
    sqlx::query(
        r#"
        INSERT INTO current_config (singleton, config_id) VALUES (TRUE, $1)
        ON CONFLICT (singleton) DO UPDATE SET config_id = EXCLUDED.config_id
        "#,
    )
    .bind(current_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

fn dingtalk_json(config: &ApiConfig) -> Result<Option<Value>> {
    config
        .dingtalk
        .as_ref()
        .map(serde_json::to_value)
        .transpose()
        .map_err(Into::into)
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BackupRow {
    pub id: Uuid,
    pub taken_at: DateTime<Utc>,
    pub document: Value,
}

/// What the backup listing shows; the document itself stays in the store.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupSummary {
    pub id: Uuid,
    pub taken_at: DateTime<Utc>,
    pub config_count: usize,
    pub version: String,
}

impl BackupRow {
    pub fn summary(&self) -> BackupSummary {
        BackupSummary {
            id: self.id,
            taken_at: self.taken_at,
            config_count: self
                .document
                .pointer("/configurations/configs")
                .and_then(Value::as_array)
                .map(Vec::len)
                .unwrap_or(0),
            version: self
                .document
                .pointer("/exportMetadata/version")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        }
    }
}

/// Stores a backup document and prunes the table down to the retention
/// limit. Returns the new backup's id.
pub async fn insert_backup(pool: &PgPool, document: &Value) -> Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO config_backups (id, taken_at, document) VALUES ($1, $2, $3)")
        .bind(id)
        .bind(Utc::now())
        .bind(document)
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        DELETE FROM config_backups
        WHERE id NOT IN (
            SELECT id FROM config_backups ORDER BY taken_at DESC LIMIT $1
        )
        "#,
    )
    .bind(BACKUP_RETENTION)
    .execute(pool)
    .await?;

    Ok(id)
}

pub async fn list_backups(pool: &PgPool) -> Result<Vec<BackupRow>> {
    Ok(sqlx::query_as::<_, BackupRow>(
        "SELECT * FROM config_backups ORDER BY taken_at DESC",
    )
    .fetch_all(pool)
    .await?)
}

pub async fn get_backup(pool: &PgPool, id: Uuid) -> Result<Option<BackupRow>> {
    Ok(
        sqlx::query_as::<_, BackupRow>("SELECT * FROM config_backups WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_backup_summary_reads_document() {
        let row = BackupRow {
            id: Uuid::new_v4(),
            taken_at: Utc::now(),
            document: json!({
                "exportMetadata": { "version": "1.0" },
                "configurations": { "configs": [{"id": "a"}, {"id": "b"}] }
            }),
        };
        let summary = row.summary();
        assert_eq!(summary.config_count, 2);
        assert_eq!(summary.version, "1.0");
    }

    #[test]
    fn test_backup_summary_tolerates_malformed_document() {
        let row = BackupRow {
            id: Uuid::new_v4(),
            taken_at: Utc::now(),
            document: json!("not an object"),
        };
        let summary = row.summary();
        assert_eq!(summary.config_count, 0);
        assert_eq!(summary.version, "");
    }
}
