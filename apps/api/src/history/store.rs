//! Report history persistence. The table keeps the newest rows up to
//! `HISTORY_RETENTION`; every insert is followed by a prune.

use anyhow::Result;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::dify::ReportInputs;
use crate::extract::{ExtractionResult, StructuredReport};
use crate::models::report::HistoryRecordRow;

/// Maximum number of history rows kept after pruning.
pub const HISTORY_RETENTION: i64 = 100;

/// Everything recorded about one finished generation.
pub struct NewReportRecord<'a> {
    pub inputs: &'a ReportInputs,
    pub outcome: &'a ExtractionResult,
    pub config_id: Option<&'a str>,
    pub config_name: Option<&'a str>,
}

/// Inserts a finished report and returns the stored row.
pub async fn insert_record(
    pool: &PgPool,
    record: NewReportRecord<'_>,
) -> Result<HistoryRecordRow> {
    let row = HistoryRecordRow {
        id: Uuid::new_v4(),
        created_at: Utc::now(),
        prev_week_plan: record.inputs.prev_week_plan.clone(),
        prev_week_work: record.inputs.prev_week_work.clone(),
        curr_week_plan: record.inputs.curr_week_plan.clone(),
        prev_week_additional_notes: record.inputs.prev_week_additional_notes.clone(),
        raw_output: record.outcome.original.clone(),
        cleaned_output: record.outcome.cleaned.clone(),
        is_json: record.outcome.is_json,
        json_data: record
            .outcome
            .json_data
            .clone()
            .map(StructuredReport::into_value),
        formatted_html: record.outcome.formatted.clone(),
        config_id: record.config_id.map(str::to_string),
        config_name: record.config_name.map(str::to_string),
    };

    sqlx::query(
        r#"
        INSERT INTO report_history
            (id, created_at, prev_week_plan, prev_week_work, curr_week_plan,
             prev_week_additional_notes, raw_output, cleaned_output, is_json,
             json_data, formatted_html, config_id, config_name)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        "#,
    )
    .bind(row.id)
    .bind(row.created_at)
    .bind(&row.prev_week_plan)
    .bind(&row.prev_week_work)
    .bind(&row.curr_week_plan)
    .bind(&row.prev_week_additional_notes)
    .bind(&row.raw_output)
    .bind(&row.cleaned_output)
    .bind(row.is_json)
    .bind(&row.json_data)
    .bind(&row.formatted_html)
    .bind(&row.config_id)
    .bind(&row.config_name)
    .execute(pool)
    .await?;

    Ok(row)
}

/// Returns records newest-first. `LIMIT NULL` means no limit in Postgres.
pub async fn list_records(pool: &PgPool, limit: Option<i64>) -> Result<Vec<HistoryRecordRow>> {
    Ok(sqlx::query_as::<_, HistoryRecordRow>(
        "SELECT * FROM report_history ORDER BY created_at DESC LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?)
}

pub async fn get_record(pool: &PgPool, id: Uuid) -> Result<Option<HistoryRecordRow>> {
    Ok(
        sqlx::query_as::<_, HistoryRecordRow>("SELECT * FROM report_history WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?,
    )
}

/// Deletes one record. Returns false when the id did not exist.
pub async fn delete_record(pool: &PgPool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM report_history WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Deletes every record. Returns how many were removed.
pub async fn clear_records(pool: &PgPool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM report_history").execute(pool).await?;
    Ok(result.rows_affected())
}

/// Deletes everything but the newest `keep` rows. Returns how many were
/// pruned.
pub async fn prune_records(pool: &PgPool, keep: i64) -> Result<u64> {
    let result = sqlx::query(
        r#"
        DELETE FROM report_history
        WHERE id NOT IN (
            SELECT id FROM report_history ORDER BY created_at DESC LIMIT $1
        )
        "#,
    )
    .bind(keep)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
