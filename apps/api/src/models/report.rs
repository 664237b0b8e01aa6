use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row shape for `report_history`. One row per generated report:
/// the form inputs, the raw and cleaned model output, the interpretation, and
/// which configuration produced it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecordRow {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub prev_week_plan: String,
    pub prev_week_work: String,
    pub curr_week_plan: String,
    pub prev_week_additional_notes: String,
    pub raw_output: String,
    pub cleaned_output: String,
    pub is_json: bool,
    pub json_data: Option<serde_json::Value>,
    pub formatted_html: String,
    pub config_id: Option<String>,
    pub config_name: Option<String>,
}
