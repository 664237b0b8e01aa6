//! Draft persistence: the one in-progress report form, kept in Redis.
//!
//! A single fixed key holds the form fields as JSON with a seven-day TTL.
//! Saving overwrites the previous draft and refreshes the TTL.

use anyhow::Context;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::state::AppState;

const DRAFT_KEY: &str = "weekly_reporter:draft";
const DRAFT_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// The four report inputs as typed into the form. All fields default to empty
/// so a partially filled form saves cleanly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    #[serde(default)]
    pub prev_week_plan: String,
    #[serde(default)]
    pub prev_week_work: String,
    #[serde(default)]
    pub curr_week_plan: String,
    #[serde(default)]
    pub prev_week_additional_notes: String,
}

/// GET /api/v1/draft
pub async fn handle_get_draft(State(state): State<AppState>) -> Result<Json<Draft>, AppError> {
    let mut conn = state.redis.get_multiplexed_async_connection().await?;
    let raw: Option<String> = conn.get(DRAFT_KEY).await?;
    let raw = raw.ok_or_else(|| AppError::NotFound("No draft saved".to_string()))?;

    let draft = serde_json::from_str(&raw).context("stored draft is not valid JSON")?;
    Ok(Json(draft))
}

/// PUT /api/v1/draft
pub async fn handle_save_draft(
    State(state): State<AppState>,
    Json(draft): Json<Draft>,
) -> Result<StatusCode, AppError> {
    let mut conn = state.redis.get_multiplexed_async_connection().await?;
    let raw = serde_json::to_string(&draft).context("failed to serialize draft")?;
    let _: () = conn.set_ex(DRAFT_KEY, raw, DRAFT_TTL_SECS).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/draft. Deleting an absent draft is a no-op.
pub async fn handle_delete_draft(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    let mut conn = state.redis.get_multiplexed_async_connection().await?;
    let _: () = conn.del(DRAFT_KEY).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_wire_names_are_camel_case() {
        let draft = Draft {
            prev_week_plan: "plan".to_string(),
            prev_week_work: "work".to_string(),
            curr_week_plan: "next".to_string(),
            prev_week_additional_notes: "notes".to_string(),
        };
        let json = serde_json::to_value(&draft).unwrap();
        assert_eq!(json["prevWeekPlan"], "plan");
        assert_eq!(json["prevWeekWork"], "work");
        assert_eq!(json["currWeekPlan"], "next");
        assert_eq!(json["prevWeekAdditionalNotes"], "notes");
    }

    #[test]
    fn test_partial_draft_deserializes_with_defaults() {
        let draft: Draft = serde_json::from_str(r#"{"prevWeekPlan": "only this"}"#).unwrap();
        assert_eq!(draft.prev_week_plan, "only this");
        assert_eq!(draft.prev_week_work, "");
        assert_eq!(draft.prev_week_additional_notes, "");
    }
}
