use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::configs::store as config_store;
use crate::dify::ReportInputs;
use crate::dingtalk::ReportSections;
use crate::errors::AppError;
use crate::extract::{self, ExtractionResult, StructuredReport};
use crate::history::store::{self as history_store, NewReportRecord, HISTORY_RETENTION};
use crate::models::config::{ApiConfig, DingTalkConfig};
use crate::state::AppState;

/// Generation request as the web client sends it. The input fields mirror the
/// report form; `configId` overrides the current configuration for one run.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerateRequest {
    pub prev_week_plan: String,
    pub prev_week_work: String,
    pub curr_week_plan: String,
    pub prev_week_additional_notes: String,
    pub config_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub config_id: Option<String>,
    pub config_name: Option<String>,
    #[serde(flatten)]
    pub result: ExtractionResult,
}

/// The three planning fields are mandatory; whitespace-only counts as empty.
fn missing_fields(request: &GenerateRequest) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if request.prev_week_plan.trim().is_empty() {
        missing.push("prevWeekPlan");
    }
    if request.prev_week_work.trim().is_empty() {
        missing.push("prevWeekWork");
    }
    if request.curr_week_plan.trim().is_empty() {
        missing.push("currWeekPlan");
    }
    missing
}

/// Picks the configuration for a run: an explicit id when given, the current
/// configuration otherwise.
async fn resolve_config(state: &AppState, config_id: Option<&str>) -> Result<ApiConfig, AppError> {
    match config_id {
        Some(id) => config_store::get_config(&state.db, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Configuration {id} not found"))),
        None => current_config(state).await?.ok_or_else(|| {
            AppError::Validation(
                "No configuration selected; create one or pass configId".to_string(),
            )
        }),
    }
}

/// The configuration the current pointer resolves to, if any. A dangling
/// pointer reads as no configuration.
async fn current_config(state: &AppState) -> Result<Option<ApiConfig>, AppError> {
    match config_store::get_current_id(&state.db).await? {
        Some(id) => Ok(config_store::get_config(&state.db, &id).await?),
        None => Ok(None),
    }
}

/// Forwarding needs DingTalk settings that are present and enabled; absent or
/// disabled settings count as missing, like the report itself.
fn require_dingtalk(config: &ApiConfig) -> Result<&DingTalkConfig, AppError> {
    config
        .dingtalk
        .as_ref()
        .filter(|d| d.enabled)
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "DingTalk settings are not configured for configuration {}",
                config.id
            ))
        })
}

/// POST /api/v1/reports/generate
pub async fn handle_generate_report(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, AppError> {
    let missing = missing_fields(&request);
    if !missing.is_empty() {
        return Err(AppError::Validation(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )));
    }

    let config = resolve_config(&state, request.config_id.as_deref()).await?;

    let inputs = ReportInputs {
        prev_week_plan: request.prev_week_plan,
        prev_week_work: request.prev_week_work,
        curr_week_plan: request.curr_week_plan,
        prev_week_additional_notes: request.prev_week_additional_notes,
    };

    info!("Generating report with configuration {}", config.id);
    let raw = state
        .backend
        .generate(&config.api_url, &config.api_key, &inputs)
        .await?;

    let outcome = extract::process(&raw);

    let record = history_store::insert_record(
        &state.db,
        NewReportRecord {
            inputs: &inputs,
            outcome: &outcome,
            config_id: Some(&config.id),
            config_name: Some(&config.name),
        },
    )
    .await?;

    let pruned = history_store::prune_records(&state.db, HISTORY_RETENTION).await?;
    if pruned > 0 {
        debug!("Pruned {pruned} history records past the retention window");
    }

    info!(
        "Report {} generated via {:?} path, {} chars formatted",
        record.id,
        outcome.metadata.parsing_method,
        outcome.formatted.len()
    );

    Ok(Json(GenerateResponse {
        id: record.id,
        created_at: record.created_at,
        config_id: record.config_id,
        config_name: record.config_name,
        result: outcome,
    }))
}

#[derive(Deserialize)]
pub struct PreviewRequest {
    pub content: String,
}

/// POST /api/v1/reports/preview
///
/// Runs the extraction pipeline over caller-supplied text. No backend call,
/// nothing persisted.
pub async fn handle_preview_report(Json(request): Json<PreviewRequest>) -> Json<ExtractionResult> {
    Json(extract::process(&request.content))
}

/// POST /api/v1/reports/:id/dingtalk
pub async fn handle_forward_to_dingtalk(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let record = history_store::get_record(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Report {id} not found")))?;

    // Prefer the configuration that generated the report; it may have been
    // deleted since, in which case the current one stands in.
    let config = match record.config_id.as_deref() {
        Some(config_id) => config_store::get_config(&state.db, config_id).await?,
        None => None,
    };
    let config = match config {
        Some(config) => config,
        None => current_config(&state).await?.ok_or_else(|| {
            AppError::NotFound(format!("No configuration available to forward report {id}"))
        })?,
    };

    let settings = require_dingtalk(&config)?;

    let report = record
        .json_data
        .clone()
        .and_then(StructuredReport::from_value);
    let sections = ReportSections::from_report(
        report.as_ref(),
        &record.cleaned_output,
        &record.prev_week_additional_notes,
    );

    state.dingtalk.send_report(settings, &sections).await?;
    info!("Report {id} forwarded to DingTalk");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_inputs_missing_lists_every_field() {
        let request = GenerateRequest::default();
        assert_eq!(
            missing_fields(&request),
            vec!["prevWeekPlan", "prevWeekWork", "currWeekPlan"]
        );
    }

    #[test]
    fn test_whitespace_only_input_counts_as_missing() {
        let request = GenerateRequest {
            prev_week_plan: "  \n ".to_string(),
            prev_week_work: "did things".to_string(),
            curr_week_plan: "do things".to_string(),
            ..Default::default()
        };
        assert_eq!(missing_fields(&request), vec!["prevWeekPlan"]);
    }

    #[test]
    fn test_complete_inputs_pass() {
        let request = GenerateRequest {
            prev_week_plan: "plan".to_string(),
            prev_week_work: "work".to_string(),
            curr_week_plan: "next".to_string(),
            ..Default::default()
        };
        assert!(missing_fields(&request).is_empty());
    }

    #[test]
    fn test_request_accepts_camel_case_wire_names() {
        let request: GenerateRequest = serde_json::from_str(
            "{\"prevWeekPlan\": \"a\", \"prevWeekWork\": \"b\", \"currWeekPlan\": \"c\", \
             \"configId\": \"cfg_1\"}",
        )
        .unwrap();
        assert_eq!(request.prev_week_plan, "a");
        assert_eq!(request.config_id.as_deref(), Some("cfg_1"));
        assert_eq!(request.prev_week_additional_notes, "");
    }

    #[test]
    fn test_generate_response_flattens_extraction_result() {
        let response = GenerateResponse {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            config_id: Some("cfg_1".to_string()),
            config_name: Some("Production".to_string()),
            result: extract::process("{\"summary\": \"shipped\"}"),
        };
        let value = serde_json::to_value(&response).unwrap();
        assert!(value.get("id").is_some());
        assert_eq!(value["configId"], "cfg_1");
        assert_eq!(value["isJson"], true);
        assert!(value.get("formatted").is_some());
        assert!(value.get("result").is_none());
    }

    fn config_with_dingtalk(dingtalk: Option<DingTalkConfig>) -> ApiConfig {
        ApiConfig {
            id: "cfg_1".to_string(),
            name: "Production".to_string(),
            api_url: "https://api.dify.ai/v1/workflows/run".to_string(),
            api_key: "app-123".to_string(),
            dingtalk,
        }
    }

    fn dingtalk_settings(enabled: bool) -> DingTalkConfig {
        DingTalkConfig {
            enabled,
            corp_id: "corp".to_string(),
            app_key: "key".to_string(),
            app_secret: "secret".to_string(),
            user_id: "user".to_string(),
        }
    }

    #[test]
    fn test_missing_dingtalk_settings_are_not_found() {
        let config = config_with_dingtalk(None);
        assert!(matches!(
            require_dingtalk(&config),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_disabled_dingtalk_settings_are_not_found() {
        let config = config_with_dingtalk(Some(dingtalk_settings(false)));
        assert!(matches!(
            require_dingtalk(&config),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_enabled_dingtalk_settings_pass() {
        let config = config_with_dingtalk(Some(dingtalk_settings(true)));
        let settings = require_dingtalk(&config).unwrap();
        assert_eq!(settings.user_id, "user");
    }
}
