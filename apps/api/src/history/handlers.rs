use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::history::document::render_document;
use crate::history::store;
use crate::models::report::HistoryRecordRow;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

/// GET /api/v1/history
pub async fn handle_list_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<Vec<HistoryRecordRow>>, AppError> {
    if let Some(limit) = params.limit {
        if limit <= 0 {
            return Err(AppError::Validation("limit must be positive".to_string()));
        }
    }
    let records = store::list_records(&state.db, params.limit).await?;
    Ok(Json(records))
}

/// GET /api/v1/history/:id
pub async fn handle_get_history_record(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<HistoryRecordRow>, AppError> {
    let record = store::get_record(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Report {id} not found")))?;
    Ok(Json(record))
}

/// GET /api/v1/history/:id/document
pub async fn handle_get_history_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Html<String>, AppError> {
    let record = store::get_record(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Report {id} not found")))?;
    Ok(Html(render_document(&record)))
}

/// DELETE /api/v1/history/:id
pub async fn handle_delete_history_record(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !store::delete_record(&state.db, id).await? {
        return Err(AppError::NotFound(format!("Report {id} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/history
pub async fn handle_clear_history(
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let removed = store::clear_records(&state.db).await?;
    tracing::info!("Cleared {removed} history records");
    Ok(StatusCode::NO_CONTENT)
}
