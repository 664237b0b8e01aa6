use anyhow::Context;
use axum::extract::{Multipart, Path, Query, Request, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::{Json, RequestExt};
use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::configs::export::{self, ExportDocument};
use crate::configs::import::{self, ImportOptions, MergeStats};
use crate::configs::store;
use crate::configs::validation::validate_config;
use crate::errors::AppError;
use crate::models::config::ApiConfig;
use crate::state::AppState;

/// Matches the original 1 MB export file cap.
const MAX_IMPORT_BYTES: usize = 1024 * 1024;

/// GET /api/v1/configs
pub async fn handle_list_configs(
    State(state): State<AppState>,
) -> Result<Json<Vec<ApiConfig>>, AppError> {
    Ok(Json(store::list_configs(&state.db).await?))
}

/// POST /api/v1/configs
pub async fn handle_create_config(
    State(state): State<AppState>,
    Json(config): Json<ApiConfig>,
) -> Result<(StatusCode, Json<ApiConfig>), AppError> {
    validate_config(&config, true).map_err(AppError::Validation)?;
    if store::get_config(&state.db, &config.id).await?.is_some() {
        return Err(AppError::Validation(format!(
            "configuration {} already exists",
            config.id
        )));
    }
    store::insert_config(&state.db, &config).await?;

    // The first config becomes current automatically.
    if store::get_current_id(&state.db).await?.is_none() {
        store::set_current_id(&state.db, Some(&config.id)).await?;
    }

    Ok((StatusCode::CREATED, Json(config)))
}

/// GET /api/v1/configs/:id
pub async fn handle_get_config(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiConfig>, AppError> {
    let config = store::get_config(&state.db, &id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Configuration {id} not found")))?;
    Ok(Json(config))
}

/// PUT /api/v1/configs/:id
pub async fn handle_update_config(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(config): Json<ApiConfig>,
) -> Result<Json<ApiConfig>, AppError> {
    if config.id != id {
        return Err(AppError::Validation(
            "body id does not match the path id".to_string(),
        ));
    }
    validate_config(&config, true).map_err(AppError::Validation)?;
    if !store::update_config(&state.db, &config).await? {
        return Err(AppError::NotFound(format!("Configuration {id} not found")));
    }
    Ok(Json(config))
}

/// DELETE /api/v1/configs/:id
pub async fn handle_delete_config(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    if !store::delete_config(&state.db, &id).await? {
        return Err(AppError::NotFound(format!("Configuration {id} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/configs/current
pub async fn handle_get_current_config(
    State(state): State<AppState>,
) -> Result<Json<ApiConfig>, AppError> {
    let id = store::get_current_id(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("No current configuration set".to_string()))?;
    let config = store::get_config(&state.db, &id)
        .await?
        .ok_or_else(|| AppError::NotFound("No current configuration set".to_string()))?;
    Ok(Json(config))
}

#[derive(Deserialize)]
pub struct SetCurrentRequest {
    pub id: String,
}

/// PUT /api/v1/configs/current
pub async fn handle_set_current_config(
    State(state): State<AppState>,
    Json(request): Json<SetCurrentRequest>,
) -> Result<StatusCode, AppError> {
    if store::get_config(&state.db, &request.id).await?.is_none() {
        return Err(AppError::NotFound(format!(
            "Configuration {} not found",
            request.id
        )));
    }
    store::set_current_id(&state.db, Some(&request.id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/configs/export
pub async fn handle_export_configs(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let configs = store::list_configs(&state.db).await?;
    let current = store::get_current_id(&state.db).await?;
    let document = export::build_export(configs, current);

    let body =
        serde_json::to_string_pretty(&document).context("failed to serialize export document")?;
    let filename = export::export_filename(Utc::now());
    let headers = [
        (
            header::CONTENT_TYPE,
            "application/json; charset=utf-8".to_string(),
        ),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        ),
    ];
    Ok((headers, body))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    pub configs: Vec<ApiConfig>,
    pub current_config_id: Option<String>,
    pub stats: MergeStats,
    pub backup_id: Option<Uuid>,
}

/// POST /api/v1/configs/import
///
/// Accepts the export document either as a multipart `file` part or as the
/// raw JSON request body. Options come from the query string.
pub async fn handle_import_configs(
    State(state): State<AppState>,
    Query(options): Query<ImportOptions>,
    request: Request,
) -> Result<Json<ImportResponse>, AppError> {
    let raw = read_import_document(request).await?;
    let parsed = import::parse_import(&raw, options.validate_urls)?;

    let existing = store::list_configs(&state.db).await?;
    let existing_current = store::get_current_id(&state.db).await?;

    let mut backup_id = None;
    if options.create_backup {
        // A failed backup is logged but never blocks the import.
        match backup_document(&existing, &existing_current) {
            Ok(document) => match store::insert_backup(&state.db, &document).await {
                Ok(id) => backup_id = Some(id),
                Err(e) => warn!("Failed to back up configurations before import: {e}"),
            },
            Err(e) => warn!("Failed to build pre-import backup: {e}"),
        }
    }

    let single_imported_id = (parsed.configs.len() == 1).then(|| parsed.configs[0].id.clone());
    let document_current = parsed.current_config_id.clone();

    let outcome = import::merge_configurations(existing, parsed.configs, options.strategy);

    // The current pointer must reference a config in the merged set.
    let mut current = existing_current.filter(|id| outcome.configs.iter().any(|c| &c.id == id));
    if options.set_as_current && !outcome.configs.is_empty() {
        let candidate = single_imported_id.or(document_current);
        if let Some(id) = candidate {
            if outcome.configs.iter().any(|c| c.id == id) {
                current = Some(id);
            }
        }
    }

    store::replace_all(&state.db, &outcome.configs, current.as_deref()).await?;

    info!(
        "Imported configurations: {} total, {} added, {} updated, {} skipped",
        outcome.stats.total, outcome.stats.added, outcome.stats.updated, outcome.stats.skipped
    );

    Ok(Json(ImportResponse {
        configs: outcome.configs,
        current_config_id: current,
        stats: outcome.stats,
        backup_id,
    }))
}

fn backup_document(
    configs: &[ApiConfig],
    current: &Option<String>,
) -> Result<Value, serde_json::Error> {
    serde_json::to_value(export::build_export(configs.to_vec(), current.clone()))
}

/// Pulls the export document bytes out of the request.
async fn read_import_document(request: Request) -> Result<Bytes, AppError> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"));

    let raw = if is_multipart {
        let mut multipart = request
            .extract::<Multipart, _>()
            .await
            .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?;
        read_file_part(&mut multipart).await?
    } else {
        axum::body::to_bytes(request.into_body(), MAX_IMPORT_BYTES)
            .await
            .map_err(|_| {
                AppError::Validation("Request body unreadable or larger than 1 MB".to_string())
            })?
    };

    if raw.is_empty() {
        return Err(AppError::Validation(
            "The uploaded file is empty".to_string(),
        ));
    }
    Ok(raw)
}

async fn read_file_part(multipart: &mut Multipart) -> Result<Bytes, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        if let Some(name) = field.file_name() {
            if !name.to_lowercase().ends_with(".json") {
                return Err(AppError::Validation(
                    "The uploaded file must be a .json export".to_string(),
                ));
            }
        }
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read uploaded file: {e}")))?;
        if data.len() > MAX_IMPORT_BYTES {
            return Err(AppError::Validation(
                "The uploaded file exceeds the 1 MB limit".to_string(),
            ));
        }
        return Ok(data);
    }
    Err(AppError::Validation(
        "Multipart body has no `file` part".to_string(),
    ))
}

/// GET /api/v1/configs/backups
pub async fn handle_list_backups(
    State(state): State<AppState>,
) -> Result<Json<Vec<store::BackupSummary>>, AppError> {
    let rows = store::list_backups(&state.db).await?;
    Ok(Json(rows.iter().map(store::BackupRow::summary).collect()))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreResponse {
    pub configs: Vec<ApiConfig>,
    pub current_config_id: Option<String>,
}

/// POST /api/v1/configs/backups/:id/restore
pub async fn handle_restore_backup(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RestoreResponse>, AppError> {
    let backup = store::get_backup(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Backup {id} not found")))?;
    let document: ExportDocument =
        serde_json::from_value(backup.document).context("stored backup is corrupt")?;

    // Snapshot the present state so the restore itself can be undone.
    let existing = store::list_configs(&state.db).await?;
    let existing_current = store::get_current_id(&state.db).await?;
    let pre_restore = serde_json::to_value(export::build_export(existing, existing_current))
        .context("failed to serialize pre-restore backup")?;
    store::insert_backup(&state.db, &pre_restore).await?;

    let configs = document.configurations.configs;
    let current = document
        .configurations
        .current_config_id
        .filter(|current_id| configs.iter().any(|c| &c.id == current_id));
    store::replace_all(&state.db, &configs, current.as_deref()).await?;

    info!("Restored {} configurations from backup {id}", configs.len());

    Ok(Json(RestoreResponse {
        configs,
        current_config_id: current,
    }))
}
