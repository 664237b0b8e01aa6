pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::configs::handlers as config_handlers;
use crate::drafts;
use crate::history::handlers as history_handlers;
use crate::reports::handlers as report_handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Reports
        .route(
            "/api/v1/reports/generate",
            post(report_handlers::handle_generate_report),
        )
        .route(
            "/api/v1/reports/preview",
            post(report_handlers::handle_preview_report),
        )
        .route(
            "/api/v1/reports/:id/dingtalk",
            post(report_handlers::handle_forward_to_dingtalk),
        )
        // History
        .route(
            "/api/v1/history",
            get(history_handlers::handle_list_history)
                .delete(history_handlers::handle_clear_history),
        )
        .route(
            "/api/v1/history/:id",
            get(history_handlers::handle_get_history_record)
                .delete(history_handlers::handle_delete_history_record),
        )
        .route(
            "/api/v1/history/:id/document",
            get(history_handlers::handle_get_history_document),
        )
        // Configurations
        .route(
            "/api/v1/configs",
            get(config_handlers::handle_list_configs).post(config_handlers::handle_create_config),
        )
        .route(
            "/api/v1/configs/current",
            get(config_handlers::handle_get_current_config)
                .put(config_handlers::handle_set_current_config),
        )
        .route(
            "/api/v1/configs/export",
            get(config_handlers::handle_export_configs),
        )
        .route(
            "/api/v1/configs/import",
            post(config_handlers::handle_import_configs),
        )
        .route(
            "/api/v1/configs/backups",
            get(config_handlers::handle_list_backups),
        )
        .route(
            "/api/v1/configs/backups/:id/restore",
            post(config_handlers::handle_restore_backup),
        )
        .route(
            "/api/v1/configs/:id",
            get(config_handlers::handle_get_config)
                .put(config_handlers::handle_update_config)
                .delete(config_handlers::handle_delete_config),
        )
        // Draft autosave
        .route(
            "/api/v1/draft",
            get(drafts::handle_get_draft)
                .put(drafts::handle_save_draft)
                .delete(drafts::handle_delete_draft),
        )
        .with_state(state)
}
