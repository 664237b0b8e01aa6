//! Import planning: parsing, validation, merge strategies, and id conflict
//! resolution. Everything here is store-free; the handler applies the
//! resulting plan.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::configs::export::{ExportMetadata, APP_NAME, EXPORT_VERSION};
use crate::configs::validation::validate_config;
use crate::errors::AppError;
use crate::models::config::ApiConfig;

const SUPPORTED_VERSIONS: [&str; 1] = [EXPORT_VERSION];

/// How imported configs combine with the existing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    Replace,
    #[default]
    Merge,
    AddOnly,
}

/// Import options; every field is optional on the wire.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImportOptions {
    pub strategy: MergeStrategy,
    pub set_as_current: bool,
    pub create_backup: bool,
    pub validate_urls: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            strategy: MergeStrategy::Merge,
            set_as_current: true,
            create_backup: true,
            validate_urls: true,
        }
    }
}

/// The validated content of an uploaded export document.
#[derive(Debug, Clone)]
pub struct ParsedImport {
    pub configs: Vec<ApiConfig>,
    pub current_config_id: Option<String>,
}

// Lenient read-side shape: structural problems surface as targeted messages
// instead of one opaque deserialization error.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDocument {
    export_metadata: Option<ExportMetadata>,
    configurations: Option<RawConfigurations>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfigurations {
    configs: Option<Vec<Value>>,
    #[serde(default)]
    current_config_id: Option<String>,
}

/// Parses and validates an uploaded document. Every config must pass
/// validation or the whole import is rejected.
pub fn parse_import(raw: &[u8], validate_urls: bool) -> Result<ParsedImport, AppError> {
    let document: RawDocument = serde_json::from_slice(raw).map_err(|e| {
        AppError::UnprocessableEntity(format!("File is not a valid configuration export: {e}"))
    })?;

    let metadata = document.export_metadata.ok_or_else(|| {
        AppError::UnprocessableEntity(
            "Missing export metadata; the file does not look like a configuration export"
                .to_string(),
        )
    })?;
    if metadata.version.is_empty() {
        return Err(AppError::UnprocessableEntity(
            "The file carries no version information".to_string(),
        ));
    }
    if !SUPPORTED_VERSIONS.contains(&metadata.version.as_str()) {
        return Err(AppError::UnprocessableEntity(format!(
            "Unsupported export version {}; supported versions: {}",
            metadata.version,
            SUPPORTED_VERSIONS.join(", ")
        )));
    }
    if metadata.app_name != APP_NAME {
        warn!(
            "Import file was not exported by {APP_NAME} (appName: {:?})",
            metadata.app_name
        );
    }

    let configurations = document.configurations.ok_or_else(|| {
        AppError::UnprocessableEntity("No configuration data found in the file".to_string())
    })?;
    let raw_configs = configurations.configs.unwrap_or_default();
    if raw_configs.is_empty() {
        return Err(AppError::UnprocessableEntity(
            "The file contains no configurations".to_string(),
        ));
    }

    let mut configs = Vec::with_capacity(raw_configs.len());
    for (index, value) in raw_configs.into_iter().enumerate() {
        let config: ApiConfig = serde_json::from_value(value).map_err(|e| {
            AppError::UnprocessableEntity(format!("Config {} failed validation: {e}", index + 1))
        })?;
        validate_config(&config, validate_urls).map_err(|e| {
            AppError::UnprocessableEntity(format!("Config {} failed validation: {e}", index + 1))
        })?;
        configs.push(config);
    }

    Ok(ParsedImport {
        configs,
        current_config_id: configurations.current_config_id,
    })
}

/// Outcome counters for an import, reported back to the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    pub total: usize,
    pub added: usize,
    pub updated: usize,
    pub skipped: usize,
    /// Names (or ids) of imported configs skipped under `add_only`.
    pub conflicts: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub configs: Vec<ApiConfig>,
    pub stats: MergeStats,
}

/// Combines the existing store with the imported set. Pure; the caller
/// persists the result.
pub fn merge_configurations(
    existing: Vec<ApiConfig>,
    imported: Vec<ApiConfig>,
    strategy: MergeStrategy,
) -> MergeOutcome {
    let mut stats = MergeStats::default();
    let mut result;

    match strategy {
        MergeStrategy::Replace => {
            stats.added = imported.len();
            result = imported;
        }
        MergeStrategy::Merge => {
            result = existing;
            for config in imported {
                match result.iter_mut().find(|c| c.id == config.id) {
                    Some(slot) => {
                        *slot = config;
                        stats.updated += 1;
                    }
                    None => {
                        result.push(config);
                        stats.added += 1;
                    }
                }
            }
        }
        MergeStrategy::AddOnly => {
            result = existing;
            for config in imported {
                if result.iter().any(|c| c.id == config.id) {
                    stats.conflicts.push(if config.name.is_empty() {
                        config.id.clone()
                    } else {
                        config.name.clone()
                    });
                    stats.skipped += 1;
                } else {
                    result.push(config);
                    stats.added += 1;
                }
            }
        }
    }

    let result = resolve_id_conflicts(result);
    stats.total = result.len();
    MergeOutcome {
        configs: result,
        stats,
    }
}

/// Rewrites duplicate ids within the set to `{id}_{n}`, first free n. Only a
/// `replace` import of a file carrying internal duplicates can produce them.
pub fn resolve_id_conflicts(configs: Vec<ApiConfig>) -> Vec<ApiConfig> {
    let mut used = HashSet::new();
    configs
        .into_iter()
        .map(|mut config| {
            if used.contains(&config.id) {
                let mut counter = 1;
                let mut candidate = format!("{}_{}", config.id, counter);
                while used.contains(&candidate) {
                    counter += 1;
                    candidate = format!("{}_{}", config.id, counter);
                }
                warn!("Resolved config id conflict: {} -> {}", config.id, candidate);
                config.id = candidate;
            }
            used.insert(config.id.clone());
            config
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(id: &str, name: &str) -> ApiConfig {
        ApiConfig {
            id: id.to_string(),
            name: name.to_string(),
            api_url: "https://api.dify.ai/v1/workflows/run".to_string(),
            api_key: "app-123".to_string(),
            dingtalk: None,
        }
    }

    fn document(configs: Value) -> Vec<u8> {
        json!({
            "exportMetadata": {
                "version": "1.0",
                "appName": "Weekly Reporter"
            },
            "configurations": { "configs": configs }
        })
        .to_string()
        .into_bytes()
    }

    fn unprocessable_message(error: AppError) -> String {
        match error {
            AppError::UnprocessableEntity(message) => message,
            other => panic!("expected UnprocessableEntity, got {other:?}"),
        }
    }

    #[test]
    fn test_well_formed_document_parses() {
        let raw = document(json!([{
            "id": "a",
            "name": "A",
            "apiUrl": "https://api.dify.ai/v1/workflows/run",
            "apiKey": "app-1"
        }]));
        let parsed = parse_import(&raw, true).unwrap();
        assert_eq!(parsed.configs.len(), 1);
        assert_eq!(parsed.configs[0].id, "a");
    }

    #[test]
    fn test_missing_metadata_rejected() {
        let raw = br#"{"configurations": {"configs": []}}"#;
        let message = unprocessable_message(parse_import(raw, true).unwrap_err());
        assert!(message.contains("export metadata"));
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let raw = json!({
            "exportMetadata": { "version": "2.0" },
            "configurations": { "configs": [{}] }
        })
        .to_string();
        let message = unprocessable_message(parse_import(raw.as_bytes(), true).unwrap_err());
        assert!(message.contains("Unsupported export version 2.0"));
    }

    #[test]
    fn test_empty_config_list_rejected() {
        let raw = document(json!([]));
        let message = unprocessable_message(parse_import(&raw, true).unwrap_err());
        assert!(message.contains("no configurations"));
    }

    #[test]
    fn test_invalid_entry_names_its_position() {
        let raw = document(json!([
            {
                "id": "a",
                "name": "A",
                "apiUrl": "https://api.dify.ai/v1/workflows/run",
                "apiKey": "app-1"
            },
            { "id": "b", "name": "B" }
        ]));
        let message = unprocessable_message(parse_import(&raw, true).unwrap_err());
        assert!(message.starts_with("Config 2 failed validation"));
    }

    #[test]
    fn test_url_validation_respects_flag() {
        let raw = document(json!([{
            "id": "a",
            "name": "A",
            "apiUrl": "not a url",
            "apiKey": "app-1"
        }]));
        assert!(parse_import(&raw, true).is_err());
        assert!(parse_import(&raw, false).is_ok());
    }

    #[test]
    fn test_options_default_from_empty_body() {
        let options: ImportOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options.strategy, MergeStrategy::Merge);
        assert!(options.set_as_current);
        assert!(options.create_backup);
        assert!(options.validate_urls);
    }

    #[test]
    fn test_strategy_parses_snake_case() {
        let options: ImportOptions =
            serde_json::from_str(r#"{"strategy": "add_only", "createBackup": false}"#).unwrap();
        assert_eq!(options.strategy, MergeStrategy::AddOnly);
        assert!(!options.create_backup);
    }

    #[test]
    fn test_replace_swaps_the_whole_set() {
        let outcome = merge_configurations(
            vec![config("old", "Old")],
            vec![config("new", "New")],
            MergeStrategy::Replace,
        );
        assert_eq!(outcome.configs.len(), 1);
        assert_eq!(outcome.configs[0].id, "new");
        assert_eq!(outcome.stats.added, 1);
        assert_eq!(outcome.stats.total, 1);
    }

    #[test]
    fn test_merge_updates_same_id_and_appends_rest() {
        let outcome = merge_configurations(
            vec![config("a", "Old A"), config("b", "B")],
            vec![config("a", "New A"), config("c", "C")],
            MergeStrategy::Merge,
        );
        assert_eq!(outcome.stats.updated, 1);
        assert_eq!(outcome.stats.added, 1);
        assert_eq!(outcome.stats.total, 3);
        let a = outcome.configs.iter().find(|c| c.id == "a").unwrap();
        assert_eq!(a.name, "New A");
    }

    #[test]
    fn test_add_only_skips_collisions() {
        let outcome = merge_configurations(
            vec![config("a", "Existing A")],
            vec![config("a", "Imported A"), config("b", "B")],
            MergeStrategy::AddOnly,
        );
        assert_eq!(outcome.stats.added, 1);
        assert_eq!(outcome.stats.skipped, 1);
        assert_eq!(outcome.stats.conflicts, vec!["Imported A".to_string()]);
        let a = outcome.configs.iter().find(|c| c.id == "a").unwrap();
        assert_eq!(a.name, "Existing A");
    }

    #[test]
    fn test_duplicate_ids_in_replace_get_suffixed() {
        let outcome = merge_configurations(
            Vec::new(),
            vec![config("a", "First"), config("a", "Second")],
            MergeStrategy::Replace,
        );
        let ids: Vec<_> = outcome.configs.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "a_1"]);
    }

    #[test]
    fn test_suffix_skips_taken_ids() {
        let configs = vec![config("a", "1"), config("a_1", "2"), config("a", "3")];
        let resolved = resolve_id_conflicts(configs);
        let ids: Vec<_> = resolved.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "a_1", "a_2"]);
    }
}
