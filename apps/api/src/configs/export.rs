//! The portable export document: everything a deployment needs to move its
//! configurations elsewhere. The same shape is stored as a backup payload.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::config::ApiConfig;

pub const EXPORT_VERSION: &str = "1.0";
pub const APP_NAME: &str = "Weekly Reporter";
const EXPORT_DESCRIPTION: &str = "Weekly Reporter Configuration Export";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub export_metadata: ExportMetadata,
    pub configurations: Configurations,
    /// Reserved for future application settings; carried through untouched.
    #[serde(default)]
    pub settings: Map<String, Value>,
}

/// Document metadata. Fields default to empty on read so older or foreign
/// files still parse; validation decides what is acceptable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportMetadata {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub export_date: String,
    #[serde(default)]
    pub app_name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configurations {
    #[serde(default)]
    pub configs: Vec<ApiConfig>,
    #[serde(default)]
    pub current_config_id: Option<String>,
}

/// Builds the export document for the given configs and current pointer.
pub fn build_export(configs: Vec<ApiConfig>, current_config_id: Option<String>) -> ExportDocument {
    ExportDocument {
        export_metadata: ExportMetadata {
            version: EXPORT_VERSION.to_string(),
            export_date: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            app_name: APP_NAME.to_string(),
            description: EXPORT_DESCRIPTION.to_string(),
        },
        configurations: Configurations {
            configs,
            current_config_id,
        },
        settings: Map::new(),
    }
}

/// `weekly-reporter-config-export_2025-03-14_09-30-00.json`
pub fn export_filename(now: DateTime<Utc>) -> String {
    format!(
        "weekly-reporter-config-export_{}.json",
        now.format("%Y-%m-%d_%H-%M-%S")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_export_document_shape() {
        let config = ApiConfig {
            id: "default".to_string(),
            name: "Default".to_string(),
            api_url: "https://api.dify.ai/v1/workflows/run".to_string(),
            api_key: "app-123".to_string(),
            dingtalk: None,
        };
        let document = build_export(vec![config], Some("default".to_string()));
        let value = serde_json::to_value(&document).unwrap();

        assert_eq!(value["exportMetadata"]["version"], "1.0");
        assert_eq!(value["exportMetadata"]["appName"], "Weekly Reporter");
        assert_eq!(value["configurations"]["currentConfigId"], "default");
        assert_eq!(value["configurations"]["configs"][0]["id"], "default");
        assert_eq!(value["settings"], serde_json::json!({}));
    }

    #[test]
    fn test_export_date_is_iso_8601() {
        let document = build_export(Vec::new(), None);
        let date = &document.export_metadata.export_date;
        assert!(date.ends_with('Z'));
        assert!(DateTime::parse_from_rfc3339(date).is_ok());
    }

    #[test]
    fn test_export_filename_format() {
        let now = Utc.with_ymd_and_hms(2025, 3, 14, 9, 30, 5).unwrap();
        assert_eq!(
            export_filename(now),
            "weekly-reporter-config-export_2025-03-14_09-30-05.json"
        );
    }

    #[test]
    fn test_document_round_trips() {
        let document = build_export(Vec::new(), None);
        let json = serde_json::to_string(&document).unwrap();
        let parsed: ExportDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.export_metadata.version, EXPORT_VERSION);
        assert!(parsed.configurations.configs.is_empty());
    }
}
