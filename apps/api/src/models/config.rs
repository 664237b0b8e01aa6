use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// DingTalk forwarding settings attached to a configuration. Fields are only
/// required when `enabled` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DingTalkConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub corp_id: String,
    #[serde(default)]
    pub app_key: String,
    #[serde(default)]
    pub app_secret: String,
    #[serde(default)]
    pub user_id: String,
}

/// A generation endpoint configuration. Wire format is camelCase so exported
/// documents round-trip with previously exported files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    pub id: String,
    pub name: String,
    pub api_url: String,
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dingtalk: Option<DingTalkConfig>,
}

/// Database row shape for `api_configs`. The DingTalk sub-config is stored
/// as JSONB.
#[derive(Debug, Clone, FromRow)]
pub struct ApiConfigRow {
    pub id: String,
    pub name: String,
    pub api_url: String,
    pub api_key: String,
    pub dingtalk: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApiConfigRow {
    /// A stored sub-config that no longer deserializes is treated as absent
    /// rather than failing the whole read.
    pub fn into_config(self) -> ApiConfig {
        ApiConfig {
            id: self.id,
            name: self.name,
            api_url: self.api_url,
            api_key: self.api_key,
            dingtalk: self
                .dingtalk
                .and_then(|value| serde_json::from_value(value).ok()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_config_uses_camel_case_wire_names() {
        let config = ApiConfig {
            id: "default".to_string(),
            name: "Default".to_string(),
            api_url: "https://api.dify.ai/v1/workflows/run".to_string(),
            api_key: "app-123".to_string(),
            dingtalk: None,
        };
        let value = serde_json::to_value(&config).unwrap();
        assert!(value.get("apiUrl").is_some());
        assert!(value.get("apiKey").is_some());
        assert!(value.get("api_url").is_none());
        assert!(value.get("dingtalk").is_none());
    }

    #[test]
    fn test_dingtalk_config_defaults_to_disabled() {
        let dingtalk: DingTalkConfig = serde_json::from_str("{}").unwrap();
        assert!(!dingtalk.enabled);
        assert_eq!(dingtalk.corp_id, "");
    }

    #[test]
    fn test_dingtalk_round_trips_camel_case() {
        let json = "{\"enabled\": true, \"corpId\": \"c\", \"appKey\": \"k\", \
                    \"appSecret\": \"s\", \"userId\": \"u\"}";
        let dingtalk: DingTalkConfig = serde_json::from_str(json).unwrap();
        assert!(dingtalk.enabled);
        assert_eq!(dingtalk.app_key, "k");
        let value = serde_json::to_value(&dingtalk).unwrap();
        assert!(value.get("appSecret").is_some());
    }
}
