//! Configuration validation shared by create, update, and import.

use crate::models::config::{ApiConfig, DingTalkConfig};

/// Checks one configuration. `validate_urls` is only ever false during an
/// import that explicitly opted out of URL checking.
pub fn validate_config(config: &ApiConfig, validate_urls: bool) -> Result<(), String> {
    if config.id.trim().is_empty() {
        return Err("configuration id must not be empty".to_string());
    }
    if config.name.trim().is_empty() {
        return Err("configuration name must not be empty".to_string());
    }
    if config.api_url.trim().is_empty() {
        return Err("apiUrl must not be empty".to_string());
    }
    if config.api_key.trim().is_empty() {
        return Err("apiKey must not be empty".to_string());
    }
    if validate_urls {
        validate_api_url(&config.api_url)?;
    }
    if let Some(dingtalk) = &config.dingtalk {
        validate_dingtalk(dingtalk)?;
    }
    Ok(())
}

fn validate_api_url(api_url: &str) -> Result<(), String> {
    let parsed =
        reqwest::Url::parse(api_url).map_err(|_| "apiUrl is not a valid URL".to_string())?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err("apiUrl must use http or https".to_string());
    }
    Ok(())
}

/// DingTalk fields are free-form until forwarding is switched on.
fn validate_dingtalk(dingtalk: &DingTalkConfig) -> Result<(), String> {
    if !dingtalk.enabled {
        return Ok(());
    }
    let required = [
        ("corpId", &dingtalk.corp_id),
        ("appKey", &dingtalk.app_key),
        ("appSecret", &dingtalk.app_secret),
        ("userId", &dingtalk.user_id),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(format!(
                "DingTalk forwarding is enabled but {field} is empty"
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ApiConfig {
        ApiConfig {
            id: "default".to_string(),
            name: "Default".to_string(),
            api_url: "https://api.dify.ai/v1/workflows/run".to_string(),
            api_key: "app-123".to_string(),
            dingtalk: None,
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate_config(&config(), true).is_ok());
    }

    #[test]
    fn test_blank_id_rejected() {
        let mut c = config();
        c.id = "   ".to_string();
        assert_eq!(
            validate_config(&c, true).unwrap_err(),
            "configuration id must not be empty"
        );
    }

    #[test]
    fn test_blank_name_rejected() {
        let mut c = config();
        c.name = String::new();
        assert!(validate_config(&c, true).is_err());
    }

    #[test]
    fn test_blank_api_key_rejected() {
        let mut c = config();
        c.api_key = String::new();
        assert_eq!(
            validate_config(&c, true).unwrap_err(),
            "apiKey must not be empty"
        );
    }

    #[test]
    fn test_unparseable_url_rejected() {
        let mut c = config();
        c.api_url = "not a url".to_string();
        assert_eq!(
            validate_config(&c, true).unwrap_err(),
            "apiUrl is not a valid URL"
        );
    }

    #[test]
    fn test_non_http_scheme_rejected() {
        let mut c = config();
        c.api_url = "ftp://example.com/run".to_string();
        assert_eq!(
            validate_config(&c, true).unwrap_err(),
            "apiUrl must use http or https"
        );
    }

    #[test]
    fn test_url_check_can_be_skipped() {
        let mut c = config();
        c.api_url = "not a url".to_string();
        assert!(validate_config(&c, false).is_ok());
    }

    #[test]
    fn test_disabled_dingtalk_allows_empty_fields() {
        let mut c = config();
        c.dingtalk = Some(DingTalkConfig {
            enabled: false,
            corp_id: String::new(),
            app_key: String::new(),
            app_secret: String::new(),
            user_id: String::new(),
        });
        assert!(validate_config(&c, true).is_ok());
    }

    #[test]
    fn test_enabled_dingtalk_requires_all_fields() {
        let mut c = config();
        c.dingtalk = Some(DingTalkConfig {
            enabled: true,
            corp_id: "corp".to_string(),
            app_key: "key".to_string(),
            app_secret: String::new(),
            user_id: "user".to_string(),
        });
        assert_eq!(
            validate_config(&c, true).unwrap_err(),
            "DingTalk forwarding is enabled but appSecret is empty"
        );
    }
}
