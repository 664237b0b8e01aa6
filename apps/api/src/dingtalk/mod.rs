//! DingTalk delivery: pushes a finished weekly report to DingTalk's
//! report-create endpoint.
//!
//! Access tokens are exchanged for app credentials and cached per app key;
//! a token is considered stale 300 seconds before DingTalk's own expiry so a
//! send never races the cutoff.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::extract::StructuredReport;
use crate::models::config::DingTalkConfig;

const OAPI_BASE: &str = "https://oapi.dingtalk.com";
const TEMPLATE_NAME: &str = "Weekly Report";
const TOKEN_SAFETY_MARGIN_SECS: i64 = 300;
/// Placeholder shown for a pane with nothing to say.
const EMPTY_SECTION: &str = "N/A";

#[derive(Debug, Error)]
pub enum DingTalkError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("DingTalk returned status {status}: {body}")]
    BadStatus { status: u16, body: String },

    #[error("DingTalk API error {errcode}: {errmsg}")]
    Api { errcode: i64, errmsg: String },

    #[error("DingTalk token response contained no access_token")]
    MissingToken,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    errcode: i64,
    #[serde(default)]
    errmsg: String,
    access_token: Option<String>,
    expires_in: Option<i64>,
}

#[derive(Debug, Serialize)]
struct CreateReportRequest<'a> {
    userid: &'a str,
    /// Milliseconds since the epoch.
    create_time: i64,
    template_name: &'a str,
    contents: Vec<ReportContent<'a>>,
}

#[derive(Debug, Serialize)]
struct ReportContent<'a> {
    content_type: &'a str,
    title: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateReportResponse {
    errcode: i64,
    #[serde(default)]
    errmsg: String,
}

/// The four markdown panes a DingTalk weekly report is assembled from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSections {
    pub last_week_review: String,
    pub this_week_summary: String,
    pub next_week_plan: String,
    pub notes: String,
}

impl ReportSections {
    /// Maps a stored report onto the DingTalk panes. Structured reports feed
    /// each pane from its matching section; a plain-text report carries the
    /// whole cleaned output in the summary pane.
    pub fn from_report(report: Option<&StructuredReport>, cleaned: &str, notes: &str) -> Self {
        let notes = non_empty_or_placeholder(notes);

        match report {
            Some(report) => Self {
                last_week_review: section_markdown(report.section("last_week_actual_table")),
                this_week_summary: section_markdown(report.section("summary")),
                next_week_plan: section_markdown(report.section("next_week_plan_table")),
                notes,
            },
            None => Self {
                last_week_review: EMPTY_SECTION.to_string(),
                this_week_summary: non_empty_or_placeholder(cleaned),
                next_week_plan: EMPTY_SECTION.to_string(),
                notes,
            },
        }
    }
}

fn non_empty_or_placeholder(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        EMPTY_SECTION.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Renders one report section as DingTalk markdown. Strings pass through,
/// object arrays become pipe tables, primitive arrays become bullet lists,
/// anything else is shown as fenced JSON. Missing or empty sections render
/// the `N/A` placeholder.
fn section_markdown(value: Option<&Value>) -> String {
    let Some(value) = value else {
        return EMPTY_SECTION.to_string();
    };

    match value {
        Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
        Value::Array(items) if items.first().is_some_and(Value::is_object) => {
            markdown_table(items)
        }
        Value::Array(items) if !items.is_empty() => markdown_list(items),
        Value::Null | Value::String(_) | Value::Array(_) => EMPTY_SECTION.to_string(),
        other => format!(
            "```json\n{}\n```",
            serde_json::to_string_pretty(other).unwrap_or_default()
        ),
    }
}

/// Pipe table over the first row's keys; later rows missing a column render
/// an empty cell.
fn markdown_table(rows: &[Value]) -> String {
    let columns: Vec<&str> = match rows.first().and_then(Value::as_object) {
        Some(first) => first.keys().map(String::as_str).collect(),
        None => return EMPTY_SECTION.to_string(),
    };

    let mut out = String::new();
    out.push('|');
    for column in &columns {
        out.push(' ');
        out.push_str(&markdown_cell(column));
        out.push_str(" |");
    }
    out.push_str("\n|");
    for _ in &columns {
        out.push_str(" --- |");
    }

    let empty_row = serde_json::Map::new();
    for row in rows {
        let cells = row.as_object().unwrap_or(&empty_row);
        out.push_str("\n|");
        for column in &columns {
            out.push(' ');
            out.push_str(&markdown_cell(&cell_text(cells.get(*column))));
            out.push_str(" |");
        }
    }
    out
}

fn markdown_list(items: &[Value]) -> String {
    items
        .iter()
        .map(|item| format!("- {}", cell_text(Some(item))))
        .collect::<Vec<_>>()
        .join("\n")
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

/// Pipes and newlines inside a cell would break the table grid.
fn markdown_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// DingTalk API client shared across requests. Holds one cached access token
/// per app key.
pub struct DingTalkClient {
    client: Client,
    tokens: Mutex<HashMap<String, CachedToken>>,
}

impl DingTalkClient {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
            tokens: Mutex::new(HashMap::new()),
        }
    }

    /// Returns a valid access token for the app, hitting the network only
    /// when the cache has no fresh entry.
    async fn access_token(
        &self,
        app_key: &str,
        app_secret: &str,
    ) -> Result<String, DingTalkError> {
        {
            let tokens = self.tokens.lock().await;
            if let Some(cached) = tokens.get(app_key) {
                if Utc::now() < cached.expires_at {
                    return Ok(cached.token.clone());
                }
            }
        }

        debug!("Requesting new DingTalk access token");
        let url = format!("{OAPI_BASE}/gettoken?appkey={app_key}&appsecret={app_secret}");
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DingTalkError::BadStatus {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = response.json().await?;
        if token.errcode != 0 {
            return Err(DingTalkError::Api {
                errcode: token.errcode,
                errmsg: token.errmsg,
            });
        }
        let access_token = token.access_token.ok_or(DingTalkError::MissingToken)?;

        let lifetime = (token.expires_in.unwrap_or(0) - TOKEN_SAFETY_MARGIN_SECS).max(0);
        let mut tokens = self.tokens.lock().await;
        tokens.insert(
            app_key.to_string(),
            CachedToken {
                token: access_token.clone(),
                expires_at: Utc::now() + Duration::seconds(lifetime),
            },
        );

        Ok(access_token)
    }

    /// Creates a weekly report for the configured user.
    pub async fn send_report(
        &self,
        settings: &DingTalkConfig,
        sections: &ReportSections,
    ) -> Result<(), DingTalkError> {
        let token = self
            .access_token(&settings.app_key, &settings.app_secret)
            .await?;
        let url = format!("{OAPI_BASE}/topapi/report/create?access_token={token}");

        let request = CreateReportRequest {
            userid: &settings.user_id,
            create_time: Utc::now().timestamp_millis(),
            template_name: TEMPLATE_NAME,
            contents: vec![
                ReportContent {
                    content_type: "markdown",
                    title: "Last Week Review",
                    content: &sections.last_week_review,
                },
                ReportContent {
                    content_type: "markdown",
                    title: "This Week Summary",
                    content: &sections.this_week_summary,
                },
                ReportContent {
                    content_type: "markdown",
                    title: "Next Week Plan",
                    content: &sections.next_week_plan,
                },
                ReportContent {
                    content_type: "markdown",
                    title: "Notes",
                    content: &sections.notes,
                },
            ],
        };

        let response = self.client.post(&url).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DingTalkError::BadStatus {
                status: status.as_u16(),
                body,
            });
        }

        let result: CreateReportResponse = response.json().await?;
        if result.errcode != 0 {
            return Err(DingTalkError::Api {
                errcode: result.errcode,
                errmsg: result.errmsg,
            });
        }

        info!("Report forwarded to DingTalk for user {}", settings.user_id);
        Ok(())
    }
}

impl Default for DingTalkClient {
    fn default() -> Self {
        Self::new()
    }
}
