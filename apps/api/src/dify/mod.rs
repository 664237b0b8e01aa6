//! Dify client, the single point of entry for report-generation calls.
//!
//! ARCHITECTURAL RULE: no other module may call the Dify API directly.
//! All generation traffic goes through `ReportBackend`, so handlers never
//! depend on the concrete HTTP client.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

const RESPONSE_MODE: &str = "blocking";
/// Fixed caller identity sent with every workflow run.
const API_USER: &str = "weekly-reporter-user";
const MAX_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum DifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Response is missing data.outputs.text")]
    MissingOutput,

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },
}

/// The workflow inputs the report template expects. Field names are the exact
/// keys the workflow reads; the notes field may be omitted by callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportInputs {
    pub prev_week_plan: String,
    pub prev_week_work: String,
    pub curr_week_plan: String,
    #[serde(default)]
    pub prev_week_additional_notes: String,
}

#[derive(Debug, Serialize)]
struct WorkflowRequest<'a> {
    inputs: &'a ReportInputs,
    response_mode: &'a str,
    user: &'a str,
}

#[derive(Debug, Deserialize)]
struct WorkflowResponse {
    data: Option<WorkflowData>,
}

#[derive(Debug, Deserialize)]
struct WorkflowData {
    outputs: Option<WorkflowOutputs>,
}

#[derive(Debug, Deserialize)]
struct WorkflowOutputs {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DifyErrorBody {
    message: String,
}

/// Report text backends implement this. Handlers depend on the trait only, so
/// the backend can be swapped or mocked without touching endpoint code.
///
/// Carried in `AppState` as `Arc<dyn ReportBackend>`.
#[async_trait]
pub trait ReportBackend: Send + Sync {
    async fn generate(
        &self,
        api_url: &str,
        api_key: &str,
        inputs: &ReportInputs,
    ) -> Result<String, DifyError>;
}

/// HTTP client for Dify workflow runs. Endpoint and key arrive per call since
/// each stored configuration carries its own.
#[derive(Clone)]
pub struct DifyClient {
    client: Client,
}

impl DifyClient {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .expect("Failed to build HTTP client"),
        }
    }

    /// Runs a blocking workflow and returns the generated report text.
    /// Retries on 429 (rate limit) and 5xx errors with exponential backoff.
    pub async fn run_workflow(
        &self,
        api_url: &str,
        api_key: &str,
        inputs: &ReportInputs,
    ) -> Result<String, DifyError> {
        let request_body = WorkflowRequest {
            inputs,
            response_mode: RESPONSE_MODE,
            user: API_USER,
        };

        let mut last_error: Option<DifyError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s
                let delay = std::time::Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "Dify call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(api_url)
                .bearer_auth(api_key)
                .json(&request_body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(DifyError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("Dify API returned {}: {}", status, body);
                last_error = Some(DifyError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                // Surface the body's message field when it parses
                let message = serde_json::from_str::<DifyErrorBody>(&body)
                    .map(|e| e.message)
                    .unwrap_or(body);
                return Err(DifyError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let workflow: WorkflowResponse = response.json().await?;
            let text = extract_output_text(workflow)?;

            debug!("Dify call succeeded: {} chars returned", text.len());

            return Ok(text);
        }

        Err(last_error.unwrap_or(DifyError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }
}

impl Default for DifyClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReportBackend for DifyClient {
    async fn generate(
        &self,
        api_url: &str,
        api_key: &str,
        inputs: &ReportInputs,
    ) -> Result<String, DifyError> {
        self.run_workflow(api_url, api_key, inputs).await
    }
}

/// Pulls `data.outputs.text` out of a workflow response; anything less is a
/// malformed response.
fn extract_output_text(workflow: WorkflowResponse) -> Result<String, DifyError> {
    workflow
        .data
        .and_then(|d| d.outputs)
        .and_then(|o| o.text)
        .ok_or(DifyError::MissingOutput)
}
