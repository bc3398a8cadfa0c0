use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::GenerationConfig;
use crate::error::{ReportError, ReportResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Chat-completions style text generation, implemented by [`OpenAiClient`].
#[allow(async_fn_in_trait)]
pub trait TextGenerator {
    /// One completion request. Errors are reported as `GenerationFailed`.
    async fn complete(&self, model: &str, messages: &[ChatMessage]) -> ReportResult<String>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

pub struct OpenAiClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(config: &GenerationConfig, api_key: String) -> ReportResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ReportError::generation(format!("HTTP client setup failed: {e}")))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            api_key,
        })
    }
}

impl TextGenerator for OpenAiClient {
    async fn complete(&self, model: &str, messages: &[ChatMessage]) -> ReportResult<String> {
        debug!(model, endpoint = %self.endpoint, "sending completion request");

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&ChatRequest { model, messages })
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "completion request failed");
                ReportError::generation(format!("HTTP error: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "completion endpoint returned an error status");
            return Err(ReportError::generation(format!(
                "API returned {status}: {body}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ReportError::generation(format!("failed to read response: {e}")))?;
        extract_content(&body)
    }
}

/// Pulls the first choice's text out of a chat-completions response body.
fn extract_content(body: &str) -> ReportResult<String> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| ReportError::generation(format!("JSON parse error: {e}")))?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| ReportError::generation("response contained no message content"))
}
