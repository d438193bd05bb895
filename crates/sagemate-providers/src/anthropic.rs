//! Anthropic API provider.
//!
//! Calls the Anthropic Messages API with a single user turn.

use async_trait::async_trait;
use sagemate_core::{
    error::SagemateError,
    traits::{Completion, CompletionRequest, Provider},
};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Anthropic Messages API provider.
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl AnthropicProvider {
    /// Create from config values.
    pub fn from_config(api_key: String, model: String) -> Result<Self, SagemateError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SagemateError::Provider(format!("anthropic: client build failed: {e}")))?;
        Ok(Self {
            client,
            api_key,
            model,
        })
    }
}

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "String::is_empty")]
    system: String,
    messages: Vec<AnthropicMessage>,
}

#[derive(Serialize, Deserialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Option<Vec<AnthropicContentBlock>>,
    model: Option<String>,
    usage: Option<AnthropicUsage>,
}

#[derive(Deserialize)]
struct AnthropicContentBlock {
    #[serde(default, rename = "type")]
    block_type: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

impl AnthropicResponse {
    /// Concatenate every text block of the response.
    fn text(&self) -> String {
        self.content
            .iter()
            .flatten()
            .filter(|b| b.block_type.is_empty() || b.block_type == "text")
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("")
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, SagemateError> {
        if self.api_key.is_empty() {
            return Err(SagemateError::Provider(
                "anthropic: no API key configured".into(),
            ));
        }

        let start = Instant::now();
        let body = AnthropicRequest {
            model: self.model.clone(),
            max_tokens: request.max_tokens,
            system: request.system.clone(),
            messages: vec![AnthropicMessage {
                role: "user".into(),
                content: request.prompt.clone(),
            }],
        };

        debug!("anthropic: POST {ANTHROPIC_API_URL} model={}", self.model);

        let resp = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| SagemateError::Provider(format!("anthropic request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(SagemateError::Provider(format!(
                "anthropic returned {status}: {text}"
            )));
        }

        let parsed: AnthropicResponse = resp.json().await.map_err(|e| {
            SagemateError::Provider(format!("anthropic: failed to parse response: {e}"))
        })?;

        let text = parsed.text();
        if text.trim().is_empty() {
            return Err(SagemateError::Provider(
                "anthropic returned no text content".into(),
            ));
        }

        let tokens = parsed
            .usage
            .as_ref()
            .map(|u| u.input_tokens + u.output_tokens);

        Ok(Completion {
            text,
            tokens_used: tokens,
            processing_time_ms: start.elapsed().as_millis() as u64,
            model: parsed.model,
        })
    }
}
