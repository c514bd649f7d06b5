//! Anthropic Claude backend implementation.
//!
//! Uses the Messages API with the structured-outputs beta so responses are
//! guaranteed to match the requested JSON schema.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{JsonRequest, LlmError};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const STRUCTURED_OUTPUTS_BETA: &str = "structured-outputs-2025-11-13";
const PROVIDER: &str = "anthropic";

/// Anthropic backend for Claude API.
pub struct AnthropicBackend {
    pub model: String,
    api_key: String,
    client: Client,
}

impl AnthropicBackend {
    /// Create a new Anthropic backend.
    pub fn new(model: String, api_key: String) -> Result<Self, LlmError> {
        let client = Client::builder().build().map_err(LlmError::Client)?;

        Ok(Self {
            model,
            api_key,
            client,
        })
    }

    /// Send a structured-output request and return the JSON text block.
    pub async fn complete_json(&self, request: &JsonRequest) -> Result<String, LlmError> {
        let body = AnthropicRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            system: request.system.as_deref(),
            messages: vec![AnthropicMessage {
                role: "user",
                content: &request.prompt,
            }],
            output_format: OutputFormat {
                format_type: "json_schema",
                schema: &request.schema,
            },
        };

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("anthropic-beta", STRUCTURED_OUTPUTS_BETA)
            .json(&body)
            .send()
            .await
            .map_err(|source| LlmError::Request {
                provider: PROVIDER,
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body: Result<AnthropicError, _> = response.json().await;
            let message = body
                .map(|e| e.error.message)
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LlmError::Status {
                provider: PROVIDER,
                status,
                message,
            });
        }

        let anthropic_response: AnthropicResponse =
            response.json().await.map_err(|source| LlmError::Request {
                provider: PROVIDER,
                source,
            })?;
        debug!(stop_reason = ?anthropic_response.stop_reason, "anthropic response received");

        extract_text(anthropic_response)
    }
}

fn extract_text(response: AnthropicResponse) -> Result<String, LlmError> {
    response
        .content
        .into_iter()
        .find_map(|block| block.text)
        .filter(|text| !text.trim().is_empty())
        .ok_or(LlmError::EmptyResponse(PROVIDER))
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<AnthropicMessage<'a>>,
    output_format: OutputFormat<'a>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct OutputFormat<'a> {
    #[serde(rename = "type")]
    format_type: &'a str,
    schema: &'a Value,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorDetail,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorDetail {
    message: String,
}
