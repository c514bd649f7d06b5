//! LLM backend implementations.
//!
//! Both external calls the pipeline makes (option generation and risk
//! scoring) are structured-output requests: the provider is handed a JSON
//! schema and returns a JSON document matching it. Providers only differ in
//! how that request is framed on the wire, so each backend exposes a single
//! `complete_json` primitive and the prompts and parsing live here.

pub mod anthropic;
#[cfg(test)]
pub mod mock;
pub mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use crate::config::ResolvedConfig;
use crate::environment::ShellEnvironment;

/// Number of options requested from the generation call.
pub const OPTION_COUNT: usize = 3;

/// Errors from a provider call.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("failed to create HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("failed to connect to {provider} API: {source}")]
    Request {
        provider: &'static str,
        source: reqwest::Error,
    },
    #[error("{provider} API request failed with status {status}: {message}")]
    Status {
        provider: &'static str,
        status: reqwest::StatusCode,
        message: String,
    },
    #[error("empty response from {0} API")]
    EmptyResponse(&'static str),
    #[error("failed to parse response JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One option as returned by the generation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOption {
    /// Brief title (2-5 words).
    pub title: String,
    /// The shell command to execute.
    pub command: String,
    /// What the command does and any caveats.
    pub description: String,
}

/// One evaluation as returned by the safety call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRisk {
    pub command: String,
    /// One of `none`, `low`, `high`.
    pub risk_level: String,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
struct OptionsEnvelope {
    options: Vec<CommandOption>,
}

#[derive(Debug, Deserialize)]
struct EvaluationsEnvelope {
    evaluations: Vec<CommandRisk>,
}

/// A structured-output request, independent of provider framing.
#[derive(Debug, Clone)]
pub struct JsonRequest {
    pub system: Option<String>,
    pub prompt: String,
    /// Schema name (OpenAI requires one).
    pub schema_name: &'static str,
    pub schema: Value,
    pub max_tokens: u32,
}

/// The two external calls the pipeline depends on.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Propose candidate commands for a natural-language query.
    async fn generate_options(&self, query: &str) -> Result<Vec<CommandOption>, LlmError>;

    /// Score each command for destructive risk, in input order.
    async fn evaluate_commands(&self, commands: &[String]) -> Result<Vec<CommandRisk>, LlmError>;
}

/// Enum-based backend for LLM providers.
pub enum Backend {
    Anthropic(anthropic::AnthropicBackend),
    OpenAI(openai::OpenAIBackend),
}

impl Backend {
    /// Send a structured-output request and return the raw JSON text.
    pub async fn complete_json(&self, request: &JsonRequest) -> Result<String, LlmError> {
        match self {
            Backend::Anthropic(b) => b.complete_json(request).await,
            Backend::OpenAI(b) => b.complete_json(request).await,
        }
    }

    /// Get the backend name.
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Anthropic(_) => "anthropic",
            Backend::OpenAI(_) => "openai",
        }
    }

    /// Get the model name.
    pub fn model(&self) -> &str {
        match self {
            Backend::Anthropic(b) => &b.model,
            Backend::OpenAI(b) => &b.model,
        }
    }
}

/// A provider backend plus the host facts that shape its prompts.
pub struct ProviderClient {
    backend: Backend,
    environment: ShellEnvironment,
}

impl ProviderClient {
    pub fn new(backend: Backend, environment: ShellEnvironment) -> Self {
        Self {
            backend,
            environment,
        }
    }
}

#[async_trait]
impl LlmClient for ProviderClient {
    async fn generate_options(&self, query: &str) -> Result<Vec<CommandOption>, LlmError> {
        debug!(
            backend = self.backend.name(),
            model = self.backend.model(),
            "requesting options"
        );
        let text = self
            .backend
            .complete_json(&generation_request(query, &self.environment))
            .await?;
        parse_options(&text)
    }

    async fn evaluate_commands(&self, commands: &[String]) -> Result<Vec<CommandRisk>, LlmError> {
        debug!(count = commands.len(), "requesting safety evaluation");
        let text = self
            .backend
            .complete_json(&safety_request(commands))
            .await?;
        parse_evaluations(&text)
    }
}

/// Create a client from resolved configuration.
pub fn create_client(
    config: &ResolvedConfig,
    environment: ShellEnvironment,
) -> Result<ProviderClient, LlmError> {
    let backend = match config.provider.name {
        "openai" => Backend::OpenAI(openai::OpenAIBackend::new(
            config.model.clone(),
            config.api_key.clone(),
        )?),
        _ => Backend::Anthropic(anthropic::AnthropicBackend::new(
            config.model.clone(),
            config.api_key.clone(),
        )?),
    };
    Ok(ProviderClient::new(backend, environment))
}

fn generation_request(query: &str, environment: &ShellEnvironment) -> JsonRequest {
    let prompt = format!(
        r#"Given this user request: "{query}"

Generate exactly {OPTION_COUNT} different shell command options that accomplish the task.

Requirements:
- Provide exactly {OPTION_COUNT} different approaches when possible
- Commands should be safe and practical
- Prefer commonly available tools
- Include relevant flags and options
- Descriptions should explain the approach and any caveats

The commands will run on:
{environment}"#
    );

    JsonRequest {
        system: None,
        prompt,
        schema_name: "command_options",
        schema: json!({
            "type": "object",
            "properties": {
                "options": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "title": {
                                "type": "string",
                                "description": "Brief title for this command option (2-5 words)"
                            },
                            "command": {
                                "type": "string",
                                "description": "The actual shell command to execute"
                            },
                            "description": {
                                "type": "string",
                                "description": "Clear explanation of what this command does and any important details"
                            }
                        },
                        "required": ["title", "command", "description"],
                        "additionalProperties": false
                    }
                }
            },
            "required": ["options"],
            "additionalProperties": false
        }),
        max_tokens: 2048,
    }
}

const SAFETY_SYSTEM_PROMPT: &str = "You are a security expert evaluating shell commands for safety risks.

Risk levels:
- HIGH: Destructive operations that could cause data loss or system damage (rm -rf, dd, mkfs, formatting, permanent deletion)
- LOW: Operations that interact with external systems or require careful attention (network operations, downloads, system scans, privilege changes)
- NONE: Safe read-only operations (ls, grep, find, echo, cat, viewing files)

Be practical and context-aware. Flag commands that users should think twice about before running.
Return one evaluation per command, in the order given.";

fn safety_request(commands: &[String]) -> JsonRequest {
    let mut prompt = String::from("Evaluate these commands:\n\n");
    for (i, command) in commands.iter().enumerate() {
        prompt.push_str(&format!("{}. {}\n", i + 1, command));
    }

    JsonRequest {
        system: Some(SAFETY_SYSTEM_PROMPT.to_string()),
        prompt,
        schema_name: "command_evaluations",
        schema: json!({
            "type": "object",
            "properties": {
                "evaluations": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "command": { "type": "string" },
                            "risk_level": { "type": "string", "enum": ["none", "low", "high"] },
                            "reason": { "type": "string", "maxLength": 100 }
                        },
                        "required": ["command", "risk_level", "reason"],
                        "additionalProperties": false
                    }
                }
            },
            "required": ["evaluations"],
            "additionalProperties": false
        }),
        max_tokens: 1024,
    }
}

/// Parse the generation call's JSON document.
pub fn parse_options(text: &str) -> Result<Vec<CommandOption>, LlmError> {
    let envelope: OptionsEnvelope = serde_json::from_str(text)?;
    Ok(envelope.options)
}

/// Parse the safety call's JSON document.
pub fn parse_evaluations(text: &str) -> Result<Vec<CommandRisk>, LlmError> {
    let envelope: EvaluationsEnvelope = serde_json::from_str(text)?;
    Ok(envelope.evaluations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_parse_options() {
        let text = r#"{
            "options": [
                {"title": "Git log with search", "command": "git log -p -S myFunction", "description": "Search history for modifications"},
                {"title": "Git grep", "command": "git log -G myFunction", "description": "Commits with pattern in diff"}
            ]
        }"#;
        let options = parse_options(text).unwrap();
        assert_eq!(options.len(), 2);
        assert_eq!(options[0].title, "Git log with search");
        assert_eq!(options[1].command, "git log -G myFunction");
    }

    #[test]
    fn test_parse_options_rejects_malformed() {
        assert!(matches!(parse_options("not json"), Err(LlmError::Parse(_))));
        assert!(matches!(
            parse_options(r#"{"options": [{"title": "x"}]}"#),
            Err(LlmError::Parse(_))
        ));
    }

    #[test]
    fn test_parse_evaluations() {
        let text = r#"{"evaluations": [
            {"command": "ls", "risk_level": "none", "reason": "read-only"},
            {"command": "rm -rf build", "risk_level": "high", "reason": "deletes files"}
        ]}"#;
        let evaluations = parse_evaluations(text).unwrap();
        assert_eq!(evaluations.len(), 2);
        assert_eq!(evaluations[1].risk_level, "high");
    }

    #[test]
    fn test_safety_request_numbers_commands() {
        let request = safety_request(&["ls -la".to_string(), "rm -rf /tmp/x".to_string()]);
        assert!(request.prompt.contains("1. ls -la\n2. rm -rf /tmp/x\n"));
        assert!(request.system.is_some());
        assert_eq!(
            request.schema["properties"]["evaluations"]["items"]["properties"]["risk_level"]
                ["enum"],
            json!(["none", "low", "high"])
        );
    }

    #[test]
    fn test_generation_request_includes_query_and_environment() {
        let environment = ShellEnvironment {
            os: "Linux 6.1".into(),
            distro: Some("Debian 12".into()),
            shell: "/bin/bash".into(),
            cwd: PathBuf::from("/srv"),
        };
        let request = generation_request("list files", &environment);
        assert!(request.prompt.contains(r#""list files""#));
        assert!(request.prompt.contains("exactly 3"));
        assert!(request.prompt.contains("Distro: Debian 12"));
        assert!(request.system.is_none());
    }
}
