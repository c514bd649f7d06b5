//! In-memory `LlmClient` for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use super::{CommandOption, CommandRisk, LlmClient, LlmError};

/// Returns canned batches and records what it was asked.
#[derive(Default)]
pub struct MockClient {
    pub options: Vec<CommandOption>,
    pub evaluations: Vec<CommandRisk>,
    pub fail_generation: bool,
    pub fail_evaluation: bool,
    pub last_query: Mutex<Option<String>>,
    pub evaluated: Mutex<Vec<String>>,
    pub evaluate_calls: AtomicUsize,
    /// When set, evaluation waits for one notification before answering.
    pub evaluation_gate: Option<Arc<Notify>>,
}

impl MockClient {
    /// Three harmless `echo` options, all scored `none`.
    pub fn new() -> Self {
        Self::default()
            .with_options(&[
                ("Option 1", "echo 'test'", "Test command 1"),
                ("Option 2", "echo 'test2'", "Test command 2"),
                ("Option 3", "echo 'test3'", "Test command 3"),
            ])
            .with_risks(&[("none", ""), ("none", ""), ("none", "")])
    }

    pub fn with_options(mut self, options: &[(&str, &str, &str)]) -> Self {
        self.options = options
            .iter()
            .map(|(title, command, description)| CommandOption {
                title: title.to_string(),
                command: command.to_string(),
                description: description.to_string(),
            })
            .collect();
        self
    }

    /// Risk scores as `(level, reason)`, matched to options positionally.
    pub fn with_risks(mut self, risks: &[(&str, &str)]) -> Self {
        self.evaluations = risks
            .iter()
            .enumerate()
            .map(|(i, (level, reason))| CommandRisk {
                command: self
                    .options
                    .get(i)
                    .map(|o| o.command.clone())
                    .unwrap_or_default(),
                risk_level: level.to_string(),
                reason: reason.to_string(),
            })
            .collect();
        self
    }

    pub fn failing_generation(mut self) -> Self {
        self.fail_generation = true;
        self
    }

    pub fn failing_evaluation(mut self) -> Self {
        self.fail_evaluation = true;
        self
    }

    pub fn with_evaluation_gate(mut self, gate: Arc<Notify>) -> Self {
        self.evaluation_gate = Some(gate);
        self
    }

    pub fn evaluate_calls(&self) -> usize {
        self.evaluate_calls.load(Ordering::SeqCst)
    }
}

fn unavailable() -> LlmError {
    LlmError::Status {
        provider: "mock",
        status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
        message: "mock failure".to_string(),
    }
}

#[async_trait]
impl LlmClient for MockClient {
    async fn generate_options(&self, query: &str) -> Result<Vec<CommandOption>, LlmError> {
        *self.last_query.lock().unwrap() = Some(query.to_string());
        if self.fail_generation {
            return Err(unavailable());
        }
        Ok(self.options.clone())
    }

    async fn evaluate_commands(&self, commands: &[String]) -> Result<Vec<CommandRisk>, LlmError> {
        self.evaluate_calls.fetch_add(1, Ordering::SeqCst);
        *self.evaluated.lock().unwrap() = commands.to_vec();
        if let Some(gate) = &self.evaluation_gate {
            gate.notified().await;
        }
        if self.fail_evaluation {
            return Err(unavailable());
        }
        Ok(self.evaluations.clone())
    }
}
