//! Risk scoring for candidate commands.
//!
//! The evaluator turns an ordered batch of command strings into a parallel
//! batch of optional risk annotations. `None` risk is never materialised:
//! safe commands simply carry no annotation.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::llm::{LlmClient, LlmError};

/// Severity of a detected risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RiskLevel {
    None,
    /// Network access, downloads, scans, privilege changes.
    Low,
    /// Destructive or data-losing operations.
    High,
}

impl RiskLevel {
    /// Parse the wire value. Anything unrecognised counts as `None`.
    pub fn parse(level: &str) -> Self {
        match level.trim().to_ascii_lowercase().as_str() {
            "low" => RiskLevel::Low,
            "high" => RiskLevel::High,
            _ => RiskLevel::None,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RiskLevel::None => "None",
            RiskLevel::Low => "Low",
            RiskLevel::High => "High",
        })
    }
}

/// A warning attached to a candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskInfo {
    pub level: RiskLevel,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("safety call failed: {0}")]
    Call(#[from] LlmError),
    #[error("expected {expected} evaluations, got {got}")]
    CountMismatch { expected: usize, got: usize },
}

/// Scores commands through one batched LLM call.
#[derive(Clone)]
pub struct Evaluator {
    client: Arc<dyn LlmClient>,
}

impl Evaluator {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }

    /// Evaluate `commands` in a single call. The result has the same length
    /// and order as the input; `None` entries are safe commands. An empty
    /// batch returns immediately without calling out.
    pub async fn evaluate(
        &self,
        commands: &[String],
    ) -> Result<Vec<Option<RiskInfo>>, EvaluationError> {
        if commands.is_empty() {
            return Ok(Vec::new());
        }

        let evaluations = self.client.evaluate_commands(commands).await?;
        if evaluations.len() != commands.len() {
            return Err(EvaluationError::CountMismatch {
                expected: commands.len(),
                got: evaluations.len(),
            });
        }

        Ok(evaluations
            .into_iter()
            .zip(commands)
            .map(|(eval, command)| {
                // Matching is positional; an echoed command that differs is only noted.
                if eval.command.trim() != command.trim() {
                    debug!(expected = %command, echoed = %eval.command, "evaluation echoed a different command");
                }
                match RiskLevel::parse(&eval.risk_level) {
                    RiskLevel::None => None,
                    level => Some(RiskInfo {
                        level,
                        message: eval.reason,
                    }),
                }
            })
            .collect())
    }
}
