//! The two-call pipeline: generate candidates, then score them for risk.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::CandidateOption;
use crate::llm::{LlmClient, LlmError};
use crate::safety::{EvaluationError, Evaluator};

/// Observable position of the pipeline, used for UI messaging only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Generating,
    Evaluating,
}

/// Where the safety pass runs.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum SafetyMode {
    /// Selection starts immediately; annotations arrive while the user browses.
    #[default]
    Background,
    /// Annotate before the selection list is shown.
    Inline,
    /// Skip the safety pass.
    Off,
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Call(#[from] LlmError),
    #[error("no options generated")]
    NoOptions,
}

/// Handles command generation from natural language queries.
#[derive(Clone)]
pub struct Generator {
    client: Arc<dyn LlmClient>,
    evaluator: Evaluator,
    safety: SafetyMode,
}

impl Generator {
    pub fn new(client: Arc<dyn LlmClient>, safety: SafetyMode) -> Self {
        Self {
            evaluator: Evaluator::new(Arc::clone(&client)),
            client,
            safety,
        }
    }

    /// Create candidates for `query`. Risks are left absent.
    pub async fn generate(&self, query: &str) -> Result<Vec<CandidateOption>, GenerationError> {
        let options = self.client.generate_options(query).await?;
        if options.is_empty() {
            return Err(GenerationError::NoOptions);
        }
        info!(count = options.len(), "options generated");
        Ok(options.into_iter().map(CandidateOption::from).collect())
    }

    /// Return a copy of `candidates` with risk annotations overlaid
    /// positionally. The input is never modified; callers decide whether
    /// an error matters.
    pub async fn evaluate_safety(
        &self,
        candidates: &[CandidateOption],
    ) -> Result<Vec<CandidateOption>, EvaluationError> {
        let commands: Vec<String> = candidates.iter().map(|c| c.command.clone()).collect();
        let risks = self.evaluator.evaluate(&commands).await?;

        let mut annotated = candidates.to_vec();
        for (candidate, risk) in annotated.iter_mut().zip(risks) {
            if let Some(risk) = risk {
                candidate.risk = Some(risk);
            }
        }
        debug!(
            flagged = annotated.iter().filter(|c| c.risk.is_some()).count(),
            "safety pass complete"
        );
        Ok(annotated)
    }

    /// Run the pipeline up to the point the selection list can be shown,
    /// reporting each stage transition through `on_stage`. `on_stage` must
    /// not block.
    ///
    /// In [`SafetyMode::Inline`] the safety pass runs here too, best-effort:
    /// a failed pass returns the unannotated batch.
    pub async fn generate_with_progress<F>(
        &self,
        query: &str,
        on_stage: F,
    ) -> Result<Vec<CandidateOption>, GenerationError>
    where
        F: Fn(PipelineStage) + Send + Sync,
    {
        on_stage(PipelineStage::Generating);
        let candidates = self.generate(query).await?;

        if self.safety != SafetyMode::Inline {
            return Ok(candidates);
        }

        on_stage(PipelineStage::Evaluating);
        match self.evaluate_safety(&candidates).await {
            Ok(annotated) => Ok(annotated),
            Err(e) => {
                warn!(error = %e, "safety evaluation failed, continuing without annotations");
                Ok(candidates)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::MockClient;
    use crate::safety::RiskLevel;
    use std::sync::Mutex;

    fn generator(mock: &Arc<MockClient>, safety: SafetyMode) -> Generator {
        Generator::new(mock.clone(), safety)
    }

    fn git_mock() -> MockClient {
        MockClient::default().with_options(&[
            ("Option 1", "git log", "Show git log"),
            ("Option 2", "git log -p", "Show git log with patches"),
            ("Option 3", "git log --all", "Show all git log"),
        ])
    }

    #[tokio::test]
    async fn test_generate_maps_options_positionally() {
        let mock = Arc::new(git_mock());
        let options = generator(&mock, SafetyMode::Background)
            .generate("search git history")
            .await
            .unwrap();

        assert_eq!(options.len(), 3);
        for (option, expected) in options.iter().zip(&mock.options) {
            assert_eq!(option.title, expected.title);
            assert_eq!(option.command, expected.command);
            assert_eq!(option.description, expected.description);
            assert!(option.risk.is_none());
        }
        assert_eq!(
            mock.last_query.lock().unwrap().as_deref(),
            Some("search git history")
        );
        assert_eq!(mock.evaluate_calls(), 0);
    }

    #[tokio::test]
    async fn test_generate_llm_error() {
        let mock = Arc::new(git_mock().failing_generation());
        let err = generator(&mock, SafetyMode::Background)
            .generate("test query")
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Call(_)));
    }

    #[tokio::test]
    async fn test_generate_empty_is_error() {
        let mock = Arc::new(MockClient::default());
        let err = generator(&mock, SafetyMode::Background)
            .generate("test query")
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::NoOptions));
    }

    #[tokio::test]
    async fn test_evaluate_safety_returns_annotated_copy() {
        let mock = Arc::new(git_mock().with_risks(&[
            ("none", "read-only"),
            ("low", "large output"),
            ("high", "rewrites history"),
        ]));
        let generator = generator(&mock, SafetyMode::Background);
        let candidates = generator.generate("git").await.unwrap();

        let annotated = generator.evaluate_safety(&candidates).await.unwrap();

        assert!(candidates.iter().all(|c| c.risk.is_none()));
        assert_eq!(annotated.len(), candidates.len());
        assert!(annotated[0].risk.is_none());
        assert_eq!(annotated[1].risk.as_ref().unwrap().level, RiskLevel::Low);
        assert_eq!(annotated[2].risk.as_ref().unwrap().message, "rewrites history");
        for (before, after) in candidates.iter().zip(&annotated) {
            assert_eq!(before.title, after.title);
            assert_eq!(before.command, after.command);
            assert_eq!(before.description, after.description);
        }
    }

    #[tokio::test]
    async fn test_evaluate_safety_is_idempotent() {
        let mock = Arc::new(git_mock().with_risks(&[("high", "x"), ("none", ""), ("low", "y")]));
        let generator = generator(&mock, SafetyMode::Background);
        let candidates = generator.generate("git").await.unwrap();

        let first = generator.evaluate_safety(&candidates).await.unwrap();
        let second = generator.evaluate_safety(&candidates).await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_evaluate_safety_all_none_leaves_risk_absent() {
        let mock = Arc::new(MockClient::new());
        let generator = generator(&mock, SafetyMode::Background);
        let candidates = generator.generate("list files").await.unwrap();

        let annotated = generator.evaluate_safety(&candidates).await.unwrap();

        assert_eq!(annotated, candidates);
    }

    #[tokio::test]
    async fn test_evaluate_safety_empty_batch() {
        let mock = Arc::new(MockClient::new());
        let annotated = generator(&mock, SafetyMode::Background)
            .evaluate_safety(&[])
            .await
            .unwrap();
        assert!(annotated.is_empty());
        assert_eq!(mock.evaluate_calls(), 0);
    }

    #[tokio::test]
    async fn test_evaluate_safety_failure_is_reported() {
        let mock = Arc::new(MockClient::new().failing_evaluation());
        let generator = generator(&mock, SafetyMode::Background);
        let candidates = generator.generate("list files").await.unwrap();

        assert!(generator.evaluate_safety(&candidates).await.is_err());
    }

    #[tokio::test]
    async fn test_progress_background_reports_generating_only() {
        let mock = Arc::new(MockClient::new());
        let stages = Mutex::new(Vec::new());

        let options = generator(&mock, SafetyMode::Background)
            .generate_with_progress("list files", |s| stages.lock().unwrap().push(s))
            .await
            .unwrap();

        assert_eq!(options.len(), 3);
        assert_eq!(*stages.lock().unwrap(), vec![PipelineStage::Generating]);
        assert_eq!(mock.evaluate_calls(), 0);
    }

    #[tokio::test]
    async fn test_progress_inline_evaluates_once() {
        let mock = Arc::new(MockClient::new().with_risks(&[
            ("none", ""),
            ("high", "danger"),
            ("none", ""),
        ]));
        let stages = Mutex::new(Vec::new());

        let options = generator(&mock, SafetyMode::Inline)
            .generate_with_progress("list files", |s| stages.lock().unwrap().push(s))
            .await
            .unwrap();

        assert_eq!(
            *stages.lock().unwrap(),
            vec![PipelineStage::Generating, PipelineStage::Evaluating]
        );
        assert_eq!(mock.evaluate_calls(), 1);
        assert_eq!(options[1].risk.as_ref().unwrap().level, RiskLevel::High);
    }

    #[tokio::test]
    async fn test_progress_inline_swallows_evaluation_failure() {
        let mock = Arc::new(MockClient::new().failing_evaluation());

        let options = generator(&mock, SafetyMode::Inline)
            .generate_with_progress("list files", |_| {})
            .await
            .unwrap();

        assert_eq!(options.len(), 3);
        assert!(options.iter().all(|o| o.risk.is_none()));
    }

    #[tokio::test]
    async fn test_progress_generation_failure_skips_evaluation() {
        let mock = Arc::new(MockClient::default().failing_generation());
        let stages = Mutex::new(Vec::new());

        let result = generator(&mock, SafetyMode::Inline)
            .generate_with_progress("list files", |s| stages.lock().unwrap().push(s))
            .await;

        assert!(result.is_err());
        assert_eq!(*stages.lock().unwrap(), vec![PipelineStage::Generating]);
        assert_eq!(mock.evaluate_calls(), 0);
    }
}
