//! Waiting for candidates.
//!
//! On entry the stage launches generation, a listener for stage
//! notifications and the spinner. Notifications only change the message on
//! screen; the stage moves on when the generation result itself arrives.

use crossterm::event::KeyCode;
use ratatui::{
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use tokio::sync::mpsc;
use tracing::debug;

use super::spinner::Spinner;
use super::{
    centered_rect, is_ctrl_c, styles, Message, Outcome, SelectionStage, Stage, Task, Transition,
};
use crate::commands::{GenerationError, PipelineStage, SafetyMode};

/// Notifications queued beyond this are dropped rather than blocking generation.
const PROGRESS_CAPACITY: usize = 2;

#[derive(Debug)]
pub struct ProgressStage {
    query: String,
    stage: PipelineStage,
    spinner: Spinner,
    safety: SafetyMode,
}

impl ProgressStage {
    /// Enter the stage for `query`, returning the generation, listener and
    /// spinner tasks.
    pub fn start(query: String, safety: SafetyMode) -> Transition {
        let (progress_tx, progress_rx) = mpsc::channel(PROGRESS_CAPACITY);
        let stage = Self {
            query: query.clone(),
            stage: PipelineStage::Generating,
            spinner: Spinner::new(),
            safety,
        };
        let tasks = vec![
            Task::Generate {
                query,
                progress: progress_tx,
            },
            Task::ListenProgress(progress_rx),
            Task::Tick(stage.spinner.id()),
        ];
        (Stage::Progress(stage), tasks)
    }

    pub fn pipeline_stage(&self) -> PipelineStage {
        self.stage
    }

    pub fn update(mut self, message: Message) -> Transition {
        match message {
            Message::Key(key) if key.code == KeyCode::Char('q') || is_ctrl_c(&key) => {
                (Stage::Finished(Outcome::Cancelled), Vec::new())
            }
            Message::Tick(id) => {
                if self.spinner.tick(id) {
                    (Stage::Progress(self), vec![Task::Tick(id)])
                } else {
                    (Stage::Progress(self), Vec::new())
                }
            }
            Message::Progress(stage, receiver) => {
                debug!(?stage, "pipeline stage changed");
                self.stage = stage;
                (Stage::Progress(self), vec![Task::ListenProgress(receiver)])
            }
            Message::Generated(Err(e)) => (Stage::Finished(Outcome::Failed(e)), Vec::new()),
            Message::Generated(Ok(candidates)) if candidates.is_empty() => (
                Stage::Finished(Outcome::Failed(GenerationError::NoOptions)),
                Vec::new(),
            ),
            Message::Generated(Ok(candidates)) => SelectionStage::start(candidates, self.safety),
            _ => (Stage::Progress(self), Vec::new()),
        }
    }

    pub fn render(&self, frame: &mut Frame) {
        let area = frame.area();
        let message = match self.pipeline_stage() {
            PipelineStage::Generating => "Generating options...",
            PipelineStage::Evaluating => "Evaluating safety...",
        };

        let width = area.width.saturating_sub(4).min(80);
        let popup = centered_rect(width, 2, area);
        let lines = vec![
            Line::from(vec![
                Span::styled(self.spinner.frame(), styles::TITLE),
                Span::raw(" "),
                Span::raw(message),
            ]),
            Line::styled(truncate(&self.query, width as usize), styles::DESCRIPTION),
        ];
        frame.render_widget(Paragraph::new(lines), popup);
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut out: String = text.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}
