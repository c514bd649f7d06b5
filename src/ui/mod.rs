//! Terminal UI for onelm.
//!
//! The interface is a three-stage state machine: Input (type a query),
//! Progress (wait for candidates), Selection (pick one). Every stage owns its
//! own state. [`Stage::update`] maps the current stage and an incoming
//! [`Message`] to the next stage plus a list of [`Task`]s; the runtime runs
//! tasks off the event loop and feeds their results back as messages. State
//! is only ever touched by the event loop, so nothing here needs a lock.

mod input;
mod progress;
pub mod runtime;
mod selector;
mod spinner;
mod styles;

pub use input::InputStage;
pub use progress::ProgressStage;
pub use runtime::{run, TerminalTarget};
pub use selector::SelectionStage;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::Frame;
use tokio::sync::mpsc;

use crate::commands::{CandidateOption, GenerationError, PipelineStage};
use crate::safety::EvaluationError;

/// Everything the event loop reacts to.
#[derive(Debug)]
pub enum Message {
    Key(KeyEvent),
    /// The terminal changed size; the next draw picks up the new area.
    Resize,
    /// Spinner frame for the spinner with this id.
    Tick(u64),
    /// A stage notification, with the receiver handed back so the stage
    /// can listen again.
    Progress(PipelineStage, mpsc::Receiver<PipelineStage>),
    /// The notification channel closed; generation has finished.
    ProgressClosed,
    Generated(Result<Vec<CandidateOption>, GenerationError>),
    SafetyEvaluated(Result<Vec<CandidateOption>, EvaluationError>),
}

/// Side effects requested by a stage transition.
#[derive(Debug)]
pub enum Task {
    /// Run generation, reporting stage changes on `progress`.
    Generate {
        query: String,
        progress: mpsc::Sender<PipelineStage>,
    },
    /// Wait for the next stage notification.
    ListenProgress(mpsc::Receiver<PipelineStage>),
    /// Run the safety pass over this batch.
    EvaluateSafety(Vec<CandidateOption>),
    /// Deliver [`Message::Tick`] after one frame interval.
    Tick(u64),
}

/// How a run ended.
#[derive(Debug)]
pub enum Outcome {
    /// Quit before any candidates were shown.
    Cancelled,
    /// Generation failed; nothing to select from.
    Failed(GenerationError),
    /// Quit from the selection list.
    NoSelection,
    /// The chosen candidate, frozen at the moment of selection.
    Selected(CandidateOption),
}

/// The screen currently owning the terminal.
#[derive(Debug)]
pub enum Stage {
    Input(InputStage),
    Progress(ProgressStage),
    Selection(SelectionStage),
    Finished(Outcome),
}

/// Result of a transition: the next stage and the tasks to launch.
pub type Transition = (Stage, Vec<Task>);

impl Stage {
    /// Apply `message` to the current stage.
    pub fn update(self, message: Message) -> Transition {
        match self {
            Stage::Input(stage) => stage.update(message),
            Stage::Progress(stage) => stage.update(message),
            Stage::Selection(stage) => stage.update(message),
            finished @ Stage::Finished(_) => (finished, Vec::new()),
        }
    }

    pub fn render(&self, frame: &mut Frame) {
        match self {
            Stage::Input(stage) => stage.render(frame),
            Stage::Progress(stage) => stage.render(frame),
            Stage::Selection(stage) => stage.render(frame),
            Stage::Finished(_) => {}
        }
    }

    pub fn outcome(self) -> Option<Outcome> {
        match self {
            Stage::Finished(outcome) => Some(outcome),
            _ => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, Stage::Finished(_))
    }
}

fn is_ctrl_c(key: &KeyEvent) -> bool {
    key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL)
}

/// Create a centered rectangle.
fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length((area.height.saturating_sub(height)) / 2),
            Constraint::Length(height),
            Constraint::Min(0),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length((area.width.saturating_sub(width)) / 2),
            Constraint::Length(width),
            Constraint::Min(0),
        ])
        .split(vertical[1]);

    horizontal[1]
}
