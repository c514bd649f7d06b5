//! Option selection.
//!
//! The list is interactive immediately. In background safety mode the
//! stage launches the safety pass on entry and swaps in the annotated batch
//! when it lands; a failed pass just stops the "checking" indicator.

use crossterm::event::KeyCode;
use std::ops::Range;

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use tracing::warn;

use super::spinner::Spinner;
use super::{is_ctrl_c, styles, Message, Outcome, Stage, Task, Transition};
use crate::commands::{CandidateOption, SafetyMode};
use crate::safety::{RiskInfo, RiskLevel};

#[derive(Debug)]
pub struct SelectionStage {
    options: Vec<CandidateOption>,
    cursor: usize,
    safety_done: bool,
    spinner: Spinner,
}

impl SelectionStage {
    /// Enter the stage with a non-empty batch.
    pub fn start(options: Vec<CandidateOption>, safety: SafetyMode) -> Transition {
        let background = safety == SafetyMode::Background;
        let stage = Self {
            options,
            cursor: 0,
            safety_done: !background,
            spinner: Spinner::new(),
        };

        let tasks = if background {
            vec![
                Task::EvaluateSafety(stage.options.clone()),
                Task::Tick(stage.spinner.id()),
            ]
        } else {
            Vec::new()
        };
        (Stage::Selection(stage), tasks)
    }

    pub fn options(&self) -> &[CandidateOption] {
        &self.options
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn safety_done(&self) -> bool {
        self.safety_done
    }

    pub fn update(mut self, message: Message) -> Transition {
        match message {
            Message::Key(key) if is_ctrl_c(&key) => {
                return (Stage::Finished(Outcome::NoSelection), Vec::new())
            }
            Message::Key(key) => match key.code {
                KeyCode::Char('q') | KeyCode::Esc => {
                    return (Stage::Finished(Outcome::NoSelection), Vec::new());
                }
                KeyCode::Up | KeyCode::Char('k') => {
                    self.cursor = self.cursor.saturating_sub(1);
                }
                KeyCode::Down | KeyCode::Char('j') => {
                    if self.cursor + 1 < self.options.len() {
                        self.cursor += 1;
                    }
                }
                KeyCode::Enter => {
                    if let Some(selected) = self.options.get(self.cursor) {
                        return (Stage::Finished(Outcome::Selected(selected.clone())), Vec::new());
                    }
                }
                _ => {}
            },
            Message::SafetyEvaluated(result) => {
                self.safety_done = true;
                match result {
                    Ok(annotated) if annotated.len() == self.options.len() => {
                        self.options = annotated;
                    }
                    Ok(annotated) => warn!(
                        expected = self.options.len(),
                        got = annotated.len(),
                        "ignoring safety batch of unexpected length"
                    ),
                    Err(e) => warn!(error = %e, "safety evaluation failed"),
                }
            }
            Message::Tick(id) => {
                if !self.safety_done && self.spinner.tick(id) {
                    return (Stage::Selection(self), vec![Task::Tick(id)]);
                }
            }
            _ => {}
        }

        (Stage::Selection(self), Vec::new())
    }

    pub fn render(&self, frame: &mut Frame) {
        let area = frame.area();
        let area = Rect {
            x: area.x + 1,
            width: area.width.saturating_sub(2),
            ..area
        };
        let [list_area, help_area] =
            Layout::vertical([Constraint::Min(0), Constraint::Length(1)]).areas(area);

        let (rows, current) = self.rows(usize::from(list_area.width));
        let scroll = scroll_offset(&current, usize::from(list_area.height));
        let list = Paragraph::new(rows).scroll((u16::try_from(scroll).unwrap_or(u16::MAX), 0));
        frame.render_widget(list, list_area);

        let help = Paragraph::new(Line::styled(
            "↑/k: up • ↓/j: down • enter: select • q: quit",
            styles::HELP,
        ));
        frame.render_widget(help, help_area);
    }

    /// The list already wrapped to `width`, and the rows taken by the
    /// option under the cursor.
    fn rows(&self, width: usize) -> (Vec<Line<'static>>, Range<usize>) {
        let text_width = width.saturating_sub(INDENT.len());
        let mut rows = vec![
            Line::default(),
            Line::styled("Select a command:", styles::TITLE),
            Line::default(),
        ];
        let mut current = 0..0;

        for (i, option) in self.options().iter().enumerate() {
            let is_current = i == self.cursor();
            let first = rows.len();
            let (marker, title_style) = if is_current {
                ("▸ ", styles::SELECTED)
            } else {
                (INDENT, styles::TITLE)
            };

            for (n, piece) in wrap(&option.title, text_width).into_iter().enumerate() {
                let lead = if n == 0 { marker } else { INDENT };
                rows.push(Line::from(vec![
                    Span::styled(lead, styles::SELECTED),
                    Span::styled(piece, title_style),
                ]));
            }
            let command = format!(" {} ", option.command);
            push_indented(&mut rows, split_long(&command, text_width), styles::COMMAND);
            match self.risk_line(option, is_current) {
                Some(RiskLine::Warning(text, style)) => {
                    push_indented(&mut rows, wrap(&text, text_width), style);
                }
                Some(RiskLine::Checking) => rows.push(Line::from(vec![
                    Span::raw(INDENT),
                    Span::styled(self.spinner.frame(), styles::CHECKING),
                    Span::styled(" checking safety...", styles::CHECKING),
                ])),
                None => {}
            }
            push_indented(
                &mut rows,
                wrap(&option.description, text_width),
                styles::DESCRIPTION,
            );

            if is_current {
                current = first..rows.len();
            }
            rows.push(Line::default());
        }

        (rows, current)
    }

    /// The risk annotation if present, otherwise the checking placeholder
    /// while the safety pass is outstanding.
    fn risk_line(&self, option: &CandidateOption, is_current: bool) -> Option<RiskLine> {
        match &option.risk {
            Some(risk) => risk_warning(risk, is_current),
            None if !self.safety_done() => Some(RiskLine::Checking),
            None => None,
        }
    }
}

const INDENT: &str = "  ";

enum RiskLine {
    Warning(String, Style),
    Checking,
}

fn risk_warning(risk: &RiskInfo, is_current: bool) -> Option<RiskLine> {
    let (icon, style) = match risk.level {
        RiskLevel::Low => ("⚠", styles::WARNING_LOW),
        RiskLevel::High => ("🚨", styles::WARNING_HIGH),
        RiskLevel::None => return None,
    };
    let style = if is_current {
        style.add_modifier(Modifier::BOLD)
    } else {
        style
    };
    Some(RiskLine::Warning(format!("{} {}", icon, risk.message), style))
}

fn push_indented(rows: &mut Vec<Line<'static>>, pieces: Vec<String>, style: Style) {
    for piece in pieces {
        rows.push(Line::from(vec![Span::raw(INDENT), Span::styled(piece, style)]));
    }
}

/// First visible row so that `current` fits in `height` rows, preferring
/// its top when it is taller than the view.
fn scroll_offset(current: &Range<usize>, height: usize) -> usize {
    current.end.saturating_sub(height).min(current.start)
}

fn display_width(text: &str) -> usize {
    Span::raw(text).width()
}

/// Greedy word wrap to `width` columns. Words wider than a row are split.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut rows = Vec::new();
    let mut row = String::new();

    for word in text.split_whitespace() {
        for piece in split_long(word, width) {
            if !row.is_empty() && display_width(&row) + 1 + display_width(&piece) > width {
                rows.push(std::mem::take(&mut row));
            }
            if !row.is_empty() {
                row.push(' ');
            }
            row.push_str(&piece);
        }
    }
    if !row.is_empty() || rows.is_empty() {
        rows.push(row);
    }
    rows
}

/// Cut `text` into pieces no wider than `width`, keeping every character.
fn split_long(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut pieces = Vec::new();
    let mut piece = String::new();
    let mut used = 0;

    for c in text.chars() {
        let w = display_width(c.encode_utf8(&mut [0; 4]));
        if used + w > width && !piece.is_empty() {
            pieces.push(std::mem::take(&mut piece));
            used = 0;
        }
        piece.push(c);
        used += w;
    }
    if !piece.is_empty() {
        pieces.push(piece);
    }
    pieces
}
