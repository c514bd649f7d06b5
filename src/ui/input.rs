//! Query entry.
//!
//! Renders a single-line input popup. Confirming a non-blank query hands it
//! to a new [`ProgressStage`].

use crossterm::event::{Event, KeyCode};
use ratatui::{
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};
use tui_input::backend::crossterm::EventHandler;
use tui_input::Input;

use super::{centered_rect, is_ctrl_c, styles, Message, Outcome, ProgressStage, Stage, Transition};
use crate::commands::SafetyMode;

const PLACEHOLDER: &str = "e.g., search git history for myFunction";
const CHAR_LIMIT: usize = 200;

#[derive(Debug)]
pub struct InputStage {
    input: Input,
    safety: SafetyMode,
}

impl InputStage {
    pub fn new(safety: SafetyMode) -> Self {
        Self {
            input: Input::default(),
            safety,
        }
    }

    pub fn value(&self) -> &str {
        self.input.value()
    }

    pub fn update(mut self, message: Message) -> Transition {
        let Message::Key(key) = message else {
            // Resize only affects layout, which is recomputed on every draw.
            return (Stage::Input(self), Vec::new());
        };

        match key.code {
            KeyCode::Esc => return (Stage::Finished(Outcome::Cancelled), Vec::new()),
            _ if is_ctrl_c(&key) => return (Stage::Finished(Outcome::Cancelled), Vec::new()),
            KeyCode::Enter => {
                let query = self.input.value().trim();
                if !query.is_empty() {
                    return ProgressStage::start(query.to_string(), self.safety);
                }
            }
            KeyCode::Char(_) if self.input.value().chars().count() >= CHAR_LIMIT => {}
            _ => {
                self.input.handle_event(&Event::Key(key));
            }
        }

        (Stage::Input(self), Vec::new())
    }

    pub fn render(&self, frame: &mut Frame) {
        let area = frame.area();

        let popup_width = area.width.saturating_sub(4).min(80);
        let popup_area = centered_rect(popup_width, 4, area);

        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .title(" What command do you need? ")
            .title_style(styles::TITLE)
            .title_bottom(Line::styled(" enter: submit • esc: quit ", styles::HELP))
            .borders(Borders::ALL)
            .border_style(styles::BORDER);

        let inner_area = block.inner(popup_area);
        frame.render_widget(block, popup_area);

        let input_width = inner_area.width as usize;
        let value = self.value();
        let cursor_pos = self.input.visual_cursor();

        // Keep the cursor in view by scrolling horizontally.
        let scroll = if cursor_pos >= input_width {
            cursor_pos - input_width + 1
        } else {
            0
        };

        let line = if value.is_empty() {
            Line::from(Span::styled(PLACEHOLDER, styles::PLACEHOLDER))
        } else {
            let visible: String = value.chars().skip(scroll).take(input_width).collect();
            Line::from(visible)
        };
        frame.render_widget(Paragraph::new(line), inner_area);

        frame.set_cursor_position((
            inner_area.x + (cursor_pos - scroll) as u16,
            inner_area.y,
        ));
    }
}
