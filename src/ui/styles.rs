use ratatui::style::{Color, Modifier, Style};

/// Option titles and headings.
pub const TITLE: Style = Style::new()
    .fg(Color::Indexed(205))
    .add_modifier(Modifier::BOLD);

/// The command line itself.
pub const COMMAND: Style = Style::new().fg(Color::Indexed(86)).bg(Color::Indexed(235));

pub const DESCRIPTION: Style = Style::new().fg(Color::Indexed(241));

/// The option under the cursor.
pub const SELECTED: Style = Style::new()
    .fg(Color::Indexed(170))
    .add_modifier(Modifier::BOLD);

pub const HELP: Style = Style::new()
    .fg(Color::Indexed(241))
    .add_modifier(Modifier::ITALIC);

pub const PLACEHOLDER: Style = Style::new().fg(Color::DarkGray);

pub const BORDER: Style = Style::new().fg(Color::DarkGray);

/// "checking safety..." placeholder.
pub const CHECKING: Style = Style::new()
    .fg(Color::Indexed(241))
    .add_modifier(Modifier::ITALIC);

/// Network, downloads, scans.
pub const WARNING_LOW: Style = Style::new()
    .fg(Color::Indexed(220))
    .add_modifier(Modifier::ITALIC);

/// Destructive, data loss.
pub const WARNING_HIGH: Style = Style::new()
    .fg(Color::Indexed(196))
    .add_modifier(Modifier::BOLD);
