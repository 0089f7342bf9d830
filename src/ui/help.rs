//! Help overlay rendering.
//!
//! Displays keyboard shortcuts and commands in a modal overlay.

use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::Frame;

use super::centered_rect;

/// Key binding entry for the help display.
struct KeyBinding {
    key: &'static str,
    description: &'static str,
}

const GENERAL_BINDINGS: &[KeyBinding] = &[
    KeyBinding {
        key: "?",
        description: "Toggle this help",
    },
    KeyBinding {
        key: "Esc / Ctrl+Q",
        description: "Quit",
    },
    KeyBinding {
        key: "Ctrl+C",
        description: "Force quit",
    },
    KeyBinding {
        key: "q",
        description: "Quit (view mode)",
    },
];

const RECORDING_BINDINGS: &[KeyBinding] = &[
    KeyBinding {
        key: "Enter",
        description: "Record / stop / save, by state",
    },
    KeyBinding {
        key: "Ctrl+R",
        description: "Start or stop recording",
    },
    KeyBinding {
        key: "Ctrl+T",
        description: "Switch instrument / microphone",
    },
    KeyBinding {
        key: "Bksp / Delete",
        description: "Discard the take",
    },
    KeyBinding {
        key: "9 / 0",
        description: "Lower / raise the tagged BPM",
    },
    KeyBinding {
        key: "k",
        description: "Cycle the tagged key",
    },
];

const PLAYBACK_BINDINGS: &[KeyBinding] = &[
    KeyBinding {
        key: "Space",
        description: "Play / pause the preview",
    },
    KeyBinding {
        key: "Left / Right",
        description: "Seek back / forward one second",
    },
    KeyBinding {
        key: "Home",
        description: "Seek to the start",
    },
];

const KEYBOARD_BINDINGS: &[KeyBinding] = &[
    KeyBinding {
        key: "Z-M / Q-I",
        description: "Play notes (piano layout)",
    },
    KeyBinding {
        key: ",",
        description: "Octave down",
    },
    KeyBinding {
        key: "/",
        description: "Octave up",
    },
    KeyBinding {
        key: "< / >",
        description: "Previous / next instrument (GM)",
    },
];

const VIEW_BINDINGS: &[KeyBinding] = &[
    KeyBinding {
        key: "Tab",
        description: "Cycle renderer (Linear/Waterfall/Radial)",
    },
    KeyBinding {
        key: "o",
        description: "Cycle color mode",
    },
    KeyBinding {
        key: "p",
        description: "Cycle radial style",
    },
    KeyBinding {
        key: "= / -",
        description: "Zoom in/out (Linear)",
    },
    KeyBinding {
        key: "[ / ]",
        description: "Scroll left/right (Linear)",
    },
];

const MOUSE_BINDINGS: &[KeyBinding] = &[
    KeyBinding {
        key: "Click",
        description: "Seek to the clicked time or note",
    },
    KeyBinding {
        key: "Scroll",
        description: "Zoom in/out (Linear)",
    },
];

/// Renders the help overlay.
///
/// # Arguments
///
/// * `frame` - The frame to render to
/// * `scroll` - Vertical scroll offset
pub fn render_help(frame: &mut Frame, scroll: u16) {
    let area = centered_rect(70, 80, frame.area());

    // Clear the area behind the popup
    frame.render_widget(Clear, area);

    let block = Block::default()
        .title(" Help - Keyboard Shortcuts ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    // Split inner area into content and fixed footer
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),    // Scrollable content
            Constraint::Length(1), // Fixed footer
        ])
        .split(inner);

    // Build help content (without footer)
    let mut lines: Vec<Line<'static>> = Vec::new();

    let section_style = Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
    let key_style = Style::default()
        .fg(Color::Cyan)
        .add_modifier(Modifier::BOLD);
    let desc_style = Style::default().fg(Color::White);

    // Helper to add a section
    fn add_section(
        lines: &mut Vec<Line<'static>>,
        title: &'static str,
        bindings: &[KeyBinding],
        section_style: Style,
        key_style: Style,
        desc_style: Style,
    ) {
        lines.push(Line::from(Span::styled(title, section_style)));
        for binding in bindings {
            lines.push(Line::from(vec![
                Span::styled(format!("{:15}", binding.key), key_style),
                Span::styled(binding.description, desc_style),
            ]));
        }
        lines.push(Line::from(""));
    }

    add_section(
        &mut lines,
        "General",
        GENERAL_BINDINGS,
        section_style,
        key_style,
        desc_style,
    );
    add_section(
        &mut lines,
        "Recording",
        RECORDING_BINDINGS,
        section_style,
        key_style,
        desc_style,
    );
    add_section(
        &mut lines,
        "Playback",
        PLAYBACK_BINDINGS,
        section_style,
        key_style,
        desc_style,
    );
    add_section(
        &mut lines,
        "Keyboard",
        KEYBOARD_BINDINGS,
        section_style,
        key_style,
        desc_style,
    );
    add_section(
        &mut lines,
        "View",
        VIEW_BINDINGS,
        section_style,
        key_style,
        desc_style,
    );
    add_section(
        &mut lines,
        "Mouse Controls",
        MOUSE_BINDINGS,
        section_style,
        key_style,
        desc_style,
    );

    // Render scrollable content
    let help_text = Paragraph::new(lines).scroll((scroll, 0));
    frame.render_widget(help_text, chunks[0]);

    // Render fixed footer (always visible at bottom)
    let footer = Paragraph::new(Line::from(Span::styled(
        "Scroll: Up/Down/j/k/Mouse  |  Close: ?/Esc/Click",
        Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::ITALIC),
    )));
    frame.render_widget(footer, chunks[1]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_fit_key_column() {
        for section in [
            GENERAL_BINDINGS,
            RECORDING_BINDINGS,
            PLAYBACK_BINDINGS,
            KEYBOARD_BINDINGS,
            VIEW_BINDINGS,
            MOUSE_BINDINGS,
        ] {
            for binding in section {
                assert!(binding.key.len() < 15, "{}", binding.key);
            }
        }
    }
}
