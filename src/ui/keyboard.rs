//! Piano keyboard strip.
//!
//! Shows the computer keyboard to MIDI note mapping with held notes lit,
//! plus the key bindings that matter in the current session state.

use crate::app::{App, KEYBOARD_MAP};
use crate::midi::is_black_key;
use crate::session::SessionState;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

/// Upper row (Q-I), C4 to C5.
const UPPER_KEYS: &[char] = &[
    'Q', '2', 'W', '3', 'E', 'R', '5', 'T', '6', 'Y', '7', 'U', 'I',
];
/// Lower row (Z-M), C3 to B3.
const LOWER_KEYS: &[char] = &['Z', 'S', 'X', 'D', 'C', 'V', 'G', 'B', 'H', 'N', 'J', 'M'];

/// Builds a keyboard row from a slice of key characters.
///
/// Maps each key to its MIDI note and styles it by key color, or lit if
/// the note is currently held.
fn build_keyboard_row(keys: &[char], app: &App) -> Vec<Span<'static>> {
    keys.iter()
        .map(|&key| {
            let base_note = KEYBOARD_MAP
                .iter()
                .find(|(k, _)| k.to_ascii_uppercase() == key)
                .map(|(_, n)| *n);

            let Some(base) = base_note else {
                return Span::raw(format!(" {} ", key));
            };
            let note = base as i16 + app.octave_offset as i16 * 12;
            let held = (0..=127).contains(&note) && app.is_note_held(note as u8);

            let style = if held {
                Style::default()
                    .fg(Color::White)
                    .bg(Color::Magenta)
                    .add_modifier(Modifier::BOLD)
            } else if is_black_key(note as i32) {
                Style::default()
                    .fg(Color::White)
                    .bg(Color::DarkGray)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::White)
                    .add_modifier(Modifier::BOLD)
            };

            Span::styled(format!(" {} ", key), style)
        })
        .collect()
}

/// Renders the keyboard strip at the bottom of the screen.
///
/// # Arguments
///
/// * `frame` - The frame to render to
/// * `area` - The area to render in
/// * `app` - Application state
pub fn render_keyboard(frame: &mut Frame, area: Rect, app: &App) {
    let instrument = app
        .engine
        .as_ref()
        .map(|e| e.instrument_name().to_string())
        .unwrap_or_else(|| "no SoundFont".to_string());
    let block = Block::default()
        .title(format!(
            " Keyboard (Octave: {:+}) {} ",
            app.octave_offset, instrument
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Gray));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    if inner.height < 3 {
        return;
    }

    let upper_row = build_keyboard_row(UPPER_KEYS, app);
    let lower_row = build_keyboard_row(LOWER_KEYS, app);
    let help_line = build_contextual_help(app.state());

    frame.render_widget(
        Paragraph::new(Line::from(upper_row)),
        Rect::new(inner.x, inner.y, inner.width, 1),
    );
    frame.render_widget(
        Paragraph::new(Line::from(lower_row)),
        Rect::new(inner.x, inner.y + 1, inner.width, 1),
    );
    frame.render_widget(
        Paragraph::new(help_line),
        Rect::new(inner.x, inner.y + 2, inner.width, 1),
    );
}

/// `[key]desc` spans for one binding.
fn binding(key: &'static str, desc: &'static str) -> [Span<'static>; 3] {
    let key_style = Style::default().fg(Color::Yellow);
    let bracket_style = Style::default().fg(Color::DarkGray);
    [
        Span::styled("[", bracket_style),
        Span::styled(key, key_style),
        Span::styled(desc, bracket_style),
    ]
}

type Bindings = &'static [(&'static str, &'static str)];

const IDLE_HELP: Bindings = &[
    ("Enter", "]Record "),
    ("^T", "]Source "),
    ("Z-M", "]Play "),
    ("Tab", "]View "),
    ("?", "]Help "),
    ("Esc", "]Quit"),
];

const RECORDING_HELP: Bindings = &[
    ("Enter", "] Stop  "),
    ("Z-M", "] Play  "),
    (",/", "] Octave  "),
    ("Bksp", "] Discard"),
];

const PREVIEW_HELP: Bindings = &[
    ("Enter", "] Save  "),
    ("Bksp", "] Discard  "),
    ("Space", "] Play  "),
    ("9/0", "] BPM  "),
    ("k", "] Key"),
];

const VIEW_HELP: Bindings = &[
    ("Space", "]Play "),
    ("Click", "]Seek "),
    ("Tab", "]View "),
    ("o", "]Color "),
    ("?", "]Help "),
    ("q", "]Quit"),
];

/// Builds the contextual help line for a session state, or for view mode
/// when `state` is None.
pub fn build_contextual_help(state: Option<SessionState>) -> Line<'static> {
    let (label, bindings): (Option<(&'static str, Color)>, Bindings) = match state {
        Some(SessionState::Idle) => (None, IDLE_HELP),
        Some(SessionState::Recording) => (Some(("RECORDING  ", Color::Red)), RECORDING_HELP),
        Some(SessionState::Preview) => (Some(("PREVIEW  ", Color::Green)), PREVIEW_HELP),
        None => (None, VIEW_HELP),
    };

    let mut spans = Vec::new();
    if let Some((text, color)) = label {
        spans.push(Span::styled(
            text,
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ));
    }
    for &(key, desc) in bindings {
        spans.extend(binding(key, desc));
    }
    Line::from(spans)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_help_follows_state() {
        assert!(text(&build_contextual_help(Some(SessionState::Idle))).contains("[Enter]Record"));
        assert!(text(&build_contextual_help(Some(SessionState::Recording))).starts_with("RECORDING"));
        assert!(text(&build_contextual_help(Some(SessionState::Preview))).contains("[Enter] Save"));
        assert!(text(&build_contextual_help(None)).contains("[Click]Seek"));
    }

    #[test]
    fn test_rows_cover_keyboard_map() {
        let mapped = UPPER_KEYS.len() + LOWER_KEYS.len();
        assert_eq!(mapped, KEYBOARD_MAP.len());
    }
}
