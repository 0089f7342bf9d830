//! Terminal user interface components.
//!
//! The screen is a transport bar, the timeline canvas, and a bottom strip:
//! the piano keyboard while recording, the waveform while previewing.

pub mod canvas;
mod help;
mod keyboard;
mod transport;
mod waveform;

use crate::app::App;
use crate::session::SessionState;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::Frame;

pub use canvas::render_timeline_canvas;
pub use help::render_help;
pub use keyboard::{build_contextual_help, render_keyboard};
pub use transport::{format_clock, render_transport};
pub use waveform::render_waveform;

/// Splits the screen into transport, canvas, and bottom strip.
fn calculate_layout(size: Rect) -> [Rect; 3] {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Transport
            Constraint::Min(8),    // Timeline canvas
            Constraint::Length(5), // Keyboard or waveform
        ])
        .split(size);
    [chunks[0], chunks[1], chunks[2]]
}

/// Renders the complete UI and records the canvas area for mouse hit-testing.
pub fn render(frame: &mut Frame, app: &mut App) {
    let [top, middle, bottom] = calculate_layout(frame.area());

    render_transport(frame, top, app);
    render_timeline_canvas(frame, middle, app);

    let show_keyboard = app.engine.is_some()
        && matches!(
            app.state(),
            Some(SessionState::Idle) | Some(SessionState::Recording)
        );
    if show_keyboard {
        render_keyboard(frame, bottom, app);
    } else {
        render_waveform(frame, bottom, app);
    }

    if app.show_help {
        render_help(frame, app.help_scroll);
    }
}

/// Helper function to center a rectangle within another rectangle.
pub fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
