//! Transport bar.
//!
//! Shows the session state, the take clock with a countdown gauge, MIDI
//! activity, the selected source, story tags, and the status message.

use crate::app::App;
use crate::session::{RecordingSource, SessionState};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph};
use ratatui::Frame;

/// Formats seconds as `m:ss.t`.
pub fn format_clock(seconds: f64) -> String {
    let tenths = (seconds.max(0.0) * 10.0).floor() as u64;
    format!("{}:{:02}.{}", tenths / 600, (tenths / 10) % 60, tenths % 10)
}

fn state_span(app: &App) -> Span<'static> {
    let bold = |color: Color| Style::default().fg(color).add_modifier(Modifier::BOLD);
    match app.state() {
        Some(SessionState::Idle) => Span::styled(" [.] IDLE ", bold(Color::Blue)),
        Some(SessionState::Recording) => Span::styled(" [*] REC ", bold(Color::Red)),
        Some(SessionState::Preview) if app.is_playing() => {
            Span::styled(" [>] PREVIEW ", bold(Color::Green))
        }
        Some(SessionState::Preview) => Span::styled(" [||] PREVIEW ", bold(Color::Yellow)),
        None if app.is_playing() => Span::styled(" [>] PLAY ", bold(Color::Green)),
        None => Span::styled(" [||] VIEW ", bold(Color::Yellow)),
    }
}

/// Elapsed over the limit while recording, position over length otherwise.
fn clock_line(app: &App) -> Line<'static> {
    let (now, total) = match &app.session {
        Some(session) if session.state() == SessionState::Recording => {
            (session.elapsed(), session.max_duration())
        }
        _ => (app.position_seconds(), app.timeline.total_duration()),
    };
    Line::from(vec![
        Span::styled(
            format_clock(now),
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!(" / {}", format_clock(total)),
            Style::default().fg(Color::DarkGray),
        ),
    ])
}

fn source_line(app: &App) -> Line<'static> {
    let Some(current) = app.recording_source() else {
        let title = app
            .story
            .as_ref()
            .map(|s| s.title.clone())
            .unwrap_or_default();
        return Line::from(Span::styled(title, Style::default().fg(Color::White)));
    };

    let mut spans = Vec::new();
    for source in [RecordingSource::Instrument, RecordingSource::Microphone] {
        let available = app
            .session
            .as_ref()
            .is_some_and(|s| s.has_source(source));
        let style = if source == current {
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else if available {
            Style::default().fg(Color::Gray)
        } else {
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::CROSSED_OUT)
        };
        spans.push(Span::styled(format!(" {} ", source.name()), style));
    }

    let active = app.session.as_ref().is_some_and(|s| s.has_midi_activity());
    spans.push(Span::styled(
        " MIDI",
        if active {
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        },
    ));
    Line::from(spans)
}

fn tags_line(app: &App) -> Line<'static> {
    let label = Style::default().fg(Color::DarkGray);
    let value = Style::default().fg(Color::White);
    let Some(metadata) = app.metadata() else {
        return Line::default();
    };
    let bpm = metadata
        .bpm
        .map(|b| b.to_string())
        .unwrap_or_else(|| "-".to_string());
    let key = metadata.key.clone().unwrap_or_else(|| "-".to_string());
    let mut spans = vec![
        Span::styled("BPM: ", label),
        Span::styled(bpm, value),
        Span::styled("  Key: ", label),
        Span::styled(key, value),
    ];
    if !metadata.genres.is_empty() {
        spans.push(Span::styled("  ", label));
        spans.push(Span::styled(metadata.genres.join(", "), value));
    }
    Line::from(spans)
}

/// Renders the transport bar at the top of the screen.
///
/// # Arguments
///
/// * `frame` - The frame to render to
/// * `area` - The area to render in
/// * `app` - Application state
pub fn render_transport(frame: &mut Frame, area: Rect, app: &App) {
    let recording = app.state() == Some(SessionState::Recording);
    let block = Block::default()
        .title(" Transport ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if recording { Color::Red } else { Color::Gray }));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(14), // State
            Constraint::Length(20), // Clock
            Constraint::Length(16), // Countdown
            Constraint::Length(30), // Source / title
            Constraint::Min(20),    // Status or tags
        ])
        .split(inner);

    frame.render_widget(Paragraph::new(Line::from(state_span(app))), chunks[0]);
    frame.render_widget(Paragraph::new(clock_line(app)), chunks[1]);

    if let Some(session) = app.session.as_ref().filter(|_| recording) {
        let max = session.max_duration().max(f64::EPSILON);
        let remaining = (session.max_duration() - session.elapsed()).max(0.0);
        let color = if session.can_stop() {
            Color::Green
        } else {
            Color::Yellow
        };
        let gauge = Gauge::default()
            .gauge_style(Style::default().fg(color).bg(Color::Black))
            .ratio((remaining / max).clamp(0.0, 1.0))
            .label(format!("{:.0}s left", remaining.ceil()));
        frame.render_widget(gauge, chunks[2]);
    }

    frame.render_widget(Paragraph::new(source_line(app)), chunks[3]);

    let status_line = if let Some((msg, _)) = &app.status_message {
        Line::from(Span::styled(
            msg.clone(),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::ITALIC),
        ))
    } else {
        tags_line(app)
    };
    frame.render_widget(Paragraph::new(status_line), chunks[4]);
}
