//! Waveform strip shown under the timeline while previewing.

use super::keyboard::build_contextual_help;
use crate::app::App;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::widgets::{Block, Borders, Paragraph, Sparkline};
use ratatui::Frame;

/// Sparkline height scale for peaks in `[0, 1]`.
const BAR_SCALE: f32 = 100.0;

/// Resamples `peaks` to `width` bars, marking how far `progress` reaches.
///
/// Returns the bar heights and the number of bars already played.
pub fn bars(peaks: &[f32], width: usize, progress: f64) -> (Vec<u64>, usize) {
    if peaks.is_empty() || width == 0 {
        return (Vec::new(), 0);
    }
    let bars = (0..width)
        .map(|i| {
            let from = i * peaks.len() / width;
            let to = ((i + 1) * peaks.len() / width).max(from + 1);
            let peak = peaks[from..to.min(peaks.len())]
                .iter()
                .fold(0.0f32, |m, p| m.max(*p));
            (peak.clamp(0.0, 1.0) * BAR_SCALE).round() as u64
        })
        .collect();
    let played = (progress.clamp(0.0, 1.0) * width as f64).round() as usize;
    (bars, played)
}

/// Renders the waveform of the take or story with the played part
/// highlighted, plus the contextual help line.
pub fn render_waveform(frame: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .title(" Waveform ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Gray));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if inner.height < 2 {
        return;
    }
    let wave_area = Rect::new(inner.x, inner.y, inner.width, inner.height - 1);
    let help_area = Rect::new(inner.x, inner.y + inner.height - 1, inner.width, 1);

    let total = app.timeline.total_duration();
    let progress = if total > 0.0 {
        app.position_seconds() / total
    } else {
        0.0
    };
    let (data, played) = bars(app.waveform(), wave_area.width as usize, progress);

    if data.is_empty() {
        frame.render_widget(
            Paragraph::new("no audio").style(Style::default().fg(Color::DarkGray)),
            wave_area,
        );
    } else {
        let split = played.min(data.len());
        let played_area = Rect::new(wave_area.x, wave_area.y, split as u16, wave_area.height);
        let rest_area = Rect::new(
            wave_area.x + split as u16,
            wave_area.y,
            wave_area.width - split as u16,
            wave_area.height,
        );
        frame.render_widget(
            Sparkline::default()
                .data(&data[..split])
                .max(BAR_SCALE as u64)
                .style(Style::default().fg(Color::Cyan)),
            played_area,
        );
        frame.render_widget(
            Sparkline::default()
                .data(&data[split..])
                .max(BAR_SCALE as u64)
                .style(Style::default().fg(Color::DarkGray)),
            rest_area,
        );
    }

    frame.render_widget(
        Paragraph::new(build_contextual_help(app.state())),
        help_area,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bars_downsample_by_max() {
        let peaks = [0.1, 0.5, 0.2, 1.0];
        let (data, played) = bars(&peaks, 2, 0.5);
        assert_eq!(data, vec![50, 100]);
        assert_eq!(played, 1);
    }

    #[test]
    fn test_bars_upsample_repeats() {
        let (data, played) = bars(&[0.25, 0.75], 4, 2.0);
        assert_eq!(data, vec![25, 25, 75, 75]);
        assert_eq!(played, 4);
    }

    #[test]
    fn test_no_peaks_no_bars() {
        assert_eq!(bars(&[], 10, 0.3), (Vec::new(), 0));
    }
}
