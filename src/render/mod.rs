//! Timeline renderers.
//!
//! A [`Timeline`] owns the loaded notes, the playback position pushed in by
//! the host, the visible pitch range, and a decorative pulse. The geometry
//! itself comes from one of three [`TimelineLayout`] strategies selected by
//! [`RendererKind`]:
//!
//! - [`LinearLayout`]: time runs left to right, one row per pitch
//! - [`WaterfallLayout`]: upcoming notes fall toward a catch line
//! - [`RadialLayout`]: time sweeps clockwise from the top, pitch grows outward
//!
//! Layouts produce a [`TimelineFrame`] of abstract shapes; drawing them is
//! up to the front end.

mod color;
mod geometry;
mod linear;
mod pulse;
mod radial;
mod range;
mod waterfall;

pub use color::{
    ColorMode, Rgb, ACTIVE_NOTE_COLOR, CHANNEL_PALETTE, GRID_COLOR, NOTE_COLOR, PLAYHEAD_COLOR,
};
pub use geometry::{clockwise_angle_from_top, polar_to_cartesian, Bounds, Point};
pub use linear::LinearLayout;
pub use pulse::Pulse;
pub use radial::{RadialLayout, RadialStyle};
pub use range::PitchRange;
pub use waterfall::WaterfallLayout;

use crate::midi::{MidiPayload, NoteInterval};
use serde::{Deserialize, Serialize};

/// Which layout strategy a [`Timeline`] uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RendererKind {
    #[default]
    Linear,
    Waterfall,
    Radial,
}

impl RendererKind {
    pub fn next(self) -> Self {
        match self {
            RendererKind::Linear => RendererKind::Waterfall,
            RendererKind::Waterfall => RendererKind::Radial,
            RendererKind::Radial => RendererKind::Linear,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RendererKind::Linear => "Linear",
            RendererKind::Waterfall => "Waterfall",
            RendererKind::Radial => "Radial",
        }
    }

    /// Parses a CLI style name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "linear" | "piano" | "pianoroll" => Some(RendererKind::Linear),
            "waterfall" => Some(RendererKind::Waterfall),
            "radial" | "circular" => Some(RendererKind::Radial),
            _ => None,
        }
    }
}

/// Drawable form of one note.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Rect(Bounds),
    Dot {
        center: Point,
        radius: f64,
    },
    /// Arc around `center`; angles follow [`polar_to_cartesian`].
    Arc {
        center: Point,
        radius: f64,
        start_angle: f64,
        end_angle: f64,
        thickness: f64,
    },
}

/// One laid-out note.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteShape {
    /// Index into [`Timeline::notes`].
    pub note_index: usize,
    pub shape: Shape,
    pub color: Rgb,
    /// Whether the note sounds at the playback position.
    pub active: bool,
}

/// Non-note marks: playhead, grid, key strip, labels.
#[derive(Debug, Clone, PartialEq)]
pub enum Guide {
    Line { from: Point, to: Point, color: Rgb },
    Fill { bounds: Bounds, color: Rgb },
    Circle { center: Point, radius: f64, color: Rgb },
    Label { at: Point, text: String, color: Rgb },
}

/// Everything needed to draw one redraw.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TimelineFrame {
    pub bounds: Bounds,
    /// Drawn first.
    pub guides: Vec<Guide>,
    pub notes: Vec<NoteShape>,
    /// Drawn over the notes.
    pub overlays: Vec<Guide>,
}

/// Read-only view of a timeline handed to its layout.
#[derive(Debug, Clone, Copy)]
pub struct LayoutContext<'a> {
    pub notes: &'a [NoteInterval],
    pub total_duration: f64,
    pub position: f64,
    pub range: PitchRange,
    pub bounds: Bounds,
    pub color_mode: ColorMode,
    /// Pulse amount in `[0, 1]`.
    pub pulse: f64,
}

impl LayoutContext<'_> {
    /// Glow strength for a note: zero when inactive, otherwise pulse-scaled.
    pub fn glow(&self, note: &NoteInterval, strength: f64) -> f64 {
        if note.is_active_at(self.position) {
            strength * self.pulse
        } else {
            0.0
        }
    }

    /// Note color with the active highlight applied.
    pub fn note_color(&self, note: &NoteInterval, glow_strength: f64) -> Rgb {
        self.color_mode
            .note_color(note)
            .brighter(self.glow(note, glow_strength))
    }

    /// Notes inside the visible pitch range, with their indices.
    pub fn visible_notes(&self) -> impl Iterator<Item = (usize, &NoteInterval)> + '_ {
        let range = self.range;
        self.notes
            .iter()
            .enumerate()
            .filter(move |(_, n)| range.contains(n.pitch))
    }
}

/// A timeline layout strategy.
///
/// `time_to_geometry` and `pitch_to_geometry` return the coordinate along
/// the strategy's own axis: x and y for [`LinearLayout`], y and x for
/// [`WaterfallLayout`], angle and radius for [`RadialLayout`].
pub trait TimelineLayout {
    fn kind(&self) -> RendererKind;

    /// Rate the pulse advances at, in radians per second.
    fn pulse_rate(&self) -> f64;

    fn time_to_geometry(&self, t: f64, ctx: &LayoutContext) -> f64;

    fn pitch_to_geometry(&self, pitch: i32, ctx: &LayoutContext) -> f64;

    /// Inverse of the time mapping for a point on screen.
    fn geometry_to_time(&self, point: Point, ctx: &LayoutContext) -> f64;

    fn layout_notes(&self, ctx: &LayoutContext) -> TimelineFrame;

    /// Index of the note drawn under `point`, for layouts that seek to note starts.
    fn note_at(&self, _point: Point, _ctx: &LayoutContext) -> Option<usize> {
        None
    }

    /// Multiplies horizontal zoom. No-op for layouts without zoom.
    fn zoom_by(&mut self, _factor: f64, _total_duration: f64) {}

    /// Scrolls by `steps` tenths of the duration. No-op for layouts without scroll.
    fn scroll_by(&mut self, _steps: f64, _total_duration: f64) {}

    /// Follows the playhead if it left the visible window. No-op by default.
    fn follow(&mut self, _position: f64, _total_duration: f64) {}

    /// Drops view state such as zoom and scroll when notes are replaced.
    fn reset_view(&mut self) {}
}

/// Construction options for layouts that need them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimelineOptions {
    pub lookahead_secs: f64,
    pub radial_style: RadialStyle,
    pub color_mode: ColorMode,
}

impl Default for TimelineOptions {
    fn default() -> Self {
        Self {
            lookahead_secs: waterfall::DEFAULT_LOOKAHEAD,
            radial_style: RadialStyle::default(),
            color_mode: ColorMode::default(),
        }
    }
}

fn build_layout(kind: RendererKind, options: &TimelineOptions) -> Box<dyn TimelineLayout> {
    match kind {
        RendererKind::Linear => Box::new(LinearLayout::new()),
        RendererKind::Waterfall => Box::new(WaterfallLayout::new(options.lookahead_secs)),
        RendererKind::Radial => Box::new(RadialLayout::new(options.radial_style)),
    }
}

type SeekCallback = Box<dyn FnMut(f64)>;

/// A note timeline bound to one layout strategy.
pub struct Timeline {
    layout: Box<dyn TimelineLayout>,
    options: TimelineOptions,
    notes: Vec<NoteInterval>,
    total_duration: f64,
    position: f64,
    range: PitchRange,
    bounds: Bounds,
    pulse: Pulse,
    redraw: bool,
    on_seek: Option<SeekCallback>,
}

impl Timeline {
    pub fn new(kind: RendererKind) -> Self {
        Self::with_options(kind, TimelineOptions::default())
    }

    pub fn with_options(kind: RendererKind, options: TimelineOptions) -> Self {
        let layout = build_layout(kind, &options);
        let pulse = Pulse::new(layout.pulse_rate());
        Self {
            layout,
            options,
            notes: Vec::new(),
            total_duration: 0.0,
            position: 0.0,
            range: PitchRange::default(),
            bounds: Bounds::default(),
            pulse,
            redraw: true,
            on_seek: None,
        }
    }

    pub fn kind(&self) -> RendererKind {
        self.layout.kind()
    }

    /// Switches strategy, keeping notes, range, and position.
    pub fn set_kind(&mut self, kind: RendererKind) {
        if kind == self.kind() {
            return;
        }
        self.layout = build_layout(kind, &self.options);
        self.pulse = Pulse::new(self.layout.pulse_rate());
        self.redraw = true;
        tracing::debug!("Timeline switched to {}", kind.name());
    }

    /// Replaces the note set and refits the visible pitch range.
    ///
    /// An empty note set keeps the previous range.
    pub fn load_notes(&mut self, notes: Vec<NoteInterval>, total_duration: f64) {
        if let Some(range) = PitchRange::fit(&notes) {
            self.range = range;
        }
        tracing::info!(
            "Timeline loaded {} notes, {:.2}s duration",
            notes.len(),
            total_duration
        );
        self.notes = notes;
        self.total_duration = total_duration.max(0.0);
        self.layout.reset_view();
        self.redraw = true;
    }

    /// Replaces notes that are still being captured.
    ///
    /// Like [`Timeline::load_notes`] but keeps zoom and scroll, so it can run
    /// on every tick while recording.
    pub fn update_live(&mut self, notes: Vec<NoteInterval>, total_duration: f64) {
        if let Some(range) = PitchRange::fit(&notes) {
            self.range = range;
        }
        tracing::debug!("Timeline live update: {} notes", notes.len());
        self.notes = notes;
        self.total_duration = total_duration.max(0.0);
        self.redraw = true;
    }

    /// Compiles a payload and loads the result, using `total_time` as duration.
    pub fn load_payload(&mut self, payload: &MidiPayload) {
        self.load_notes(payload.compile(), payload.total_time);
    }

    /// Removes all notes and rewinds. The pitch range is kept.
    pub fn clear(&mut self) {
        self.notes.clear();
        self.total_duration = 0.0;
        self.position = 0.0;
        self.layout.reset_view();
        self.redraw = true;
    }

    /// Stores the playback position and requests a redraw. Last write wins.
    pub fn set_playback_position(&mut self, t: f64) {
        self.position = t;
        self.layout.follow(t, self.total_duration);
        self.redraw = true;
    }

    pub fn playback_position(&self) -> f64 {
        self.position
    }

    /// Advances the decorative pulse.
    pub fn tick(&mut self, delta_seconds: f64) {
        self.pulse.tick(delta_seconds);
        if self.notes.iter().any(|n| n.is_active_at(self.position)) {
            self.redraw = true;
        }
    }

    pub fn pulse_phase(&self) -> f64 {
        self.pulse.phase()
    }

    /// Area the timeline draws into, in drawing units.
    pub fn set_bounds(&mut self, bounds: Bounds) {
        if bounds != self.bounds {
            self.bounds = bounds;
            self.redraw = true;
        }
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn notes(&self) -> &[NoteInterval] {
        &self.notes
    }

    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    pub fn pitch_range(&self) -> PitchRange {
        self.range
    }

    /// Overrides the fitted pitch range until the next non-empty load.
    pub fn set_note_range(&mut self, low: i32, high: i32) {
        self.range = PitchRange::new(low, high);
        self.redraw = true;
    }

    pub fn color_mode(&self) -> ColorMode {
        self.options.color_mode
    }

    pub fn set_color_mode(&mut self, mode: ColorMode) {
        self.options.color_mode = mode;
        self.redraw = true;
    }

    /// Changes the radial sub-style, rebuilding the layout if it is radial.
    pub fn set_radial_style(&mut self, style: RadialStyle) {
        self.options.radial_style = style;
        if self.kind() == RendererKind::Radial {
            self.layout = build_layout(RendererKind::Radial, &self.options);
            self.redraw = true;
        }
    }

    pub fn radial_style(&self) -> RadialStyle {
        self.options.radial_style
    }

    pub fn is_active_at(note: &NoteInterval, t: f64) -> bool {
        note.is_active_at(t)
    }

    pub fn time_to_geometry(&self, t: f64) -> f64 {
        self.layout.time_to_geometry(t, &self.context())
    }

    pub fn pitch_to_geometry(&self, pitch: i32) -> f64 {
        self.layout.pitch_to_geometry(pitch, &self.context())
    }

    pub fn hit_test_to_time(&self, point: Point) -> f64 {
        self.layout.geometry_to_time(point, &self.context())
    }

    /// Handles a click at `point`, returning the time the host should seek to.
    ///
    /// Clicking a note seeks to its start where the layout supports it;
    /// anywhere else seeks to [`Timeline::hit_test_to_time`]. Clicks outside
    /// the bounds return None. The seek callback, if set, is fired too.
    pub fn click(&mut self, point: Point) -> Option<f64> {
        if !self.bounds.contains(point) || self.total_duration <= 0.0 {
            return None;
        }
        let ctx = self.context();
        let time = match self.layout.note_at(point, &ctx) {
            Some(index) => self.notes[index].start_time,
            None => self.layout.geometry_to_time(point, &ctx),
        };
        if let Some(on_seek) = self.on_seek.as_mut() {
            on_seek(time);
        }
        Some(time)
    }

    /// Registers the seek callback fired by [`Timeline::click`].
    pub fn set_on_seek<F: FnMut(f64) + 'static>(&mut self, callback: F) {
        self.on_seek = Some(Box::new(callback));
    }

    pub fn zoom_by(&mut self, factor: f64) {
        self.layout.zoom_by(factor, self.total_duration);
        self.redraw = true;
    }

    pub fn scroll_by(&mut self, steps: f64) {
        self.layout.scroll_by(steps, self.total_duration);
        self.redraw = true;
    }

    /// Lays out the current state.
    pub fn frame(&self) -> TimelineFrame {
        if self.bounds.is_empty() {
            return TimelineFrame {
                bounds: self.bounds,
                ..TimelineFrame::default()
            };
        }
        self.layout.layout_notes(&self.context())
    }

    pub fn redraw_requested(&self) -> bool {
        self.redraw
    }

    /// Returns and clears the redraw request.
    pub fn take_redraw(&mut self) -> bool {
        std::mem::take(&mut self.redraw)
    }

    fn context(&self) -> LayoutContext<'_> {
        LayoutContext {
            notes: &self.notes,
            total_duration: self.total_duration,
            position: self.position,
            range: self.range,
            bounds: self.bounds,
            color_mode: self.options.color_mode,
            pulse: self.pulse.value(),
        }
    }
}

impl std::fmt::Debug for Timeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timeline")
            .field("kind", &self.kind())
            .field("notes", &self.notes.len())
            .field("total_duration", &self.total_duration)
            .field("position", &self.position)
            .field("range", &self.range)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::MidiEvent;
    use std::cell::Cell;
    use std::rc::Rc;

    fn sample_notes() -> Vec<NoteInterval> {
        vec![
            NoteInterval::new(0.0, 1.0, 60, 100, 0),
            NoteInterval::new(1.0, 2.0, 64, 80, 1),
            NoteInterval::new(2.0, 4.0, 67, 60, 2),
        ]
    }

    fn timeline(kind: RendererKind) -> Timeline {
        let mut timeline = Timeline::new(kind);
        timeline.set_bounds(Bounds::new(0.0, 0.0, 200.0, 100.0));
        timeline.load_notes(sample_notes(), 4.0);
        timeline
    }

    #[test]
    fn test_load_fits_range() {
        let t = timeline(RendererKind::Linear);
        assert_eq!(t.pitch_range(), PitchRange { low: 57, high: 69 });
    }

    #[test]
    fn test_empty_load_keeps_range() {
        let mut t = timeline(RendererKind::Linear);
        t.load_notes(Vec::new(), 0.0);
        assert_eq!(t.pitch_range(), PitchRange { low: 57, high: 69 });

        let fresh = Timeline::new(RendererKind::Radial);
        assert_eq!(fresh.pitch_range(), PitchRange::default());
    }

    #[test]
    fn test_load_payload_compiles() {
        let mut t = Timeline::new(RendererKind::Waterfall);
        let payload = MidiPayload {
            events: vec![MidiEvent::note_on(0.5, 72, 100, 0)],
            total_time: 3.0,
            ..MidiPayload::default()
        };
        t.load_payload(&payload);
        assert_eq!(t.notes(), &[NoteInterval::new(0.5, 3.0, 72, 100, 0)]);
        assert_eq!(t.total_duration(), 3.0);
    }

    #[test]
    fn test_playback_position_is_idempotent() {
        for kind in [
            RendererKind::Linear,
            RendererKind::Waterfall,
            RendererKind::Radial,
        ] {
            let mut t = timeline(kind);
            t.set_playback_position(1.5);
            let first = t.frame();
            t.set_playback_position(1.5);
            assert_eq!(t.frame(), first);
            assert_eq!(t.playback_position(), 1.5);
        }
    }

    #[test]
    fn test_position_requests_redraw() {
        let mut t = timeline(RendererKind::Radial);
        assert!(t.take_redraw());
        assert!(!t.redraw_requested());
        t.set_playback_position(0.5);
        assert!(t.take_redraw());
    }

    #[test]
    fn test_tick_only_moves_pulse() {
        let mut t = timeline(RendererKind::Linear);
        t.set_playback_position(0.5);
        t.tick(0.1);
        assert!(t.pulse_phase() > 0.0);
        assert_eq!(t.playback_position(), 0.5);
    }

    #[test]
    fn test_active_notes_flagged_in_frame() {
        for kind in [
            RendererKind::Linear,
            RendererKind::Waterfall,
            RendererKind::Radial,
        ] {
            let mut t = timeline(kind);
            t.set_playback_position(1.5);
            let frame = t.frame();
            let active: Vec<usize> = frame
                .notes
                .iter()
                .filter(|n| n.active)
                .map(|n| n.note_index)
                .collect();
            assert_eq!(active, vec![1], "{:?}", kind);
        }
    }

    #[test]
    fn test_out_of_range_notes_are_not_drawn() {
        let mut t = timeline(RendererKind::Linear);
        t.set_note_range(62, 80);
        let frame = t.frame();
        assert!(frame.notes.iter().all(|n| n.note_index != 0));
        assert_eq!(frame.notes.len(), 2);
    }

    #[test]
    fn test_click_fires_seek_callback() {
        let mut t = timeline(RendererKind::Radial);
        let seen = Rc::new(Cell::new(None));
        let sink = Rc::clone(&seen);
        t.set_on_seek(move |time| sink.set(Some(time)));

        // Three o'clock on the dial is a quarter of the way through.
        let time = t.click(Point::new(190.0, 50.0)).unwrap();
        assert!((time - 1.0).abs() < 1e-9);
        assert_eq!(seen.get(), Some(time));

        assert_eq!(t.click(Point::new(500.0, 50.0)), None);
    }

    #[test]
    fn test_switching_kind_keeps_notes() {
        let mut t = timeline(RendererKind::Linear);
        t.set_playback_position(2.5);
        t.set_kind(RendererKind::Waterfall);
        assert_eq!(t.kind(), RendererKind::Waterfall);
        assert_eq!(t.notes().len(), 3);
        assert_eq!(t.playback_position(), 2.5);
    }

    #[test]
    fn test_live_update_keeps_zoom() {
        let mut t = timeline(RendererKind::Linear);
        t.zoom_by(2.0);
        let zoomed = t.time_to_geometry(1.0);

        t.update_live(sample_notes(), 4.0);
        assert_eq!(t.time_to_geometry(1.0), zoomed);

        t.load_notes(sample_notes(), 4.0);
        assert!(t.time_to_geometry(1.0) < zoomed);
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(RendererKind::from_name("Radial"), Some(RendererKind::Radial));
        assert_eq!(RendererKind::from_name("circular"), Some(RendererKind::Radial));
        assert_eq!(RendererKind::from_name("spiral"), None);
        assert_eq!(RendererKind::Radial.next(), RendererKind::Linear);
    }
}
