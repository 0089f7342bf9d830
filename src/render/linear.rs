//! Piano-roll style layout.
//!
//! Time runs left to right through a zoomable, scrollable window; each
//! visible pitch gets one row with the highest pitch on top. A key strip on
//! the left marks pitches and lights up the ones currently sounding.

use super::geometry::clamp01;
use super::{
    Bounds, Guide, LayoutContext, NoteShape, Point, RendererKind, Rgb, Shape, TimelineFrame,
    TimelineLayout, GRID_COLOR, PLAYHEAD_COLOR,
};
use crate::midi::{is_black_key, note_to_name, NoteInterval};

pub const MIN_ZOOM: f64 = 0.5;
pub const MAX_ZOOM: f64 = 5.0;
/// One scroll step moves a tenth of the duration.
const SCROLL_STEP: f64 = 0.1;
const KEY_STRIP_WIDTH: f64 = 8.0;
const MIN_NOTE_WIDTH: f64 = 2.0;
/// 0.1 rad per frame at 30 fps.
const PULSE_RATE: f64 = 3.0;
const GLOW: f64 = 0.3;

const WHITE_KEY: Rgb = Rgb(0xe0, 0xe0, 0xe0);
const BLACK_KEY: Rgb = Rgb(0x30, 0x30, 0x30);

#[derive(Debug, Clone, PartialEq)]
pub struct LinearLayout {
    zoom: f64,
    /// Time at the left edge of the grid, in seconds.
    scroll: f64,
}

impl Default for LinearLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearLayout {
    pub fn new() -> Self {
        Self {
            zoom: 1.0,
            scroll: 0.0,
        }
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn scroll(&self) -> f64 {
        self.scroll
    }

    /// Area right of the key strip.
    fn grid(&self, bounds: Bounds) -> Bounds {
        bounds.split_left(KEY_STRIP_WIDTH.min(bounds.width * 0.25)).1
    }

    fn key_strip(&self, bounds: Bounds) -> Bounds {
        bounds.split_left(KEY_STRIP_WIDTH.min(bounds.width * 0.25)).0
    }

    fn visible_duration(&self, total: f64) -> f64 {
        total / self.zoom
    }

    fn row_height(&self, ctx: &LayoutContext) -> f64 {
        ctx.bounds.height / ctx.range.rows() as f64
    }

    fn max_scroll(&self, total: f64) -> f64 {
        (total * (1.0 - 1.0 / self.zoom)).max(0.0)
    }

    fn clamp_scroll(&mut self, total: f64) {
        self.scroll = self.scroll.clamp(0.0, self.max_scroll(total));
    }

    /// Screen rectangle for a note, or None when it is outside the window or range.
    fn note_rect(&self, note: &NoteInterval, ctx: &LayoutContext) -> Option<Bounds> {
        if !ctx.range.contains(note.pitch) || ctx.total_duration <= 0.0 {
            return None;
        }
        let window_end = self.scroll + self.visible_duration(ctx.total_duration);
        if note.end_time < self.scroll || note.start_time > window_end {
            return None;
        }

        let x1 = self.time_to_geometry(note.start_time, ctx);
        let x2 = self.time_to_geometry(note.end_time, ctx);
        let row = self.row_height(ctx);
        let scale = ctx
            .color_mode
            .size_fraction(note)
            .map(|f| 0.5 + 0.5 * f)
            .unwrap_or(1.0);
        let height = (row * 0.8 * scale).max(1.0);
        let top = self.pitch_to_geometry(note.pitch, ctx) + (row - height) / 2.0;

        let grid = self.grid(ctx.bounds);
        let width = (x2 - x1).max(MIN_NOTE_WIDTH).min(grid.width);
        let x = x1.min(grid.right() - width).max(grid.x);
        Some(Bounds::new(x, top, width, height))
    }

    fn key_guides(&self, ctx: &LayoutContext, guides: &mut Vec<Guide>) {
        let strip = self.key_strip(ctx.bounds);
        let grid = self.grid(ctx.bounds);
        let row = self.row_height(ctx);

        for pitch in ctx.range.low..=ctx.range.high {
            let y = self.pitch_to_geometry(pitch, ctx);
            let sounding = ctx
                .notes
                .iter()
                .find(|n| n.pitch == pitch && n.is_active_at(ctx.position));
            let color = match sounding {
                Some(note) => ctx.color_mode.note_color(note).brighter(GLOW * ctx.pulse),
                None if is_black_key(pitch) => BLACK_KEY,
                None => WHITE_KEY,
            };
            guides.push(Guide::Fill {
                bounds: Bounds::new(strip.x, y, strip.width, row),
                color,
            });

            if pitch % 12 == 0 {
                guides.push(Guide::Line {
                    from: Point::new(grid.x, y + row),
                    to: Point::new(grid.right(), y + row),
                    color: GRID_COLOR,
                });
                guides.push(Guide::Label {
                    at: Point::new(strip.x, y),
                    text: note_to_name(pitch),
                    color: GRID_COLOR,
                });
            }
        }
    }

    fn time_guides(&self, ctx: &LayoutContext, guides: &mut Vec<Guide>) {
        let grid = self.grid(ctx.bounds);
        let visible = self.visible_duration(ctx.total_duration);
        if visible <= 0.0 {
            return;
        }
        let mut step = 1.0;
        while visible / step > 20.0 {
            step *= 2.0;
        }
        let mut t = (self.scroll / step).ceil() * step;
        while t <= self.scroll + visible {
            let x = self.time_to_geometry(t, ctx);
            guides.push(Guide::Line {
                from: Point::new(x, grid.y),
                to: Point::new(x, grid.bottom()),
                color: GRID_COLOR,
            });
            t += step;
        }
    }
}

impl TimelineLayout for LinearLayout {
    fn kind(&self) -> RendererKind {
        RendererKind::Linear
    }

    fn pulse_rate(&self) -> f64 {
        PULSE_RATE
    }

    /// X coordinate for `t`, pinned to the grid edges outside the window.
    fn time_to_geometry(&self, t: f64, ctx: &LayoutContext) -> f64 {
        let grid = self.grid(ctx.bounds);
        if ctx.total_duration <= 0.0 {
            return grid.x;
        }
        let progress = (t - self.scroll) / self.visible_duration(ctx.total_duration);
        grid.x + clamp01(progress) * grid.width
    }

    /// Top edge of the row for `pitch`.
    fn pitch_to_geometry(&self, pitch: i32, ctx: &LayoutContext) -> f64 {
        ctx.bounds.y + (ctx.range.high - pitch) as f64 * self.row_height(ctx)
    }

    fn geometry_to_time(&self, point: Point, ctx: &LayoutContext) -> f64 {
        let grid = self.grid(ctx.bounds);
        if ctx.total_duration <= 0.0 || grid.width <= 0.0 {
            return 0.0;
        }
        let progress = clamp01((point.x - grid.x) / grid.width);
        (self.scroll + progress * self.visible_duration(ctx.total_duration))
            .min(ctx.total_duration)
    }

    fn layout_notes(&self, ctx: &LayoutContext) -> TimelineFrame {
        let mut guides = Vec::new();
        self.key_guides(ctx, &mut guides);
        self.time_guides(ctx, &mut guides);

        let notes = ctx
            .visible_notes()
            .filter_map(|(index, note)| {
                self.note_rect(note, ctx).map(|rect| NoteShape {
                    note_index: index,
                    shape: Shape::Rect(rect),
                    color: ctx.note_color(note, GLOW),
                    active: note.is_active_at(ctx.position),
                })
            })
            .collect();

        let mut overlays = Vec::new();
        let window_end = self.scroll + self.visible_duration(ctx.total_duration);
        if ctx.total_duration > 0.0 && ctx.position >= self.scroll && ctx.position <= window_end {
            let grid = self.grid(ctx.bounds);
            let x = self.time_to_geometry(ctx.position, ctx);
            overlays.push(Guide::Line {
                from: Point::new(x, grid.y),
                to: Point::new(x, grid.bottom()),
                color: PLAYHEAD_COLOR,
            });
        }

        TimelineFrame {
            bounds: ctx.bounds,
            guides,
            notes,
            overlays,
        }
    }

    fn note_at(&self, point: Point, ctx: &LayoutContext) -> Option<usize> {
        // Later notes draw on top, so search from the end.
        ctx.visible_notes()
            .filter_map(|(index, note)| self.note_rect(note, ctx).map(|rect| (index, rect)))
            .filter(|(_, rect)| rect.contains(point))
            .map(|(index, _)| index)
            .last()
    }

    fn zoom_by(&mut self, factor: f64, total_duration: f64) {
        if !(factor.is_finite() && factor > 0.0) {
            return;
        }
        self.zoom = (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        self.clamp_scroll(total_duration);
    }

    fn scroll_by(&mut self, steps: f64, total_duration: f64) {
        self.scroll += steps * SCROLL_STEP * total_duration;
        self.clamp_scroll(total_duration);
    }

    fn follow(&mut self, position: f64, total_duration: f64) {
        let visible = self.visible_duration(total_duration);
        if position < self.scroll || position > self.scroll + visible {
            self.scroll = position;
            self.clamp_scroll(total_duration);
        }
    }

    fn reset_view(&mut self) {
        self.zoom = 1.0;
        self.scroll = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{ColorMode, PitchRange};

    const BOUNDS: Bounds = Bounds::new(0.0, 0.0, 208.0, 130.0);

    fn ctx<'a>(notes: &'a [NoteInterval], position: f64) -> LayoutContext<'a> {
        LayoutContext {
            notes,
            total_duration: 10.0,
            position,
            range: PitchRange { low: 60, high: 72 },
            bounds: BOUNDS,
            color_mode: ColorMode::Flat,
            pulse: 1.0,
        }
    }

    #[test]
    fn test_time_mapping_and_inverse() {
        let layout = LinearLayout::new();
        let c = ctx(&[], 0.0);
        assert_eq!(layout.time_to_geometry(0.0, &c), 8.0);
        assert_eq!(layout.time_to_geometry(5.0, &c), 108.0);
        assert_eq!(layout.time_to_geometry(10.0, &c), 208.0);
        assert_eq!(layout.time_to_geometry(20.0, &c), 208.0);
        assert_eq!(layout.geometry_to_time(Point::new(108.0, 5.0), &c), 5.0);
        assert_eq!(layout.geometry_to_time(Point::new(0.0, 5.0), &c), 0.0);
    }

    #[test]
    fn test_zoom_and_scroll_shift_window() {
        let mut layout = LinearLayout::new();
        layout.zoom_by(2.0, 10.0);
        layout.scroll_by(30.0, 10.0);
        // Scroll is capped so the window never runs past the end.
        assert_eq!(layout.scroll(), 5.0);

        let c = ctx(&[], 0.0);
        assert_eq!(layout.time_to_geometry(7.5, &c), 108.0);
        assert_eq!(layout.geometry_to_time(Point::new(108.0, 0.0), &c), 7.5);
        assert_eq!(layout.time_to_geometry(1.0, &c), 8.0);
    }

    #[test]
    fn test_zoom_limits() {
        let mut layout = LinearLayout::new();
        layout.zoom_by(100.0, 10.0);
        assert_eq!(layout.zoom(), MAX_ZOOM);
        layout.zoom_by(0.0001, 10.0);
        assert_eq!(layout.zoom(), MIN_ZOOM);
        layout.scroll_by(5.0, 10.0);
        assert_eq!(layout.scroll(), 0.0);
    }

    #[test]
    fn test_high_pitch_on_top() {
        let layout = LinearLayout::new();
        let c = ctx(&[], 0.0);
        assert_eq!(layout.pitch_to_geometry(72, &c), 0.0);
        assert_eq!(layout.pitch_to_geometry(60, &c), 120.0);
    }

    #[test]
    fn test_short_notes_get_minimum_width() {
        let notes = [NoteInterval::new(1.0, 1.0, 64, 100, 0)];
        let layout = LinearLayout::new();
        let frame = layout.layout_notes(&ctx(&notes, 0.0));
        match frame.notes[0].shape {
            Shape::Rect(rect) => assert_eq!(rect.width, MIN_NOTE_WIDTH),
            other => panic!("unexpected shape {:?}", other),
        }
    }

    #[test]
    fn test_note_at_right_edge_stays_in_grid() {
        let notes = [NoteInterval::new(10.0, 10.0, 64, 100, 0)];
        let layout = LinearLayout::new();
        let frame = layout.layout_notes(&ctx(&notes, 0.0));
        match frame.notes[0].shape {
            Shape::Rect(rect) => {
                assert_eq!(rect.width, MIN_NOTE_WIDTH);
                assert_eq!(rect.right(), BOUNDS.right());
            }
            other => panic!("unexpected shape {:?}", other),
        }
    }

    #[test]
    fn test_click_on_note_finds_it() {
        let notes = [
            NoteInterval::new(2.0, 4.0, 72, 100, 0),
            NoteInterval::new(6.0, 7.0, 60, 100, 0),
        ];
        let layout = LinearLayout::new();
        let c = ctx(&notes, 0.0);
        // Middle of the first note's row and span.
        assert_eq!(layout.note_at(Point::new(68.0, 5.0), &c), Some(0));
        assert_eq!(layout.note_at(Point::new(68.0, 60.0), &c), None);
    }

    #[test]
    fn test_playhead_only_inside_window() {
        let layout = LinearLayout::new();
        let frame = layout.layout_notes(&ctx(&[], 3.0));
        assert_eq!(frame.overlays.len(), 1);
        let frame = layout.layout_notes(&ctx(&[], 12.0));
        assert!(frame.overlays.is_empty());
    }

    #[test]
    fn test_follow_scrolls_when_zoomed() {
        let mut layout = LinearLayout::new();
        layout.zoom_by(4.0, 10.0);
        layout.follow(6.0, 10.0);
        assert_eq!(layout.scroll(), 6.0);
        layout.follow(7.0, 10.0);
        assert_eq!(layout.scroll(), 6.0);
    }
}
