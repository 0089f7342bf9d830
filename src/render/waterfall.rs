//! Falling-notes layout.
//!
//! Each pitch owns a column. Notes fall from the top toward a catch line at
//! 90% of the height and reach it exactly when they start sounding. The strip
//! under the catch line shows which keys are down.

use super::geometry::clamp01;
use super::{
    Bounds, Guide, LayoutContext, NoteShape, Point, RendererKind, Rgb, Shape, TimelineFrame,
    TimelineLayout, PLAYHEAD_COLOR,
};
use crate::midi::{is_black_key, NoteInterval};

/// Seconds of upcoming notes shown above the catch line.
pub const DEFAULT_LOOKAHEAD: f64 = 3.0;

const CATCH_FRACTION: f64 = 0.9;
const MIN_NOTE_HEIGHT: f64 = 2.0;
const PULSE_RATE: f64 = 9.0;
const GLOW: f64 = 0.4;

const WHITE_KEY: Rgb = Rgb(0xd0, 0xd0, 0xd0);
const BLACK_KEY: Rgb = Rgb(0x28, 0x28, 0x28);

#[derive(Debug, Clone, PartialEq)]
pub struct WaterfallLayout {
    lookahead: f64,
}

impl Default for WaterfallLayout {
    fn default() -> Self {
        Self::new(DEFAULT_LOOKAHEAD)
    }
}

impl WaterfallLayout {
    /// A non-finite or negative lookahead collapses every note onto the catch line.
    pub fn new(lookahead: f64) -> Self {
        let lookahead = if lookahead.is_finite() {
            lookahead.max(0.0)
        } else {
            0.0
        };
        Self { lookahead }
    }

    pub fn lookahead(&self) -> f64 {
        self.lookahead
    }

    fn catch_y(&self, bounds: Bounds) -> f64 {
        bounds.y + bounds.height * CATCH_FRACTION
    }

    fn column_width(&self, ctx: &LayoutContext) -> f64 {
        ctx.bounds.width / ctx.range.rows() as f64
    }

    fn in_window(&self, note: &NoteInterval, position: f64) -> bool {
        note.end_time > position && note.start_time <= position + self.lookahead
    }

    fn note_rect(&self, note: &NoteInterval, ctx: &LayoutContext) -> Option<Bounds> {
        if !ctx.range.contains(note.pitch) || !self.in_window(note, ctx.position) {
            return None;
        }
        let catch = self.catch_y(ctx.bounds);
        let bottom = self.time_to_geometry(note.start_time, ctx).min(catch);
        let top = self.time_to_geometry(note.end_time, ctx).max(ctx.bounds.y);
        let height = (bottom - top).max(MIN_NOTE_HEIGHT);

        let column = self.column_width(ctx);
        let scale = ctx
            .color_mode
            .size_fraction(note)
            .map(|f| 0.5 + 0.5 * f)
            .unwrap_or(1.0);
        let width = (column * 0.8 * scale).max(1.0);
        let left = self.pitch_to_geometry(note.pitch, ctx) + (column - width) / 2.0;

        Some(Bounds::new(left, bottom - height, width, height))
    }

    fn key_indicators(&self, ctx: &LayoutContext, guides: &mut Vec<Guide>) {
        let catch = self.catch_y(ctx.bounds);
        let column = self.column_width(ctx);
        let height = ctx.bounds.bottom() - catch;

        for pitch in ctx.range.low..=ctx.range.high {
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
                bounds: Bounds::new(self.pitch_to_geometry(pitch, ctx), catch, column, height),
                color,
            });
        }
    }
}

impl TimelineLayout for WaterfallLayout {
    fn kind(&self) -> RendererKind {
        RendererKind::Waterfall
    }

    fn pulse_rate(&self) -> f64 {
        PULSE_RATE
    }

    /// Y coordinate for `t`. Times before the playback position land below
    /// the catch line.
    fn time_to_geometry(&self, t: f64, ctx: &LayoutContext) -> f64 {
        let catch = self.catch_y(ctx.bounds);
        if self.lookahead <= 0.0 {
            return catch;
        }
        let ahead = (t - ctx.position) / self.lookahead;
        ctx.bounds.y + (catch - ctx.bounds.y) * (1.0 - ahead)
    }

    /// Left edge of the column for `pitch`.
    fn pitch_to_geometry(&self, pitch: i32, ctx: &LayoutContext) -> f64 {
        ctx.bounds.x + (pitch - ctx.range.low) as f64 * self.column_width(ctx)
    }

    fn geometry_to_time(&self, point: Point, ctx: &LayoutContext) -> f64 {
        let catch = self.catch_y(ctx.bounds);
        let fall = catch - ctx.bounds.y;
        if self.lookahead <= 0.0 || fall <= 0.0 {
            return ctx.position.clamp(0.0, ctx.total_duration.max(0.0));
        }
        let ahead = 1.0 - clamp01((point.y - ctx.bounds.y) / fall);
        (ctx.position + ahead * self.lookahead).clamp(0.0, ctx.total_duration.max(0.0))
    }

    fn layout_notes(&self, ctx: &LayoutContext) -> TimelineFrame {
        let mut guides = Vec::new();
        self.key_indicators(ctx, &mut guides);

        let mut notes = Vec::new();
        let mut overlays = Vec::new();
        let column = self.column_width(ctx);
        let catch = self.catch_y(ctx.bounds);

        for (index, note) in ctx.visible_notes() {
            let Some(rect) = self.note_rect(note, ctx) else {
                continue;
            };
            let active = note.is_active_at(ctx.position);
            let color = ctx.note_color(note, GLOW);
            notes.push(NoteShape {
                note_index: index,
                shape: Shape::Rect(rect),
                color,
                active,
            });
            if active {
                let glow = 1.0 + ctx.pulse * 2.0;
                overlays.push(Guide::Fill {
                    bounds: Bounds::new(
                        self.pitch_to_geometry(note.pitch, ctx),
                        catch - glow / 2.0,
                        column,
                        glow,
                    ),
                    color,
                });
            }
        }

        overlays.insert(
            0,
            Guide::Line {
                from: Point::new(ctx.bounds.x, catch),
                to: Point::new(ctx.bounds.right(), catch),
                color: PLAYHEAD_COLOR,
            },
        );

        TimelineFrame {
            bounds: ctx.bounds,
            guides,
            notes,
            overlays,
        }
    }
}
