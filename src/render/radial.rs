//! Circular layout.
//!
//! The whole recording is one turn of a dial: time sweeps clockwise from
//! twelve o'clock and pitch grows outward from an inner ring. A sweep line
//! marks the playback position and the centre shows it as `mm:ss`.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use serde::{Deserialize, Serialize};

use super::{
    clockwise_angle_from_top, polar_to_cartesian, Guide, LayoutContext, NoteShape, Point,
    RendererKind, Shape, TimelineFrame, TimelineLayout, GRID_COLOR, PLAYHEAD_COLOR,
};
use crate::midi::NoteInterval;

const OUTER_FRACTION: f64 = 0.45;
const INNER_FRACTION: f64 = 0.2;
const RING_COUNT: usize = 5;
const SPOKE_STEP: f64 = PI / 6.0;
const PULSE_RATE: f64 = 9.0;
const GLOW: f64 = 0.3;
const MAX_PARTICLES: usize = 64;
/// Angle covered by one segment of an active note's elapsed arc.
const ARC_STEP: f64 = 0.05;

/// How each note is drawn on the dial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RadialStyle {
    /// A dot at the note onset.
    #[default]
    Dots,
    /// An arc spanning the note duration.
    Arcs,
    /// A trail of small dots along the duration.
    Particles,
}

impl RadialStyle {
    pub fn next(self) -> Self {
        match self {
            RadialStyle::Dots => RadialStyle::Arcs,
            RadialStyle::Arcs => RadialStyle::Particles,
            RadialStyle::Particles => RadialStyle::Dots,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RadialStyle::Dots => "Dots",
            RadialStyle::Arcs => "Arcs",
            RadialStyle::Particles => "Particles",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "dots" => Some(RadialStyle::Dots),
            "arcs" => Some(RadialStyle::Arcs),
            "particles" => Some(RadialStyle::Particles),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RadialLayout {
    style: RadialStyle,
}

impl Default for RadialLayout {
    fn default() -> Self {
        Self::new(RadialStyle::default())
    }
}

impl RadialLayout {
    pub fn new(style: RadialStyle) -> Self {
        Self { style }
    }

    pub fn style(&self) -> RadialStyle {
        self.style
    }

    fn outer_radius(ctx: &LayoutContext) -> f64 {
        ctx.bounds.min_side() * OUTER_FRACTION
    }

    fn inner_radius(ctx: &LayoutContext) -> f64 {
        Self::outer_radius(ctx) * INNER_FRACTION
    }

    /// Marks scale with the dial so small terminals stay legible.
    fn unit(ctx: &LayoutContext) -> f64 {
        (Self::outer_radius(ctx) / 40.0).max(0.25)
    }

    /// `base + span * velocity` when the color mode sizes by velocity, else `fixed`.
    fn sized(ctx: &LayoutContext, note: &NoteInterval, base: f64, span: f64, fixed: f64) -> f64 {
        let size = match ctx.color_mode.size_fraction(note) {
            Some(f) => base + span * f,
            None => fixed,
        };
        size * Self::unit(ctx)
    }

    fn note_shape(&self, note: &NoteInterval, ctx: &LayoutContext) -> Shape {
        let center = ctx.bounds.center();
        let radius = self.pitch_to_geometry(note.pitch, ctx);
        let start_angle = self.time_to_geometry(note.start_time, ctx);
        let end_angle = self.time_to_geometry(note.end_time, ctx);

        match self.style {
            RadialStyle::Dots => Shape::Dot {
                center: polar_to_cartesian(center, radius, start_angle),
                radius: Self::sized(ctx, note, 2.0, 4.0, 3.0),
            },
            RadialStyle::Arcs => Shape::Arc {
                center,
                radius,
                start_angle,
                end_angle,
                thickness: Self::sized(ctx, note, 1.5, 3.0, 2.5),
            },
            RadialStyle::Particles => Shape::Dot {
                center: polar_to_cartesian(center, radius, start_angle),
                radius: Self::sized(ctx, note, 1.0, 2.0, 1.5),
            },
        }
    }

    /// Trailing dots after the head particle of a note.
    fn particle_trail(&self, note: &NoteInterval, ctx: &LayoutContext, guides: &mut Vec<Guide>) {
        let center = ctx.bounds.center();
        let radius = self.pitch_to_geometry(note.pitch, ctx);
        let start = self.time_to_geometry(note.start_time, ctx);
        let end = self.time_to_geometry(note.end_time, ctx);
        let count = (((end - start) * 10.0) as usize).clamp(3, MAX_PARTICLES);
        let size = Self::sized(ctx, note, 1.0, 2.0, 1.5);
        let color = ctx.note_color(note, GLOW);

        for i in 1..count {
            let angle = start + (end - start) * i as f64 / (count - 1) as f64;
            guides.push(Guide::Circle {
                center: polar_to_cartesian(center, radius, angle),
                radius: size,
                color,
            });
        }
    }

    /// Highlight for a sounding note: the elapsed part of its arc, a pulsing
    /// glow, and a bright head at the playback angle.
    fn active_marks(&self, note: &NoteInterval, ctx: &LayoutContext, overlays: &mut Vec<Guide>) {
        let center = ctx.bounds.center();
        let radius = self.pitch_to_geometry(note.pitch, ctx);
        let start = self.time_to_geometry(note.start_time, ctx);
        let now = self.time_to_geometry(ctx.position, ctx);
        let base = ctx.color_mode.note_color(note);
        let unit = Self::unit(ctx);

        let arc_color = base.brighter(0.3);
        // At most one full turn; positions past the end keep the ring closed.
        let sweep = (now - start).clamp(0.0, TAU);
        let steps = ((sweep / ARC_STEP).ceil() as usize).max(1);
        let mut prev = polar_to_cartesian(center, radius, start);
        for i in 1..=steps {
            let next = polar_to_cartesian(center, radius, start + sweep * i as f64 / steps as f64);
            overlays.push(Guide::Line {
                from: prev,
                to: next,
                color: arc_color,
            });
            prev = next;
        }

        let head = polar_to_cartesian(center, radius, now);
        overlays.push(Guide::Circle {
            center: head,
            radius: (7.5 + 5.0 * ctx.pulse) * unit,
            color: base.brighter(GLOW * ctx.pulse),
        });
        overlays.push(Guide::Circle {
            center: head,
            radius: Self::sized(ctx, note, 4.0, 6.0, 5.0),
            color: base.brighter(0.5),
        });
    }

    fn dial_guides(&self, ctx: &LayoutContext, guides: &mut Vec<Guide>) {
        let center = ctx.bounds.center();
        let inner = Self::inner_radius(ctx);
        let outer = Self::outer_radius(ctx);

        for i in 0..RING_COUNT {
            guides.push(Guide::Circle {
                center,
                radius: inner + (outer - inner) * i as f64 / (RING_COUNT - 1) as f64,
                color: GRID_COLOR,
            });
        }

        let mut angle = -FRAC_PI_2;
        while angle < TAU - FRAC_PI_2 - 1e-9 {
            guides.push(Guide::Line {
                from: polar_to_cartesian(center, inner, angle),
                to: polar_to_cartesian(center, outer, angle),
                color: GRID_COLOR,
            });
            angle += SPOKE_STEP;
        }
    }

    fn sweep(&self, ctx: &LayoutContext, overlays: &mut Vec<Guide>) {
        if ctx.total_duration <= 0.0 {
            return;
        }
        let center = ctx.bounds.center();
        let angle = self.time_to_geometry(ctx.position, ctx);
        let margin = ctx.bounds.min_side() * 0.04;
        let tip = polar_to_cartesian(center, Self::outer_radius(ctx) + margin, angle);
        overlays.push(Guide::Line {
            from: polar_to_cartesian(center, (Self::inner_radius(ctx) - margin).max(0.0), angle),
            to: tip,
            color: PLAYHEAD_COLOR,
        });
        overlays.push(Guide::Circle {
            center: tip,
            radius: 1.5 * Self::unit(ctx),
            color: PLAYHEAD_COLOR,
        });
    }
}

/// `mm:ss` for the dial centre.
fn clock_label(seconds: f64) -> String {
    let whole = seconds.max(0.0) as u64;
    format!("{:02}:{:02}", whole / 60, whole % 60)
}

impl TimelineLayout for RadialLayout {
    fn kind(&self) -> RendererKind {
        RendererKind::Radial
    }

    fn pulse_rate(&self) -> f64 {
        PULSE_RATE
    }

    /// Angle for `t` in radians, `-PI / 2` at the start.
    fn time_to_geometry(&self, t: f64, ctx: &LayoutContext) -> f64 {
        if ctx.total_duration <= 0.0 {
            return -FRAC_PI_2;
        }
        -FRAC_PI_2 + (t / ctx.total_duration) * TAU
    }

    /// Radius for `pitch`, from the inner ring at the low end to the outer ring.
    fn pitch_to_geometry(&self, pitch: i32, ctx: &LayoutContext) -> f64 {
        let inner = Self::inner_radius(ctx);
        let outer = Self::outer_radius(ctx);
        let fraction = (pitch - ctx.range.low) as f64 / ctx.range.span().max(1) as f64;
        inner + fraction * (outer - inner)
    }

    fn geometry_to_time(&self, point: Point, ctx: &LayoutContext) -> f64 {
        if ctx.total_duration <= 0.0 {
            return 0.0;
        }
        clockwise_angle_from_top(ctx.bounds.center(), point) / TAU * ctx.total_duration
    }

    fn layout_notes(&self, ctx: &LayoutContext) -> TimelineFrame {
        let mut guides = Vec::new();
        self.dial_guides(ctx, &mut guides);

        let mut notes = Vec::new();
        let mut overlays = Vec::new();
        for (index, note) in ctx.visible_notes() {
            let active = note.is_active_at(ctx.position);
            if self.style == RadialStyle::Particles {
                self.particle_trail(note, ctx, &mut guides);
            }
            notes.push(NoteShape {
                note_index: index,
                shape: self.note_shape(note, ctx),
                color: ctx.note_color(note, GLOW),
                active,
            });
            if active {
                self.active_marks(note, ctx, &mut overlays);
            }
        }

        self.sweep(ctx, &mut overlays);
        overlays.push(Guide::Label {
            at: ctx.bounds.center(),
            text: clock_label(ctx.position),
            color: GRID_COLOR,
        });

        TimelineFrame {
            bounds: ctx.bounds,
            guides,
            notes,
            overlays,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{Bounds, ColorMode, PitchRange};

    fn ctx<'a>(notes: &'a [NoteInterval], total: f64, position: f64) -> LayoutContext<'a> {
        LayoutContext {
            notes,
            total_duration: total,
            position,
            range: PitchRange { low: 48, high: 72 },
            bounds: Bounds::new(0.0, 0.0, 200.0, 200.0),
            color_mode: ColorMode::Velocity,
            pulse: 0.0,
        }
    }

    #[test]
    fn test_angle_mapping() {
        let layout = RadialLayout::default();
        let c = ctx(&[], 8.0, 0.0);
        assert_eq!(layout.time_to_geometry(0.0, &c), -FRAC_PI_2);
        assert!((layout.time_to_geometry(4.0, &c) - FRAC_PI_2).abs() < 1e-9);

        let empty = ctx(&[], 0.0, 0.0);
        assert_eq!(layout.time_to_geometry(3.0, &empty), -FRAC_PI_2);
    }

    #[test]
    fn test_radius_mapping() {
        let layout = RadialLayout::default();
        let c = ctx(&[], 8.0, 0.0);
        assert!((layout.pitch_to_geometry(48, &c) - 18.0).abs() < 1e-9);
        assert!((layout.pitch_to_geometry(72, &c) - 90.0).abs() < 1e-9);
        assert!((layout.pitch_to_geometry(60, &c) - 54.0).abs() < 1e-9);
    }

    #[test]
    fn test_hit_test_round_trip() {
        let layout = RadialLayout::default();
        let c = ctx(&[], 8.0, 0.0);
        // Straight down is half way.
        assert!((layout.geometry_to_time(Point::new(100.0, 180.0), &c) - 4.0).abs() < 1e-9);
        // Nine o'clock is three quarters.
        assert!((layout.geometry_to_time(Point::new(10.0, 100.0), &c) - 6.0).abs() < 1e-9);
        assert_eq!(layout.geometry_to_time(Point::new(10.0, 100.0), &ctx(&[], 0.0, 0.0)), 0.0);
    }

    #[test]
    fn test_arc_spans_duration() {
        let notes = [NoteInterval::new(2.0, 4.0, 60, 127, 0)];
        let layout = RadialLayout::new(RadialStyle::Arcs);
        let frame = layout.layout_notes(&ctx(&notes, 8.0, 0.0));
        match frame.notes[0].shape {
            Shape::Arc {
                start_angle,
                end_angle,
                ..
            } => {
                assert!(start_angle.abs() < 1e-9);
                assert!((end_angle - FRAC_PI_2).abs() < 1e-9);
            }
            other => panic!("unexpected shape {:?}", other),
        }
    }

    #[test]
    fn test_particles_leave_trail() {
        let notes = [NoteInterval::new(0.0, 4.0, 60, 100, 0)];
        let dots = RadialLayout::new(RadialStyle::Dots).layout_notes(&ctx(&notes, 8.0, 6.0));
        let particles =
            RadialLayout::new(RadialStyle::Particles).layout_notes(&ctx(&notes, 8.0, 6.0));
        assert_eq!(particles.notes.len(), 1);
        // Half a turn is about 31 particles; the head is the note shape.
        assert_eq!(particles.guides.len() - dots.guides.len(), 30);
    }

    #[test]
    fn test_sweep_and_clock() {
        let layout = RadialLayout::default();
        let frame = layout.layout_notes(&ctx(&[], 90.0, 75.4));
        assert_eq!(frame.overlays.len(), 3);
        assert!(matches!(
            frame.overlays.last(),
            Some(Guide::Label { text, .. }) if text == "01:15"
        ));

        let frame = layout.layout_notes(&ctx(&[], 0.0, 0.0));
        assert_eq!(frame.overlays.len(), 1);
    }

    #[test]
    fn test_elapsed_arc_stops_after_one_turn() {
        let notes = [NoteInterval::new(0.0, 1000.0, 60, 100, 0)];
        let layout = RadialLayout::default();
        let frame = layout.layout_notes(&ctx(&notes, 1.0, 500.0));
        let max_segments = (TAU / ARC_STEP).ceil() as usize;
        // Segments, two head circles, sweep and clock.
        assert!(frame.overlays.len() <= max_segments + 5);
        assert!(frame.overlays.len() > 3);
    }

    #[test]
    fn test_dial_has_rings_and_spokes() {
        let frame = RadialLayout::default().layout_notes(&ctx(&[], 8.0, 0.0));
        assert_eq!(frame.guides.len(), RING_COUNT + 12);
    }

    #[test]
    fn test_style_names() {
        assert_eq!(RadialStyle::from_name("ARCS"), Some(RadialStyle::Arcs));
        assert_eq!(RadialStyle::Particles.next(), RadialStyle::Dots);
        assert_eq!(RadialStyle::default().name(), "Dots");
    }
}
