//! Timeline canvas.
//!
//! Draws a [`TimelineFrame`] with braille markers. Timeline coordinates are
//! braille dots with y growing downward; the canvas has y growing upward, so
//! every point is flipped on the way in.

use crate::app::App;
use crate::render::{polar_to_cartesian, Bounds, Guide, Point, Rgb, Shape, TimelineFrame};
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::symbols::Marker;
use ratatui::text::Span;
use ratatui::widgets::canvas::{Canvas, Circle, Context, Line as CanvasLine, Points};
use ratatui::widgets::{Block, Borders};
use ratatui::Frame;

/// Braille dots per terminal cell.
pub const DOTS_PER_COLUMN: f64 = 2.0;
pub const DOTS_PER_ROW: f64 = 4.0;

/// Timeline bounds covering a canvas of `area` cells.
pub fn bounds_for(area: Rect) -> Bounds {
    Bounds::new(
        0.0,
        0.0,
        area.width as f64 * DOTS_PER_COLUMN,
        area.height as f64 * DOTS_PER_ROW,
    )
}

/// Timeline point under the centre of the cell at (`column`, `row`).
///
/// Returns None when the cell lies outside `area`.
pub fn cell_to_point(area: Rect, column: u16, row: u16) -> Option<Point> {
    let inside = column >= area.x
        && column < area.x + area.width
        && row >= area.y
        && row < area.y + area.height;
    if !inside {
        return None;
    }
    Some(Point::new(
        (column - area.x) as f64 * DOTS_PER_COLUMN + DOTS_PER_COLUMN / 2.0,
        (row - area.y) as f64 * DOTS_PER_ROW + DOTS_PER_ROW / 2.0,
    ))
}

fn color(rgb: Rgb) -> Color {
    Color::Rgb(rgb.0, rgb.1, rgb.2)
}

struct Painter {
    height: f64,
}

impl Painter {
    fn flip(&self, p: Point) -> (f64, f64) {
        (p.x, self.height - p.y)
    }

    fn line(&self, ctx: &mut Context, from: Point, to: Point, rgb: Rgb) {
        let (x1, y1) = self.flip(from);
        let (x2, y2) = self.flip(to);
        ctx.draw(&CanvasLine {
            x1,
            y1,
            x2,
            y2,
            color: color(rgb),
        });
    }

    /// Solid rectangle, one horizontal line per dot row.
    fn fill(&self, ctx: &mut Context, bounds: Bounds, rgb: Rgb) {
        let mut y = bounds.y;
        while y <= bounds.bottom() {
            self.line(
                ctx,
                Point::new(bounds.x, y),
                Point::new(bounds.right(), y),
                rgb,
            );
            y += 1.0;
        }
    }

    /// Solid disc built from concentric rings.
    fn disc(&self, ctx: &mut Context, center: Point, radius: f64, rgb: Rgb) {
        let (x, y) = self.flip(center);
        let mut r = radius;
        while r > 0.5 {
            ctx.draw(&Circle {
                x,
                y,
                radius: r,
                color: color(rgb),
            });
            r -= 1.0;
        }
        ctx.draw(&Points {
            coords: &[(x, y)],
            color: color(rgb),
        });
    }

    fn arc(
        &self,
        ctx: &mut Context,
        center: Point,
        radius: f64,
        (start_angle, end_angle): (f64, f64),
        thickness: f64,
        rgb: Rgb,
    ) {
        let sweep = (end_angle - start_angle).max(0.0);
        let steps = ((sweep * radius).ceil() as usize).clamp(2, 512);
        let half = (thickness / 2.0).max(0.5);
        let mut coords = Vec::with_capacity(steps * 3);
        let mut r = radius - half;
        while r <= radius + half {
            for i in 0..=steps {
                let angle = start_angle + sweep * i as f64 / steps as f64;
                coords.push(self.flip(polar_to_cartesian(center, r, angle)));
            }
            r += 1.0;
        }
        ctx.draw(&Points {
            coords: &coords,
            color: color(rgb),
        });
    }

    fn guide(&self, ctx: &mut Context, guide: &Guide) {
        match guide {
            Guide::Line { from, to, color } => self.line(ctx, *from, *to, *color),
            Guide::Fill { bounds, color } => self.fill(ctx, *bounds, *color),
            Guide::Circle {
                center,
                radius,
                color: rgb,
            } => {
                let (x, y) = self.flip(*center);
                ctx.draw(&Circle {
                    x,
                    y,
                    radius: *radius,
                    color: color(*rgb),
                });
            }
            Guide::Label { at, text, color: rgb } => {
                let (x, y) = self.flip(*at);
                ctx.print(
                    x,
                    y,
                    Span::styled(text.clone(), Style::default().fg(color(*rgb))),
                );
            }
        }
    }

    fn shape(&self, ctx: &mut Context, shape: &Shape, rgb: Rgb) {
        match *shape {
            Shape::Rect(bounds) => self.fill(ctx, bounds, rgb),
            Shape::Dot { center, radius } => self.disc(ctx, center, radius, rgb),
            Shape::Arc {
                center,
                radius,
                start_angle,
                end_angle,
                thickness,
            } => self.arc(ctx, center, radius, (start_angle, end_angle), thickness, rgb),
        }
    }
}

/// Paints guides, then notes, then overlays, each on its own layer.
fn paint(ctx: &mut Context, frame: &TimelineFrame) {
    let painter = Painter {
        height: frame.bounds.height,
    };
    for guide in &frame.guides {
        painter.guide(ctx, guide);
    }
    ctx.layer();
    for note in &frame.notes {
        painter.shape(ctx, &note.shape, note.color);
    }
    ctx.layer();
    for overlay in &frame.overlays {
        painter.guide(ctx, overlay);
    }
}

/// Renders the timeline into `area` and records the inner canvas rect for
/// mouse hit-testing.
pub fn render_timeline_canvas(frame: &mut Frame, area: Rect, app: &mut App) {
    let title = format!(
        " {} | {} ",
        app.timeline.kind().name(),
        app.timeline.color_mode().name()
    );
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Gray));

    let inner = block.inner(area);
    app.set_canvas_area(inner);

    let timeline_frame = app.timeline.frame();
    let bounds = timeline_frame.bounds;
    let canvas = Canvas::default()
        .block(block)
        .marker(Marker::Braille)
        .background_color(Color::Reset)
        .x_bounds([0.0, bounds.width.max(1.0)])
        .y_bounds([0.0, bounds.height.max(1.0)])
        .paint(move |ctx| paint(ctx, &timeline_frame));
    frame.render_widget(canvas, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_in_braille_dots() {
        let bounds = bounds_for(Rect::new(3, 4, 50, 20));
        assert_eq!(bounds, Bounds::new(0.0, 0.0, 100.0, 80.0));
    }

    #[test]
    fn test_cell_to_point() {
        let area = Rect::new(1, 3, 10, 5);
        assert_eq!(cell_to_point(area, 1, 3), Some(Point::new(1.0, 2.0)));
        assert_eq!(cell_to_point(area, 5, 4), Some(Point::new(9.0, 6.0)));
        assert_eq!(cell_to_point(area, 0, 3), None);
        assert_eq!(cell_to_point(area, 11, 3), None);
        assert_eq!(cell_to_point(area, 2, 8), None);
    }

    #[test]
    fn test_points_flip_vertically() {
        let painter = Painter { height: 80.0 };
        assert_eq!(painter.flip(Point::new(4.0, 0.0)), (4.0, 80.0));
        assert_eq!(painter.flip(Point::new(4.0, 80.0)), (4.0, 0.0));
    }
}
