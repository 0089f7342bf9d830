//! Plane geometry shared by the timeline layouts.
//!
//! Coordinates are abstract drawing units with the origin at the top-left
//! and y growing downward. The terminal front end maps one unit to one
//! braille dot.

use std::f64::consts::FRAC_PI_2;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// An axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn min_side(&self) -> f64 {
        self.width.min(self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Half-open containment: the right and bottom edges are outside.
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x < self.right() && p.y >= self.y && p.y < self.bottom()
    }

    /// Splits off a strip of `width` from the left edge.
    pub fn split_left(&self, width: f64) -> (Bounds, Bounds) {
        let width = width.clamp(0.0, self.width.max(0.0));
        (
            Bounds::new(self.x, self.y, width, self.height),
            Bounds::new(self.x + width, self.y, self.width - width, self.height),
        )
    }
}

/// Point at `radius` along `angle` from `center`.
///
/// Angle 0 points right and angles grow clockwise on screen, so
/// `-PI / 2` is straight up.
pub fn polar_to_cartesian(center: Point, radius: f64, angle: f64) -> Point {
    Point::new(
        center.x + radius * angle.cos(),
        center.y + radius * angle.sin(),
    )
}

/// Angle of `p` around `center`, normalized to start at the top and grow
/// clockwise through `[0, 2*PI)`.
pub fn clockwise_angle_from_top(center: Point, p: Point) -> f64 {
    let raw = (p.y - center.y).atan2(p.x - center.x);
    (raw + FRAC_PI_2).rem_euclid(std::f64::consts::TAU)
}

pub(crate) fn clamp01(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_polar_top_is_up() {
        let c = Point::new(50.0, 50.0);
        let p = polar_to_cartesian(c, 10.0, -FRAC_PI_2);
        assert!((p.x - 50.0).abs() < 1e-9);
        assert!((p.y - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_clockwise_angle() {
        let c = Point::new(0.0, 0.0);
        assert!(clockwise_angle_from_top(c, Point::new(0.0, -5.0)).abs() < 1e-9);
        assert!((clockwise_angle_from_top(c, Point::new(5.0, 0.0)) - FRAC_PI_2).abs() < 1e-9);
        assert!((clockwise_angle_from_top(c, Point::new(0.0, 5.0)) - PI).abs() < 1e-9);
        assert!((clockwise_angle_from_top(c, Point::new(-5.0, 0.0)) - 1.5 * PI).abs() < 1e-9);
    }

    #[test]
    fn test_bounds_split_and_contains() {
        let b = Bounds::new(0.0, 0.0, 100.0, 40.0);
        let (strip, rest) = b.split_left(10.0);
        assert_eq!(strip.width, 10.0);
        assert_eq!(rest.x, 10.0);
        assert_eq!(rest.width, 90.0);
        assert!(b.contains(Point::new(0.0, 0.0)));
        assert!(!b.contains(Point::new(100.0, 10.0)));
    }
}
