//! 2D geometry helpers shared by movement and collision
//!
//! Everything here works in arena space: origin top-left, +y down.

use glam::Vec2;
use std::f32::consts::PI;

use crate::wrap_angle;

/// Closest point to `p` on segment AB
#[inline]
pub fn closest_point_on_segment(a: Vec2, b: Vec2, p: Vec2) -> Vec2 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq < 1e-8 {
        return a; // Degenerate segment
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    a + ab * t
}

/// Shortest distance from `p` to segment AB
#[inline]
pub fn segment_point_distance(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (p - closest_point_on_segment(a, b, p)).length()
}

/// Two circles touch or overlap
#[inline]
pub fn circles_overlap(a: Vec2, ra: f32, b: Vec2, rb: f32) -> bool {
    a.distance_squared(b) <= (ra + rb) * (ra + rb)
}

/// Reflect a velocity off a surface with unit normal `n`
#[inline]
pub fn reflect(vel: Vec2, normal: Vec2) -> Vec2 {
    vel - 2.0 * vel.dot(normal) * normal
}

/// Which wall(s) a bounce hit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Bounce {
    pub x: bool,
    pub y: bool,
}

impl Bounce {
    pub fn any(self) -> bool {
        self.x || self.y
    }
}

/// Axis-aligned rectangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Vec2,
    pub max: Vec2,
}

impl Bounds {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            min: Vec2::ZERO,
            max: Vec2::new(width, height),
        }
    }

    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    /// Shrink by `margin` on every side (negative grows)
    pub fn inset(&self, margin: f32) -> Self {
        Self {
            min: self.min + Vec2::splat(margin),
            max: self.max - Vec2::splat(margin),
        }
    }

    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    pub fn clamp(&self, p: Vec2) -> Vec2 {
        p.clamp(self.min, self.max)
    }

    /// Bounce a heading off the walls.
    ///
    /// Only reflects when the point is outside *and* moving further out, so
    /// something entering from beyond the edge is left alone. Reflected points
    /// are clamped back onto the wall.
    pub fn bounce_heading(&self, pos: &mut Vec2, heading: &mut f32) -> Bounce {
        let dir = Vec2::new(heading.cos(), heading.sin());
        let mut bounce = Bounce::default();

        if (pos.x < self.min.x && dir.x < 0.0) || (pos.x > self.max.x && dir.x > 0.0) {
            pos.x = pos.x.clamp(self.min.x, self.max.x);
            *heading = PI - *heading;
            bounce.x = true;
        }
        if (pos.y < self.min.y && dir.y < 0.0) || (pos.y > self.max.y && dir.y > 0.0) {
            pos.y = pos.y.clamp(self.min.y, self.max.y);
            *heading = -*heading;
            bounce.y = true;
        }
        if bounce.any() {
            *heading = wrap_angle(*heading);
        }
        bounce
    }

    /// Bounce a velocity off the walls (same outward-only rule)
    pub fn bounce_velocity(&self, pos: &mut Vec2, vel: &mut Vec2) -> Bounce {
        let mut bounce = Bounce::default();
        if (pos.x < self.min.x && vel.x < 0.0) || (pos.x > self.max.x && vel.x > 0.0) {
            pos.x = pos.x.clamp(self.min.x, self.max.x);
            *vel = reflect(*vel, Vec2::X);
            bounce.x = true;
        }
        if (pos.y < self.min.y && vel.y < 0.0) || (pos.y > self.max.y && vel.y > 0.0) {
            pos.y = pos.y.clamp(self.min.y, self.max.y);
            *vel = reflect(*vel, Vec2::Y);
            bounce.y = true;
        }
        bounce
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_point_distance() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(10.0, 0.0);
        assert!((segment_point_distance(a, b, Vec2::new(5.0, 3.0)) - 3.0).abs() < 1e-5);
        // Past the end clamps to the endpoint
        assert!((segment_point_distance(a, b, Vec2::new(13.0, 4.0)) - 5.0).abs() < 1e-5);
        // Degenerate segment behaves like a point
        assert!((segment_point_distance(a, a, Vec2::new(3.0, 4.0)) - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_circles_overlap_touching_counts() {
        assert!(circles_overlap(Vec2::ZERO, 5.0, Vec2::new(10.0, 0.0), 5.0));
        assert!(!circles_overlap(Vec2::ZERO, 5.0, Vec2::new(10.1, 0.0), 5.0));
    }

    #[test]
    fn test_reflect() {
        let v = reflect(Vec2::new(100.0, 0.0), Vec2::new(-1.0, 0.0));
        assert!((v.x + 100.0).abs() < 1e-4);
        assert!(v.y.abs() < 1e-4);
    }

    #[test]
    fn test_bounce_heading_reflects_outward_motion() {
        let bounds = Bounds::new(100.0, 100.0);
        let mut pos = Vec2::new(-2.0, 50.0);
        let mut heading = PI; // moving left, out of the arena
        let bounce = bounds.bounce_heading(&mut pos, &mut heading);
        assert!(bounce.x && !bounce.y);
        assert_eq!(pos.x, 0.0);
        assert!(heading.cos() > 0.99);
    }

    #[test]
    fn test_bounce_heading_ignores_entering_motion() {
        let bounds = Bounds::new(100.0, 100.0);
        let mut pos = Vec2::new(50.0, -20.0);
        let mut heading = PI / 2.0; // moving down, into the arena
        let bounce = bounds.bounce_heading(&mut pos, &mut heading);
        assert!(!bounce.any());
        assert_eq!(pos, Vec2::new(50.0, -20.0));
        assert_eq!(heading, PI / 2.0);
    }

    #[test]
    fn test_bounce_velocity() {
        let bounds = Bounds::new(100.0, 100.0);
        let mut pos = Vec2::new(50.0, 101.0);
        let mut vel = Vec2::new(3.0, 4.0);
        bounds.bounce_velocity(&mut pos, &mut vel);
        assert_eq!(pos.y, 100.0);
        assert_eq!(vel, Vec2::new(3.0, -4.0));
    }
}
