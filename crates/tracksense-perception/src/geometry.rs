//! Planar geometry for the sensor model.
//!
//! Everything here works in `f64`; inputs arrive as `f32` off the bus and are
//! widened once at the edge.
//!
//! # Example
//!
//! ```rust
//! use tracksense_perception::geometry::{Vec2, world_to_body};
//!
//! // A cone 1 m north of a car that faces north sits dead ahead.
//! let ahead = world_to_body(Vec2::new(0.0, 1.0), std::f64::consts::FRAC_PI_2);
//! assert!((ahead.x - 1.0).abs() < 1e-9);
//! assert!(ahead.y.abs() < 1e-9);
//! ```

/// A 2-D vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }

    /// Scale both components by `1 / divisor`.
    pub fn div(self, divisor: f64) -> Self {
        Self::new(self.x / divisor, self.y / divisor)
    }

    /// Counter-clockwise rotation by `angle_rad`.
    pub fn rotate(self, angle_rad: f64) -> Self {
        let (sin, cos) = angle_rad.sin_cos();
        Self::new(self.x * cos - self.y * sin, self.x * sin + self.y * cos)
    }

    /// Euclidean length.
    pub fn norm(self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Angle from +X, in `(-π, π]`.
    pub fn bearing(self) -> f64 {
        self.y.atan2(self.x)
    }
}

/// Express a world-frame offset in the body frame of a vehicle with the given
/// heading (+X forward, +Y left).
pub fn world_to_body(offset: Vec2, heading_rad: f64) -> Vec2 {
    offset.rotate(-heading_rad)
}
