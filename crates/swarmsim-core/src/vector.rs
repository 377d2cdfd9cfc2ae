//! Plain 2D vector arithmetic used by every rule and metric.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub};

/// Two-component value type in arena space.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Vector2D {
    pub x: f32,
    pub y: f32,
}

impl Vector2D {
    /// The zero vector.
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    /// Construct a new vector.
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn magnitude_sq(self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    /// Euclidean length; stays finite for any finite vector.
    #[must_use]
    pub fn magnitude(self) -> f32 {
        self.x.hypot(self.y)
    }

    /// Unit vector in the same direction, or zero when the length is zero.
    #[must_use]
    pub fn normalize(self) -> Self {
        let mag = self.magnitude();
        if mag > 0.0 && mag.is_finite() {
            Self::new(self.x / mag, self.y / mag)
        } else {
            Self::ZERO
        }
    }

    /// Rescale to `magnitude`, keeping direction. Zero stays zero.
    #[must_use]
    pub fn with_magnitude(self, magnitude: f32) -> Self {
        self.normalize() * magnitude
    }

    /// Clamp the length to at most `max`.
    #[must_use]
    pub fn limit(self, max: f32) -> Self {
        if self.magnitude_sq() > max * max {
            self.with_magnitude(max)
        } else {
            self
        }
    }

    #[must_use]
    pub fn distance_sq(self, other: Self) -> f32 {
        (self - other).magnitude_sq()
    }

    #[must_use]
    pub fn distance(self, other: Self) -> f32 {
        (self - other).magnitude()
    }

    #[must_use]
    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y
    }

    /// Z component of the 3D cross product; positive means `other` lies counter-clockwise.
    #[must_use]
    pub fn cross(self, other: Self) -> f32 {
        self.x * other.y - self.y * other.x
    }

    /// Cosine of the angle between two vectors, 0 when either is zero-length.
    #[must_use]
    pub fn cosine_similarity(self, other: Self) -> f32 {
        self.normalize()
            .dot(other.normalize())
            .clamp(-1.0, 1.0)
    }

    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Tuple form consumed by the neighborhood index.
    #[must_use]
    pub const fn as_tuple(self) -> (f32, f32) {
        (self.x, self.y)
    }
}

impl Add for Vector2D {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vector2D {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vector2D {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vector2D {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

impl Div<f32> for Vector2D {
    type Output = Self;

    fn div(self, rhs: f32) -> Self {
        Self::new(self.x / rhs, self.y / rhs)
    }
}

impl Neg for Vector2D {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_zero_is_zero() {
        assert_eq!(Vector2D::ZERO.normalize(), Vector2D::ZERO);
        assert_eq!(Vector2D::ZERO.with_magnitude(4.0), Vector2D::ZERO);
    }

    #[test]
    fn limit_only_shrinks() {
        let v = Vector2D::new(3.0, 4.0);
        assert_eq!(v.limit(10.0), v);
        let limited = v.limit(1.0);
        assert!((limited.magnitude() - 1.0).abs() < 1e-6);
        assert!((limited.x - 0.6).abs() < 1e-6);
    }

    #[test]
    fn huge_finite_vectors_keep_their_direction() {
        let v = Vector2D::new(1e20, 1e20);
        assert!(v.magnitude().is_finite());
        let limited = v.limit(4.0);
        assert!((limited.magnitude() - 4.0).abs() < 1e-5);
        assert!((limited.x - limited.y).abs() < 1e-6);
        assert!((v.cosine_similarity(Vector2D::new(1.0, 1.0)) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cross_sign_tracks_rotation() {
        let radial = Vector2D::new(1.0, 0.0);
        assert!(radial.cross(Vector2D::new(0.0, 1.0)) > 0.0);
        assert!(radial.cross(Vector2D::new(0.0, -1.0)) < 0.0);
    }

    #[test]
    fn cosine_similarity_guards_zero() {
        let v = Vector2D::new(1.0, 1.0);
        assert_eq!(v.cosine_similarity(Vector2D::ZERO), 0.0);
        assert!((v.cosine_similarity(v * 3.0) - 1.0).abs() < 1e-6);
        assert!((v.cosine_similarity(-v) + 1.0).abs() < 1e-6);
    }
}
