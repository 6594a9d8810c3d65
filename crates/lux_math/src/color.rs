//! Linear RGB color.

use std::fmt;
use std::ops::{Add, Mul};

use crate::Vec3;

/// Linear RGB triple.
///
/// Kept distinct from `Vec3` so that scene descriptions can tell a color
/// parameter apart from a position or direction.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0);
    pub const WHITE: Color = Color::new(1.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// A gray level, used when a description gives a single number.
    pub const fn gray(value: f32) -> Self {
        Self::new(value, value, value)
    }

    pub fn is_black(&self) -> bool {
        self.r == 0.0 && self.g == 0.0 && self.b == 0.0
    }

    /// Rec. 709 luminance.
    pub fn luminance(&self) -> f32 {
        0.212671 * self.r + 0.715160 * self.g + 0.072169 * self.b
    }

    pub fn max_component(&self) -> f32 {
        self.r.max(self.g).max(self.b)
    }

    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(self.r, self.g, self.b)
    }
}

impl From<Vec3> for Color {
    fn from(v: Vec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

impl From<[f32; 3]> for Color {
    fn from(v: [f32; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

impl Add for Color {
    type Output = Color;

    fn add(self, rhs: Color) -> Color {
        Color::new(self.r + rhs.r, self.g + rhs.g, self.b + rhs.b)
    }
}

impl Mul<f32> for Color {
    type Output = Color;

    fn mul(self, rhs: f32) -> Color {
        Color::new(self.r * rhs, self.g * rhs, self.b * rhs)
    }
}

impl Mul for Color {
    type Output = Color;

    fn mul(self, rhs: Color) -> Color {
        Color::new(self.r * rhs.r, self.g * rhs.g, self.b * rhs.b)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}]", self.r, self.g, self.b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_luminance_of_white_is_one() {
        assert!((Color::WHITE.luminance() - 1.0).abs() < 1e-5);
        assert!(Color::BLACK.is_black());
    }

    #[test]
    fn test_color_arithmetic() {
        let c = Color::new(0.5, 0.25, 1.0) * 2.0;
        assert_eq!(c, Color::new(1.0, 0.5, 2.0));
        assert_eq!(c.max_component(), 2.0);
        assert_eq!(Color::gray(0.5) * Color::new(2.0, 0.0, 1.0), Color::new(1.0, 0.0, 0.5));
    }
}
