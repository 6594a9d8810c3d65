// Re-export glam for convenience
pub use glam::*;

// LUX math types
mod aabb;
mod color;
mod interval;
mod ray;
mod real;
mod transform;

pub use aabb::Aabb;
pub use color::Color;
pub use interval::Interval;
pub use ray::Ray;
pub use real::Real;
pub use transform::{AnimatedTransform, Keyframe, Transform};
