use crate::Vec3;

/// Half-line used by shape and scene intersection queries.
///
/// `time` picks the sample of an animated `to_world` the ray sees. Shapes
/// report hits as the parameter `t` with the hit point at [`Ray::at`].
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
    pub time: f32,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3, time: f32) -> Self {
        Self {
            origin,
            direction,
            time,
        }
    }

    /// `origin + t * direction`. The direction is not normalized, so `t` is
    /// in units of its length.
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}
