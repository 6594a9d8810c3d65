// Homogeneous transforms for scene descriptions.
//
// Transforms are kept in double precision alongside their inverse since
// descriptions carry f64 values; shapes narrow to f32 when they need to.

use std::ops::Mul;

use glam::{DMat4, DQuat, DVec3, Vec3};

use crate::Aabb;

/// A 4x4 homogeneous transform with its cached inverse.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    matrix: DMat4,
    inverse: DMat4,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        matrix: DMat4::IDENTITY,
        inverse: DMat4::IDENTITY,
    };

    /// Wrap a matrix, computing its inverse.
    pub fn new(matrix: DMat4) -> Self {
        Self {
            matrix,
            inverse: matrix.inverse(),
        }
    }

    /// Build from 16 values in row-major order, as written in descriptions.
    pub fn from_rows(values: &[f64; 16]) -> Self {
        Self::new(DMat4::from_cols_array(values).transpose())
    }

    pub fn translate(offset: DVec3) -> Self {
        Self {
            matrix: DMat4::from_translation(offset),
            inverse: DMat4::from_translation(-offset),
        }
    }

    pub fn scale(factors: DVec3) -> Self {
        Self::new(DMat4::from_scale(factors))
    }

    /// Rotation of `angle` degrees around `axis`.
    pub fn rotate(axis: DVec3, angle: f64) -> Self {
        let rotation = DMat4::from_axis_angle(axis.normalize(), angle.to_radians());
        Self {
            matrix: rotation,
            inverse: rotation.transpose(),
        }
    }

    /// Camera-to-world transform looking from `origin` towards `target`.
    pub fn look_at(origin: DVec3, target: DVec3, up: DVec3) -> Self {
        let world_to_camera = DMat4::look_at_rh(origin, target, up);
        Self {
            matrix: world_to_camera.inverse(),
            inverse: world_to_camera,
        }
    }

    pub fn matrix(&self) -> DMat4 {
        self.matrix
    }

    pub fn inverse_matrix(&self) -> DMat4 {
        self.inverse
    }

    pub fn inverse(&self) -> Transform {
        Self {
            matrix: self.inverse,
            inverse: self.matrix,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.matrix == DMat4::IDENTITY
    }

    pub fn transform_point(&self, p: DVec3) -> DVec3 {
        self.matrix.transform_point3(p)
    }

    /// Transform a direction (w = 0, translation ignored).
    pub fn transform_vector(&self, v: DVec3) -> DVec3 {
        self.matrix.transform_vector3(v)
    }

    /// Single precision point transform used by shapes.
    pub fn transform_point_f32(&self, p: Vec3) -> Vec3 {
        self.transform_point(p.as_dvec3()).as_vec3()
    }

    /// Bounds of the eight transformed corners.
    pub fn transform_aabb(&self, aabb: &Aabb) -> Aabb {
        if aabb.is_empty() {
            return *aabb;
        }
        aabb.corners()
            .iter()
            .fold(Aabb::EMPTY, |acc, &corner| {
                acc.include(self.transform_point_f32(corner))
            })
    }

    /// Split into scale, rotation and translation.
    pub fn decompose(&self) -> (DVec3, DQuat, DVec3) {
        self.matrix.to_scale_rotation_translation()
    }
}

impl Mul for Transform {
    type Output = Transform;

    /// `a * b` applies `b` first, then `a`.
    fn mul(self, rhs: Transform) -> Transform {
        Transform {
            matrix: self.matrix * rhs.matrix,
            inverse: rhs.inverse * self.inverse,
        }
    }
}

/// One sample of an animated transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keyframe {
    pub time: f64,
    pub transform: Transform,
}

/// A transform sampled at increasing times.
///
/// Evaluation interpolates the decomposed scale, rotation (slerp) and
/// translation of the two surrounding keyframes and clamps outside the
/// sampled range. An empty animation evaluates to the identity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnimatedTransform {
    keyframes: Vec<Keyframe>,
}

impl AnimatedTransform {
    pub fn new() -> Self {
        Self::default()
    }

    /// A single keyframe at time zero.
    pub fn constant(transform: Transform) -> Self {
        Self {
            keyframes: vec![Keyframe {
                time: 0.0,
                transform,
            }],
        }
    }

    /// Insert a keyframe, keeping the list sorted. A keyframe at an existing
    /// time replaces the old one.
    pub fn append(&mut self, time: f64, transform: Transform) {
        match self
            .keyframes
            .binary_search_by(|k| k.time.total_cmp(&time))
        {
            Ok(index) => self.keyframes[index].transform = transform,
            Err(index) => self.keyframes.insert(index, Keyframe { time, transform }),
        }
    }

    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keyframes
    }

    pub fn is_animated(&self) -> bool {
        self.keyframes.len() > 1
    }

    /// Time span covered by the keyframes.
    pub fn time_bounds(&self) -> Option<(f64, f64)> {
        let first = self.keyframes.first()?;
        let last = self.keyframes.last()?;
        Some((first.time, last.time))
    }

    pub fn eval(&self, time: f64) -> Transform {
        let (first, last) = match (self.keyframes.first(), self.keyframes.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Transform::IDENTITY,
        };
        if time <= first.time {
            return first.transform;
        }
        if time >= last.time {
            return last.transform;
        }

        // First keyframe strictly after `time`; guaranteed to be > 0.
        let upper = self.keyframes.partition_point(|k| k.time <= time);
        let a = &self.keyframes[upper - 1];
        let b = &self.keyframes[upper];
        let t = (time - a.time) / (b.time - a.time);

        let (scale_a, rot_a, trans_a) = a.transform.decompose();
        let (scale_b, rot_b, trans_b) = b.transform.decompose();
        Transform::new(DMat4::from_scale_rotation_translation(
            scale_a.lerp(scale_b, t),
            rot_a.slerp(rot_b, t),
            trans_a.lerp(trans_b, t),
        ))
    }
}

impl From<Transform> for AnimatedTransform {
    fn from(transform: Transform) -> Self {
        Self::constant(transform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: DVec3, b: DVec3) -> bool {
        (a - b).length() < 1e-6
    }

    #[test]
    fn test_translate_and_inverse() {
        let t = Transform::translate(DVec3::new(10.0, 20.0, 30.0));
        let p = DVec3::new(1.0, 2.0, 3.0);

        assert_eq!(t.transform_point(p), DVec3::new(11.0, 22.0, 33.0));
        assert_eq!(t.inverse().transform_point(t.transform_point(p)), p);
        assert_eq!(t.transform_vector(DVec3::X), DVec3::X);
    }

    #[test]
    fn test_from_rows_is_row_major() {
        let rows = [
            1.0, 0.0, 0.0, 5.0, //
            0.0, 1.0, 0.0, 6.0, //
            0.0, 0.0, 1.0, 7.0, //
            0.0, 0.0, 0.0, 1.0,
        ];
        let t = Transform::from_rows(&rows);
        assert_eq!(t.transform_point(DVec3::ZERO), DVec3::new(5.0, 6.0, 7.0));
    }

    #[test]
    fn test_rotation_composition_order() {
        let rotate = Transform::rotate(DVec3::Z, 90.0);
        let translate = Transform::translate(DVec3::new(1.0, 0.0, 0.0));

        // Rotate first, then translate.
        let p = (translate * rotate).transform_point(DVec3::X);
        assert!(approx(p, DVec3::new(1.0, 1.0, 0.0)));
    }

    #[test]
    fn test_transform_aabb_translation() {
        let t = Transform::translate(DVec3::splat(5.0));
        let aabb = Aabb::from_points(Vec3::ZERO, Vec3::ONE);
        let moved = t.transform_aabb(&aabb);

        assert!((moved.min() - Vec3::splat(5.0)).length() < 1e-4);
        assert!((moved.max() - Vec3::splat(6.0)).length() < 1e-4);
        assert!(t.transform_aabb(&Aabb::EMPTY).is_empty());
    }

    #[test]
    fn test_animated_transform_interpolates_translation() {
        let mut anim = AnimatedTransform::new();
        anim.append(1.0, Transform::translate(DVec3::new(10.0, 0.0, 0.0)));
        anim.append(0.0, Transform::IDENTITY);

        assert!(anim.is_animated());
        assert_eq!(anim.time_bounds(), Some((0.0, 1.0)));

        let mid = anim.eval(0.5).transform_point(DVec3::ZERO);
        assert!(approx(mid, DVec3::new(5.0, 0.0, 0.0)));

        // Clamped outside the sampled range
        let before = anim.eval(-3.0).transform_point(DVec3::ZERO);
        assert!(approx(before, DVec3::ZERO));
        let after = anim.eval(4.0).transform_point(DVec3::ZERO);
        assert!(approx(after, DVec3::new(10.0, 0.0, 0.0)));
    }

    #[test]
    fn test_animated_transform_replaces_equal_time() {
        let mut anim = AnimatedTransform::constant(Transform::IDENTITY);
        anim.append(0.0, Transform::scale(DVec3::splat(2.0)));

        assert_eq!(anim.keyframes().len(), 1);
        assert!(!anim.is_animated());
        assert_eq!(AnimatedTransform::new().eval(1.0), Transform::IDENTITY);
    }
}
