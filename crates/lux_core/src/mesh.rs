//! Triangle mesh data shared by mesh-based shape plugins.
//!
//! Mesh loaders fill a [`Mesh`] in object space; shapes transform it to
//! world space once at construction.

use lux_math::{Aabb, Transform, Vec3};

/// An indexed triangle mesh.
#[derive(Clone, Debug, Default)]
pub struct Mesh {
    /// Vertex positions
    pub positions: Vec<Vec3>,

    /// Per-vertex normals, if known
    pub normals: Option<Vec<Vec3>>,

    /// Per-vertex texture coordinates, if known
    pub uvs: Option<Vec<[f32; 2]>>,

    /// Triangle indices, three per face
    pub indices: Vec<u32>,

    pub bounds: Aabb,
}

impl Mesh {
    pub fn new(positions: Vec<Vec3>, indices: Vec<u32>) -> Self {
        let bounds = Self::compute_bounds(&positions);
        Self {
            positions,
            normals: None,
            uvs: None,
            indices,
            bounds,
        }
    }

    /// Attach normals; ignored unless there is one per vertex.
    pub fn with_normals(mut self, normals: Vec<Vec3>) -> Self {
        if normals.len() == self.positions.len() {
            self.normals = Some(normals);
        } else {
            log::debug!(
                "dropping {} normals for a mesh with {} vertices",
                normals.len(),
                self.positions.len()
            );
        }
        self
    }

    /// Attach texture coordinates; ignored unless there is one per vertex.
    pub fn with_uvs(mut self, uvs: Vec<[f32; 2]>) -> Self {
        if uvs.len() == self.positions.len() {
            self.uvs = Some(uvs);
        }
        self
    }

    fn compute_bounds(positions: &[Vec3]) -> Aabb {
        positions
            .iter()
            .fold(Aabb::EMPTY, |bounds, &p| bounds.include(p))
    }

    /// Smooth normals from area-weighted face normals (counter-clockwise
    /// winding).
    pub fn compute_normals(&mut self) {
        let mut normals = vec![Vec3::ZERO; self.positions.len()];
        for face in 0..self.triangle_count() {
            let Some([p0, p1, p2]) = self.triangle(face) else {
                continue;
            };
            let face_normal = (p1 - p0).cross(p2 - p0);
            for &i in &self.indices[face * 3..face * 3 + 3] {
                normals[i as usize] += face_normal;
            }
        }
        for normal in &mut normals {
            *normal = normal.try_normalize().unwrap_or(Vec3::Y);
        }
        self.normals = Some(normals);
    }

    /// Compute normals if the mesh has none.
    pub fn ensure_normals(&mut self) {
        if self.normals.is_none() {
            self.compute_normals();
        }
    }

    /// Apply `transform` to positions and normals.
    pub fn transform(&mut self, transform: &Transform) {
        if transform.is_identity() {
            return;
        }
        for p in &mut self.positions {
            *p = transform.transform_point_f32(*p);
        }
        if let Some(normals) = &mut self.normals {
            // Normals transform with the inverse transpose.
            let normal_matrix = transform.inverse_matrix().transpose();
            for n in normals.iter_mut() {
                let world = normal_matrix.transform_vector3(n.as_dvec3()).as_vec3();
                *n = world.try_normalize().unwrap_or(*n);
            }
        }
        self.bounds = Self::compute_bounds(&self.positions);
    }

    /// Corners of triangle `face`, or `None` if it references a missing
    /// vertex.
    pub fn triangle(&self, face: usize) -> Option<[Vec3; 3]> {
        let indices = self.indices.get(face * 3..face * 3 + 3)?;
        let corner = |i: u32| self.positions.get(i as usize).copied();
        Some([corner(indices[0])?, corner(indices[1])?, corner(indices[2])?])
    }

    pub fn surface_area(&self) -> f32 {
        (0..self.triangle_count())
            .filter_map(|face| self.triangle(face))
            .map(|[p0, p1, p2]| 0.5 * (p1 - p0).cross(p2 - p0).length())
            .sum()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn has_normals(&self) -> bool {
        self.normals.is_some()
    }

    pub fn has_uvs(&self) -> bool {
        self.uvs.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lux_math::DVec3;

    fn quad() -> Mesh {
        let positions = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        Mesh::new(positions, vec![0, 1, 2, 0, 2, 3])
    }

    #[test]
    fn test_mesh_creation() {
        let mesh = quad();
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.triangle_count(), 2);
        assert!(!mesh.has_normals());
        assert_eq!(mesh.bounds.min(), Vec3::ZERO);
        assert_eq!(mesh.bounds.max(), Vec3::new(1.0, 1.0, 0.0));
        assert!((mesh.surface_area() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_compute_normals_ccw() {
        let mut mesh = quad();
        mesh.ensure_normals();
        for normal in mesh.normals.as_ref().unwrap() {
            assert!((normal.z - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_attributes_must_match_vertex_count() {
        let mesh = quad()
            .with_normals(vec![Vec3::Z; 3])
            .with_uvs(vec![[0.0, 0.0]; 4]);
        assert!(!mesh.has_normals());
        assert!(mesh.has_uvs());
    }

    #[test]
    fn test_invalid_indices_are_skipped() {
        let mesh = Mesh::new(vec![Vec3::ZERO, Vec3::X, Vec3::Y], vec![0, 1, 2, 0, 1, 7]);
        assert!(mesh.triangle(0).is_some());
        assert!(mesh.triangle(1).is_none());
        assert!(mesh.triangle(2).is_none());
        assert!((mesh.surface_area() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_transform_moves_positions_and_bounds() {
        let mut mesh = quad();
        mesh.compute_normals();
        mesh.transform(&(Transform::translate(DVec3::new(0.0, 0.0, 5.0)) * Transform::scale(DVec3::splat(2.0))));

        assert!((mesh.bounds.max() - Vec3::new(2.0, 2.0, 5.0)).length() < 1e-5);
        assert!((mesh.surface_area() - 4.0).abs() < 1e-5);
        let normal = mesh.normals.as_ref().unwrap()[0];
        assert!((normal - Vec3::Z).length() < 1e-5);
    }
}
