//! Shape plugins: `sphere`, `rectangle` and `obj`.
//!
//! Every shape owns its BSDF and an optional area emitter. Nested objects
//! are picked up by interface, so they may be keyed `bsdf`/`emitter` or
//! given as anonymous children.

use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use lux_core::{
    file_resolver, impl_object, BackRef, BoxError, ClassRegistry, Mesh, Object, ObjectBase,
    ObjectId, Plugin, Properties, Ref, RegistryError, TraversalCallback, Tunable, Variant,
};
use lux_math::{Aabb, Color, DVec3, Interval, Ray, Real, Transform, Vec3};
use thiserror::Error;

use crate::bsdfs::Diffuse;
use crate::interfaces::{put_child, upcast, Bsdf, Emitter, Shape, SHAPE};

/// BSDF, emitter and scene link shared by all shapes.
struct Attachments<V: Variant> {
    bsdf: Ref<dyn Bsdf<V>>,
    /// Owned. The emitter links back through its own `BackRef`.
    emitter: Option<Ref<dyn Emitter<V>>>,
    scene_link: BackRef,
}

impl<V: Variant> Attachments<V> {
    /// Collect the nested objects. Nothing is linked until [`Self::attach`].
    fn from_props(props: &Properties) -> Result<Self, BoxError> {
        let mut bsdf = None;
        let mut emitter = None;
        for (key, object) in props.objects() {
            if let Some(found) = Ref::cast::<dyn Bsdf<V>>(object) {
                if bsdf.replace(found).is_some() {
                    return Err("a shape can only have one BSDF".into());
                }
            } else if let Some(found) = Ref::cast::<dyn Emitter<V>>(object) {
                if emitter.replace(found).is_some() {
                    return Err("a shape can only have one emitter".into());
                }
            } else {
                return Err(format!(
                    "nested \"{}\" object at \"{key}\" is neither a BSDF nor an emitter",
                    object.class_name()
                )
                .into());
            }
        }

        if let Some(emitter) = &emitter {
            if emitter_link(emitter)?.is_set() {
                return Err("emitter is already attached to another shape".into());
            }
        }

        let bsdf = match bsdf {
            Some(bsdf) => bsdf,
            None => upcast(Diffuse::<V>::with_reflectance(Color::gray(0.5))?)?,
        };
        Ok(Self {
            bsdf,
            emitter,
            scene_link: BackRef::new(),
        })
    }

    /// Link the emitter back to `owner`. Called once the shape can no
    /// longer fail to construct.
    fn attach(&self, owner: ObjectId) -> Result<(), BoxError> {
        if let Some(emitter) = &self.emitter {
            if !emitter_link(emitter)?.set(owner, 0) {
                return Err("emitter is already attached to another shape".into());
            }
        }
        Ok(())
    }

    fn traverse(&self, callback: &mut dyn TraversalCallback) {
        put_child(callback, "bsdf", &self.bsdf);
        if let Some(emitter) = &self.emitter {
            put_child(callback, "emitter", emitter);
        }
    }
}

fn emitter_link<V: Variant>(emitter: &Ref<dyn Emitter<V>>) -> Result<&BackRef, BoxError> {
    emitter.shape_link().ok_or_else(|| {
        format!("\"{}\" emitters cannot be attached to a shape", emitter.class_name()).into()
    })
}

pub struct Sphere<V: Variant> {
    base: ObjectBase,
    center: Tunable<DVec3>,
    radius: Tunable<V::Float>,
    to_world: Transform,
    attachments: Attachments<V>,
}

impl<V: Variant> Sphere<V> {
    /// World-space center and radius.
    pub fn world(&self) -> (Vec3, f32) {
        let center = self.to_world.transform_point(self.center.get()).as_vec3();
        let scale = self.to_world.transform_vector(DVec3::X).length();
        (center, (self.radius.get().lane(0) * scale) as f32)
    }
}

impl<V: Variant> Object for Sphere<V> {
    impl_object!("sphere", dyn Shape<V>);

    fn traverse(&self, callback: &mut dyn TraversalCallback) {
        callback.put_parameter("center", &self.center);
        callback.put_parameter("radius", &self.radius);
        self.attachments.traverse(callback);
    }

    fn parameters_changed(&self, keys: &[String]) {
        if keys.iter().any(|key| key == "radius") {
            let radius = self.radius.get().lane(0);
            if radius < 0.0 {
                log::warn!("sphere radius {radius} is negative, using its magnitude");
                self.radius.set(V::float(-radius));
            }
        }
    }
}

impl<V: Variant> Plugin for Sphere<V> {
    fn construct(props: &Properties) -> Result<Self, BoxError> {
        let base = ObjectBase::for_variant::<V>(props);
        let radius = props.float("radius", 1.0)?;
        if radius < 0.0 {
            return Err(format!("sphere radius must be non-negative, got {radius}").into());
        }
        let center = props.vector("center", DVec3::ZERO)?;
        let to_world = props.transform("to_world", Transform::IDENTITY)?;
        let attachments = Attachments::from_props(props)?;
        attachments.attach(base.object_id())?;
        Ok(Self {
            center: Tunable::new(center),
            radius: Tunable::new(V::float(radius)),
            to_world,
            attachments,
            base,
        })
    }
}

impl<V: Variant> Shape<V> for Sphere<V> {
    fn bbox(&self) -> Aabb {
        let (center, radius) = self.world();
        let r = Vec3::splat(radius);
        Aabb::from_points(center - r, center + r)
    }

    fn ray_intersect(&self, ray: &Ray, ray_t: Interval) -> Option<f32> {
        let (center, radius) = self.world();
        let oc = center - ray.origin;
        let a = ray.direction.length_squared();
        let h = ray.direction.dot(oc);
        let c = oc.length_squared() - radius * radius;

        let discriminant = h * h - a * c;
        if discriminant < 0.0 {
            return None;
        }
        let sqrtd = discriminant.sqrt();

        // Nearest root in the acceptable range
        [(h - sqrtd) / a, (h + sqrtd) / a]
            .into_iter()
            .find(|&root| ray_t.surrounds(root))
    }

    fn surface_area(&self) -> f32 {
        let (_, radius) = self.world();
        4.0 * std::f32::consts::PI * radius * radius
    }

    fn bsdf(&self) -> Option<&Ref<dyn Bsdf<V>>> {
        Some(&self.attachments.bsdf)
    }

    fn emitter(&self) -> Option<&Ref<dyn Emitter<V>>> {
        self.attachments.emitter.as_ref()
    }

    fn scene_link(&self) -> &BackRef {
        &self.attachments.scene_link
    }
}

/// The square `[-1, 1]^2` in the local `z = 0` plane, facing `+z`.
pub struct Rectangle<V: Variant> {
    base: ObjectBase,
    to_world: Tunable<Transform>,
    attachments: Attachments<V>,
}

impl<V: Variant> Rectangle<V> {
    /// World-space corner and the two edge vectors.
    fn frame(&self) -> (Vec3, Vec3, Vec3) {
        let to_world = self.to_world.get();
        let corner = |x: f64, y: f64| to_world.transform_point(DVec3::new(x, y, 0.0)).as_vec3();
        let origin = corner(-1.0, -1.0);
        (origin, corner(1.0, -1.0) - origin, corner(-1.0, 1.0) - origin)
    }
}

impl<V: Variant> Object for Rectangle<V> {
    impl_object!("rectangle", dyn Shape<V>);

    fn traverse(&self, callback: &mut dyn TraversalCallback) {
        callback.put_parameter("to_world", &self.to_world);
        self.attachments.traverse(callback);
    }
}

impl<V: Variant> Plugin for Rectangle<V> {
    fn construct(props: &Properties) -> Result<Self, BoxError> {
        let base = ObjectBase::for_variant::<V>(props);
        let to_world = props.transform("to_world", Transform::IDENTITY)?;
        let attachments = Attachments::from_props(props)?;
        attachments.attach(base.object_id())?;
        Ok(Self {
            to_world: Tunable::new(to_world),
            attachments,
            base,
        })
    }
}

impl<V: Variant> Shape<V> for Rectangle<V> {
    fn bbox(&self) -> Aabb {
        let (origin, du, dv) = self.frame();
        Aabb::from_points(origin, origin + du + dv)
            .include(origin + du)
            .include(origin + dv)
    }

    fn ray_intersect(&self, ray: &Ray, ray_t: Interval) -> Option<f32> {
        let (origin, du, dv) = self.frame();
        let n = du.cross(dv);
        let denom = n.dot(ray.direction);
        if denom.abs() < 1e-8 {
            return None;
        }
        let t = n.dot(origin - ray.origin) / denom;
        if !ray_t.contains(t) {
            return None;
        }

        let planar = ray.at(t) - origin;
        let w = n / n.dot(n);
        let alpha = w.dot(planar.cross(dv));
        let beta = w.dot(du.cross(planar));
        let unit = 0.0..=1.0;
        (unit.contains(&alpha) && unit.contains(&beta)).then_some(t)
    }

    fn surface_area(&self) -> f32 {
        let (_, du, dv) = self.frame();
        du.cross(dv).length()
    }

    fn bsdf(&self) -> Option<&Ref<dyn Bsdf<V>>> {
        Some(&self.attachments.bsdf)
    }

    fn emitter(&self) -> Option<&Ref<dyn Emitter<V>>> {
        self.attachments.emitter.as_ref()
    }

    fn scene_link(&self) -> &BackRef {
        &self.attachments.scene_link
    }
}

#[derive(Debug, Error)]
pub enum MeshError {
    #[error("mesh file \"{0}\" not found")]
    NotFound(String),

    #[error("failed to read {path}: {source}")]
    Obj {
        path: PathBuf,
        #[source]
        source: tobj::LoadError,
    },

    #[error("{0} contains no triangles")]
    Empty(PathBuf),
}

/// Load every model of an OBJ file into one mesh.
pub fn load_obj(path: &Path) -> Result<Mesh, MeshError> {
    let (models, _materials) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            single_index: true,
            triangulate: true,
            ..Default::default()
        },
    )
    .map_err(|source| MeshError::Obj {
        path: path.to_path_buf(),
        source,
    })?;

    let mut positions = Vec::new();
    let mut normals = Vec::new();
    let mut uvs = Vec::new();
    let mut indices = Vec::new();
    for model in &models {
        let mesh = &model.mesh;
        let offset = positions.len() as u32;
        positions.extend(
            mesh.positions
                .chunks_exact(3)
                .map(|p| Vec3::new(p[0], p[1], p[2])),
        );
        normals.extend(mesh.normals.chunks_exact(3).map(|n| Vec3::new(n[0], n[1], n[2])));
        uvs.extend(mesh.texcoords.chunks_exact(2).map(|t| [t[0], t[1]]));
        indices.extend(mesh.indices.iter().map(|i| i + offset));
    }
    if indices.is_empty() {
        return Err(MeshError::Empty(path.to_path_buf()));
    }

    log::debug!(
        "loaded {} ({} models, {} triangles)",
        path.display(),
        models.len(),
        indices.len() / 3
    );
    Ok(Mesh::new(positions, indices).with_normals(normals).with_uvs(uvs))
}

/// A triangle mesh read from a Wavefront OBJ file.
pub struct ObjMesh<V: Variant> {
    base: ObjectBase,
    /// Object-space mesh as loaded
    local: Mesh,
    world: RwLock<Mesh>,
    to_world: Tunable<Transform>,
    attachments: Attachments<V>,
}

impl<V: Variant> ObjMesh<V> {
    pub fn triangle_count(&self) -> usize {
        self.local.triangle_count()
    }

    pub fn vertex_count(&self) -> usize {
        self.local.vertex_count()
    }

    fn world_mesh(&self, to_world: &Transform) -> Mesh {
        let mut mesh = self.local.clone();
        mesh.transform(to_world);
        mesh
    }
}

impl<V: Variant> Object for ObjMesh<V> {
    impl_object!("obj", dyn Shape<V>);

    fn traverse(&self, callback: &mut dyn TraversalCallback) {
        callback.put_parameter("to_world", &self.to_world);
        self.attachments.traverse(callback);
    }

    fn parameters_changed(&self, keys: &[String]) {
        if keys.iter().any(|key| key == "to_world") {
            let mesh = self.world_mesh(&self.to_world.get());
            *self.world.write().unwrap_or_else(PoisonError::into_inner) = mesh;
        }
    }
}

impl<V: Variant> Plugin for ObjMesh<V> {
    fn construct(props: &Properties) -> Result<Self, BoxError> {
        let base = ObjectBase::for_variant::<V>(props);
        let filename: String = props.get("filename")?;
        let path = file_resolver().resolve(&filename);
        if !path.exists() {
            return Err(MeshError::NotFound(filename).into());
        }

        let mut local = load_obj(&path)?;
        if props.bool_("face_normals", false)? {
            local.normals = None;
        } else {
            local.ensure_normals();
        }
        let to_world = props.transform("to_world", Transform::IDENTITY)?;
        let attachments = Attachments::from_props(props)?;

        let mut world = local.clone();
        world.transform(&to_world);
        attachments.attach(base.object_id())?;
        Ok(Self {
            base,
            local,
            world: RwLock::new(world),
            to_world: Tunable::new(to_world),
            attachments,
        })
    }
}

impl<V: Variant> Shape<V> for ObjMesh<V> {
    fn bbox(&self) -> Aabb {
        self.world.read().unwrap_or_else(PoisonError::into_inner).bounds
    }

    /// Möller-Trumbore against every triangle.
    fn ray_intersect(&self, ray: &Ray, ray_t: Interval) -> Option<f32> {
        let mesh = self.world.read().unwrap_or_else(PoisonError::into_inner);
        let mut closest: Option<f32> = None;
        for face in 0..mesh.triangle_count() {
            let Some([v0, v1, v2]) = mesh.triangle(face) else {
                continue;
            };
            let edge1 = v1 - v0;
            let edge2 = v2 - v0;
            let h = ray.direction.cross(edge2);
            let a = edge1.dot(h);
            // Parallel to the triangle
            if a.abs() < 1e-8 {
                continue;
            }
            let f = 1.0 / a;
            let s = ray.origin - v0;
            let u = f * s.dot(h);
            if !(0.0..=1.0).contains(&u) {
                continue;
            }
            let q = s.cross(edge1);
            let v = f * ray.direction.dot(q);
            if v < 0.0 || u + v > 1.0 {
                continue;
            }
            let t = f * edge2.dot(q);
            let limit = closest.unwrap_or(ray_t.max);
            if t > ray_t.min && t < limit {
                closest = Some(t);
            }
        }
        closest
    }

    fn surface_area(&self) -> f32 {
        self.world
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .surface_area()
    }

    fn bsdf(&self) -> Option<&Ref<dyn Bsdf<V>>> {
        Some(&self.attachments.bsdf)
    }

    fn emitter(&self) -> Option<&Ref<dyn Emitter<V>>> {
        self.attachments.emitter.as_ref()
    }

    fn scene_link(&self) -> &BackRef {
        &self.attachments.scene_link
    }
}

fn register_variant<V: Variant>(registry: &mut ClassRegistry) -> Result<(), RegistryError> {
    registry.register_plugin::<V, Sphere<V>>("sphere", SHAPE)?;
    registry.register_plugin::<V, Rectangle<V>>("rectangle", SHAPE)?;
    registry.register_plugin::<V, ObjMesh<V>>("obj", SHAPE)?;
    Ok(())
}

pub fn register(registry: &mut ClassRegistry) -> Result<(), RegistryError> {
    crate::for_each_variant!(registry, register_variant)
}
