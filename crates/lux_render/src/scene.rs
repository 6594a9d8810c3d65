//! The `scene` plugin, root of a built object graph.

use std::marker::PhantomData;

use lux_core::{
    impl_object, BoxError, ClassRegistry, Object, ObjectBase, Plugin, Properties, Ref,
    RegistryError, TraversalCallback, Variant,
};
use lux_math::{Aabb, Interval, Ray};

use crate::interfaces::{Emitter, Integrator, Scene, Shape, SCENE};

/// Owns every top-level object of a description.
///
/// Ownership runs scene -> shape -> emitter. Shapes point back at the scene
/// only through their `scene_link`, which stores this scene's object id and
/// the shape's index in [`Scene::shapes`].
pub struct BasicScene<V: Variant> {
    base: ObjectBase,
    shapes: Vec<Ref<dyn Shape<V>>>,
    /// Free-standing emitters followed by those attached to shapes
    emitters: Vec<Ref<dyn Emitter<V>>>,
    integrator: Option<Ref<dyn Integrator<V>>>,
    /// Every nested object under its property key, in declaration order
    children: Vec<(String, Ref<dyn Object>)>,
    bbox: Aabb,
    _variant: PhantomData<V>,
}

impl<V: Variant> BasicScene<V> {
    pub fn children(&self) -> impl Iterator<Item = (&str, &Ref<dyn Object>)> + '_ {
        self.children.iter().map(|(key, object)| (key.as_str(), object))
    }
}

impl<V: Variant> Object for BasicScene<V> {
    impl_object!("scene", dyn Scene<V>);

    fn traverse(&self, callback: &mut dyn TraversalCallback) {
        for (key, object) in &self.children {
            callback.put_object(key, object);
        }
    }
}

impl<V: Variant> Plugin for BasicScene<V> {
    fn construct(props: &Properties) -> Result<Self, BoxError> {
        let base = ObjectBase::for_variant::<V>(props);
        let mut shapes: Vec<(&str, Ref<dyn Shape<V>>)> = Vec::new();
        let mut emitters = Vec::new();
        let mut integrator = None;
        let mut children = Vec::new();

        for (key, object) in props.objects() {
            if let Some(shape) = Ref::cast::<dyn Shape<V>>(object) {
                shapes.push((key, shape));
            } else if let Some(emitter) = Ref::cast::<dyn Emitter<V>>(object) {
                emitters.push(emitter);
            } else if let Some(found) = Ref::cast::<dyn Integrator<V>>(object) {
                if integrator.replace(found).is_some() {
                    return Err("a scene can only have one integrator".into());
                }
            } else {
                log::debug!("scene keeps \"{key}\" ({}) as a plain child", object.class_name());
            }
            children.push((key.to_string(), object.clone()));
        }

        // Shapes are linked only once the scene is certain to be built.
        for (slot, (key, shape)) in shapes.iter().enumerate() {
            if !shape.scene_link().set(base.object_id(), slot) {
                log::warn!("shape \"{key}\" already belongs to another scene");
            }
        }
        let shapes: Vec<Ref<dyn Shape<V>>> = shapes.into_iter().map(|(_, shape)| shape).collect();

        emitters.extend(shapes.iter().filter_map(|shape| shape.emitter().cloned()));
        let bbox = shapes
            .iter()
            .fold(Aabb::EMPTY, |bbox, shape| Aabb::surrounding(&bbox, &shape.bbox()));

        log::debug!(
            "scene with {} shapes and {} emitters",
            shapes.len(),
            emitters.len()
        );
        Ok(Self {
            base,
            shapes,
            emitters,
            integrator,
            children,
            bbox,
            _variant: PhantomData,
        })
    }
}

impl<V: Variant> Scene<V> for BasicScene<V> {
    fn shapes(&self) -> &[Ref<dyn Shape<V>>] {
        &self.shapes
    }

    fn emitters(&self) -> &[Ref<dyn Emitter<V>>] {
        &self.emitters
    }

    fn integrator(&self) -> Option<&Ref<dyn Integrator<V>>> {
        self.integrator.as_ref()
    }

    fn bbox(&self) -> Aabb {
        self.bbox
    }

    fn ray_intersect(&self, ray: &Ray) -> Option<(usize, f32)> {
        let mut closest: Option<(usize, f32)> = None;
        for (index, shape) in self.shapes.iter().enumerate() {
            let max = closest.map_or(f32::INFINITY, |(_, t)| t);
            if let Some(t) = shape.ray_intersect(ray, Interval::new(1e-4, max)) {
                closest = Some((index, t));
            }
        }
        closest
    }
}

fn register_variant<V: Variant>(registry: &mut ClassRegistry) -> Result<(), RegistryError> {
    registry.register_plugin::<V, BasicScene<V>>("scene", SCENE)
}

pub fn register(registry: &mut ClassRegistry) -> Result<(), RegistryError> {
    crate::for_each_variant!(registry, register_variant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitters::{Area, PointLight};
    use crate::integrators::PathIntegrator;
    use crate::shapes::Sphere;
    use lux_core::ScalarRgb;
    use lux_math::{Color, DVec3, Vec3};

    fn sphere(z: f64, radius: f64) -> Ref<Sphere<ScalarRgb>> {
        let mut props = Properties::with_plugin("sphere");
        props.set("center", DVec3::new(0.0, 0.0, z));
        props.set("radius", radius);
        Ref::new(Sphere::construct(&props).unwrap())
    }

    #[test]
    fn test_scene_sorts_children_and_links_shapes() {
        let near = sphere(-2.0, 0.5);
        let far = sphere(-6.0, 1.0);
        let light = Ref::new(PointLight::<ScalarRgb>::construct(&Properties::with_plugin("point_light")).unwrap());
        let path = Ref::new(PathIntegrator::<ScalarRgb>::construct(&Properties::with_plugin("path")).unwrap());

        let mut props = Properties::with_plugin("scene");
        props.set_object("far", far.clone());
        props.set_object("near", near.clone());
        props.set_object("light", light);
        props.set_object("integrator", path);
        let scene = BasicScene::<ScalarRgb>::construct(&props).unwrap();

        assert_eq!(scene.shapes().len(), 2);
        assert_eq!(scene.emitters().len(), 1);
        assert!(scene.integrator().is_some());
        assert_eq!(far.scene_link().owner(), Some(scene.base.object_id()));
        assert_eq!(near.scene_link().slot(), Some(1));

        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0), 0.0);
        let (index, t) = scene.ray_intersect(&ray).unwrap();
        assert_eq!(index, 1);
        assert!((t - 1.5).abs() < 1e-4);
        assert!((scene.bbox().min().z + 7.0).abs() < 1e-5);
    }

    #[test]
    fn test_area_emitters_are_collected_from_shapes() {
        let mut emitter_props = Properties::with_plugin("area");
        emitter_props.set("radiance", Color::gray(4.0));
        let area = Ref::new(Area::<ScalarRgb>::construct(&emitter_props).unwrap());

        let mut shape_props = Properties::with_plugin("sphere");
        shape_props.set_object("emitter", area);
        let lamp = Ref::new(Sphere::<ScalarRgb>::construct(&shape_props).unwrap());

        let mut props = Properties::with_plugin("scene");
        props.set_object("lamp", lamp);
        let scene = BasicScene::<ScalarRgb>::construct(&props).unwrap();
        assert_eq!(scene.emitters().len(), 1);
        assert_eq!(scene.emitters()[0].radiance(), Color::gray(4.0));
    }

    #[test]
    fn test_two_integrators_rejected() {
        let ball = sphere(-2.0, 0.5);
        let mut props = Properties::with_plugin("scene");
        props.set_object("ball", ball.clone());
        for key in ["a", "b"] {
            let path = PathIntegrator::<ScalarRgb>::construct(&Properties::with_plugin("path")).unwrap();
            props.set_object(key, Ref::new(path));
        }
        assert!(BasicScene::<ScalarRgb>::construct(&props).is_err());

        // The failed scene left the shape free for the next one.
        assert!(!ball.scene_link().is_set());
        let mut props = Properties::with_plugin("scene");
        props.set_object("ball", ball.clone());
        let scene = BasicScene::<ScalarRgb>::construct(&props).unwrap();
        assert_eq!(ball.scene_link().owner(), Some(scene.base.object_id()));
    }
}
