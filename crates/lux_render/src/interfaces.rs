//! Abstract plugin interfaces.
//!
//! Each interface is a trait over the variant and extends [`Object`], so a
//! built plugin is reached through `Ref<dyn Shape<V>>` and friends. The
//! matching abstract classes are registered by the `core` module; every leaf
//! plugin names one of them as its parent.

use lux_core::class::OBJECT_CLASS;
use lux_core::{
    BackRef, BoxError, ClassRegistry, Object, Properties, PropertyType, Ref, RegistryError,
    TraversalCallback, Variant,
};
use lux_math::{Aabb, Color, Interval, Ray};
use rand::rngs::StdRng;

pub const SHAPE: &str = "Shape";
pub const BSDF: &str = "Bsdf";
pub const EMITTER: &str = "Emitter";
pub const TEXTURE: &str = "Texture";
pub const PHASE_FUNCTION: &str = "PhaseFunction";
pub const SAMPLER: &str = "Sampler";
pub const FILM: &str = "Film";
pub const RECONSTRUCTION_FILTER: &str = "ReconstructionFilter";
pub const INTEGRATOR: &str = "Integrator";
pub const SCENE: &str = "Scene";

/// Abstract base classes, all direct children of `Object`.
pub const BASES: &[&str] = &[
    SHAPE,
    BSDF,
    EMITTER,
    TEXTURE,
    PHASE_FUNCTION,
    SAMPLER,
    FILM,
    RECONSTRUCTION_FILTER,
    INTEGRATOR,
    SCENE,
];

pub fn register_bases(registry: &mut ClassRegistry) -> Result<(), RegistryError> {
    for base in BASES {
        registry.register_abstract(base, OBJECT_CLASS)?;
    }
    Ok(())
}

/// Geometry that rays can hit.
pub trait Shape<V: Variant>: Object {
    fn bbox(&self) -> Aabb;

    /// Distance to the closest hit inside `ray_t`.
    fn ray_intersect(&self, ray: &Ray, ray_t: Interval) -> Option<f32>;

    fn surface_area(&self) -> f32;

    fn bsdf(&self) -> Option<&Ref<dyn Bsdf<V>>>;

    /// Area emitter attached to this shape. The shape owns it.
    fn emitter(&self) -> Option<&Ref<dyn Emitter<V>>>;

    /// Non-owning link to the scene holding this shape.
    fn scene_link(&self) -> &BackRef;
}

pub trait Bsdf<V: Variant>: Object {
    /// Hemispherical reflectance at surface coordinates `(u, v)`.
    fn reflectance(&self, u: f32, v: f32) -> Color;

    /// True for perfectly specular lobes.
    fn is_delta(&self) -> bool;
}

pub trait Emitter<V: Variant>: Object {
    fn radiance(&self) -> Color;

    /// True if the emitter is a point or direction with no area.
    fn is_delta(&self) -> bool;

    fn is_environment(&self) -> bool {
        false
    }

    /// Shape this emitter refers to, if it holds one.
    fn shape(&self) -> Option<Ref<dyn Shape<V>>> {
        None
    }

    /// Non-owning link to the shape this emitter is attached to.
    fn shape_link(&self) -> Option<&BackRef> {
        None
    }
}

pub trait Texture<V: Variant>: Object {
    fn eval(&self, u: f32, v: f32) -> Color;

    fn mean(&self) -> Color;
}

pub trait PhaseFunction<V: Variant>: Object {
    /// Phase function value for the cosine between incident and outgoing
    /// directions.
    fn eval(&self, cos_theta: f32) -> f32;
}

pub trait Sampler<V: Variant>: Object {
    fn sample_count(&self) -> u32;

    /// Independent random stream for work item `index`.
    fn stream(&self, index: u64) -> StdRng;
}

pub trait ReconstructionFilter<V: Variant>: Object {
    fn radius(&self) -> f32;

    fn eval(&self, x: f32) -> f32;
}

pub trait Film<V: Variant>: Object {
    fn size(&self) -> (u32, u32);

    fn rfilter(&self) -> &Ref<dyn ReconstructionFilter<V>>;
}

pub trait Integrator<V: Variant>: Object {
    /// Longest path length, -1 for unbounded.
    fn max_depth(&self) -> i32;

    /// Depth at which Russian roulette starts.
    fn rr_depth(&self) -> i32;
}

pub trait Scene<V: Variant>: Object {
    fn shapes(&self) -> &[Ref<dyn Shape<V>>];

    fn emitters(&self) -> &[Ref<dyn Emitter<V>>];

    fn integrator(&self) -> Option<&Ref<dyn Integrator<V>>>;

    fn bbox(&self) -> Aabb;

    /// Closest shape hit by `ray`, as `(shape index, distance)`.
    fn ray_intersect(&self, ray: &Ray) -> Option<(usize, f32)>;
}

/// The child object at `key`, which must implement `I`.
pub fn child<I: ?Sized + Object>(props: &Properties, key: &str, kind: &str) -> Result<Ref<I>, BoxError> {
    let object = props.object(key)?;
    Ref::cast::<I>(&object).ok_or_else(|| -> BoxError {
        format!(
            "property \"{key}\" holds a \"{}\" object, expected a {kind}",
            object.class_name()
        )
        .into()
    })
}

/// Like [`child`], but absent keys yield `None`.
pub fn optional_child<I: ?Sized + Object>(
    props: &Properties,
    key: &str,
    kind: &str,
) -> Result<Option<Ref<I>>, BoxError> {
    if props.has_property(key) {
        child(props, key, kind).map(Some)
    } else {
        Ok(None)
    }
}

/// Wrap a freshly built object as interface `I`.
pub(crate) fn upcast<T: Object, I: ?Sized + Object>(object: T) -> Result<Ref<I>, BoxError> {
    let class = object.class_name();
    Ref::cast::<I>(&Ref::new(object))
        .ok_or_else(|| -> BoxError { format!("\"{class}\" does not implement the interface").into() })
}

/// A color parameter that may also be given as a single number.
pub fn spectrum(props: &Properties, key: &str, default: Color) -> Result<Color, BoxError> {
    match props.type_of(key) {
        Some(PropertyType::Float | PropertyType::Integer) => Ok(Color::gray(props.float(key, 0.0)? as f32)),
        _ => Ok(props.color(key, default)?),
    }
}

/// A texture parameter: a nested texture, a color or a single number.
pub fn texture<V: Variant>(
    props: &Properties,
    key: &str,
    default: Color,
) -> Result<Ref<dyn Texture<V>>, BoxError> {
    if props.type_of(key) == Some(PropertyType::Object) {
        return child(props, key, "texture");
    }
    upcast(crate::textures::Uniform::<V>::new(spectrum(props, key, default)?))
}

/// Publish `child` under `name` during traversal.
pub fn put_child<I: ?Sized + Object>(callback: &mut dyn TraversalCallback, name: &str, child: &Ref<I>) {
    if let Some(object) = Ref::as_object(child) {
        callback.put_object(name, &object);
    }
}
