//! Emitter plugins: `point_light`, `area`, `constant` and `light_group`.

use std::marker::PhantomData;

use lux_core::{
    impl_object, BackRef, BoxError, ClassRegistry, Object, ObjectBase, Plugin, Properties, Ref,
    RegistryError, TraversalCallback, Tunable, Variant,
};
use lux_math::{Color, DVec3};

use crate::interfaces::{optional_child, put_child, spectrum, Emitter, Shape, EMITTER};

/// Isotropic point source. With `shape_ref` it sits at the center of the
/// referenced shape unless `position` says otherwise.
pub struct PointLight<V: Variant> {
    base: ObjectBase,
    position: Tunable<DVec3>,
    intensity: Tunable<Color>,
    /// Shared with the scene; keeps the shape alive.
    shape: Option<Ref<dyn Shape<V>>>,
}

impl<V: Variant> PointLight<V> {
    pub fn position(&self) -> DVec3 {
        self.position.get()
    }
}

impl<V: Variant> Object for PointLight<V> {
    impl_object!("point_light", dyn Emitter<V>);

    fn traverse(&self, callback: &mut dyn TraversalCallback) {
        callback.put_parameter("position", &self.position);
        callback.put_parameter("intensity", &self.intensity);
        if let Some(shape) = &self.shape {
            put_child(callback, "shape_ref", shape);
        }
    }
}

impl<V: Variant> Plugin for PointLight<V> {
    fn construct(props: &Properties) -> Result<Self, BoxError> {
        let shape = optional_child::<dyn Shape<V>>(props, "shape_ref", "shape")?;
        let fallback = shape
            .as_ref()
            .map(|shape| shape.bbox().centroid().as_dvec3())
            .unwrap_or(DVec3::ZERO);
        Ok(Self {
            base: ObjectBase::for_variant::<V>(props),
            position: Tunable::new(props.vector("position", fallback)?),
            intensity: Tunable::new(spectrum(props, "intensity", Color::WHITE)?),
            shape,
        })
    }
}

impl<V: Variant> Emitter<V> for PointLight<V> {
    fn radiance(&self) -> Color {
        self.intensity.get()
    }

    fn is_delta(&self) -> bool {
        true
    }

    fn shape(&self) -> Option<Ref<dyn Shape<V>>> {
        self.shape.clone()
    }
}

/// Uniform emission from the surface of the shape that owns it.
pub struct Area<V: Variant> {
    base: ObjectBase,
    radiance: Tunable<Color>,
    shape_link: BackRef,
    _variant: PhantomData<V>,
}

impl<V: Variant> Object for Area<V> {
    impl_object!("area", dyn Emitter<V>);

    fn traverse(&self, callback: &mut dyn TraversalCallback) {
        callback.put_parameter("radiance", &self.radiance);
    }
}

impl<V: Variant> Plugin for Area<V> {
    fn construct(props: &Properties) -> Result<Self, BoxError> {
        if props.has_property("to_world") {
            return Err("an area emitter takes its placement from its shape, remove \"to_world\"".into());
        }
        Ok(Self {
            base: ObjectBase::for_variant::<V>(props),
            radiance: Tunable::new(spectrum(props, "radiance", Color::WHITE)?),
            shape_link: BackRef::new(),
            _variant: PhantomData,
        })
    }
}

impl<V: Variant> Emitter<V> for Area<V> {
    fn radiance(&self) -> Color {
        self.radiance.get()
    }

    fn is_delta(&self) -> bool {
        false
    }

    fn shape_link(&self) -> Option<&BackRef> {
        Some(&self.shape_link)
    }
}

/// Environment light of constant radiance.
pub struct Constant<V: Variant> {
    base: ObjectBase,
    radiance: Tunable<Color>,
    _variant: PhantomData<V>,
}

impl<V: Variant> Object for Constant<V> {
    impl_object!("constant", dyn Emitter<V>);

    fn traverse(&self, callback: &mut dyn TraversalCallback) {
        callback.put_parameter("radiance", &self.radiance);
    }
}

impl<V: Variant> Plugin for Constant<V> {
    fn construct(props: &Properties) -> Result<Self, BoxError> {
        Ok(Self {
            base: ObjectBase::for_variant::<V>(props),
            radiance: Tunable::new(spectrum(props, "radiance", Color::WHITE)?),
            _variant: PhantomData,
        })
    }
}

impl<V: Variant> Emitter<V> for Constant<V> {
    fn radiance(&self) -> Color {
        self.radiance.get()
    }

    fn is_delta(&self) -> bool {
        false
    }

    fn is_environment(&self) -> bool {
        true
    }
}

/// Stands in for the emitters nested inside it. Callers never see the group
/// itself, only the emitters it expands into.
pub struct LightGroup<V: Variant> {
    base: ObjectBase,
    members: Vec<Ref<dyn Object>>,
    _variant: PhantomData<V>,
}

impl<V: Variant> Object for LightGroup<V> {
    impl_object!("light_group");

    fn expand(&self) -> Vec<Ref<dyn Object>> {
        self.members.clone()
    }
}

impl<V: Variant> Plugin for LightGroup<V> {
    fn construct(props: &Properties) -> Result<Self, BoxError> {
        let mut members = Vec::new();
        for (key, object) in props.objects() {
            if Ref::cast::<dyn Emitter<V>>(object).is_none() {
                return Err(format!(
                    "light_group member \"{key}\" is a \"{}\", not an emitter",
                    object.class_name()
                )
                .into());
            }
            members.push(object.clone());
        }
        if members.is_empty() {
            return Err("light_group needs at least one emitter".into());
        }
        Ok(Self {
            base: ObjectBase::for_variant::<V>(props),
            members,
            _variant: PhantomData,
        })
    }
}

fn register_variant<V: Variant>(registry: &mut ClassRegistry) -> Result<(), RegistryError> {
    registry.register_plugin::<V, PointLight<V>>("point_light", EMITTER)?;
    registry.register_plugin::<V, Area<V>>("area", EMITTER)?;
    registry.register_plugin::<V, Constant<V>>("constant", EMITTER)?;
    registry.register_plugin::<V, LightGroup<V>>("light_group", EMITTER)?;
    Ok(())
}

pub fn register(registry: &mut ClassRegistry) -> Result<(), RegistryError> {
    crate::for_each_variant!(registry, register_variant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::Sphere;
    use lux_core::ScalarRgb;

    fn point(intensity: f64) -> Ref<dyn Object> {
        let mut props = Properties::with_plugin("point_light");
        props.set("intensity", intensity);
        Ref::into_object(Ref::new(PointLight::<ScalarRgb>::construct(&props).unwrap()))
    }

    #[test]
    fn test_point_light_sits_on_referenced_shape() {
        let mut sphere_props = Properties::with_plugin("sphere");
        sphere_props.set("center", DVec3::new(1.0, 2.0, 3.0));
        let sphere = Ref::new(Sphere::<ScalarRgb>::construct(&sphere_props).unwrap());

        let mut props = Properties::with_plugin("point_light");
        props.set_object("shape_ref", sphere.clone());
        let light = PointLight::<ScalarRgb>::construct(&props).unwrap();

        assert!((light.position() - DVec3::new(1.0, 2.0, 3.0)).length() < 1e-5);
        assert!(Ref::ptr_eq(&light.shape().unwrap(), &sphere));
        assert_eq!(light.radiance(), Color::WHITE);
        assert_eq!(Ref::ref_count(&sphere), 3);
    }

    #[test]
    fn test_shape_ref_must_be_a_shape() {
        let mut props = Properties::with_plugin("point_light");
        props.set("shape_ref", point(1.0));
        let err = PointLight::<ScalarRgb>::construct(&props).err().unwrap();
        assert!(err.to_string().contains("expected a shape"));
    }

    #[test]
    fn test_light_group_expands() {
        let mut props = Properties::with_plugin("light_group");
        props.set("a", point(1.0));
        props.set("b", point(2.0));
        let group = LightGroup::<ScalarRgb>::construct(&props).unwrap();

        let members = group.expand();
        assert_eq!(members.len(), 2);
        let second = Ref::cast::<dyn Emitter<ScalarRgb>>(&members[1]).unwrap();
        assert_eq!(second.radiance(), Color::gray(2.0));

        assert!(LightGroup::<ScalarRgb>::construct(&Properties::with_plugin("light_group")).is_err());
    }

    #[test]
    fn test_constant_is_environment() {
        let constant = Constant::<ScalarRgb>::construct(&Properties::with_plugin("constant")).unwrap();
        assert!(constant.is_environment());
        assert!(!constant.is_delta());
    }
}
