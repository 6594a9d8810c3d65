//! The `path` integrator.

use std::marker::PhantomData;

use lux_core::{
    impl_object, BoxError, ClassRegistry, Object, ObjectBase, Plugin, Properties, RegistryError,
    TraversalCallback, Tunable, Variant,
};

use crate::interfaces::{Integrator, INTEGRATOR};

/// Unidirectional path tracer settings.
pub struct PathIntegrator<V: Variant> {
    base: ObjectBase,
    max_depth: Tunable<i32>,
    rr_depth: Tunable<i32>,
    hide_emitters: bool,
    _variant: PhantomData<V>,
}

impl<V: Variant> PathIntegrator<V> {
    pub fn hide_emitters(&self) -> bool {
        self.hide_emitters
    }
}

impl<V: Variant> Object for PathIntegrator<V> {
    impl_object!("path", dyn Integrator<V>);

    fn traverse(&self, callback: &mut dyn TraversalCallback) {
        callback.put_parameter("max_depth", &self.max_depth);
        callback.put_parameter("rr_depth", &self.rr_depth);
    }

    fn parameters_changed(&self, keys: &[String]) {
        if keys.iter().any(|key| key == "max_depth") && self.max_depth.get() < -1 {
            log::warn!("max_depth {} is invalid, using -1 (unbounded)", self.max_depth.get());
            self.max_depth.set(-1);
        }
    }
}

impl<V: Variant> Plugin for PathIntegrator<V> {
    fn construct(props: &Properties) -> Result<Self, BoxError> {
        let max_depth: i32 = props.get_or("max_depth", -1)?;
        if max_depth < -1 {
            return Err("max_depth must be -1 (unbounded) or non-negative".into());
        }
        let rr_depth: i32 = props.get_or("rr_depth", 5)?;
        if rr_depth <= 0 {
            return Err("rr_depth must be positive".into());
        }
        Ok(Self {
            base: ObjectBase::for_variant::<V>(props),
            max_depth: Tunable::new(max_depth),
            rr_depth: Tunable::new(rr_depth),
            hide_emitters: props.bool_("hide_emitters", false)?,
            _variant: PhantomData,
        })
    }
}

impl<V: Variant> Integrator<V> for PathIntegrator<V> {
    fn max_depth(&self) -> i32 {
        self.max_depth.get()
    }

    fn rr_depth(&self) -> i32 {
        self.rr_depth.get()
    }
}

fn register_variant<V: Variant>(registry: &mut ClassRegistry) -> Result<(), RegistryError> {
    registry.register_plugin::<V, PathIntegrator<V>>("path", INTEGRATOR)
}

pub fn register(registry: &mut ClassRegistry) -> Result<(), RegistryError> {
    crate::for_each_variant!(registry, register_variant)
}
