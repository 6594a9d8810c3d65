//! Phase function plugins: `isotropic` and `hg` (Henyey-Greenstein).

use std::f32::consts::PI;
use std::marker::PhantomData;

use lux_core::{
    impl_object, BoxError, ClassRegistry, Object, ObjectBase, Plugin, Properties, RegistryError,
    TraversalCallback, Tunable, Variant,
};
use lux_math::Real;

use crate::interfaces::{PhaseFunction, PHASE_FUNCTION};

const INV_FOUR_PI: f32 = 1.0 / (4.0 * PI);

pub struct Isotropic<V: Variant> {
    base: ObjectBase,
    _variant: PhantomData<V>,
}

impl<V: Variant> Object for Isotropic<V> {
    impl_object!("isotropic", dyn PhaseFunction<V>);
}

impl<V: Variant> Plugin for Isotropic<V> {
    fn construct(props: &Properties) -> Result<Self, BoxError> {
        Ok(Self {
            base: ObjectBase::for_variant::<V>(props),
            _variant: PhantomData,
        })
    }
}

impl<V: Variant> PhaseFunction<V> for Isotropic<V> {
    fn eval(&self, _cos_theta: f32) -> f32 {
        INV_FOUR_PI
    }
}

pub struct HenyeyGreenstein<V: Variant> {
    base: ObjectBase,
    /// Mean cosine of the scattering angle, in (-1, 1)
    g: Tunable<V::Float>,
}

impl<V: Variant> Object for HenyeyGreenstein<V> {
    impl_object!("hg", dyn PhaseFunction<V>);

    fn traverse(&self, callback: &mut dyn TraversalCallback) {
        callback.put_parameter("g", &self.g);
    }
}

impl<V: Variant> Plugin for HenyeyGreenstein<V> {
    fn construct(props: &Properties) -> Result<Self, BoxError> {
        let g = props.float("g", 0.8)?;
        if g <= -1.0 || g >= 1.0 {
            return Err(format!("hg asymmetry parameter must lie in (-1, 1), got {g}").into());
        }
        Ok(Self {
            base: ObjectBase::for_variant::<V>(props),
            g: Tunable::new(V::float(g)),
        })
    }
}

impl<V: Variant> PhaseFunction<V> for HenyeyGreenstein<V> {
    fn eval(&self, cos_theta: f32) -> f32 {
        let g = self.g.get().lane(0) as f32;
        let denom = 1.0 + g * g + 2.0 * g * cos_theta;
        INV_FOUR_PI * (1.0 - g * g) / (denom * denom.sqrt())
    }
}

fn register_variant<V: Variant>(registry: &mut ClassRegistry) -> Result<(), RegistryError> {
    registry.register_plugin::<V, Isotropic<V>>("isotropic", PHASE_FUNCTION)?;
    registry.register_plugin::<V, HenyeyGreenstein<V>>("hg", PHASE_FUNCTION)?;
    Ok(())
}

pub fn register(registry: &mut ClassRegistry) -> Result<(), RegistryError> {
    crate::for_each_variant!(registry, register_variant)
}
