//! Reconstruction filters: `box` and `gaussian`.

use std::marker::PhantomData;

use lux_core::{
    impl_object, BoxError, ClassRegistry, Object, ObjectBase, Plugin, Properties, RegistryError,
    TraversalCallback, Tunable, Variant,
};

use crate::interfaces::{ReconstructionFilter, RECONSTRUCTION_FILTER};

pub struct BoxFilter<V: Variant> {
    base: ObjectBase,
    radius: f32,
    _variant: PhantomData<V>,
}

impl<V: Variant> BoxFilter<V> {
    /// The filter a film uses when none is given.
    pub fn with_radius(radius: f32) -> Self {
        Self {
            base: ObjectBase::with_id(None, Some(V::ID)),
            radius,
            _variant: PhantomData,
        }
    }
}

impl<V: Variant> Object for BoxFilter<V> {
    impl_object!("box", dyn ReconstructionFilter<V>);
}

impl<V: Variant> Plugin for BoxFilter<V> {
    fn construct(props: &Properties) -> Result<Self, BoxError> {
        let radius = props.float("radius", 0.5)? as f32;
        if radius <= 0.0 {
            return Err(format!("box filter radius must be positive, got {radius}").into());
        }
        Ok(Self {
            base: ObjectBase::for_variant::<V>(props),
            ..Self::with_radius(radius)
        })
    }
}

impl<V: Variant> ReconstructionFilter<V> for BoxFilter<V> {
    fn radius(&self) -> f32 {
        self.radius
    }

    fn eval(&self, x: f32) -> f32 {
        if x.abs() <= self.radius {
            1.0
        } else {
            0.0
        }
    }
}

/// Gaussian truncated at four standard deviations.
pub struct Gaussian<V: Variant> {
    base: ObjectBase,
    stddev: Tunable<f32>,
    _variant: PhantomData<V>,
}

impl<V: Variant> Object for Gaussian<V> {
    impl_object!("gaussian", dyn ReconstructionFilter<V>);

    fn traverse(&self, callback: &mut dyn TraversalCallback) {
        callback.put_parameter("stddev", &self.stddev);
    }
}

impl<V: Variant> Plugin for Gaussian<V> {
    fn construct(props: &Properties) -> Result<Self, BoxError> {
        let stddev = props.float("stddev", 0.5)? as f32;
        if stddev <= 0.0 {
            return Err(format!("gaussian stddev must be positive, got {stddev}").into());
        }
        Ok(Self {
            base: ObjectBase::for_variant::<V>(props),
            stddev: Tunable::new(stddev),
            _variant: PhantomData,
        })
    }
}

impl<V: Variant> ReconstructionFilter<V> for Gaussian<V> {
    fn radius(&self) -> f32 {
        4.0 * self.stddev.get()
    }

    fn eval(&self, x: f32) -> f32 {
        let stddev = self.stddev.get();
        let cutoff = (-8.0f32).exp();
        ((-0.5 * x * x / (stddev * stddev)).exp() - cutoff).max(0.0)
    }
}

fn register_variant<V: Variant>(registry: &mut ClassRegistry) -> Result<(), RegistryError> {
    registry.register_plugin::<V, BoxFilter<V>>("box", RECONSTRUCTION_FILTER)?;
    registry.register_plugin::<V, Gaussian<V>>("gaussian", RECONSTRUCTION_FILTER)?;
    Ok(())
}

pub fn register(registry: &mut ClassRegistry) -> Result<(), RegistryError> {
    crate::for_each_variant!(registry, register_variant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lux_core::ScalarRgb;

    #[test]
    fn test_box_filter_support() {
        let filter = BoxFilter::<ScalarRgb>::construct(&Properties::with_plugin("box")).unwrap();
        assert_eq!(filter.eval(0.25), 1.0);
        assert_eq!(filter.eval(0.75), 0.0);
    }

    #[test]
    fn test_gaussian_vanishes_at_radius() {
        let filter = Gaussian::<ScalarRgb>::construct(&Properties::with_plugin("gaussian")).unwrap();
        assert!((filter.radius() - 2.0).abs() < 1e-6);
        assert!(filter.eval(filter.radius()).abs() < 1e-6);
        assert!(filter.eval(0.0) > filter.eval(0.5));
    }
}
