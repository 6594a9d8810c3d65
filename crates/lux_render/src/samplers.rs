//! The `independent` sampler.

use std::marker::PhantomData;

use lux_core::{
    impl_object, BoxError, ClassRegistry, Object, ObjectBase, Plugin, Properties, RegistryError,
    TraversalCallback, Tunable, Variant,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::interfaces::{Sampler, SAMPLER};

/// Uncorrelated uniform samples. Every work item gets its own stream derived
/// from `seed`, so results do not depend on scheduling.
pub struct Independent<V: Variant> {
    base: ObjectBase,
    sample_count: Tunable<u32>,
    seed: u64,
    _variant: PhantomData<V>,
}

impl<V: Variant> Object for Independent<V> {
    impl_object!("independent", dyn Sampler<V>);

    fn traverse(&self, callback: &mut dyn TraversalCallback) {
        callback.put_parameter("sample_count", &self.sample_count);
    }
}

impl<V: Variant> Plugin for Independent<V> {
    fn construct(props: &Properties) -> Result<Self, BoxError> {
        let sample_count: u32 = props.get_or("sample_count", 4)?;
        if sample_count == 0 {
            return Err("sample_count must be at least 1".into());
        }
        let seed = props.int("seed", 0)?;
        Ok(Self {
            base: ObjectBase::for_variant::<V>(props),
            sample_count: Tunable::new(sample_count),
            seed: seed as u64,
            _variant: PhantomData,
        })
    }
}

impl<V: Variant> Sampler<V> for Independent<V> {
    fn sample_count(&self) -> u32 {
        self.sample_count.get()
    }

    fn stream(&self, index: u64) -> StdRng {
        // SplitMix-style mixing keeps neighbouring indices apart.
        let mixed = (self.seed ^ index.wrapping_mul(0x9E37_79B9_7F4A_7C15)).rotate_left(31);
        StdRng::seed_from_u64(mixed)
    }
}

fn register_variant<V: Variant>(registry: &mut ClassRegistry) -> Result<(), RegistryError> {
    registry.register_plugin::<V, Independent<V>>("independent", SAMPLER)
}

pub fn register(registry: &mut ClassRegistry) -> Result<(), RegistryError> {
    crate::for_each_variant!(registry, register_variant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lux_core::ScalarRgb;
    use rand::Rng;

    #[test]
    fn test_streams_are_reproducible() {
        let mut props = Properties::with_plugin("independent");
        props.set("sample_count", 16);
        props.set("seed", 7);
        let sampler = Independent::<ScalarRgb>::construct(&props).unwrap();
        assert_eq!(sampler.sample_count(), 16);

        let a: f32 = sampler.stream(3).gen();
        let b: f32 = sampler.stream(3).gen();
        let c: f32 = sampler.stream(4).gen();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!((0.0..1.0).contains(&a));
    }

    #[test]
    fn test_zero_samples_rejected() {
        let mut props = Properties::with_plugin("independent");
        props.set("sample_count", 0);
        assert!(Independent::<ScalarRgb>::construct(&props).is_err());
    }
}
