//! Surface scattering plugins: `diffuse`, `conductor` and `dielectric`.

use lux_core::{
    impl_object, BoxError, ClassRegistry, Object, ObjectBase, Plugin, Properties, PropertyType,
    Ref, RegistryError, TraversalCallback, Tunable, Variant,
};
use lux_math::{Color, Real};

use crate::interfaces::{put_child, texture, Bsdf, Texture, BSDF};

/// Index of refraction by material name.
pub fn ior_by_name(name: &str) -> Option<f64> {
    let ior = match name.to_ascii_lowercase().as_str() {
        "vacuum" => 1.0,
        "air" => 1.000277,
        "water" => 1.333,
        "acrylic" => 1.49,
        "polypropylene" => 1.49,
        "fused quartz" => 1.458,
        "bk7" => 1.5046,
        "sapphire" => 1.77,
        "diamond" => 2.419,
        _ => return None,
    };
    Some(ior)
}

fn ior(props: &Properties, key: &str, default: &str) -> Result<f64, BoxError> {
    if props.type_of(key) == Some(PropertyType::String) {
        let name = props.string(key, default)?;
        return ior_by_name(&name).ok_or_else(|| format!("unknown material \"{name}\" for {key}").into());
    }
    match props.has_property(key) {
        true => Ok(props.float(key, 1.0)?),
        false => ior_by_name(default).ok_or_else(|| format!("unknown material \"{default}\"").into()),
    }
}

/// Ideal Lambertian reflector.
pub struct Diffuse<V: Variant> {
    base: ObjectBase,
    reflectance: Ref<dyn Texture<V>>,
}

impl<V: Variant> Diffuse<V> {
    /// A diffuse BSDF with a constant reflectance, used where a shape has
    /// none.
    pub fn with_reflectance(reflectance: Color) -> Result<Self, BoxError> {
        Ok(Self {
            base: ObjectBase::with_id(None, Some(V::ID)),
            reflectance: crate::interfaces::upcast(crate::textures::Uniform::<V>::new(reflectance))?,
        })
    }
}

impl<V: Variant> Object for Diffuse<V> {
    impl_object!("diffuse", dyn Bsdf<V>);

    fn traverse(&self, callback: &mut dyn TraversalCallback) {
        put_child(callback, "reflectance", &self.reflectance);
    }
}

impl<V: Variant> Plugin for Diffuse<V> {
    fn construct(props: &Properties) -> Result<Self, BoxError> {
        Ok(Self {
            base: ObjectBase::for_variant::<V>(props),
            reflectance: texture(props, "reflectance", Color::gray(0.5))?,
        })
    }
}

impl<V: Variant> Bsdf<V> for Diffuse<V> {
    fn reflectance(&self, u: f32, v: f32) -> Color {
        self.reflectance.eval(u, v)
    }

    fn is_delta(&self) -> bool {
        false
    }
}

/// Smooth metal. Without `eta`/`k` it is a perfect mirror.
pub struct Conductor<V: Variant> {
    base: ObjectBase,
    eta: Tunable<Color>,
    k: Tunable<Color>,
    specular_reflectance: Ref<dyn Texture<V>>,
}

impl<V: Variant> Object for Conductor<V> {
    impl_object!("conductor", dyn Bsdf<V>);

    fn traverse(&self, callback: &mut dyn TraversalCallback) {
        callback.put_parameter("eta", &self.eta);
        callback.put_parameter("k", &self.k);
        put_child(callback, "specular_reflectance", &self.specular_reflectance);
    }
}

impl<V: Variant> Plugin for Conductor<V> {
    fn construct(props: &Properties) -> Result<Self, BoxError> {
        let material = props.string("material", "none")?;
        if material != "none" {
            return Err(format!("measured conductor \"{material}\" is not available").into());
        }
        Ok(Self {
            base: ObjectBase::for_variant::<V>(props),
            eta: Tunable::new(props.color("eta", Color::BLACK)?),
            k: Tunable::new(props.color("k", Color::WHITE)?),
            specular_reflectance: texture(props, "specular_reflectance", Color::WHITE)?,
        })
    }
}

impl<V: Variant> Bsdf<V> for Conductor<V> {
    /// Normal-incidence Fresnel reflectance scaled by `specular_reflectance`.
    fn reflectance(&self, u: f32, v: f32) -> Color {
        let (eta, k) = (self.eta.get(), self.k.get());
        let fresnel = |eta: f32, k: f32| {
            let k2 = k * k;
            ((eta - 1.0).powi(2) + k2) / ((eta + 1.0).powi(2) + k2)
        };
        let f = Color::new(fresnel(eta.r, k.r), fresnel(eta.g, k.g), fresnel(eta.b, k.b));
        f * self.specular_reflectance.eval(u, v)
    }

    fn is_delta(&self) -> bool {
        true
    }
}

/// Smooth glass-like interface between two indices of refraction.
pub struct Dielectric<V: Variant> {
    base: ObjectBase,
    int_ior: Tunable<V::Float>,
    ext_ior: Tunable<V::Float>,
    specular_reflectance: Ref<dyn Texture<V>>,
    specular_transmittance: Ref<dyn Texture<V>>,
}

impl<V: Variant> Dielectric<V> {
    /// Relative index of refraction, interior over exterior.
    pub fn eta(&self) -> f64 {
        self.int_ior.get().lane(0) / self.ext_ior.get().lane(0)
    }

    pub fn transmittance(&self, u: f32, v: f32) -> Color {
        self.specular_transmittance.eval(u, v)
    }
}

impl<V: Variant> Object for Dielectric<V> {
    impl_object!("dielectric", dyn Bsdf<V>);

    fn traverse(&self, callback: &mut dyn TraversalCallback) {
        callback.put_parameter("int_ior", &self.int_ior);
        callback.put_parameter("ext_ior", &self.ext_ior);
        put_child(callback, "specular_reflectance", &self.specular_reflectance);
        put_child(callback, "specular_transmittance", &self.specular_transmittance);
    }
}

impl<V: Variant> Plugin for Dielectric<V> {
    fn construct(props: &Properties) -> Result<Self, BoxError> {
        let int_ior = ior(props, "int_ior", "bk7")?;
        let ext_ior = ior(props, "ext_ior", "air")?;
        if int_ior < 0.0 || ext_ior < 0.0 {
            return Err("indices of refraction must be non-negative".into());
        }
        Ok(Self {
            base: ObjectBase::for_variant::<V>(props),
            int_ior: Tunable::new(V::float(int_ior)),
            ext_ior: Tunable::new(V::float(ext_ior)),
            specular_reflectance: texture(props, "specular_reflectance", Color::WHITE)?,
            specular_transmittance: texture(props, "specular_transmittance", Color::WHITE)?,
        })
    }
}

impl<V: Variant> Bsdf<V> for Dielectric<V> {
    fn reflectance(&self, u: f32, v: f32) -> Color {
        let eta = self.eta();
        let r0 = ((eta - 1.0) / (eta + 1.0)).powi(2) as f32;
        self.specular_reflectance.eval(u, v) * r0
    }

    fn is_delta(&self) -> bool {
        true
    }
}

fn register_variant<V: Variant>(registry: &mut ClassRegistry) -> Result<(), RegistryError> {
    registry.register_plugin::<V, Diffuse<V>>("diffuse", BSDF)?;
    registry.register_plugin::<V, Conductor<V>>("conductor", BSDF)?;
    registry.register_plugin::<V, Dielectric<V>>("dielectric", BSDF)?;
    Ok(())
}

pub fn register(registry: &mut ClassRegistry) -> Result<(), RegistryError> {
    crate::for_each_variant!(registry, register_variant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lux_core::{PacketRgb, ScalarRgb, ScalarRgbDouble, SceneParameters};

    #[test]
    fn test_diffuse_default_reflectance() {
        let props = Properties::with_plugin("diffuse");
        let bsdf = Diffuse::<ScalarRgb>::construct(&props).unwrap();
        assert_eq!(bsdf.reflectance(0.1, 0.9), Color::gray(0.5));
        assert!(!bsdf.is_delta());
    }

    #[test]
    fn test_diffuse_reflectance_from_texture() {
        let mut texture_props = Properties::with_plugin("checkerboard");
        texture_props.set("color0", Color::WHITE);
        let texture = crate::textures::Checkerboard::<ScalarRgb>::construct(&texture_props).unwrap();

        let mut props = Properties::with_plugin("diffuse");
        props.set_object("reflectance", Ref::new(texture));
        let bsdf = Diffuse::<ScalarRgb>::construct(&props).unwrap();
        assert_eq!(bsdf.reflectance(0.25, 0.25), Color::WHITE);
    }

    #[test]
    fn test_diffuse_rejects_non_texture_child() {
        let mut props = Properties::with_plugin("diffuse");
        let other = Diffuse::<ScalarRgb>::with_reflectance(Color::WHITE).unwrap();
        props.set_object("reflectance", Ref::new(other));
        let err = Diffuse::<ScalarRgb>::construct(&props).err().unwrap();
        assert!(err.to_string().contains("expected a texture"));
    }

    #[test]
    fn test_dielectric_named_ior() {
        let mut props = Properties::with_plugin("dielectric");
        props.set("int_ior", "water");
        let bsdf = Dielectric::<ScalarRgbDouble>::construct(&props).unwrap();
        assert!((bsdf.eta() - 1.333 / 1.000277).abs() < 1e-9);

        props.set("int_ior", "unobtainium");
        assert!(Dielectric::<ScalarRgbDouble>::construct(&props).is_err());
    }

    #[test]
    fn test_dielectric_packet_variant_broadcasts() {
        let mut props = Properties::with_plugin("dielectric");
        props.set("int_ior", 1.5);
        props.set("ext_ior", 1.0);
        let bsdf = Dielectric::<PacketRgb>::construct(&props).unwrap();
        assert!((bsdf.eta() - 1.5).abs() < 1e-6);
        let r0 = bsdf.reflectance(0.0, 0.0).r;
        assert!((r0 - 0.04).abs() < 1e-6);
    }

    #[test]
    fn test_conductor_parameters_are_tunable() {
        let props = Properties::with_plugin("conductor");
        let bsdf = Ref::into_object(Ref::new(Conductor::<ScalarRgb>::construct(&props).unwrap()));
        let mut params = SceneParameters::collect(&bsdf);
        assert!(params.contains("eta"));
        assert!(params.contains("specular_reflectance.value"));

        params.set("specular_reflectance.value", Color::gray(0.5)).unwrap();
        params.update().unwrap();
        let conductor = bsdf.downcast_ref::<Conductor<ScalarRgb>>().unwrap();
        // eta 0, k 1 reflects everything.
        assert!((conductor.reflectance(0.0, 0.0).g - 0.5).abs() < 1e-6);
    }
}
