//! The `hdrfilm` film.

use lux_core::{
    impl_object, BoxError, ClassRegistry, Object, ObjectBase, Plugin, Properties, Ref,
    RegistryError, TraversalCallback, Variant,
};

use crate::interfaces::{put_child, upcast, Film, ReconstructionFilter, FILM};
use crate::rfilters::BoxFilter;

/// High dynamic range film. Pixel storage is allocated by the renderer, the
/// film only describes it.
pub struct HdrFilm<V: Variant> {
    base: ObjectBase,
    width: u32,
    height: u32,
    pixel_format: String,
    rfilter: Ref<dyn ReconstructionFilter<V>>,
}

impl<V: Variant> HdrFilm<V> {
    pub fn pixel_format(&self) -> &str {
        &self.pixel_format
    }
}

impl<V: Variant> Object for HdrFilm<V> {
    impl_object!("hdrfilm", dyn Film<V>);

    fn traverse(&self, callback: &mut dyn TraversalCallback) {
        put_child(callback, "rfilter", &self.rfilter);
    }
}

impl<V: Variant> Plugin for HdrFilm<V> {
    fn construct(props: &Properties) -> Result<Self, BoxError> {
        let width: u32 = props.get_or("width", 768)?;
        let height: u32 = props.get_or("height", 576)?;
        if width == 0 || height == 0 {
            return Err(format!("film size {width}x{height} is empty").into());
        }
        let pixel_format = props.string("pixel_format", "rgb")?;
        if !matches!(pixel_format.as_str(), "rgb" | "rgba" | "luminance") {
            return Err(format!("unsupported pixel format \"{pixel_format}\"").into());
        }

        let mut rfilter = None;
        for (key, object) in props.objects() {
            match Ref::cast::<dyn ReconstructionFilter<V>>(object) {
                Some(found) if rfilter.is_none() => rfilter = Some(found),
                Some(_) => return Err("a film can only have one reconstruction filter".into()),
                None => {
                    return Err(format!(
                        "nested \"{}\" object at \"{key}\" is not a reconstruction filter",
                        object.class_name()
                    )
                    .into())
                }
            }
        }
        let rfilter = match rfilter {
            Some(rfilter) => rfilter,
            None => upcast(BoxFilter::<V>::with_radius(0.5))?,
        };
        Ok(Self {
            base: ObjectBase::for_variant::<V>(props),
            width,
            height,
            pixel_format,
            rfilter,
        })
    }
}

impl<V: Variant> Film<V> for HdrFilm<V> {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn rfilter(&self) -> &Ref<dyn ReconstructionFilter<V>> {
        &self.rfilter
    }
}

fn register_variant<V: Variant>(registry: &mut ClassRegistry) -> Result<(), RegistryError> {
    registry.register_plugin::<V, HdrFilm<V>>("hdrfilm", FILM)
}

pub fn register(registry: &mut ClassRegistry) -> Result<(), RegistryError> {
    crate::for_each_variant!(registry, register_variant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rfilters::Gaussian;
    use lux_core::ScalarRgb;

    #[test]
    fn test_defaults() {
        let film = HdrFilm::<ScalarRgb>::construct(&Properties::with_plugin("hdrfilm")).unwrap();
        assert_eq!(film.size(), (768, 576));
        assert_eq!(film.pixel_format(), "rgb");
        assert_eq!(film.rfilter().class_name(), "box");
    }

    #[test]
    fn test_rfilter_child() {
        let gaussian = Gaussian::<ScalarRgb>::construct(&Properties::with_plugin("gaussian")).unwrap();
        let mut props = Properties::with_plugin("hdrfilm");
        props.set("width", 32);
        props.set("height", 16);
        props.set_object("rfilter", Ref::new(gaussian));
        let film = HdrFilm::<ScalarRgb>::construct(&props).unwrap();
        assert_eq!(film.size(), (32, 16));
        assert_eq!(film.rfilter().class_name(), "gaussian");
        assert!(props.unqueried().is_empty());
    }

    #[test]
    fn test_negative_size_is_out_of_range() {
        let mut props = Properties::with_plugin("hdrfilm");
        props.set("width", -4);
        let err = HdrFilm::<ScalarRgb>::construct(&props).err().unwrap();
        assert!(err.to_string().contains("width"));
    }
}
