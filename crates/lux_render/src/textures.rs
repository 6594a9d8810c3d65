//! Texture plugins: `uniform`, `checkerboard` and `bitmap`.

use std::marker::PhantomData;

use lux_core::{
    file_resolver, impl_object, Bitmap, BoxError, ClassRegistry, Object, ObjectBase, Plugin,
    Properties, RegistryError, TraversalCallback, Tunable, Variant,
};
use lux_math::Color;

use crate::interfaces::{spectrum, Texture, TEXTURE};

/// A constant color.
pub struct Uniform<V: Variant> {
    base: ObjectBase,
    value: Tunable<Color>,
    _variant: PhantomData<V>,
}

impl<V: Variant> Uniform<V> {
    pub fn new(value: Color) -> Self {
        Self {
            base: ObjectBase::with_id(None, Some(V::ID)),
            value: Tunable::new(value),
            _variant: PhantomData,
        }
    }
}

impl<V: Variant> Object for Uniform<V> {
    impl_object!("uniform", dyn Texture<V>);

    fn traverse(&self, callback: &mut dyn TraversalCallback) {
        callback.put_parameter("value", &self.value);
    }
}

impl<V: Variant> Plugin for Uniform<V> {
    fn construct(props: &Properties) -> Result<Self, BoxError> {
        let value = spectrum(props, "value", Color::gray(0.5))?;
        Ok(Self {
            base: ObjectBase::for_variant::<V>(props),
            ..Self::new(value)
        })
    }
}

impl<V: Variant> Texture<V> for Uniform<V> {
    fn eval(&self, _u: f32, _v: f32) -> Color {
        self.value.get()
    }

    fn mean(&self) -> Color {
        self.value.get()
    }
}

/// Two colors alternating on a unit grid in texture space.
pub struct Checkerboard<V: Variant> {
    base: ObjectBase,
    color0: Tunable<Color>,
    color1: Tunable<Color>,
    scale: Tunable<f32>,
    _variant: PhantomData<V>,
}

impl<V: Variant> Object for Checkerboard<V> {
    impl_object!("checkerboard", dyn Texture<V>);

    fn traverse(&self, callback: &mut dyn TraversalCallback) {
        callback.put_parameter("color0", &self.color0);
        callback.put_parameter("color1", &self.color1);
        callback.put_parameter("scale", &self.scale);
    }
}

impl<V: Variant> Plugin for Checkerboard<V> {
    fn construct(props: &Properties) -> Result<Self, BoxError> {
        let scale = props.float("scale", 1.0)? as f32;
        if scale <= 0.0 {
            return Err(format!("checkerboard scale must be positive, got {scale}").into());
        }
        Ok(Self {
            base: ObjectBase::for_variant::<V>(props),
            color0: Tunable::new(props.color("color0", Color::gray(0.4))?),
            color1: Tunable::new(props.color("color1", Color::gray(0.2))?),
            scale: Tunable::new(scale),
            _variant: PhantomData,
        })
    }
}

impl<V: Variant> Texture<V> for Checkerboard<V> {
    fn eval(&self, u: f32, v: f32) -> Color {
        let scale = self.scale.get();
        let u = (u * scale).rem_euclid(1.0) > 0.5;
        let v = (v * scale).rem_euclid(1.0) > 0.5;
        if u == v {
            self.color0.get()
        } else {
            self.color1.get()
        }
    }

    fn mean(&self) -> Color {
        (self.color0.get() + self.color1.get()) * 0.5
    }
}

/// An image file looked up through the current file resolver.
pub struct BitmapTexture<V: Variant> {
    base: ObjectBase,
    bitmap: Bitmap,
    mean: Color,
    _variant: PhantomData<V>,
}

impl<V: Variant> BitmapTexture<V> {
    pub fn bitmap(&self) -> &Bitmap {
        &self.bitmap
    }
}

impl<V: Variant> Object for BitmapTexture<V> {
    impl_object!("bitmap", dyn Texture<V>);
}

impl<V: Variant> Plugin for BitmapTexture<V> {
    fn construct(props: &Properties) -> Result<Self, BoxError> {
        let filename: String = props.get("filename")?;
        let raw = props.bool_("raw", false)?;
        let bitmap = Bitmap::load(&filename, &file_resolver(), !raw)?;
        let mean = bitmap.mean();
        Ok(Self {
            base: ObjectBase::for_variant::<V>(props),
            bitmap,
            mean,
            _variant: PhantomData,
        })
    }
}

impl<V: Variant> Texture<V> for BitmapTexture<V> {
    fn eval(&self, u: f32, v: f32) -> Color {
        self.bitmap.sample(u, v)
    }

    fn mean(&self) -> Color {
        self.mean
    }
}

fn register_variant<V: Variant>(registry: &mut ClassRegistry) -> Result<(), RegistryError> {
    registry.register_plugin::<V, Uniform<V>>("uniform", TEXTURE)?;
    registry.register_plugin::<V, Checkerboard<V>>("checkerboard", TEXTURE)?;
    registry.register_plugin::<V, BitmapTexture<V>>("bitmap", TEXTURE)?;
    Ok(())
}

pub fn register(registry: &mut ClassRegistry) -> Result<(), RegistryError> {
    crate::for_each_variant!(registry, register_variant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lux_core::{ScalarRgb, Ref};

    fn checkerboard() -> Checkerboard<ScalarRgb> {
        let mut props = Properties::with_plugin("checkerboard");
        props.set("color0", Color::WHITE);
        props.set("color1", Color::BLACK);
        Checkerboard::construct(&props).unwrap()
    }

    #[test]
    fn test_checkerboard_alternates() {
        let texture = checkerboard();
        assert_eq!(texture.eval(0.25, 0.25), Color::WHITE);
        assert_eq!(texture.eval(0.75, 0.25), Color::BLACK);
        assert_eq!(texture.eval(0.75, 0.75), Color::WHITE);
        assert_eq!(texture.mean(), Color::gray(0.5));
    }

    #[test]
    fn test_checkerboard_rejects_bad_scale() {
        let mut props = Properties::with_plugin("checkerboard");
        props.set("scale", 0.0);
        assert!(Checkerboard::<ScalarRgb>::construct(&props).is_err());
    }

    #[test]
    fn test_uniform_accepts_a_number() {
        let mut props = Properties::with_plugin("uniform");
        props.set("value", 0.25);
        let texture = Uniform::<ScalarRgb>::construct(&props).unwrap();
        assert_eq!(texture.eval(0.0, 0.0), Color::gray(0.25));
        assert!(props.unqueried().is_empty());
    }

    #[test]
    fn test_texture_cast() {
        let object = Ref::into_object(Ref::new(checkerboard()));
        let texture = Ref::cast::<dyn Texture<ScalarRgb>>(&object).unwrap();
        assert_eq!(texture.eval(0.25, 0.25), Color::WHITE);
    }

    #[test]
    fn test_bitmap_loads_through_resolver() {
        use lux_core::resolver::set_thread_file_resolver;
        use lux_core::FileResolver;
        use std::sync::Arc;

        let dir = tempfile::tempdir().unwrap();
        let image = image::RgbaImage::from_pixel(2, 2, image::Rgba([255, 0, 0, 255]));
        image.save(dir.path().join("red.png")).unwrap();
        let _guard = set_thread_file_resolver(Arc::new(FileResolver::with_paths([dir.path()])));

        let mut props = Properties::with_plugin("bitmap");
        props.set("filename", "red.png");
        props.set("raw", true);
        let texture = BitmapTexture::<ScalarRgb>::construct(&props).unwrap();
        assert_eq!(texture.bitmap().width, 2);
        assert_eq!(texture.eval(0.5, 0.5), Color::new(1.0, 0.0, 0.0));
        assert_eq!(texture.mean(), Color::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_missing_bitmap_fails() {
        let mut props = Properties::with_plugin("bitmap");
        props.set("filename", "does_not_exist.png");
        assert!(BitmapTexture::<ScalarRgb>::construct(&props).is_err());
    }
}
