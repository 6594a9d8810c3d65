//! Typed key/value parameter table passed to every plugin constructor.
//!
//! Entries keep their insertion order. Reading an entry through any typed
//! accessor marks it as queried so the plugin manager can report keys a
//! constructor never looked at (usually typos).

use std::any::Any;
use std::cell::Cell;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use lux_math::{AnimatedTransform, Color, DVec3, Transform, Vec3, Vec4};
use thiserror::Error;

use crate::object::{Object, Ref};

/// Kind tag of a [`PropertyValue`], used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyType {
    Bool,
    Integer,
    Float,
    String,
    Vector,
    Color,
    Transform,
    AnimatedTransform,
    Object,
    Any,
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PropertyType::Bool => "bool",
            PropertyType::Integer => "integer",
            PropertyType::Float => "float",
            PropertyType::String => "string",
            PropertyType::Vector => "vector",
            PropertyType::Color => "color",
            PropertyType::Transform => "transform",
            PropertyType::AnimatedTransform => "animated_transform",
            PropertyType::Object => "object",
            PropertyType::Any => "any",
        };
        f.write_str(name)
    }
}

/// A single property value.
#[derive(Debug, Clone)]
pub enum PropertyValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Vector(DVec3),
    Color(Color),
    Transform(Transform),
    AnimatedTransform(Arc<AnimatedTransform>),
    Object(Ref<dyn Object>),
    /// Opaque payload carried through unchanged.
    Any(Arc<dyn Any + Send + Sync>),
}

impl PropertyValue {
    pub fn property_type(&self) -> PropertyType {
        match self {
            PropertyValue::Bool(_) => PropertyType::Bool,
            PropertyValue::Integer(_) => PropertyType::Integer,
            PropertyValue::Float(_) => PropertyType::Float,
            PropertyValue::String(_) => PropertyType::String,
            PropertyValue::Vector(_) => PropertyType::Vector,
            PropertyValue::Color(_) => PropertyType::Color,
            PropertyValue::Transform(_) => PropertyType::Transform,
            PropertyValue::AnimatedTransform(_) => PropertyType::AnimatedTransform,
            PropertyValue::Object(_) => PropertyType::Object,
            PropertyValue::Any(_) => PropertyType::Any,
        }
    }

    pub fn as_object(&self) -> Option<&Ref<dyn Object>> {
        match self {
            PropertyValue::Object(object) => Some(object),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Bool(v) => write!(f, "{v}"),
            PropertyValue::Integer(v) => write!(f, "{v}"),
            PropertyValue::Float(v) => write!(f, "{v}"),
            PropertyValue::String(v) => write!(f, "{v:?}"),
            PropertyValue::Vector(v) => write!(f, "[{}, {}, {}]", v.x, v.y, v.z),
            PropertyValue::Color(c) => write!(f, "{c}"),
            PropertyValue::Transform(t) => {
                let (scale, _, translation) = t.decompose();
                write!(f, "transform(translate={translation}, scale={scale})")
            }
            PropertyValue::AnimatedTransform(t) => {
                write!(f, "animated_transform({} keyframes)", t.keyframes().len())
            }
            PropertyValue::Object(object) => match object.id() {
                Some(id) => write!(f, "{}(id={id:?})", object.class_name()),
                None => write!(f, "{}({})", object.class_name(), object.object_id()),
            },
            PropertyValue::Any(_) => f.write_str("<any>"),
        }
    }
}

macro_rules! property_value_from {
    ($($source:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$source> for PropertyValue {
                fn from(value: $source) -> Self {
                    PropertyValue::$variant(value.into())
                }
            }
        )*
    };
}

property_value_from! {
    bool => Bool,
    i64 => Integer,
    i32 => Integer,
    u32 => Integer,
    f64 => Float,
    f32 => Float,
    String => String,
    &str => String,
    DVec3 => Vector,
    Color => Color,
    Transform => Transform,
    Arc<AnimatedTransform> => AnimatedTransform,
    Ref<dyn Object> => Object,
}

impl From<Vec3> for PropertyValue {
    fn from(value: Vec3) -> Self {
        PropertyValue::Vector(value.as_dvec3())
    }
}

impl From<AnimatedTransform> for PropertyValue {
    fn from(value: AnimatedTransform) -> Self {
        PropertyValue::AnimatedTransform(Arc::new(value))
    }
}

/// Packets hold the same value in every lane; the first lane is published.
impl From<Vec4> for PropertyValue {
    fn from(value: Vec4) -> Self {
        PropertyValue::Float(value.x as f64)
    }
}

/// Why a stored value could not be read as the requested type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionError {
    Incompatible,
    OutOfRange,
}

/// Types that can be read out of a [`PropertyValue`].
///
/// Integer to float widening is the only implicit conversion.
pub trait FromProperty: Sized {
    const EXPECTED: PropertyType;

    fn from_property(value: &PropertyValue) -> std::result::Result<Self, ConversionError>;
}

impl FromProperty for bool {
    const EXPECTED: PropertyType = PropertyType::Bool;

    fn from_property(value: &PropertyValue) -> std::result::Result<Self, ConversionError> {
        match value {
            PropertyValue::Bool(v) => Ok(*v),
            _ => Err(ConversionError::Incompatible),
        }
    }
}

impl FromProperty for i64 {
    const EXPECTED: PropertyType = PropertyType::Integer;

    fn from_property(value: &PropertyValue) -> std::result::Result<Self, ConversionError> {
        match value {
            PropertyValue::Integer(v) => Ok(*v),
            _ => Err(ConversionError::Incompatible),
        }
    }
}

macro_rules! narrow_integer {
    ($($target:ty),*) => {
        $(
            impl FromProperty for $target {
                const EXPECTED: PropertyType = PropertyType::Integer;

                fn from_property(value: &PropertyValue) -> std::result::Result<Self, ConversionError> {
                    let wide = i64::from_property(value)?;
                    <$target>::try_from(wide).map_err(|_| ConversionError::OutOfRange)
                }
            }
        )*
    };
}

narrow_integer!(i32, u32, usize);

impl FromProperty for f64 {
    const EXPECTED: PropertyType = PropertyType::Float;

    fn from_property(value: &PropertyValue) -> std::result::Result<Self, ConversionError> {
        match value {
            PropertyValue::Float(v) => Ok(*v),
            PropertyValue::Integer(v) => Ok(*v as f64),
            _ => Err(ConversionError::Incompatible),
        }
    }
}

impl FromProperty for f32 {
    const EXPECTED: PropertyType = PropertyType::Float;

    fn from_property(value: &PropertyValue) -> std::result::Result<Self, ConversionError> {
        f64::from_property(value).map(|v| v as f32)
    }
}

impl FromProperty for Vec4 {
    const EXPECTED: PropertyType = PropertyType::Float;

    fn from_property(value: &PropertyValue) -> std::result::Result<Self, ConversionError> {
        f64::from_property(value).map(|v| Vec4::splat(v as f32))
    }
}

impl FromProperty for String {
    const EXPECTED: PropertyType = PropertyType::String;

    fn from_property(value: &PropertyValue) -> std::result::Result<Self, ConversionError> {
        match value {
            PropertyValue::String(v) => Ok(v.clone()),
            _ => Err(ConversionError::Incompatible),
        }
    }
}

impl FromProperty for DVec3 {
    const EXPECTED: PropertyType = PropertyType::Vector;

    fn from_property(value: &PropertyValue) -> std::result::Result<Self, ConversionError> {
        match value {
            PropertyValue::Vector(v) => Ok(*v),
            _ => Err(ConversionError::Incompatible),
        }
    }
}

impl FromProperty for Vec3 {
    const EXPECTED: PropertyType = PropertyType::Vector;

    fn from_property(value: &PropertyValue) -> std::result::Result<Self, ConversionError> {
        DVec3::from_property(value).map(|v| v.as_vec3())
    }
}

impl FromProperty for Color {
    const EXPECTED: PropertyType = PropertyType::Color;

    fn from_property(value: &PropertyValue) -> std::result::Result<Self, ConversionError> {
        match value {
            PropertyValue::Color(c) => Ok(*c),
            _ => Err(ConversionError::Incompatible),
        }
    }
}

impl FromProperty for Transform {
    const EXPECTED: PropertyType = PropertyType::Transform;

    fn from_property(value: &PropertyValue) -> std::result::Result<Self, ConversionError> {
        match value {
            PropertyValue::Transform(t) => Ok(*t),
            _ => Err(ConversionError::Incompatible),
        }
    }
}

impl FromProperty for Arc<AnimatedTransform> {
    const EXPECTED: PropertyType = PropertyType::AnimatedTransform;

    /// A static transform is promoted to a constant animation.
    fn from_property(value: &PropertyValue) -> std::result::Result<Self, ConversionError> {
        match value {
            PropertyValue::AnimatedTransform(t) => Ok(Arc::clone(t)),
            PropertyValue::Transform(t) => Ok(Arc::new(AnimatedTransform::constant(*t))),
            _ => Err(ConversionError::Incompatible),
        }
    }
}

impl FromProperty for Ref<dyn Object> {
    const EXPECTED: PropertyType = PropertyType::Object;

    fn from_property(value: &PropertyValue) -> std::result::Result<Self, ConversionError> {
        match value {
            PropertyValue::Object(object) => Ok(object.clone()),
            _ => Err(ConversionError::Incompatible),
        }
    }
}

#[derive(Debug, Error)]
pub enum PropertyError {
    #[error("property \"{key}\" has type {found}, but {expected} was requested")]
    TypeMismatch {
        key: String,
        expected: PropertyType,
        found: PropertyType,
    },

    #[error("property \"{key}\" is required but was not specified")]
    Missing { key: String },

    #[error("property \"{key}\" = {value} is out of range for {target}")]
    OutOfRange {
        key: String,
        value: String,
        target: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, PropertyError>;

#[derive(Debug, Clone)]
struct Entry {
    value: PropertyValue,
    queried: Cell<bool>,
}

/// Ordered, typed parameter table.
///
/// Cloning copies every entry, acquires a new reference on nested objects
/// and keeps the queried marks.
#[derive(Debug, Clone, Default)]
pub struct Properties {
    entries: IndexMap<String, Entry>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with its `"type"` entry set.
    pub fn with_plugin(name: &str) -> Self {
        let mut props = Self::new();
        props.set("type", name);
        props
    }

    /// Insert or overwrite `key`. Overwriting clears its queried mark.
    ///
    /// # Panics
    ///
    /// Panics if `key` is empty.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<PropertyValue>) {
        let key = key.into();
        assert!(!key.is_empty(), "property keys must not be empty");
        self.entries.insert(
            key,
            Entry {
                value: value.into(),
                queried: Cell::new(false),
            },
        );
    }

    /// Store a nested object under `key`.
    pub fn set_object<T: Object>(&mut self, key: impl Into<String>, object: Ref<T>) {
        self.set(key, Ref::into_object(object));
    }

    /// Store an opaque payload under `key`.
    pub fn set_any<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        let payload: Arc<dyn Any + Send + Sync> = Arc::new(value);
        self.set(key, PropertyValue::Any(payload));
    }

    /// Presence check; does not mark the key as queried.
    pub fn has_property(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Raw access without marking the key as queried.
    pub fn value(&self, key: &str) -> Option<&PropertyValue> {
        self.entries.get(key).map(|entry| &entry.value)
    }

    pub fn type_of(&self, key: &str) -> Option<PropertyType> {
        self.value(key).map(PropertyValue::property_type)
    }

    /// Read a required entry.
    pub fn get<T: FromProperty>(&self, key: &str) -> Result<T> {
        match self.get_opt(key)? {
            Some(value) => Ok(value),
            None => Err(PropertyError::Missing {
                key: key.to_string(),
            }),
        }
    }

    /// Read an entry, falling back to `default` when it is absent.
    pub fn get_or<T: FromProperty>(&self, key: &str, default: T) -> Result<T> {
        Ok(self.get_opt(key)?.unwrap_or(default))
    }

    /// Read an entry if present. Absent keys are not marked as queried.
    pub fn get_opt<T: FromProperty>(&self, key: &str) -> Result<Option<T>> {
        let Some(entry) = self.entries.get(key) else {
            return Ok(None);
        };
        entry.queried.set(true);
        match T::from_property(&entry.value) {
            Ok(value) => Ok(Some(value)),
            Err(ConversionError::Incompatible) => Err(PropertyError::TypeMismatch {
                key: key.to_string(),
                expected: T::EXPECTED,
                found: entry.value.property_type(),
            }),
            Err(ConversionError::OutOfRange) => Err(PropertyError::OutOfRange {
                key: key.to_string(),
                value: entry.value.to_string(),
                target: std::any::type_name::<T>(),
            }),
        }
    }

    pub fn bool_(&self, key: &str, default: bool) -> Result<bool> {
        self.get_or(key, default)
    }

    pub fn int(&self, key: &str, default: i64) -> Result<i64> {
        self.get_or(key, default)
    }

    pub fn float(&self, key: &str, default: f64) -> Result<f64> {
        self.get_or(key, default)
    }

    pub fn string(&self, key: &str, default: &str) -> Result<String> {
        Ok(self
            .get_opt::<String>(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    pub fn vector(&self, key: &str, default: DVec3) -> Result<DVec3> {
        self.get_or(key, default)
    }

    pub fn color(&self, key: &str, default: Color) -> Result<Color> {
        self.get_or(key, default)
    }

    pub fn transform(&self, key: &str, default: Transform) -> Result<Transform> {
        self.get_or(key, default)
    }

    pub fn animated_transform(
        &self,
        key: &str,
        default: AnimatedTransform,
    ) -> Result<Arc<AnimatedTransform>> {
        Ok(self
            .get_opt::<Arc<AnimatedTransform>>(key)?
            .unwrap_or_else(|| Arc::new(default)))
    }

    /// A required nested object.
    pub fn object(&self, key: &str) -> Result<Ref<dyn Object>> {
        self.get(key)
    }

    /// Opaque payload stored with [`Properties::set_any`].
    pub fn any<T: Any + Send + Sync>(&self, key: &str) -> Result<Arc<T>> {
        let entry = self.entries.get(key).ok_or_else(|| PropertyError::Missing {
            key: key.to_string(),
        })?;
        entry.queried.set(true);
        let mismatch = || PropertyError::TypeMismatch {
            key: key.to_string(),
            expected: PropertyType::Any,
            found: entry.value.property_type(),
        };
        match &entry.value {
            PropertyValue::Any(payload) => Arc::clone(payload).downcast::<T>().map_err(|_| mismatch()),
            _ => Err(mismatch()),
        }
    }

    /// Plugin name stored under `"type"`.
    pub fn plugin_name(&self) -> Option<&str> {
        self.str_entry("type")
    }

    /// Scene id stored under `"id"`.
    pub fn id(&self) -> Option<&str> {
        self.str_entry("id")
    }

    fn str_entry(&self, key: &str) -> Option<&str> {
        let entry = self.entries.get(key)?;
        match &entry.value {
            PropertyValue::String(s) => {
                entry.queried.set(true);
                Some(s.as_str())
            }
            _ => None,
        }
    }

    /// Nested objects in insertion order. Yielded entries are marked as
    /// queried.
    pub fn objects(&self) -> impl Iterator<Item = (&str, &Ref<dyn Object>)> + '_ {
        self.entries.iter().filter_map(|(key, entry)| {
            let object = entry.value.as_object()?;
            entry.queried.set(true);
            Some((key.as_str(), object))
        })
    }

    /// Mark `key` as used. Returns false if it does not exist.
    pub fn mark_queried(&self, key: &str) -> bool {
        match self.entries.get(key) {
            Some(entry) => {
                entry.queried.set(true);
                true
            }
            None => false,
        }
    }

    pub fn was_queried(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .map(|entry| entry.queried.get())
            .unwrap_or(false)
    }

    /// Keys never read by any accessor, in insertion order.
    pub fn unqueried(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, entry)| !entry.queried.get())
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn remove(&mut self, key: &str) -> Option<PropertyValue> {
        self.entries.shift_remove(key).map(|entry| entry.value)
    }

    /// Move the entry `from` to the key `to`, keeping its position.
    /// Returns false if `from` does not exist or `to` is taken.
    pub fn rename(&mut self, from: &str, to: &str) -> bool {
        if to.is_empty() || self.entries.contains_key(to) {
            return false;
        }
        let Some(index) = self.entries.get_index_of(from) else {
            return false;
        };
        let Some((_, entry)) = self.entries.shift_remove_index(index) else {
            return false;
        };
        self.entries.shift_insert(index, to.to_string(), entry);
        true
    }

    /// Copy every entry of `other` into this table, overwriting equal keys.
    pub fn merge(&mut self, other: &Properties) {
        for (key, entry) in &other.entries {
            self.entries.insert(key.clone(), entry.clone());
        }
    }

    pub fn property_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> + '_ {
        self.entries
            .iter()
            .map(|(key, entry)| (key.as_str(), &entry.value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for Properties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Properties[")?;
        for (key, value) in self.iter() {
            writeln!(f, "  {key} = {value},")?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectBase;

    struct Leaf {
        base: ObjectBase,
    }

    impl Object for Leaf {
        crate::impl_object!("leaf");
    }

    fn leaf(id: &str) -> Ref<Leaf> {
        Ref::new(Leaf {
            base: ObjectBase::with_id(Some(id.to_string()), None),
        })
    }

    #[test]
    fn test_round_trip_every_kind() {
        let mut props = Properties::new();
        let animated = Arc::new(AnimatedTransform::constant(Transform::translate(DVec3::X)));
        let child = Ref::into_object(leaf("child"));

        props.set("b", true);
        props.set("i", 42i64);
        props.set("f", 0.25);
        props.set("s", "hello");
        props.set("v", DVec3::new(1.0, 2.0, 3.0));
        props.set("c", Color::new(0.1, 0.2, 0.3));
        props.set("t", Transform::scale(DVec3::splat(2.0)));
        props.set("a", Arc::clone(&animated));
        props.set("o", child.clone());
        props.set_any("x", vec![1u8, 2, 3]);

        assert!(props.get::<bool>("b").unwrap());
        assert_eq!(props.get::<i64>("i").unwrap(), 42);
        assert_eq!(props.get::<f64>("f").unwrap(), 0.25);
        assert_eq!(props.get::<String>("s").unwrap(), "hello");
        assert_eq!(props.get::<DVec3>("v").unwrap(), DVec3::new(1.0, 2.0, 3.0));
        assert_eq!(props.get::<Color>("c").unwrap(), Color::new(0.1, 0.2, 0.3));
        assert_eq!(
            props.get::<Transform>("t").unwrap(),
            Transform::scale(DVec3::splat(2.0))
        );
        assert!(Arc::ptr_eq(
            &props.get::<Arc<AnimatedTransform>>("a").unwrap(),
            &animated
        ));
        assert!(Ref::ptr_eq(&props.object("o").unwrap(), &child));
        assert_eq!(*props.any::<Vec<u8>>("x").unwrap(), vec![1, 2, 3]);
        assert!(props.unqueried().is_empty());
    }

    #[test]
    fn test_missing_key_returns_default_without_marking() {
        let props = Properties::new();
        assert_eq!(props.float("radius", 1.5).unwrap(), 1.5);
        assert_eq!(props.string("filename", "a.png").unwrap(), "a.png");
        assert!(!props.has_property("radius"));
        assert!(!props.was_queried("radius"));
        assert!(matches!(
            props.get::<f64>("radius"),
            Err(PropertyError::Missing { .. })
        ));
    }

    #[test]
    fn test_type_mismatch_is_reported() {
        let mut props = Properties::new();
        props.set("name", "red");
        props.set("count", 3i64);
        props.set("flag", false);

        let err = props.color("name", Color::BLACK).unwrap_err();
        match err {
            PropertyError::TypeMismatch {
                key,
                expected,
                found,
            } => {
                assert_eq!(key, "name");
                assert_eq!(expected, PropertyType::Color);
                assert_eq!(found, PropertyType::String);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(props.get::<String>("count").is_err());
        assert!(props.get::<f64>("flag").is_err());
        assert!(props.get::<bool>("count").is_err());
        assert!(props.object("name").is_err());
        assert!(props.any::<u32>("count").is_err());
    }

    #[test]
    fn test_integer_widens_to_float_only() {
        let mut props = Properties::new();
        props.set("radius", 2i64);
        props.set("scale", 0.5);

        assert_eq!(props.float("radius", 0.0).unwrap(), 2.0);
        assert_eq!(props.get::<f32>("radius").unwrap(), 2.0);
        assert!(matches!(
            props.int("scale", 0),
            Err(PropertyError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_integer_range_checks() {
        let mut props = Properties::new();
        props.set("depth", -1i64);
        props.set("big", i64::MAX);

        assert_eq!(props.get::<i32>("depth").unwrap(), -1);
        assert!(matches!(
            props.get::<u32>("depth"),
            Err(PropertyError::OutOfRange { .. })
        ));
        assert!(props.get::<i32>("big").is_err());
    }

    #[test]
    fn test_static_transform_promotes_to_animation() {
        let mut props = Properties::new();
        props.set("to_world", Transform::translate(DVec3::Y));

        let animated = props
            .animated_transform("to_world", AnimatedTransform::new())
            .unwrap();
        assert!(!animated.is_animated());
        assert_eq!(animated.eval(3.0).transform_point(DVec3::ZERO), DVec3::Y);
    }

    #[test]
    fn test_unqueried_reports_typos_in_order() {
        let mut props = Properties::with_plugin("sphere");
        props.set("radius", 2.0);
        props.set("raidus", 3.0);
        props.set("center", DVec3::ZERO);

        assert_eq!(props.plugin_name(), Some("sphere"));
        assert_eq!(props.float("radius", 1.0).unwrap(), 2.0);
        assert_eq!(props.unqueried(), vec!["raidus", "center"]);

        assert!(props.mark_queried("center"));
        assert!(!props.mark_queried("nope"));
        assert_eq!(props.unqueried(), vec!["raidus"]);
    }

    #[test]
    fn test_clone_shares_objects_and_keeps_marks() {
        let child = leaf("c");
        let mut props = Properties::new();
        props.set_object("child", child.clone());
        props.set("radius", 1.0);
        assert_eq!(props.float("radius", 0.0).unwrap(), 1.0);

        let copy = props.clone();
        assert_eq!(Ref::ref_count(&child), 3);
        assert!(copy.was_queried("radius"));
        assert!(!copy.was_queried("child"));

        drop(copy);
        drop(props);
        assert_eq!(Ref::ref_count(&child), 1);
    }

    #[test]
    fn test_overwrite_resets_mark() {
        let mut props = Properties::new();
        props.set("k", 1i64);
        props.int("k", 0).unwrap();
        props.set("k", 2i64);
        assert!(!props.was_queried("k"));
        assert_eq!(props.len(), 1);
    }

    #[test]
    fn test_objects_in_insertion_order() {
        let mut props = Properties::with_plugin("scene");
        props.set_object("b", leaf("b"));
        props.set("scale", 1.0);
        props.set_object("a", leaf("a"));

        let keys: Vec<&str> = props.objects().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert!(props.was_queried("a"));
        assert!(!props.was_queried("scale"));
    }

    #[test]
    fn test_remove_rename_merge() {
        let mut props = Properties::new();
        props.set("a", 1i64);
        props.set("b", 2i64);
        props.set("c", 3i64);

        assert!(props.rename("b", "beta"));
        assert!(!props.rename("missing", "x"));
        assert!(!props.rename("a", "c"));
        let names: Vec<&str> = props.property_names().collect();
        assert_eq!(names, vec!["a", "beta", "c"]);

        assert!(matches!(props.remove("a"), Some(PropertyValue::Integer(1))));
        assert!(props.remove("a").is_none());

        let mut other = Properties::new();
        other.set("c", 30i64);
        other.set("d", 4i64);
        props.merge(&other);
        assert_eq!(props.int("c", 0).unwrap(), 30);
        assert_eq!(props.type_of("d"), Some(PropertyType::Integer));
        assert_eq!(props.len(), 3);
    }

    #[test]
    #[should_panic(expected = "must not be empty")]
    fn test_empty_key_panics() {
        let mut props = Properties::new();
        props.set("", 1i64);
    }

    #[test]
    fn test_display_lists_entries_in_order() {
        let mut props = Properties::with_plugin("sphere");
        props.set("radius", 2.0);
        let text = props.to_string();
        let type_at = text.find("type = \"sphere\"").unwrap();
        let radius_at = text.find("radius = 2").unwrap();
        assert!(type_at < radius_at);
    }
}
