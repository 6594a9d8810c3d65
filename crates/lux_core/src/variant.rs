//! Numeric back-ends a plugin can be compiled against.
//!
//! Every leaf plugin is a generic type over [`Variant`] and is registered
//! once per variant. The registry is keyed by `(name, VariantId)`, so asking
//! for a plugin in one variant never yields the build of another.

use std::fmt;

use lux_math::{Real, Vec4};

use crate::properties::{FromProperty, PropertyValue};

/// Registry key identifying a numeric back-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariantId(&'static str);

impl VariantId {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for VariantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// A numeric representation plugins are instantiated over.
pub trait Variant: Send + Sync + 'static {
    const ID: VariantId;

    /// Scalar or packet float used for plugin parameters.
    type Float: Real + FromProperty + Into<PropertyValue>;

    /// Broadcast a description value into this variant's float type.
    fn float(value: f64) -> Self::Float {
        <Self::Float as Real>::splat(value)
    }
}

/// Single precision scalar CPU back-end.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalarRgb;

impl Variant for ScalarRgb {
    const ID: VariantId = VariantId::new("scalar_rgb");
    type Float = f32;
}

/// Double precision scalar CPU back-end.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalarRgbDouble;

impl Variant for ScalarRgbDouble {
    const ID: VariantId = VariantId::new("scalar_rgb_double");
    type Float = f64;
}

/// Four-wide packet back-end standing in for the vectorized CPU build.
#[derive(Debug, Clone, Copy, Default)]
pub struct PacketRgb;

impl Variant for PacketRgb {
    const ID: VariantId = VariantId::new("packet_rgb");
    type Float = Vec4;
}

/// Variant used when nothing else is configured.
pub const DEFAULT_VARIANT: VariantId = ScalarRgb::ID;

const ALL: [VariantId; 3] = [ScalarRgb::ID, ScalarRgbDouble::ID, PacketRgb::ID];

/// Every variant compiled into this build.
pub fn all() -> &'static [VariantId] {
    &ALL
}

/// Look up a variant by its name, e.g. `"scalar_rgb"`.
pub fn by_name(name: &str) -> Option<VariantId> {
    ALL.iter().copied().find(|v| v.name() == name)
}
