//! LUX Render - plugin interfaces and the built-in plugin set
//!
//! Every plugin here is generic over the [`Variant`](lux_core::Variant) and
//! registered once per compiled variant. The plugins are grouped into
//! [`MODULES`], which the [`PluginManager`] loads lazily the first time one
//! of their names is requested.
//!
//! ```ignore
//! let manager = lux_render::initialize();
//! let loader = SceneLoader::new(manager, ScalarRgb::ID);
//! let graph = loader.load_file("scenes/cornell.json")?;
//! ```

use std::sync::Arc;

use lux_core::{PluginManager, PluginModule};

/// Run a generic `register::<V>` function for every compiled variant.
macro_rules! for_each_variant {
    ($registry:expr, $register:ident) => {{
        $register::<lux_core::ScalarRgb>($registry)?;
        $register::<lux_core::ScalarRgbDouble>($registry)?;
        $register::<lux_core::PacketRgb>($registry)
    }};
}
pub(crate) use for_each_variant;

pub mod bsdfs;
pub mod emitters;
pub mod films;
pub mod integrators;
pub mod interfaces;
pub mod phase;
pub mod rfilters;
pub mod samplers;
pub mod scene;
pub mod shapes;
pub mod textures;

pub use interfaces::{
    Bsdf, Emitter, Film, Integrator, PhaseFunction, ReconstructionFilter, Sampler, Scene, Shape,
    Texture,
};
pub use scene::BasicScene;

/// The built-in plugin modules.
pub const MODULES: &[PluginModule] = &[
    PluginModule {
        name: "core",
        provides: interfaces::BASES,
        depends: &[],
        register: interfaces::register_bases,
    },
    PluginModule {
        name: "textures",
        provides: &["uniform", "checkerboard", "bitmap"],
        depends: &["core"],
        register: textures::register,
    },
    PluginModule {
        name: "bsdfs",
        provides: &["diffuse", "conductor", "dielectric"],
        depends: &["core"],
        register: bsdfs::register,
    },
    PluginModule {
        name: "emitters",
        provides: &["point_light", "area", "constant", "light_group"],
        depends: &["core"],
        register: emitters::register,
    },
    PluginModule {
        name: "shapes",
        provides: &["sphere", "rectangle", "obj"],
        depends: &["core", "bsdfs"],
        register: shapes::register,
    },
    PluginModule {
        name: "phase",
        provides: &["isotropic", "hg"],
        depends: &["core"],
        register: phase::register,
    },
    PluginModule {
        name: "samplers",
        provides: &["independent"],
        depends: &["core"],
        register: samplers::register,
    },
    PluginModule {
        name: "rfilters",
        provides: &["box", "gaussian"],
        depends: &["core"],
        register: rfilters::register,
    },
    PluginModule {
        name: "films",
        provides: &["hdrfilm"],
        depends: &["core", "rfilters"],
        register: films::register,
    },
    PluginModule {
        name: "integrators",
        provides: &["path"],
        depends: &["core"],
        register: integrators::register,
    },
    PluginModule {
        name: "scene",
        provides: &["scene"],
        depends: &["core"],
        register: scene::register,
    },
];

/// Install the process-wide plugin manager with the built-in modules.
pub fn initialize() -> Arc<PluginManager> {
    lux_core::plugin::initialize(MODULES)
}

/// A private manager with the built-in modules, independent of the
/// process-wide one.
pub fn manager(strict: bool) -> Arc<PluginManager> {
    Arc::new(PluginManager::new(MODULES).with_strict(strict))
}
