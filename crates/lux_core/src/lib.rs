//! LUX Core - object model and plugin system for the LUX renderer.
//!
//! This crate provides:
//!
//! - **Objects**: intrusively counted [`Ref`] handles and interface queries
//! - **Plugins**: a class registry per variant and the [`PluginManager`]
//! - **Properties**: typed key/value bags passed to plugin constructors
//! - **Scenes**: JSON descriptions built into object graphs
//! - **Traversal**: tunable scene parameters
//!
//! # Example
//!
//! ```ignore
//! use lux_core::{PluginManager, SceneLoader, DEFAULT_VARIANT};
//!
//! let manager = std::sync::Arc::new(PluginManager::new(lux_render::MODULES));
//! let graph = SceneLoader::new(manager, DEFAULT_VARIANT).load_file("scene.json")?;
//! println!("root: {}", graph.root().class_name());
//! ```

pub mod class;
pub mod config;
pub mod mesh;
pub mod object;
pub mod plugin;
pub mod properties;
pub mod resolver;
pub mod scene;
pub mod texture;
pub mod traverse;
pub mod variant;

// Re-export commonly used types
pub use class::{BoxError, Class, ClassRegistry, Plugin, RegistryError};
pub use config::{ConfigError, LoaderConfig};
pub use mesh::Mesh;
pub use object::{BackRef, Object, ObjectBase, ObjectId, Ref};
pub use plugin::{Created, PluginError, PluginManager, PluginModule};
pub use properties::{FromProperty, Properties, PropertyError, PropertyType, PropertyValue};
pub use resolver::{file_resolver, FileResolver};
pub use scene::{BuildWarning, SceneDescription, SceneError, SceneGraph, SceneLoader};
pub use texture::{Bitmap, TextureError};
pub use traverse::{Parameter, ParameterError, SceneParameters, TraversalCallback, Tunable};
pub use variant::{PacketRgb, ScalarRgb, ScalarRgbDouble, Variant, VariantId, DEFAULT_VARIANT};
