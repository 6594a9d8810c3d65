//! Plugin lookup, lazy module loading and object construction.
//!
//! Plugins are grouped into [`PluginModule`]s, each of which registers a
//! set of classes when first needed. The manager resolves a
//! `(type name, variant)` pair to a class, loading the providing module on
//! the first request, memoizes the result and runs the constructor outside
//! of any lock so constructors may themselves create objects.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use thiserror::Error;

use crate::class::{BoxError, Class, ClassRegistry, RegistryError};
use crate::object::{Object, Ref};
use crate::properties::{Properties, PropertyError};
use crate::variant::{Variant, VariantId};

/// A group of plugins registered together.
#[derive(Debug, Clone, Copy)]
pub struct PluginModule {
    pub name: &'static str,
    /// Type names this module registers.
    pub provides: &'static [&'static str],
    /// Modules whose classes must be registered first.
    pub depends: &'static [&'static str],
    pub register: fn(&mut ClassRegistry) -> std::result::Result<(), RegistryError>,
}

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("plugin \"{name}\" is not available for variant \"{variant}\"")]
    NotFound { name: String, variant: VariantId },

    #[error("properties are missing the \"type\" entry")]
    MissingType,

    #[error(transparent)]
    Property(#[from] PropertyError),

    #[error("class \"{name}\" is abstract and cannot be instantiated")]
    Abstract { name: String },

    #[error("failed to construct plugin \"{plugin}\"{}: {source}", id_suffix(.id))]
    Construction {
        plugin: String,
        id: Option<String>,
        #[source]
        source: BoxError,
    },

    #[error("plugin \"{plugin}\"{} did not use properties {keys:?}", id_suffix(.id))]
    UnusedProperties {
        plugin: String,
        id: Option<String>,
        keys: Vec<String>,
    },

    #[error("plugin \"{plugin}\" does not implement the requested interface")]
    WrongInterface { plugin: String },

    #[error("plugin \"{plugin}\" expanded into {count} objects where one was expected")]
    Expanded { plugin: String, count: usize },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

fn id_suffix(id: &Option<String>) -> String {
    id.as_ref()
        .map(|id| format!(" (id \"{id}\")"))
        .unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, PluginError>;

/// Outcome of constructing a plugin.
#[derive(Debug, Clone)]
pub enum Created {
    Single(Ref<dyn Object>),
    /// The plugin expanded into these objects.
    Expanded(Vec<Ref<dyn Object>>),
}

impl Created {
    /// Every resulting object, in order.
    pub fn into_vec(self) -> Vec<Ref<dyn Object>> {
        match self {
            Created::Single(object) => vec![object],
            Created::Expanded(objects) => objects,
        }
    }

    pub fn single(self) -> Option<Ref<dyn Object>> {
        match self {
            Created::Single(object) => Some(object),
            Created::Expanded(_) => None,
        }
    }
}

/// Resolves plugin names to classes and constructs objects.
pub struct PluginManager {
    modules: Vec<PluginModule>,
    registry: RwLock<ClassRegistry>,
    cache: RwLock<HashMap<(String, VariantId), Arc<Class>>>,
    loaded: Mutex<HashSet<&'static str>>,
    load_lock: Mutex<()>,
    strict: bool,
}

impl std::fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginManager")
            .field("modules", &self.modules.len())
            .field("loaded", &self.loaded_modules())
            .field("strict", &self.strict)
            .finish()
    }
}

impl PluginManager {
    pub fn new(modules: &[PluginModule]) -> Self {
        Self {
            modules: modules.to_vec(),
            registry: RwLock::new(ClassRegistry::new()),
            cache: RwLock::new(HashMap::new()),
            loaded: Mutex::new(HashSet::new()),
            load_lock: Mutex::new(()),
            strict: false,
        }
    }

    /// Treat unused properties as errors instead of warnings.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Names of the modules loaded so far, sorted.
    pub fn loaded_modules(&self) -> Vec<&'static str> {
        let loaded = self.loaded.lock().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<&'static str> = loaded.iter().copied().collect();
        names.sort_unstable();
        names
    }

    /// Load every module that provides `name`. Returns false if no module
    /// does.
    pub fn ensure_plugin_loaded(&self, name: &str) -> Result<bool> {
        let providers: Vec<PluginModule> = self
            .modules
            .iter()
            .filter(|module| module.provides.iter().any(|provided| *provided == name))
            .copied()
            .collect();
        if providers.is_empty() {
            return Ok(false);
        }
        for module in providers {
            self.load_module(module)?;
        }
        Ok(true)
    }

    /// Load every module in the table.
    pub fn load_all(&self) -> Result<()> {
        for module in self.modules.clone() {
            self.load_module(module)?;
        }
        Ok(())
    }

    fn load_module(&self, module: PluginModule) -> Result<()> {
        let _guard = self.load_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.load_locked(module)
    }

    /// Register `module` and its dependencies. Caller holds `load_lock`.
    fn load_locked(&self, module: PluginModule) -> Result<()> {
        {
            let loaded = self.loaded.lock().unwrap_or_else(PoisonError::into_inner);
            if loaded.contains(module.name) {
                return Ok(());
            }
        }
        for dependency in module.depends {
            match self.modules.iter().find(|m| m.name == *dependency) {
                Some(dependency) => self.load_locked(*dependency)?,
                None => log::warn!(
                    "plugin module {} depends on unknown module {dependency}",
                    module.name
                ),
            }
        }
        log::debug!("loading plugin module {}", module.name);
        {
            let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
            (module.register)(&mut registry)?;
        }
        self.loaded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(module.name);
        Ok(())
    }

    /// Resolve `name` for `variant`, loading its module on first use.
    pub fn class(&self, name: &str, variant: VariantId) -> Result<Arc<Class>> {
        let key = (name.to_string(), variant);
        if let Some(class) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(Arc::clone(class));
        }

        self.ensure_plugin_loaded(name)?;
        let class = self
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .lookup(name, Some(variant))
            .ok_or_else(|| PluginError::NotFound {
                name: name.to_string(),
                variant,
            })?;

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(cache.entry(key).or_insert(class)))
    }

    /// True if `name` resolves to a class deriving from `base`.
    pub fn is_a(&self, name: &str, variant: VariantId, base: &str) -> bool {
        if self.ensure_plugin_loaded(name).is_err() {
            return false;
        }
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_a(name, Some(variant), base)
    }

    /// Construct the plugin named by `props["type"]` for `variant`.
    ///
    /// The result is expanded: a plugin that stands in for several objects
    /// yields [`Created::Expanded`]. Keys the constructor did not read are
    /// logged, or reported as an error in strict mode.
    pub fn create_object(&self, props: &Properties, variant: VariantId) -> Result<Created> {
        let name = props.plugin_name().ok_or(PluginError::MissingType)?.to_string();
        let class = self.class(&name, variant)?;
        let id = props.id().map(str::to_string);

        let object = match class.construct(props) {
            Some(Ok(object)) => object,
            Some(Err(source)) => {
                return Err(PluginError::Construction {
                    plugin: name,
                    id,
                    source,
                })
            }
            None => return Err(PluginError::Abstract { name }),
        };

        let unused = props.unqueried();
        if !unused.is_empty() {
            if self.strict {
                return Err(PluginError::UnusedProperties {
                    plugin: name,
                    id,
                    keys: unused,
                });
            }
            log::warn!(
                "plugin \"{name}\"{} did not use properties: {}",
                id_suffix(&id),
                unused.join(", ")
            );
        }

        let expanded = object.expand();
        if expanded.is_empty() {
            Ok(Created::Single(object))
        } else {
            log::debug!("plugin \"{name}\" expanded into {} objects", expanded.len());
            Ok(Created::Expanded(expanded))
        }
    }

    /// [`create_object`](Self::create_object) for a statically known variant,
    /// requiring a single result.
    pub fn create<V: Variant>(&self, props: &Properties) -> Result<Ref<dyn Object>> {
        match self.create_object(props, V::ID)? {
            Created::Single(object) => Ok(object),
            Created::Expanded(objects) => Err(PluginError::Expanded {
                plugin: props.plugin_name().unwrap_or_default().to_string(),
                count: objects.len(),
            }),
        }
    }

    /// Construct and cast to the interface `I`.
    pub fn create_as<V: Variant, I: ?Sized + Object>(&self, props: &Properties) -> Result<Ref<I>> {
        let object = self.create::<V>(props)?;
        Ref::cast::<I>(&object).ok_or_else(|| PluginError::WrongInterface {
            plugin: object.class_name().to_string(),
        })
    }
}

static INSTANCE: RwLock<Option<Arc<PluginManager>>> = RwLock::new(None);

/// Install the process-wide manager. Calling it again keeps the existing
/// manager and returns it.
pub fn initialize(modules: &[PluginModule]) -> Arc<PluginManager> {
    let mut instance = INSTANCE.write().unwrap_or_else(PoisonError::into_inner);
    match instance.as_ref() {
        Some(manager) => Arc::clone(manager),
        None => {
            log::debug!("initializing plugin manager with {} modules", modules.len());
            let manager = Arc::new(PluginManager::new(modules));
            *instance = Some(Arc::clone(&manager));
            manager
        }
    }
}

/// Drop the process-wide manager. Safe to call when none is installed.
pub fn shutdown() {
    let previous = INSTANCE
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
    if previous.is_some() {
        log::debug!("plugin manager shut down");
    }
}

/// The process-wide manager, if [`initialize`] was called.
pub fn instance() -> Option<Arc<PluginManager>> {
    INSTANCE
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::{Plugin, OBJECT_CLASS};
    use crate::object::ObjectBase;
    use crate::variant::{PacketRgb, ScalarRgb};
    use std::marker::PhantomData;

    trait Shape: Object {
        fn radius(&self) -> f64;
    }

    struct Ball<V: Variant> {
        base: ObjectBase,
        radius: f64,
        _variant: PhantomData<V>,
    }

    impl<V: Variant> Object for Ball<V> {
        crate::impl_object!("ball", dyn Shape);
    }

    impl<V: Variant> Shape for Ball<V> {
        fn radius(&self) -> f64 {
            self.radius
        }
    }

    impl<V: Variant> Plugin for Ball<V> {
        fn construct(props: &Properties) -> std::result::Result<Self, BoxError> {
            let radius = props.float("radius", 1.0)?;
            if radius <= 0.0 {
                return Err(format!("radius must be positive, got {radius}").into());
            }
            Ok(Self {
                base: ObjectBase::for_variant::<V>(props),
                radius,
                _variant: PhantomData,
            })
        }
    }

    struct Pair {
        base: ObjectBase,
        parts: Vec<Ref<dyn Object>>,
    }

    impl Object for Pair {
        crate::impl_object!("pair");

        fn expand(&self) -> Vec<Ref<dyn Object>> {
            self.parts.clone()
        }
    }

    impl Plugin for Pair {
        fn construct(props: &Properties) -> std::result::Result<Self, BoxError> {
            let parts = props.objects().map(|(_, object)| object.clone()).collect();
            Ok(Self {
                base: ObjectBase::new(props),
                parts,
            })
        }
    }

    fn register_bases(registry: &mut ClassRegistry) -> std::result::Result<(), RegistryError> {
        registry.register_abstract("Shape", OBJECT_CLASS)
    }

    fn register_shapes(registry: &mut ClassRegistry) -> std::result::Result<(), RegistryError> {
        registry.register_plugin::<ScalarRgb, Ball<ScalarRgb>>("ball", "Shape")?;
        registry.register_plugin::<ScalarRgb, Pair>("pair", "Shape")?;
        Ok(())
    }

    const MODULES: &[PluginModule] = &[
        PluginModule {
            name: "bases",
            provides: &["Shape"],
            depends: &[],
            register: register_bases,
        },
        PluginModule {
            name: "shapes",
            provides: &["ball", "pair"],
            depends: &["bases"],
            register: register_shapes,
        },
    ];

    fn ball(radius: f64) -> Properties {
        let mut props = Properties::with_plugin("ball");
        props.set("radius", radius);
        props
    }

    #[test]
    fn test_create_loads_module_on_demand() {
        let _ = env_logger::builder().is_test(true).try_init();
        let manager = PluginManager::new(MODULES);
        assert!(manager.loaded_modules().is_empty());

        let object = manager.create::<ScalarRgb>(&ball(2.0)).unwrap();
        assert_eq!(object.class_name(), "ball");
        assert_eq!(object.variant(), Some(ScalarRgb::ID));
        assert_eq!(manager.loaded_modules(), vec!["bases", "shapes"]);

        // Cached afterwards; the module is not registered twice.
        manager.create::<ScalarRgb>(&ball(3.0)).unwrap();
        assert!(manager.is_a("ball", ScalarRgb::ID, "Shape"));
    }

    #[test]
    fn test_not_found_names_plugin_and_variant() {
        let manager = PluginManager::new(MODULES);
        let err = manager
            .create_object(&Properties::with_plugin("nonexistent_shape"), ScalarRgb::ID)
            .unwrap_err();
        match &err {
            PluginError::NotFound { name, variant } => {
                assert_eq!(name, "nonexistent_shape");
                assert_eq!(*variant, ScalarRgb::ID);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("scalar_rgb"));

        // Registered for another variant only.
        assert!(matches!(
            manager.create_object(&ball(1.0), PacketRgb::ID),
            Err(PluginError::NotFound { .. })
        ));
    }

    #[test]
    fn test_construction_error_is_wrapped() {
        let manager = PluginManager::new(MODULES);
        let mut props = ball(-1.0);
        props.set("id", "bad");
        let err = manager.create::<ScalarRgb>(&props).unwrap_err();
        match err {
            PluginError::Construction { plugin, id, source } => {
                assert_eq!(plugin, "ball");
                assert_eq!(id.as_deref(), Some("bad"));
                assert!(source.to_string().contains("radius must be positive"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_type_mismatch_surfaces_as_construction_error() {
        let manager = PluginManager::new(MODULES);
        let mut props = Properties::with_plugin("ball");
        props.set("radius", "large");
        let err = manager.create::<ScalarRgb>(&props).unwrap_err();
        let PluginError::Construction { source, .. } = err else {
            panic!("expected a construction error");
        };
        assert!(source.downcast_ref::<PropertyError>().is_some());
    }

    #[test]
    fn test_missing_type_and_abstract() {
        let manager = PluginManager::new(MODULES);
        assert!(matches!(
            manager.create_object(&Properties::new(), ScalarRgb::ID),
            Err(PluginError::MissingType)
        ));
        assert!(matches!(
            manager.create_object(&Properties::with_plugin("Shape"), ScalarRgb::ID),
            Err(PluginError::Abstract { .. })
        ));
    }

    #[test]
    fn test_unused_properties_warn_or_fail() {
        let manager = PluginManager::new(MODULES);
        let mut props = ball(2.0);
        props.set("raidus", 3.0);
        let object = manager.create::<ScalarRgb>(&props).unwrap();
        assert_eq!(Ref::cast::<dyn Shape>(&object).unwrap().radius(), 2.0);
        assert_eq!(props.unqueried(), vec!["raidus"]);

        let strict = PluginManager::new(MODULES).with_strict(true);
        let mut props = ball(2.0);
        props.set("raidus", 3.0);
        match strict.create::<ScalarRgb>(&props) {
            Err(PluginError::UnusedProperties { keys, .. }) => assert_eq!(keys, vec!["raidus"]),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_expand_returns_parts() {
        let manager = PluginManager::new(MODULES);
        let a = manager.create::<ScalarRgb>(&ball(1.0)).unwrap();
        let b = manager.create::<ScalarRgb>(&ball(2.0)).unwrap();

        let mut props = Properties::with_plugin("pair");
        props.set("a", a.clone());
        props.set("b", b.clone());
        let created = manager.create_object(&props, ScalarRgb::ID).unwrap();
        let parts = created.into_vec();
        assert_eq!(parts.len(), 2);
        assert!(Ref::ptr_eq(&parts[0], &a));
        assert!(Ref::ptr_eq(&parts[1], &b));

        assert!(matches!(
            manager.create::<ScalarRgb>(&props),
            Err(PluginError::Expanded { count: 2, .. })
        ));
    }

    #[test]
    fn test_create_as_interface() {
        let manager = PluginManager::new(MODULES);
        let shape = manager.create_as::<ScalarRgb, dyn Shape>(&ball(4.0)).unwrap();
        assert_eq!(shape.radius(), 4.0);
        assert_eq!(Ref::ref_count(&shape), 1);
    }

    #[test]
    fn test_concurrent_creation() {
        use rayon::prelude::*;

        let manager = PluginManager::new(MODULES);
        let radii: Vec<f64> = (0..64)
            .into_par_iter()
            .map(|i| {
                let object = manager.create::<ScalarRgb>(&ball(1.0 + i as f64)).unwrap();
                Ref::cast::<dyn Shape>(&object).unwrap().radius()
            })
            .collect();
        assert_eq!(radii.len(), 64);
        assert_eq!(radii[10], 11.0);
        assert_eq!(manager.loaded_modules(), vec!["bases", "shapes"]);
    }

    #[test]
    fn test_global_instance_lifecycle() {
        shutdown();
        assert!(instance().is_none());
        let first = initialize(MODULES);
        let second = initialize(&[]);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(instance().is_some());
        shutdown();
        shutdown();
        assert!(instance().is_none());
    }
}
