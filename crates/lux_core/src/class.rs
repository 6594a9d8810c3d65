//! Run-time class metadata and the name -> constructor registry.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::object::{Object, Ref};
use crate::properties::Properties;
use crate::variant::{Variant, VariantId};

/// Error type plugin constructors report.
pub type BoxError = Box<dyn Error + Send + Sync>;

/// Type-erased constructor stored in a [`Class`].
pub type Constructor =
    Arc<dyn Fn(&Properties) -> Result<Ref<dyn Object>, BoxError> + Send + Sync>;

/// Name of the class every hierarchy is rooted at.
pub const OBJECT_CLASS: &str = "Object";

/// A concrete plugin type that can be built from properties.
pub trait Plugin: Object + Sized {
    fn construct(props: &Properties) -> Result<Self, BoxError>;
}

/// Metadata for one registered class.
#[derive(Clone)]
pub struct Class {
    name: String,
    parent: Option<String>,
    variant: Option<VariantId>,
    constructor: Option<Constructor>,
}

impl Class {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn variant(&self) -> Option<VariantId> {
        self.variant
    }

    /// Abstract classes have no constructor.
    pub fn is_abstract(&self) -> bool {
        self.constructor.is_none()
    }

    pub fn constructor(&self) -> Option<&Constructor> {
        self.constructor.as_ref()
    }

    /// Run the constructor. Returns `None` for abstract classes.
    pub fn construct(&self, props: &Properties) -> Option<Result<Ref<dyn Object>, BoxError>> {
        self.constructor.as_ref().map(|construct| construct(props))
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.name)
            .field("parent", &self.parent)
            .field("variant", &self.variant)
            .field("abstract", &self.is_abstract())
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("class \"{name}\" is already registered{}", variant_suffix(.variant))]
    DuplicateClass {
        name: String,
        variant: Option<VariantId>,
    },

    #[error("class \"{name}\" names unknown parent \"{parent}\"")]
    UnknownParent { name: String, parent: String },
}

fn variant_suffix(variant: &Option<VariantId>) -> String {
    variant
        .map(|v| format!(" for variant \"{v}\""))
        .unwrap_or_default()
}

type Key = (String, Option<VariantId>);

/// Classes keyed by `(name, variant)`.
///
/// Variant-independent classes (abstract interfaces) are stored with no
/// variant and are visible from every variant. Parents must be registered
/// before their children.
#[derive(Debug)]
pub struct ClassRegistry {
    classes: HashMap<Key, Arc<Class>>,
}

impl Default for ClassRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassRegistry {
    /// Registry holding only the root `Object` class.
    pub fn new() -> Self {
        let mut classes = HashMap::new();
        classes.insert(
            (OBJECT_CLASS.to_string(), None),
            Arc::new(Class {
                name: OBJECT_CLASS.to_string(),
                parent: None,
                variant: None,
                constructor: None,
            }),
        );
        Self { classes }
    }

    /// Register a variant-independent abstract class.
    pub fn register_abstract(&mut self, name: &str, parent: &str) -> Result<(), RegistryError> {
        self.register(name, Some(parent), None, None)
    }

    /// Register the build of plugin `T` for variant `V`.
    pub fn register_plugin<V: Variant, T: Plugin>(
        &mut self,
        name: &str,
        parent: &str,
    ) -> Result<(), RegistryError> {
        let constructor: Constructor =
            Arc::new(|props: &Properties| -> Result<Ref<dyn Object>, BoxError> {
                Ok(Ref::into_object(Ref::new(T::construct(props)?)))
            });
        self.register(name, Some(parent), Some(V::ID), Some(constructor))
    }

    pub fn register(
        &mut self,
        name: &str,
        parent: Option<&str>,
        variant: Option<VariantId>,
        constructor: Option<Constructor>,
    ) -> Result<(), RegistryError> {
        let key = (name.to_string(), variant);
        if self.classes.contains_key(&key) {
            return Err(RegistryError::DuplicateClass {
                name: name.to_string(),
                variant,
            });
        }
        if let Some(parent) = parent {
            if self.lookup(parent, variant).is_none() {
                return Err(RegistryError::UnknownParent {
                    name: name.to_string(),
                    parent: parent.to_string(),
                });
            }
        }
        log::debug!("registered class {name}{}", variant_suffix(&variant));
        self.classes.insert(
            key,
            Arc::new(Class {
                name: name.to_string(),
                parent: parent.map(str::to_string),
                variant,
                constructor,
            }),
        );
        Ok(())
    }

    /// Find `name` for `variant`, falling back to a variant-independent
    /// class of the same name.
    pub fn lookup(&self, name: &str, variant: Option<VariantId>) -> Option<Arc<Class>> {
        let specific = variant.and_then(|v| self.classes.get(&(name.to_string(), Some(v))));
        specific
            .or_else(|| self.classes.get(&(name.to_string(), None)))
            .cloned()
    }

    /// True if `name` is `base` or derives from it.
    pub fn is_a(&self, name: &str, variant: Option<VariantId>, base: &str) -> bool {
        let mut current = self.lookup(name, variant);
        while let Some(class) = current {
            if class.name() == base {
                return true;
            }
            current = class.parent().and_then(|parent| self.lookup(parent, variant));
        }
        false
    }

    pub fn contains(&self, name: &str, variant: Option<VariantId>) -> bool {
        self.lookup(name, variant).is_some()
    }

    /// Names registered for `variant`, plus variant-independent ones.
    pub fn class_names(&self, variant: VariantId) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .classes
            .iter()
            .filter(|((_, v), _)| v.is_none() || *v == Some(variant))
            .map(|((name, _), _)| name.as_str())
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectBase;
    use crate::variant::{PacketRgb, ScalarRgb};

    struct Dummy {
        base: ObjectBase,
        size: f64,
    }

    impl Object for Dummy {
        crate::impl_object!("dummy");
    }

    impl Plugin for Dummy {
        fn construct(props: &Properties) -> Result<Self, BoxError> {
            let size = props.float("size", 1.0)?;
            if size < 0.0 {
                return Err("size must be positive".into());
            }
            Ok(Self {
                base: ObjectBase::new(props),
                size,
            })
        }
    }

    fn registry() -> ClassRegistry {
        let mut registry = ClassRegistry::new();
        registry.register_abstract("Shape", OBJECT_CLASS).unwrap();
        registry
            .register_plugin::<ScalarRgb, Dummy>("dummy", "Shape")
            .unwrap();
        registry
    }

    #[test]
    fn test_lookup_is_keyed_by_variant() {
        let registry = registry();
        let class = registry.lookup("dummy", Some(ScalarRgb::ID)).unwrap();
        assert_eq!(class.variant(), Some(ScalarRgb::ID));
        assert!(!class.is_abstract());

        assert!(registry.lookup("dummy", Some(PacketRgb::ID)).is_none());
        assert!(registry.lookup("Shape", Some(PacketRgb::ID)).unwrap().is_abstract());
    }

    #[test]
    fn test_is_a_walks_parent_chain() {
        let registry = registry();
        let scalar = Some(ScalarRgb::ID);
        assert!(registry.is_a("dummy", scalar, "Shape"));
        assert!(registry.is_a("dummy", scalar, OBJECT_CLASS));
        assert!(!registry.is_a("Shape", scalar, "dummy"));
        assert!(!registry.is_a("missing", scalar, OBJECT_CLASS));
    }

    #[test]
    fn test_registration_errors() {
        let mut registry = registry();
        assert!(matches!(
            registry.register_plugin::<ScalarRgb, Dummy>("dummy", "Shape"),
            Err(RegistryError::DuplicateClass { .. })
        ));
        assert!(matches!(
            registry.register_abstract("Bsdf", "Material"),
            Err(RegistryError::UnknownParent { .. })
        ));
        // The same name may exist once per variant.
        registry
            .register_plugin::<PacketRgb, Dummy>("dummy", "Shape")
            .unwrap();
    }

    #[test]
    fn test_construct_through_class() {
        let registry = registry();
        let class = registry.lookup("dummy", Some(ScalarRgb::ID)).unwrap();

        let mut props = Properties::with_plugin("dummy");
        props.set("size", 3.0);
        let object = class.construct(&props).unwrap().unwrap();
        assert_eq!(object.downcast_ref::<Dummy>().unwrap().size, 3.0);
        assert_eq!(Ref::ref_count(&object), 1);

        props.set("size", -1.0);
        let err = class.construct(&props).unwrap().unwrap_err();
        assert_eq!(err.to_string(), "size must be positive");

        let shape = registry.lookup("Shape", None).unwrap();
        assert!(shape.construct(&props).is_none());
    }

    #[test]
    fn test_class_names_include_shared_classes() {
        let registry = registry();
        assert_eq!(
            registry.class_names(ScalarRgb::ID),
            vec!["Object", "Shape", "dummy"]
        );
        assert_eq!(registry.class_names(PacketRgb::ID), vec!["Object", "Shape"]);
    }
}
