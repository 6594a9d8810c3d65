//! Parameter discovery and editing on a built object graph.
//!
//! Objects publish their tunable parameters and child objects from
//! [`Object::traverse`]. [`SceneParameters`] walks a graph once, flattens the
//! published parameters into dotted keys and applies edits back, notifying
//! each touched object through [`Object::parameters_changed`].

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

use indexmap::IndexMap;
use thiserror::Error;

use crate::object::{Object, ObjectId, Ref};
use crate::properties::{ConversionError, FromProperty, PropertyType, PropertyValue};

/// A single published parameter.
pub trait Parameter: Send + Sync {
    fn value(&self) -> PropertyValue;

    /// Whether `value` would be accepted, without storing it.
    fn check_value(&self, value: &PropertyValue) -> Result<(), ConversionError>;

    fn set_value(&self, value: &PropertyValue) -> Result<(), ConversionError>;
}

/// Interior-mutable parameter storage for plugins.
#[derive(Debug, Default)]
pub struct Tunable<T> {
    value: RwLock<T>,
}

impl<T: Clone> Tunable<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: RwLock::new(value),
        }
    }

    pub fn get(&self) -> T {
        self.value
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set(&self, value: T) {
        *self.value.write().unwrap_or_else(PoisonError::into_inner) = value;
    }
}

impl<T> Parameter for Tunable<T>
where
    T: Clone + FromProperty + Into<PropertyValue> + Send + Sync,
{
    fn value(&self) -> PropertyValue {
        self.get().into()
    }

    fn check_value(&self, value: &PropertyValue) -> Result<(), ConversionError> {
        T::from_property(value).map(drop)
    }

    fn set_value(&self, value: &PropertyValue) -> Result<(), ConversionError> {
        self.set(T::from_property(value)?);
        Ok(())
    }
}

/// Receives what an object publishes from [`Object::traverse`].
pub trait TraversalCallback {
    fn put_parameter(&mut self, name: &str, parameter: &dyn Parameter);

    fn put_object(&mut self, name: &str, object: &Ref<dyn Object>);
}

#[derive(Debug, Error)]
pub enum ParameterError {
    #[error("unknown scene parameter \"{key}\"")]
    UnknownKey { key: String },

    #[error("scene parameter \"{key}\" has type {expected}, got {found}")]
    TypeMismatch {
        key: String,
        expected: PropertyType,
        found: PropertyType,
    },

    #[error("object \"{object}\" rejected the value of parameter \"{key}\"")]
    Rejected { key: String, object: String },
}

#[derive(Debug)]
struct Entry {
    owner: ObjectId,
    name: String,
    value: PropertyValue,
}

/// Flattened view of every parameter published by a graph.
///
/// Keys are `<prefix>.<name>`, where the prefix is the object's id if it has
/// one and otherwise the parent's prefix joined with the child's slot name.
#[derive(Debug, Default)]
pub struct SceneParameters {
    entries: IndexMap<String, Entry>,
    owners: HashMap<ObjectId, Ref<dyn Object>>,
    pending: IndexMap<String, PropertyValue>,
}

struct Collector<'a> {
    prefix: &'a str,
    owner: ObjectId,
    entries: &'a mut IndexMap<String, Entry>,
    children: Vec<(String, Ref<dyn Object>)>,
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

impl TraversalCallback for Collector<'_> {
    fn put_parameter(&mut self, name: &str, parameter: &dyn Parameter) {
        self.entries.insert(
            join(self.prefix, name),
            Entry {
                owner: self.owner,
                name: name.to_string(),
                value: parameter.value(),
            },
        );
    }

    fn put_object(&mut self, name: &str, object: &Ref<dyn Object>) {
        self.children.push((name.to_string(), object.clone()));
    }
}

/// Offers staged values to one object's parameters. In check mode nothing
/// is stored; the first refused parameter is recorded with its live value.
struct Applier<'a> {
    edits: &'a HashMap<&'a str, &'a PropertyValue>,
    check: bool,
    rejected: Option<(String, PropertyValue)>,
}

impl TraversalCallback for Applier<'_> {
    fn put_parameter(&mut self, name: &str, parameter: &dyn Parameter) {
        let Some(value) = self.edits.get(name) else {
            return;
        };
        let result = if self.check {
            parameter.check_value(value)
        } else {
            parameter.set_value(value)
        };
        if result.is_err() && self.rejected.is_none() {
            self.rejected = Some((name.to_string(), parameter.value()));
        }
    }

    fn put_object(&mut self, _name: &str, _object: &Ref<dyn Object>) {}
}

impl SceneParameters {
    /// Walk the graph below `root`, visiting every object once.
    pub fn collect(root: &Ref<dyn Object>) -> Self {
        let mut params = Self::default();
        let mut visited = HashSet::new();
        params.visit(root, String::new(), &mut visited);
        log::debug!(
            "collected {} parameters from {} objects",
            params.entries.len(),
            params.owners.len()
        );
        params
    }

    fn visit(&mut self, object: &Ref<dyn Object>, prefix: String, visited: &mut HashSet<ObjectId>) {
        if !visited.insert(object.object_id()) {
            return;
        }
        let prefix = match object.id() {
            Some(id) => id.to_string(),
            None => prefix,
        };
        let mut collector = Collector {
            prefix: &prefix,
            owner: object.object_id(),
            entries: &mut self.entries,
            children: Vec::new(),
        };
        object.traverse(&mut collector);
        let children = collector.children;
        self.owners.insert(object.object_id(), object.clone());

        for (name, child) in children {
            self.visit(&child, join(&prefix, &name), visited);
        }
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.entries.get(key).map(|entry| &entry.value)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stage a new value. Nothing reaches the objects before [`update`].
    ///
    /// [`update`]: SceneParameters::update
    pub fn set(&mut self, key: &str, value: impl Into<PropertyValue>) -> Result<(), ParameterError> {
        let entry = self
            .entries
            .get_mut(key)
            .ok_or_else(|| ParameterError::UnknownKey {
                key: key.to_string(),
            })?;
        let expected = entry.value.property_type();
        let value = match (expected, value.into()) {
            (PropertyType::Float, PropertyValue::Integer(v)) => PropertyValue::Float(v as f64),
            (_, value) if value.property_type() == expected => value,
            (_, value) => {
                return Err(ParameterError::TypeMismatch {
                    key: key.to_string(),
                    expected,
                    found: value.property_type(),
                })
            }
        };
        entry.value = value.clone();
        self.pending.insert(key.to_string(), value);
        Ok(())
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Push staged values into their objects and notify each touched object
    /// once with the names of its changed parameters. Returns the number of
    /// notified objects.
    ///
    /// Every staged value is checked before any is stored. If an object
    /// refuses one, nothing is applied: the refused edit is dropped and its
    /// entry reverts to the live value, the other edits stay staged.
    pub fn update(&mut self) -> Result<usize, ParameterError> {
        let mut refused = None;
        for (owner, edits) in &group_by_owner(&self.entries, &self.pending) {
            let Some(object) = self.owners.get(owner) else {
                continue;
            };
            if let Some((name, live)) = offer(object, edits, true) {
                let key = edits
                    .iter()
                    .find(|(_, edit_name, _)| *edit_name == name)
                    .map_or_else(|| name.clone(), |(key, _, _)| key.to_string());
                refused = Some((key, name, live, object.clone()));
                break;
            }
        }

        if let Some((key, name, live, object)) = refused {
            self.pending.shift_remove(&key);
            if let Some(entry) = self.entries.get_mut(&key) {
                entry.value = live;
            }
            return Err(ParameterError::Rejected {
                key: name,
                object: object.id().unwrap_or_else(|| object.class_name()).to_string(),
            });
        }

        let pending = std::mem::take(&mut self.pending);
        let by_owner = group_by_owner(&self.entries, &pending);
        for (owner, edits) in &by_owner {
            let Some(object) = self.owners.get(owner) else {
                continue;
            };
            if let Some((name, _)) = offer(object, edits, false) {
                log::error!("{} accepted \"{name}\" when checked but refused it", object.class_name());
            }
            let keys: Vec<String> = edits.iter().map(|(_, name, _)| name.to_string()).collect();
            log::debug!("{} parameters changed on {}", keys.len(), object.class_name());
            object.parameters_changed(&keys);
        }
        Ok(by_owner.len())
    }
}

type Edit<'a> = (&'a str, &'a str, &'a PropertyValue);

/// Staged edits as `(key, parameter name, value)`, grouped by owner.
fn group_by_owner<'a>(
    entries: &'a IndexMap<String, Entry>,
    pending: &'a IndexMap<String, PropertyValue>,
) -> IndexMap<ObjectId, Vec<Edit<'a>>> {
    let mut by_owner: IndexMap<ObjectId, Vec<Edit<'a>>> = IndexMap::new();
    for (key, value) in pending {
        if let Some(entry) = entries.get(key) {
            by_owner
                .entry(entry.owner)
                .or_default()
                .push((key.as_str(), entry.name.as_str(), value));
        }
    }
    by_owner
}

/// Run `edits` past `object`, returning the first refused parameter.
fn offer(
    object: &Ref<dyn Object>,
    edits: &[Edit<'_>],
    check: bool,
) -> Option<(String, PropertyValue)> {
    let lookup: HashMap<&str, &PropertyValue> =
        edits.iter().map(|(_, name, value)| (*name, *value)).collect();
    let mut applier = Applier {
        edits: &lookup,
        check,
        rejected: None,
    };
    object.traverse(&mut applier);
    applier.rejected
}
