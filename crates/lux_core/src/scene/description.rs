//! Flat scene descriptions and their JSON form.
//!
//! A description is a list of nodes. Each node names a plugin, may carry an
//! id and lists its properties, where a property is either a plain value, a
//! reference to another node by id, or an inline child node.
//!
//! ```json
//! {
//!     "type": "scene",
//!     "children": [
//!         { "type": "sphere", "id": "s1", "radius": 2.0 },
//!         { "type": "point_light", "id": "e1",
//!           "shape_ref": { "type": "ref", "id": "s1" } }
//!     ]
//! }
//! ```

use lux_math::{AnimatedTransform, Color, DVec3, Transform};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::properties::PropertyValue;

#[derive(Debug, Error)]
pub enum DescriptionError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{path}: node has no \"type\" string")]
    MissingType { path: String },

    #[error("{path}: property keys must not be empty")]
    EmptyKey { path: String },

    #[error("{path}: {reason}")]
    Malformed { path: String, reason: String },
}

pub type Result<T> = std::result::Result<T, DescriptionError>;

fn malformed(path: &str, reason: impl Into<String>) -> DescriptionError {
    DescriptionError::Malformed {
        path: path.to_string(),
        reason: reason.into(),
    }
}

/// Value of a node property.
#[derive(Debug, Clone)]
pub enum DescValue {
    Value(PropertyValue),
    /// Reference to the node declared with this id.
    Ref(String),
    /// Inline child, by node index.
    Node(usize),
}

/// One plugin instance in a description.
#[derive(Debug, Clone)]
pub struct NodeDesc {
    pub plugin: String,
    pub id: Option<String>,
    pub entries: Vec<(String, DescValue)>,
}

impl NodeDesc {
    pub fn new(plugin: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            id: None,
            entries: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Add a plain value. A repeated key replaces the earlier entry.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.insert(key.into(), DescValue::Value(value.into()));
        self
    }

    pub fn set_ref(mut self, key: impl Into<String>, id: impl Into<String>) -> Self {
        self.insert(key.into(), DescValue::Ref(id.into()));
        self
    }

    pub fn set_child(mut self, key: impl Into<String>, node: usize) -> Self {
        self.insert(key.into(), DescValue::Node(node));
        self
    }

    fn insert(&mut self, key: String, value: DescValue) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Ids of referenced nodes and indices of inline children.
    pub fn dependencies(&self) -> impl Iterator<Item = (&str, &DescValue)> + '_ {
        self.entries
            .iter()
            .filter(|(_, value)| !matches!(value, DescValue::Value(_)))
            .map(|(key, value)| (key.as_str(), value))
    }

    /// Name used in diagnostics: the id, or the plugin and node index.
    pub fn label(&self, index: usize) -> String {
        match &self.id {
            Some(id) => id.clone(),
            None => format!("{}[{index}]", self.plugin),
        }
    }
}

/// A tree of nodes with cross references, rooted at node `root`.
#[derive(Debug, Clone)]
pub struct SceneDescription {
    nodes: Vec<NodeDesc>,
    root: usize,
}

impl SceneDescription {
    /// Description whose root is `root`.
    pub fn new(root: NodeDesc) -> Self {
        Self {
            nodes: vec![root],
            root: 0,
        }
    }

    /// Add a node and return its index.
    pub fn add(&mut self, node: NodeDesc) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Add a node and attach it to `parent` under `key`.
    pub fn add_child(&mut self, parent: usize, key: impl Into<String>, node: NodeDesc) -> usize {
        let index = self.add(node);
        if let Some(parent) = self.nodes.get_mut(parent) {
            parent.insert(key.into(), DescValue::Node(index));
        }
        index
    }

    pub fn root(&self) -> usize {
        self.root
    }

    pub fn node(&self, index: usize) -> Option<&NodeDesc> {
        self.nodes.get(index)
    }

    pub fn node_mut(&mut self, index: usize) -> Option<&mut NodeDesc> {
        self.nodes.get_mut(index)
    }

    pub fn nodes(&self) -> &[NodeDesc] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Check what the builder methods cannot: no empty ids, keys or
    /// referenced ids, and every inline child index in range.
    pub fn validate(&self) -> Result<()> {
        for (index, node) in self.nodes.iter().enumerate() {
            let path = format!("nodes[{index}]");
            if node.id.as_deref() == Some("") {
                return Err(malformed(&path, "id must not be empty"));
            }
            for (key, value) in &node.entries {
                if key.is_empty() {
                    return Err(DescriptionError::EmptyKey { path });
                }
                match value {
                    DescValue::Ref(id) if id.is_empty() => {
                        return Err(malformed(&format!("{path}.{key}"), "reference to an empty id"));
                    }
                    DescValue::Node(child) if *child >= self.nodes.len() => {
                        return Err(malformed(
                            &format!("{path}.{key}"),
                            format!("child index {child} is out of range"),
                        ));
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| malformed("$", "the root of a description must be an object"))?;
        let mut parser = Parser { nodes: Vec::new() };
        let root = parser.node(object, "$")?;
        Ok(Self {
            nodes: parser.nodes,
            root,
        })
    }
}

struct Parser {
    nodes: Vec<NodeDesc>,
}

impl Parser {
    fn node(&mut self, object: &Map<String, Value>, path: &str) -> Result<usize> {
        let plugin = object
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| DescriptionError::MissingType {
                path: path.to_string(),
            })?;

        // Reserve the slot so parents precede their inline children.
        let index = self.nodes.len();
        self.nodes.push(NodeDesc::new(plugin));
        let mut node = NodeDesc::new(plugin);

        for (key, value) in object {
            let entry_path = format!("{path}.{key}");
            match key.as_str() {
                "type" => {}
                "id" => {
                    let id = value
                        .as_str()
                        .ok_or_else(|| malformed(&entry_path, "id must be a string"))?;
                    if id.is_empty() {
                        return Err(malformed(&entry_path, "id must not be empty"));
                    }
                    node.id = Some(id.to_string());
                }
                "children" => {
                    let children = value
                        .as_array()
                        .ok_or_else(|| malformed(&entry_path, "children must be an array"))?;
                    for (i, child) in children.iter().enumerate() {
                        let child_path = format!("{entry_path}[{i}]");
                        let child = child
                            .as_object()
                            .ok_or_else(|| malformed(&child_path, "child must be an object"))?;
                        let child_index = self.node(child, &child_path)?;
                        let child_key = match &self.nodes[child_index].id {
                            Some(id) => id.clone(),
                            None => format!("_arg_{i}"),
                        };
                        node.insert(child_key, DescValue::Node(child_index));
                    }
                }
                "" => {
                    return Err(DescriptionError::EmptyKey {
                        path: path.to_string(),
                    })
                }
                _ => {
                    let value = self.value(value, &entry_path)?;
                    node.insert(key.clone(), value);
                }
            }
        }

        self.nodes[index] = node;
        Ok(index)
    }

    fn value(&mut self, value: &Value, path: &str) -> Result<DescValue> {
        let property = match value {
            Value::Bool(b) => PropertyValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => PropertyValue::Integer(i),
                None => PropertyValue::Float(number(value, path)?),
            },
            Value::String(s) => PropertyValue::String(s.clone()),
            Value::Array(_) => PropertyValue::Vector(vector(value, path)?),
            Value::Null => return Err(malformed(path, "null is not a property value")),
            Value::Object(object) => {
                let kind = object.get("type").and_then(Value::as_str).ok_or_else(|| {
                    DescriptionError::MissingType {
                        path: path.to_string(),
                    }
                })?;
                match kind {
                    "ref" => {
                        let id = object
                            .get("id")
                            .and_then(Value::as_str)
                            .ok_or_else(|| malformed(path, "reference without an \"id\" string"))?;
                        if id.is_empty() {
                            return Err(malformed(path, "reference to an empty id"));
                        }
                        return Ok(DescValue::Ref(id.to_string()));
                    }
                    "rgb" => PropertyValue::Color(color(object, path)?),
                    "transform" => PropertyValue::Transform(transform(object, path)?),
                    "animated_transform" => {
                        PropertyValue::from(animated_transform(object, path)?)
                    }
                    _ => return Ok(DescValue::Node(self.node(object, path)?)),
                }
            }
        };
        Ok(DescValue::Value(property))
    }
}

fn number(value: &Value, path: &str) -> Result<f64> {
    value
        .as_f64()
        .ok_or_else(|| malformed(path, "expected a number"))
}

fn vector(value: &Value, path: &str) -> Result<DVec3> {
    let items = value
        .as_array()
        .ok_or_else(|| malformed(path, "expected an array of 3 numbers"))?;
    if items.len() != 3 {
        return Err(malformed(
            path,
            format!("expected an array of 3 numbers, found {} entries", items.len()),
        ));
    }
    Ok(DVec3::new(
        number(&items[0], path)?,
        number(&items[1], path)?,
        number(&items[2], path)?,
    ))
}

fn color(object: &Map<String, Value>, path: &str) -> Result<Color> {
    let value = object
        .get("value")
        .ok_or_else(|| malformed(path, "rgb without a \"value\""))?;
    let path = format!("{path}.value");
    if value.is_number() {
        return Ok(Color::gray(number(value, &path)? as f32));
    }
    Ok(Color::from(vector(value, &path)?.as_vec3()))
}

/// Apply the transform operations of `object` in key order, each one after
/// the previous.
fn transform(object: &Map<String, Value>, path: &str) -> Result<Transform> {
    let mut result = Transform::IDENTITY;
    for (key, value) in object {
        let op_path = format!("{path}.{key}");
        let op = match key.as_str() {
            "type" | "time" => continue,
            "matrix" => {
                let values = value
                    .as_array()
                    .filter(|values| values.len() == 16)
                    .ok_or_else(|| malformed(&op_path, "matrix needs 16 numbers"))?;
                let mut rows = [0.0; 16];
                for (slot, value) in rows.iter_mut().zip(values) {
                    *slot = number(value, &op_path)?;
                }
                Transform::from_rows(&rows)
            }
            "translate" => Transform::translate(vector(value, &op_path)?),
            "scale" => match value {
                Value::Number(_) => Transform::scale(DVec3::splat(number(value, &op_path)?)),
                _ => Transform::scale(vector(value, &op_path)?),
            },
            "rotate" => {
                let axis = value
                    .get("axis")
                    .ok_or_else(|| malformed(&op_path, "rotate needs an \"axis\""))?;
                let angle = value
                    .get("angle")
                    .ok_or_else(|| malformed(&op_path, "rotate needs an \"angle\""))?;
                Transform::rotate(vector(axis, &op_path)?, number(angle, &op_path)?)
            }
            "look_at" => {
                let field = |name: &str| -> Result<DVec3> {
                    let value = value
                        .get(name)
                        .ok_or_else(|| malformed(&op_path, format!("look_at needs \"{name}\"")))?;
                    vector(value, &op_path)
                };
                let up = match value.get("up") {
                    Some(up) => vector(up, &op_path)?,
                    None => DVec3::Y,
                };
                Transform::look_at(field("origin")?, field("target")?, up)
            }
            other => return Err(malformed(&op_path, format!("unknown transform operation \"{other}\""))),
        };
        result = op * result;
    }
    Ok(result)
}

fn animated_transform(object: &Map<String, Value>, path: &str) -> Result<AnimatedTransform> {
    let keyframes = object
        .get("keyframes")
        .and_then(Value::as_array)
        .ok_or_else(|| malformed(path, "animated_transform needs a \"keyframes\" array"))?;
    let mut animation = AnimatedTransform::new();
    for (i, keyframe) in keyframes.iter().enumerate() {
        let key_path = format!("{path}.keyframes[{i}]");
        let keyframe = keyframe
            .as_object()
            .ok_or_else(|| malformed(&key_path, "keyframe must be an object"))?;
        let time = keyframe
            .get("time")
            .ok_or_else(|| malformed(&key_path, "keyframe needs a \"time\""))?;
        let time = number(time, &key_path)?;
        animation.append(time, transform(keyframe, &key_path)?);
    }
    Ok(animation)
}
