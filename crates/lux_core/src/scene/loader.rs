//! Building live object graphs from scene descriptions.
//!
//! Construction runs in three phases:
//!
//! 1. **Resolve** - index node ids, resolve every reference and order the
//!    nodes so each one follows everything it depends on. Cycles are
//!    rejected here, before any plugin runs.
//! 2. **Build** - construct the nodes in that order through the plugin
//!    manager, handing each one the already-built objects it refers to.
//!    A node referenced several times is built once and shared.
//! 3. **Finalize** - keep what is reachable from the root; nodes nothing
//!    refers to are reported and released.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use thiserror::Error;

use super::description::{DescValue, DescriptionError, NodeDesc, SceneDescription};
use super::graph::{find_cycle, topological_sort};
use crate::config::{ConfigError, LoaderConfig};
use crate::object::{Object, Ref};
use crate::plugin::{Created, PluginError, PluginManager};
use crate::properties::Properties;
use crate::resolver::{self, FileResolver};
use crate::variant::VariantId;

#[derive(Debug, Error)]
pub enum SceneError {
    #[error("failed to read scene {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Description(#[from] DescriptionError),

    #[error("node \"{node}\" references undeclared id \"{id}\"")]
    UnresolvedReference { node: String, id: String },

    #[error("cyclic reference between nodes {}", .ids.join(" -> "))]
    CyclicReference { ids: Vec<String> },

    #[error("failed to build node \"{node}\": {source}")]
    Build {
        node: String,
        #[source]
        source: PluginError,
    },

    #[error("the root node expanded into {count} objects")]
    RootExpanded { count: usize },
}

pub type Result<T> = std::result::Result<T, SceneError>;

/// Non-fatal findings collected while building.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildWarning {
    /// Several nodes declared the same id; the last one wins.
    DuplicateId { id: String },
    /// A declared node is not reachable from the root.
    UnreferencedNode { node: String },
    /// A plugin did not read these properties.
    UnusedProperties { node: String, keys: Vec<String> },
}

impl fmt::Display for BuildWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildWarning::DuplicateId { id } => {
                write!(f, "id \"{id}\" is declared more than once, the last declaration wins")
            }
            BuildWarning::UnreferencedNode { node } => {
                write!(f, "node \"{node}\" is never referenced and was released")
            }
            BuildWarning::UnusedProperties { node, keys } => {
                write!(f, "node \"{node}\" did not use properties {}", keys.join(", "))
            }
        }
    }
}

/// A built scene.
#[derive(Debug)]
pub struct SceneGraph {
    root: Ref<dyn Object>,
    objects: IndexMap<String, Ref<dyn Object>>,
    construction_order: Vec<String>,
    warnings: Vec<BuildWarning>,
}

impl SceneGraph {
    pub fn root(&self) -> &Ref<dyn Object> {
        &self.root
    }

    /// A named node reachable from the root.
    pub fn get(&self, id: &str) -> Option<&Ref<dyn Object>> {
        self.objects.get(id)
    }

    /// Named reachable nodes in construction order.
    pub fn objects(&self) -> impl Iterator<Item = (&str, &Ref<dyn Object>)> + '_ {
        self.objects.iter().map(|(id, object)| (id.as_str(), object))
    }

    /// Labels of every built node, dependencies first.
    pub fn construction_order(&self) -> &[String] {
        &self.construction_order
    }

    pub fn warnings(&self) -> &[BuildWarning] {
        &self.warnings
    }

    /// Drop the id table and keep only the root handle.
    pub fn into_root(self) -> Ref<dyn Object> {
        self.root
    }
}

/// Builds scene descriptions for one variant.
#[derive(Debug, Clone)]
pub struct SceneLoader {
    manager: Arc<PluginManager>,
    variant: VariantId,
    resolver: Option<Arc<FileResolver>>,
    warn_unreferenced: bool,
}

impl SceneLoader {
    pub fn new(manager: Arc<PluginManager>, variant: VariantId) -> Self {
        Self {
            manager,
            variant,
            resolver: None,
            warn_unreferenced: true,
        }
    }

    /// Loader set up from `config`. Strictness is a property of `manager`.
    pub fn from_config(
        manager: Arc<PluginManager>,
        config: &LoaderConfig,
    ) -> std::result::Result<Self, ConfigError> {
        let mut loader = Self::new(manager, config.variant_id()?);
        loader.warn_unreferenced = config.warn_unreferenced;
        if !config.search_paths.is_empty() {
            loader.resolver = Some(Arc::new(config.file_resolver()));
        }
        Ok(loader)
    }

    /// Resolve files with `resolver` instead of the thread's current one.
    pub fn with_resolver(mut self, resolver: Arc<FileResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_warn_unreferenced(mut self, warn: bool) -> Self {
        self.warn_unreferenced = warn;
        self
    }

    pub fn variant(&self) -> VariantId {
        self.variant
    }

    pub fn manager(&self) -> &Arc<PluginManager> {
        &self.manager
    }

    pub fn load_string(&self, json: &str) -> Result<SceneGraph> {
        let description = SceneDescription::from_json(json)?;
        self.load_description(&description)
    }

    /// Load a JSON file. Relative paths inside it are looked up next to the
    /// file first.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<SceneGraph> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SceneError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let description = SceneDescription::from_json(&text)?;
        log::info!("loading scene {}", path.display());

        let mut search = self.current_resolver().as_ref().clone();
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            search.prepend(dir);
        }
        let _guard = resolver::set_thread_file_resolver(Arc::new(search));
        self.build(&description)
    }

    pub fn load_description(&self, description: &SceneDescription) -> Result<SceneGraph> {
        let _guard = self
            .resolver
            .as_ref()
            .map(|resolver| resolver::set_thread_file_resolver(Arc::clone(resolver)));
        self.build(description)
    }

    fn current_resolver(&self) -> Arc<FileResolver> {
        match &self.resolver {
            Some(resolver) => Arc::clone(resolver),
            None => resolver::file_resolver(),
        }
    }

    fn build(&self, description: &SceneDescription) -> Result<SceneGraph> {
        description.validate()?;
        let nodes = description.nodes();
        let mut warnings = Vec::new();

        // Phase 1: ids, references, order.
        let mut ids: HashMap<&str, usize> = HashMap::new();
        for (index, node) in nodes.iter().enumerate() {
            if let Some(id) = &node.id {
                if ids.insert(id.as_str(), index).is_some() {
                    log::warn!("id \"{id}\" is declared more than once, the last declaration wins");
                    warnings.push(BuildWarning::DuplicateId { id: id.clone() });
                }
            }
        }

        let mut dependencies: Vec<Vec<usize>> = Vec::with_capacity(nodes.len());
        for (index, node) in nodes.iter().enumerate() {
            let mut deps = Vec::new();
            for (_, value) in node.dependencies() {
                let target = match value {
                    DescValue::Ref(id) => *ids.get(id.as_str()).ok_or_else(|| {
                        SceneError::UnresolvedReference {
                            node: node.label(index),
                            id: id.clone(),
                        }
                    })?,
                    DescValue::Node(child) => *child,
                    DescValue::Value(_) => continue,
                };
                deps.push(target);
            }
            dependencies.push(deps);
        }

        let edges = dependencies
            .iter()
            .enumerate()
            .flat_map(|(node, deps)| deps.iter().map(move |dep| (*dep, node)));
        let order = match topological_sort(0..nodes.len(), edges) {
            Ok(order) => order,
            Err(err) => {
                let cycle = find_cycle(&err.remaining, |node| dependencies[node].clone())
                    .unwrap_or(err.remaining);
                return Err(SceneError::CyclicReference {
                    ids: cycle.iter().map(|&i| nodes[i].label(i)).collect(),
                });
            }
        };

        // Phase 2: construct, dependencies first.
        let mut built: Vec<Option<Created>> = vec![None; nodes.len()];
        let mut construction_order = Vec::with_capacity(order.len());
        for &index in &order {
            let node = &nodes[index];
            let props = self.properties(node, &ids, &built);
            let created = self
                .manager
                .create_object(&props, self.variant)
                .map_err(|source| SceneError::Build {
                    node: node.label(index),
                    source,
                })?;

            let unused = props.unqueried();
            if !unused.is_empty() {
                warnings.push(BuildWarning::UnusedProperties {
                    node: node.label(index),
                    keys: unused,
                });
            }
            log::debug!("built {} as {}", node.label(index), node.plugin);
            construction_order.push(node.label(index));
            built[index] = Some(created);
        }

        // Phase 3: keep what the root reaches.
        let root_index = description.root();
        let mut reachable = vec![false; nodes.len()];
        let mut queue = VecDeque::from([root_index]);
        while let Some(index) = queue.pop_front() {
            if std::mem::replace(&mut reachable[index], true) {
                continue;
            }
            queue.extend(dependencies[index].iter().copied());
        }

        let mut objects = IndexMap::new();
        for &index in &order {
            let node = &nodes[index];
            if !reachable[index] {
                let label = node.label(index);
                if self.warn_unreferenced {
                    log::warn!("node \"{label}\" is never referenced, releasing it");
                }
                warnings.push(BuildWarning::UnreferencedNode { node: label });
                built[index] = None;
                continue;
            }
            if let (Some(id), Some(Created::Single(object))) = (&node.id, &built[index]) {
                if ids.get(id.as_str()) == Some(&index) {
                    objects.insert(id.clone(), object.clone());
                }
            }
        }

        let root = match built[root_index].take() {
            Some(Created::Single(root)) => root,
            Some(Created::Expanded(objects)) => {
                return Err(SceneError::RootExpanded {
                    count: objects.len(),
                })
            }
            None => {
                return Err(SceneError::RootExpanded { count: 0 });
            }
        };

        log::info!(
            "built scene with {} nodes ({} warnings)",
            construction_order.len(),
            warnings.len()
        );
        Ok(SceneGraph {
            root,
            objects,
            construction_order,
            warnings,
        })
    }

    /// Properties for `node`, with references replaced by built objects.
    fn properties(
        &self,
        node: &NodeDesc,
        ids: &HashMap<&str, usize>,
        built: &[Option<Created>],
    ) -> Properties {
        let mut props = Properties::with_plugin(&node.plugin);
        if let Some(id) = &node.id {
            props.set("id", id.as_str());
        }
        for (key, value) in &node.entries {
            let target = match value {
                DescValue::Value(value) => {
                    props.set(key.as_str(), value.clone());
                    continue;
                }
                DescValue::Ref(id) => ids.get(id.as_str()).copied(),
                DescValue::Node(child) => Some(*child),
            };
            match target.and_then(|target| built[target].as_ref()) {
                Some(Created::Single(object)) => props.set(key.as_str(), object.clone()),
                Some(Created::Expanded(objects)) => {
                    for (i, object) in objects.iter().enumerate() {
                        props.set(format!("{key}_{i}"), object.clone());
                    }
                }
                // Dependencies are built first, so this only happens if the
                // order was computed from a different description.
                None => log::error!("dependency \"{key}\" of {} is not built", node.plugin),
            }
        }
        props
    }
}
