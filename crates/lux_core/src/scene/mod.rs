//! Scene descriptions and the graph builder that turns them into objects.
//!
//! A description is a tree of plugin nodes whose properties may name other
//! nodes by id. [`SceneLoader`] resolves those references, orders
//! construction so that every dependency exists before its dependents, and
//! builds each node through the [`PluginManager`](crate::plugin::PluginManager).

pub mod description;
pub mod graph;
pub mod loader;

pub use description::{DescValue, DescriptionError, NodeDesc, SceneDescription};
pub use graph::{find_cycle, topological_sort, CycleError};
pub use loader::{BuildWarning, SceneError, SceneGraph, SceneLoader};
