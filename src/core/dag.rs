//! Task graph for dependency-driven submissions.
//!
//! A [`TaskGraph`] maps caller-chosen [`TaskId`]s to [`TaskSpec`]s. Edges are
//! implied by each spec's `dependencies` list. Before any unit is scheduled
//! the graph is validated with petgraph so that cycles and references to
//! unknown tasks are rejected instead of deadlocking the watchers.

use crate::core::task::{TaskId, TaskSpec};
use crate::error::{Error, Result};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// A dependency graph submission.
///
/// Inserting an id that is already present replaces the earlier spec
/// (last write wins).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskGraph {
    tasks: BTreeMap<TaskId, TaskSpec>,
}

impl TaskGraph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task, replacing any spec already stored under the same id.
    ///
    /// Returns the replaced spec, if any.
    pub fn insert(&mut self, id: impl Into<TaskId>, spec: TaskSpec) -> Option<TaskSpec> {
        self.tasks.insert(id.into(), spec)
    }

    /// Builder form of [`TaskGraph::insert`].
    pub fn with_task(mut self, id: impl Into<TaskId>, spec: TaskSpec) -> Self {
        self.insert(id, spec);
        self
    }

    pub fn get(&self, id: &TaskId) -> Option<&TaskSpec> {
        self.tasks.get(id)
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.tasks.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Task ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = &TaskId> {
        self.tasks.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TaskId, &TaskSpec)> {
        self.tasks.iter()
    }

    /// Number of declared dependency edges, duplicates included.
    pub fn dependency_count(&self) -> usize {
        self.tasks.values().map(|s| s.dependencies.len()).sum()
    }

    /// Check that every dependency names a task in this graph and that the
    /// dependency relation is acyclic.
    ///
    /// # Errors
    /// Returns [`Error::InvalidGraph`] naming the first offending task.
    pub fn validate(&self) -> Result<()> {
        self.build_graph().map(|_| ())
    }

    /// Consume the graph, yielding its tasks in id order.
    pub fn into_tasks(self) -> impl Iterator<Item = (TaskId, TaskSpec)> {
        self.tasks.into_iter()
    }

    /// Build the petgraph view of this submission, rejecting dangling
    /// references and cycles.
    fn build_graph(&self) -> Result<DiGraph<TaskId, ()>> {
        let mut graph = DiGraph::new();
        let mut index: HashMap<&TaskId, NodeIndex> = HashMap::with_capacity(self.tasks.len());

        for id in self.tasks.keys() {
            index.insert(id, graph.add_node(id.clone()));
        }

        for (id, spec) in &self.tasks {
            let to = index[id];
            for dep in &spec.dependencies {
                if dep == id {
                    return Err(Error::InvalidGraph(format!(
                        "task '{}' depends on itself",
                        id
                    )));
                }
                let from = index.get(dep).ok_or_else(|| {
                    Error::InvalidGraph(format!(
                        "task '{}' depends on unknown task '{}'",
                        id, dep
                    ))
                })?;
                graph.update_edge(*from, to, ());
            }
        }

        if let Err(cycle) = toposort(&graph, None) {
            return Err(Error::InvalidGraph(format!(
                "dependency cycle involving task '{}'",
                graph[cycle.node_id()]
            )));
        }

        Ok(graph)
    }
}

impl<I: Into<TaskId>> FromIterator<(I, TaskSpec)> for TaskGraph {
    fn from_iter<T: IntoIterator<Item = (I, TaskSpec)>>(iter: T) -> Self {
        let mut graph = TaskGraph::new();
        for (id, spec) in iter {
            graph.insert(id, spec);
        }
        graph
    }
}

impl From<HashMap<TaskId, TaskSpec>> for TaskGraph {
    fn from(map: HashMap<TaskId, TaskSpec>) -> Self {
        map.into_iter().collect()
    }
}

impl From<BTreeMap<TaskId, TaskSpec>> for TaskGraph {
    fn from(tasks: BTreeMap<TaskId, TaskSpec>) -> Self {
        Self { tasks }
    }
}
