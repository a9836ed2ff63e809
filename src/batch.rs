//! Batch files: a submission of tasks loaded from TOML or JSON.
//!
//! ```toml
//! strategy = "graph"
//! max_concurrent = 2
//!
//! [graph.fetch]
//! description = "curl -s https://example.com"
//!
//! [graph.count]
//! description = "wc -c <<< \"$SWARM_CONTEXT\""
//! dependencies = ["fetch"]
//! ```
//!
//! A batch holds either a `[[tasks]]` list (parallel and sequential runs)
//! or a `[graph.<id>]` table (dependency-graph runs). Either form can be run
//! with any strategy; see [`Batch::task_list`] and [`Batch::task_graph`].

use crate::core::dag::TaskGraph;
use crate::core::task::{TaskResult, TaskSpec};
use crate::error::{Error, Result};
use crate::orchestration::engine::{unit_key, Orchestrator};
use crate::orchestration::events::Strategy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<Strategy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrent: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<TaskSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph: Option<TaskGraph>,
}

impl Batch {
    /// Load a batch file. `.json` files are parsed as JSON, anything else
    /// as TOML.
    pub fn load(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "Loading batch");
        let raw = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if is_json {
            Self::from_json_str(&raw)
        } else {
            Self::from_toml_str(&raw)
        }
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Check the batch without running anything.
    pub fn validate(&self) -> Result<()> {
        if !self.tasks.is_empty() && self.graph.is_some() {
            return Err(Error::Validation(
                "batch defines both a task list and a graph".to_string(),
            ));
        }
        if self.max_concurrent == Some(0) {
            return Err(Error::Validation(
                "max_concurrent must be at least 1".to_string(),
            ));
        }
        if let Some(graph) = &self.graph {
            graph.validate()?;
        }
        Ok(())
    }

    /// Number of tasks in whichever form the batch uses.
    pub fn len(&self) -> usize {
        self.graph.as_ref().map_or(self.tasks.len(), TaskGraph::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pick the strategy: an explicit override, then the batch's own
    /// setting, then graph for graph-form batches, then `default`.
    pub fn resolve_strategy(&self, explicit: Option<Strategy>, default: Strategy) -> Strategy {
        explicit
            .or(self.strategy)
            .or_else(|| self.graph.as_ref().map(|_| Strategy::Graph))
            .unwrap_or(default)
    }

    /// Tasks as a list. Graph-form batches are listed in id order.
    pub fn task_list(&self) -> Vec<TaskSpec> {
        match &self.graph {
            Some(graph) => graph.iter().map(|(_, spec)| spec.clone()).collect(),
            None => self.tasks.clone(),
        }
    }

    /// Tasks as a graph. List-form batches are keyed `task_<index>` and keep
    /// whatever dependencies they declare.
    pub fn task_graph(&self) -> TaskGraph {
        match &self.graph {
            Some(graph) => graph.clone(),
            None => self
                .tasks
                .iter()
                .enumerate()
                .map(|(index, spec)| (format!("task_{}", index), spec.clone()))
                .collect(),
        }
    }

    /// Keys used to report list runs: graph ids for graph-form batches,
    /// registry keys otherwise.
    fn list_keys(&self) -> Vec<String> {
        match &self.graph {
            Some(graph) => graph.ids().map(|id| id.to_string()).collect(),
            None => (0..self.tasks.len()).map(unit_key).collect(),
        }
    }

    /// Validate and run the batch on `orchestrator`.
    pub async fn run(
        &self,
        orchestrator: &Orchestrator,
        strategy: Strategy,
        max_concurrent: usize,
    ) -> Result<BatchReport> {
        self.validate()?;
        let entries = match strategy {
            Strategy::Parallel => {
                let results = orchestrator
                    .run_parallel(&self.task_list(), max_concurrent)
                    .await?;
                ReportEntry::zip(self.list_keys(), results)
            }
            Strategy::Sequential => {
                let results = orchestrator.run_sequential(&self.task_list()).await?;
                ReportEntry::zip(self.list_keys(), results)
            }
            Strategy::Graph => orchestrator
                .run_graph(self.task_graph())
                .await?
                .into_iter()
                .map(|(id, result)| ReportEntry {
                    key: id.to_string(),
                    result,
                })
                .collect(),
        };
        Ok(BatchReport { strategy, entries })
    }
}

/// Outcome of one task in a [`BatchReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub key: String,
    #[serde(flatten)]
    pub result: TaskResult,
}

impl ReportEntry {
    fn zip(keys: Vec<String>, results: Vec<TaskResult>) -> Vec<Self> {
        keys.into_iter()
            .zip(results)
            .map(|(key, result)| Self { key, result })
            .collect()
    }
}

/// Results of a batch run, in reporting order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub strategy: Strategy,
    pub entries: Vec<ReportEntry>,
}

impl BatchReport {
    pub fn failed(&self) -> usize {
        self.entries.iter().filter(|e| !e.result.success).count()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0
    }

    pub fn get(&self, key: &str) -> Option<&TaskResult> {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| &e.result)
    }

    /// One line per task: `[ok] key: summary` or `[fail] key: error`.
    pub fn render_text(&self) -> String {
        self.entries
            .iter()
            .map(|e| {
                if e.result.success {
                    format!("[ok] {}: {}", e.key, e.result.summary)
                } else {
                    let detail = e.result.error.as_deref().unwrap_or(&e.result.summary);
                    format!("[fail] {}: {}", e.key, detail)
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
