//! Task data model for the orchestration engine.
//!
//! A [`TaskSpec`] describes one unit of requested work, a [`TaskResult`]
//! is the outcome reported by the unit that ran it, and a [`TaskId`]
//! names a task inside one dependency-graph submission.

use serde::{Deserialize, Serialize};

/// Summary used when a unit's run errors or panics instead of returning a result.
pub const UNIT_FAILED_SUMMARY: &str = "unit failed with exception";

/// Identifier for a task within one dependency-graph submission.
///
/// Ids are caller-chosen strings; uniqueness is a property of the
/// submitted mapping, not something the engine generates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    /// Create a task id from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::borrow::Borrow<str> for TaskId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// One unit of requested work.
///
/// `dependencies` only matter to the dependency-graph strategy; the
/// parallel and sequential strategies ignore them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// The instruction given to the work unit.
    #[serde(alias = "task")]
    pub description: String,
    /// Hint passed through to the factory, opaque to the engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Supplementary text given to the work unit.
    #[serde(default)]
    pub context: String,
    /// Tasks that must complete before this one starts.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<TaskId>,
}

impl TaskSpec {
    /// Create a spec with the given description and no model, context or dependencies.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn with_dependencies<I, T>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TaskId>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }
}

/// Outcome of one work unit.
///
/// `error` is normally set exactly when `success` is false, but units may
/// report inconsistent combinations and the engine passes them through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult {
    pub success: bool,
    /// Human-readable outcome, injected as context for dependents.
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskResult {
    pub fn success(summary: impl Into<String>) -> Self {
        Self {
            success: true,
            summary: summary.into(),
            error: None,
        }
    }

    pub fn failure(summary: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            summary: summary.into(),
            error: Some(error.into()),
        }
    }

    /// Result recorded for a unit whose run errored or panicked.
    pub fn from_exception(message: impl Into<String>) -> Self {
        Self::failure(UNIT_FAILED_SUMMARY, message)
    }
}

/// Join two context fragments with a blank line.
///
/// Mirrors how contexts are assembled for chained units: the accumulated
/// part always comes first, even when either side is empty.
pub fn join_context(accumulated: &str, own: &str) -> String {
    format!("{}\n\n{}", accumulated, own)
}

/// Labeled rendition of a predecessor's summary in a sequential chain.
pub fn previous_step_block(summary: &str) -> String {
    format!("\n\nPrevious step result:\n{}", summary)
}

/// Labeled rendition of a dependency's summary in a graph submission.
pub fn dependency_block(id: &TaskId, summary: &str) -> String {
    format!("\n\nDependency {} result:\n{}", id, summary)
}
