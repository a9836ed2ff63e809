//! Lifecycle events emitted by the orchestrator.
//!
//! Events let external components (a CLI progress line, a dashboard) react
//! to unit lifecycle changes without polling the registry.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tokio::sync::mpsc;

/// The execution strategy used for a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Concurrent runs bounded by a permit pool.
    #[default]
    Parallel,
    /// One unit at a time, threading summaries forward.
    Sequential,
    /// Units start once their declared dependencies complete.
    Graph,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::Parallel => write!(f, "parallel"),
            Strategy::Sequential => write!(f, "sequential"),
            Strategy::Graph => write!(f, "graph"),
        }
    }
}

impl FromStr for Strategy {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "parallel" => Ok(Strategy::Parallel),
            "sequential" => Ok(Strategy::Sequential),
            "graph" | "dependencies" => Ok(Strategy::Graph),
            other => Err(crate::error::Error::Validation(format!(
                "unknown strategy '{}' (expected parallel, sequential or graph)",
                other
            ))),
        }
    }
}

/// Events emitted while a batch runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorEvent {
    /// A unit's `run()` is about to start.
    UnitStarted {
        /// Registry key of the unit.
        key: String,
        /// Diagnostic label of the unit.
        label: String,
    },
    /// A unit finished and its result was recorded.
    UnitCompleted {
        /// Registry key of the unit.
        key: String,
        /// Whether the recorded result is a success.
        success: bool,
    },
    /// Every unit of a batch has finished.
    BatchCompleted {
        strategy: Strategy,
        total: usize,
        failed: usize,
    },
}

/// Best-effort sender for [`OrchestratorEvent`]s.
#[derive(Debug, Clone, Default)]
pub(crate) struct EventSink {
    tx: Option<mpsc::Sender<OrchestratorEvent>>,
}

impl EventSink {
    pub(crate) fn new(tx: mpsc::Sender<OrchestratorEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Emit an event without waiting. Events are dropped when the channel
    /// is full, closed or missing.
    pub(crate) fn emit(&self, event: OrchestratorEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.try_send(event);
        }
    }
}
