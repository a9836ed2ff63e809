//! Orchestration layer for swarm.
//!
//! This module provides the [`Orchestrator`] with its three execution
//! strategies (parallel, sequential, dependency graph), the boundary traits
//! for work units and their factory, the active-unit registry used for
//! introspection, and a shell-command unit factory.

pub mod engine;
pub mod events;
pub mod registry;
mod scheduler;
pub mod shell;
pub mod unit;

pub use engine::{unit_key, Orchestrator};
pub use events::{OrchestratorEvent, Strategy};
pub use registry::{ActiveRegistry, ActiveUnit, BatchId, OrchestratorStatus};
pub use shell::{ShellUnit, ShellUnitFactory, DEFAULT_TIMEOUT_SECS};
pub use unit::{UnitFactory, WorkUnit};
