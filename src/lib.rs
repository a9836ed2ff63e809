pub mod batch;
pub mod config;
pub mod core;
pub mod error;
pub mod log;
pub mod orchestration;

pub use batch::{Batch, BatchReport, ReportEntry};
pub use config::Config;
pub use crate::core::{TaskGraph, TaskId, TaskResult, TaskSpec};
pub use error::{Error, Result};
pub use orchestration::{
    Orchestrator, OrchestratorEvent, OrchestratorStatus, ShellUnitFactory, Strategy, UnitFactory,
    WorkUnit,
};
