//! Core domain models for swarm orchestration.
//!
//! This module contains the fundamental data structures used throughout
//! the engine: task specs, results, and dependency graphs.

pub mod dag;
pub mod task;

pub use dag::TaskGraph;
pub use task::{TaskId, TaskResult, TaskSpec, UNIT_FAILED_SUMMARY};
