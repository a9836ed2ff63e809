//! Boundary with the work-unit factory and the units it produces.
//!
//! The engine never looks inside a unit: it asks a [`UnitFactory`] for one
//! per task, calls [`WorkUnit::run`] once, and records what comes back.

use crate::core::task::TaskResult;
use crate::error::Result;
use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// One runnable, isolated unit of task execution.
#[async_trait]
pub trait WorkUnit: Send + Sync {
    /// Human-readable task label, for logging and diagnostics only.
    fn label(&self) -> &str;

    /// Perform the unit's work.
    ///
    /// May take arbitrarily long. An `Err` (or a panic) is recorded as a
    /// failed result for this unit only.
    async fn run(&self) -> Result<TaskResult>;
}

/// Produces work units from task descriptions.
#[async_trait]
pub trait UnitFactory: Send + Sync {
    /// Create a unit for `description` with an optional model hint and the
    /// effective context assembled by the engine.
    ///
    /// # Errors
    ///
    /// A failure here is a setup problem and aborts the whole batch.
    async fn create_unit(
        &self,
        description: &str,
        model: Option<&str>,
        context: &str,
    ) -> Result<Arc<dyn WorkUnit>>;
}

/// Run a unit, converting errors and panics into a failed [`TaskResult`].
pub(crate) async fn run_isolated(unit: &dyn WorkUnit) -> TaskResult {
    match AssertUnwindSafe(unit.run()).catch_unwind().await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => TaskResult::from_exception(e.to_string()),
        Err(payload) => TaskResult::from_exception(panic_message(payload.as_ref())),
    }
}

/// Extract a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("unit panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("unit panicked: {}", s)
    } else {
        "unit panicked".to_string()
    }
}
