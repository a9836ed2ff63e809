//! Orchestration engine.
//!
//! The [`Orchestrator`] materialises work units through a [`UnitFactory`]
//! and drives their runs with one of three strategies:
//!
//! - [`Orchestrator::run_parallel`]: concurrent runs behind a permit pool,
//!   results in submission order.
//! - [`Orchestrator::run_sequential`]: one run at a time, successful
//!   summaries threaded into later contexts.
//! - [`Orchestrator::run_graph`]: runs gated on declared dependencies
//!   (see the `scheduler` module).
//!
//! A unit that errors or panics yields a failed [`TaskResult`]; only a
//! factory failure or an invalid submission fails the batch call itself.

use crate::config::Config;
use crate::core::task::{join_context, previous_step_block, TaskResult, TaskSpec};
use crate::error::{Error, Result};
use crate::orchestration::events::{EventSink, OrchestratorEvent, Strategy};
use crate::orchestration::registry::{ActiveUnit, LiveBatches, OrchestratorStatus};
use crate::orchestration::unit::{panic_message, run_isolated, UnitFactory, WorkUnit};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Registry key for the unit at `index` of a list submission.
pub fn unit_key(index: usize) -> String {
    format!("unit_{}", index)
}

/// Creates and runs units on behalf of one orchestrator.
///
/// Cheap to clone so it can move into spawned tasks.
#[derive(Clone)]
pub(crate) struct UnitLauncher {
    factory: Arc<dyn UnitFactory>,
    default_model: Option<String>,
    events: EventSink,
}

impl UnitLauncher {
    /// Ask the factory for a unit, mapping any failure to [`Error::Setup`].
    pub(crate) async fn create(
        &self,
        key: &str,
        spec: &TaskSpec,
        context: &str,
    ) -> Result<Arc<dyn WorkUnit>> {
        let model = spec.model.as_deref().or(self.default_model.as_deref());
        self.factory
            .create_unit(&spec.description, model, context)
            .await
            .map_err(|e| match e {
                Error::Setup { .. } => e,
                other => Error::setup(key, other),
            })
    }

    /// Run a unit in isolation, emitting lifecycle events around it.
    pub(crate) async fn run(&self, key: &str, unit: &dyn WorkUnit) -> TaskResult {
        debug!(unit = key, label = unit.label(), "Starting unit");
        self.events.emit(OrchestratorEvent::UnitStarted {
            key: key.to_string(),
            label: unit.label().to_string(),
        });

        let result = run_isolated(unit).await;

        if result.success {
            debug!(unit = key, "Unit completed");
        } else {
            warn!(
                unit = key,
                error = result.error.as_deref().unwrap_or(""),
                "Unit failed"
            );
        }
        self.events.emit(OrchestratorEvent::UnitCompleted {
            key: key.to_string(),
            success: result.success,
        });
        result
    }

    pub(crate) fn finish<'a, I>(&self, strategy: Strategy, results: I)
    where
        I: IntoIterator<Item = &'a TaskResult>,
    {
        let (total, failed) = results
            .into_iter()
            .fold((0, 0), |(total, failed), r| {
                (total + 1, failed + usize::from(!r.success))
            });
        info!(%strategy, total, failed, "Batch complete");
        self.events.emit(OrchestratorEvent::BatchCompleted {
            strategy,
            total,
            failed,
        });
    }
}

/// Coordinates batches of work units.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use swarm::core::TaskSpec;
/// use swarm::orchestration::Orchestrator;
///
/// let orchestrator = Orchestrator::new(Arc::new(my_factory));
/// let results = orchestrator
///     .run_parallel(&[TaskSpec::new("summarize inbox"), TaskSpec::new("triage alerts")], 2)
///     .await?;
/// assert_eq!(results.len(), 2);
/// ```
pub struct Orchestrator {
    pub(crate) launcher: UnitLauncher,
    pub(crate) live: LiveBatches,
    /// Optional bound on concurrent runs in the dependency-graph strategy.
    pub(crate) graph_limit: Option<usize>,
}

impl Orchestrator {
    /// Create an orchestrator that builds its units with `factory`.
    pub fn new(factory: Arc<dyn UnitFactory>) -> Self {
        Self {
            launcher: UnitLauncher {
                factory,
                default_model: None,
                events: EventSink::default(),
            },
            live: LiveBatches::default(),
            graph_limit: None,
        }
    }

    /// Create an orchestrator using the model and graph settings of `config`.
    pub fn from_config(factory: Arc<dyn UnitFactory>, config: &Config) -> Self {
        Self::new(factory)
            .with_default_model(config.default_model.clone())
            .with_graph_limit(config.graph_max_concurrent)
    }

    /// Model hint used for specs that do not carry one.
    pub fn with_default_model(mut self, model: Option<String>) -> Self {
        self.launcher.default_model = model;
        self
    }

    /// Bound concurrent runs in the dependency-graph strategy.
    pub fn with_graph_limit(mut self, limit: Option<usize>) -> Self {
        self.graph_limit = limit;
        self
    }

    /// Emit lifecycle events on `tx`.
    pub fn with_events(mut self, tx: mpsc::Sender<OrchestratorEvent>) -> Self {
        self.launcher.events = EventSink::new(tx);
        self
    }

    /// Run every task concurrently with at most `max_concurrent` runs in flight.
    ///
    /// All units are created up front; only their runs are gated. The
    /// returned results are in the same order as `tasks`.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] if `max_concurrent` is zero.
    /// - [`Error::Setup`] if the factory fails for any task; nothing runs.
    pub async fn run_parallel(
        &self,
        tasks: &[TaskSpec],
        max_concurrent: usize,
    ) -> Result<Vec<TaskResult>> {
        if max_concurrent == 0 {
            return Err(Error::Validation(
                "max_concurrent must be at least 1".to_string(),
            ));
        }
        if tasks.is_empty() {
            return Ok(Vec::new());
        }

        let scope = self.live.open();
        let registry = scope.registry();
        info!(
            batch = %registry.batch_id().short(),
            tasks = tasks.len(),
            max_concurrent,
            "Spawning units in parallel"
        );

        let mut units = Vec::with_capacity(tasks.len());
        for (index, spec) in tasks.iter().enumerate() {
            let key = unit_key(index);
            let unit = self.launcher.create(&key, spec, &spec.context).await?;
            registry.insert(&key, unit.label());
            units.push(unit);
        }

        // A limit above the batch size is the same as no limit.
        let gate = Arc::new(Semaphore::new(max_concurrent.min(units.len())));
        let mut set = JoinSet::new();
        let mut slots = HashMap::with_capacity(units.len());
        for (index, unit) in units.into_iter().enumerate() {
            let gate = Arc::clone(&gate);
            let launcher = self.launcher.clone();
            let handle = set.spawn(async move {
                let key = unit_key(index);
                // The permit lives until this task ends, however it ends.
                let _permit = match gate.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return (index, TaskResult::from_exception("concurrency gate closed"));
                    }
                };
                (index, launcher.run(&key, unit.as_ref()).await)
            });
            slots.insert(handle.id(), index);
        }

        let mut results: Vec<Option<TaskResult>> = vec![None; slots.len()];
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(e) => {
                    error!(error = %e, "Unit task terminated unexpectedly");
                    if let Some(&index) = slots.get(&e.id()) {
                        let message = if e.is_panic() {
                            panic_message(e.into_panic().as_ref())
                        } else {
                            e.to_string()
                        };
                        results[index] = Some(TaskResult::from_exception(message));
                    }
                }
            }
        }
        drop(scope);

        let results: Vec<TaskResult> = results
            .into_iter()
            .map(|r| r.unwrap_or_else(|| TaskResult::from_exception("unit produced no result")))
            .collect();
        self.launcher.finish(Strategy::Parallel, &results);
        Ok(results)
    }

    /// Run tasks one after another in input order.
    ///
    /// Each unit's context is the accumulated context of earlier successful
    /// steps joined with the task's own context. Failed steps are recorded
    /// but not threaded forward.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Setup`] if the factory fails; later tasks never run.
    pub async fn run_sequential(&self, tasks: &[TaskSpec]) -> Result<Vec<TaskResult>> {
        if tasks.is_empty() {
            return Ok(Vec::new());
        }

        let scope = self.live.open();
        let registry = scope.registry();
        info!(
            batch = %registry.batch_id().short(),
            tasks = tasks.len(),
            "Spawning units sequentially"
        );

        let mut results = Vec::with_capacity(tasks.len());
        let mut accumulated = String::new();

        for (index, spec) in tasks.iter().enumerate() {
            let key = unit_key(index);
            let context = join_context(&accumulated, &spec.context);
            let unit = self.launcher.create(&key, spec, &context).await?;

            registry.insert(&key, unit.label());
            info!(step = index + 1, total = tasks.len(), "Starting sequential unit");
            let result = self.launcher.run(&key, unit.as_ref()).await;
            registry.remove(&key);

            if result.success {
                accumulated.push_str(&previous_step_block(&result.summary));
            }
            results.push(result);
        }
        drop(scope);

        self.launcher.finish(Strategy::Sequential, &results);
        Ok(results)
    }

    /// Keys of the units registered by batches currently running on this
    /// orchestrator. A snapshot, not a live view.
    pub fn list_active(&self) -> Vec<String> {
        self.live.keys()
    }

    /// Registry entries of the units currently registered.
    pub fn active_units(&self) -> Vec<ActiveUnit> {
        self.live.snapshot()
    }

    /// Count and keys of the registered units, taken together.
    pub fn status(&self) -> OrchestratorStatus {
        let unit_ids = self.list_active();
        OrchestratorStatus {
            active_units: unit_ids.len(),
            unit_ids,
        }
    }
}
