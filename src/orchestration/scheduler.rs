//! Dependency-graph strategy.
//!
//! Every task of a validated [`TaskGraph`] gets a watcher task as soon as the
//! batch starts. A watcher waits on the completion signal of each of its
//! dependencies, builds its unit with the summaries of the dependencies that
//! succeeded, runs it and publishes the result on its own signal.
//!
//! Completion, not success, releases dependents: a failed dependency still
//! lets its dependents run, it just contributes nothing to their context.

use crate::core::dag::TaskGraph;
use crate::core::task::{dependency_block, TaskId, TaskResult, TaskSpec};
use crate::error::{Error, Result};
use crate::orchestration::engine::{Orchestrator, UnitLauncher};
use crate::orchestration::events::Strategy;
use crate::orchestration::registry::ActiveRegistry;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Completion signal of one task. `None` until the task has a result.
type Signal = watch::Receiver<Option<TaskResult>>;

/// Everything one watcher needs, moved into its task.
struct Watcher {
    id: TaskId,
    spec: TaskSpec,
    waits_on: Vec<(TaskId, Signal)>,
    done: watch::Sender<Option<TaskResult>>,
}

impl Orchestrator {
    /// Run a dependency graph of tasks.
    ///
    /// Accepts a [`TaskGraph`] or anything convertible into one (a
    /// `HashMap`/`BTreeMap` of id to spec). The returned map has exactly the
    /// submitted ids as keys.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidGraph`] for cycles, self-dependencies or unknown
    ///   dependency ids. Nothing is created or run.
    /// - [`Error::Validation`] if the configured graph limit is zero.
    /// - [`Error::Setup`] if the factory fails for any task; remaining
    ///   watchers are aborted.
    pub async fn run_graph(
        &self,
        graph: impl Into<TaskGraph>,
    ) -> Result<BTreeMap<TaskId, TaskResult>> {
        let graph = graph.into();
        if self.graph_limit == Some(0) {
            return Err(Error::Validation(
                "graph_max_concurrent must be at least 1".to_string(),
            ));
        }
        if let Err(e) = graph.validate() {
            warn!(error = %e, "Rejected dependency graph");
            return Err(e);
        }
        if graph.is_empty() {
            return Ok(BTreeMap::new());
        }

        let scope = self.live.open();
        let registry = scope.registry().clone();
        info!(
            batch = %registry.batch_id().short(),
            tasks = graph.len(),
            edges = graph.dependency_count(),
            limit = ?self.graph_limit,
            "Spawning units by dependency graph"
        );

        let mut senders = HashMap::with_capacity(graph.len());
        let mut signals = HashMap::with_capacity(graph.len());
        for id in graph.ids() {
            let (tx, rx) = watch::channel(None);
            senders.insert(id.clone(), tx);
            signals.insert(id.clone(), rx);
        }

        let gate = self
            .graph_limit
            .map(|n| Arc::new(Semaphore::new(n.min(graph.len()))));
        let mut set = JoinSet::new();
        for (id, spec) in graph.into_tasks() {
            let waits_on = spec
                .dependencies
                .iter()
                .filter_map(|dep| signals.get(dep).map(|rx| (dep.clone(), rx.clone())))
                .collect();
            let Some(done) = senders.remove(&id) else {
                continue;
            };
            let watcher = Watcher {
                id,
                spec,
                waits_on,
                done,
            };
            set.spawn(watch_and_run(
                watcher,
                self.launcher.clone(),
                registry.clone(),
                gate.clone(),
            ));
        }
        drop(signals);

        let mut results = BTreeMap::new();
        let mut deferred: Option<Error> = None;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Ok((id, result))) => {
                    results.insert(id, result);
                }
                Ok(Err(e @ Error::Setup { .. })) => {
                    error!(error = %e, "Unit setup failed, aborting graph");
                    set.abort_all();
                    return Err(e);
                }
                // A watcher whose dependency vanished; the setup error that
                // caused it is still on its way.
                Ok(Err(e)) => {
                    deferred.get_or_insert(e);
                }
                Err(e) => {
                    error!(error = %e, "Graph watcher terminated unexpectedly");
                    set.abort_all();
                    return Err(Error::TaskJoin(e.to_string()));
                }
            }
        }
        drop(scope);

        if let Some(e) = deferred {
            return Err(e);
        }
        self.launcher.finish(Strategy::Graph, results.values());
        Ok(results)
    }
}

async fn watch_and_run(
    watcher: Watcher,
    launcher: UnitLauncher,
    registry: ActiveRegistry,
    gate: Option<Arc<Semaphore>>,
) -> Result<(TaskId, TaskResult)> {
    let Watcher {
        id,
        spec,
        waits_on,
        done,
    } = watcher;

    let mut context = spec.context.clone();
    for (dep, mut signal) in waits_on {
        let outcome = match signal.wait_for(Option::is_some).await {
            Ok(published) => (*published).clone(),
            Err(_) => None,
        };
        match outcome {
            Some(result) if result.success => {
                context.push_str(&dependency_block(&dep, &result.summary));
            }
            Some(_) => {
                debug!(task = %id, dependency = %dep, "Dependency failed, summary not threaded");
            }
            None => {
                return Err(Error::TaskJoin(format!(
                    "dependency '{}' of task '{}' ended without a result",
                    dep, id
                )));
            }
        }
    }

    let unit = launcher.create(id.as_str(), &spec, &context).await?;

    let _permit = match gate {
        Some(gate) => Some(
            gate.acquire_owned()
                .await
                .map_err(|e| Error::TaskJoin(e.to_string()))?,
        ),
        None => None,
    };

    registry.insert(id.as_str(), unit.label());
    let result = launcher.run(id.as_str(), unit.as_ref()).await;
    registry.remove(id.as_str());

    done.send_replace(Some(result.clone()));
    Ok((id, result))
}
