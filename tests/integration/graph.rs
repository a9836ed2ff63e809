//! Dependency-graph strategy tests.
//!
//! These tests verify that no unit starts before all of its dependencies
//! have completed, that every submitted id gets a result, and that invalid
//! graphs are rejected before anything runs.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use swarm::core::{TaskGraph, TaskId, TaskSpec};
use swarm::error::Error;

use crate::fixtures::{
    chain_graph, diamond_graph, harness, random_dag, task_names, Behaviour, Recorder,
    ScriptedFactory,
};

/// Assert every dependency ended before its dependent started.
fn assert_gated(graph: &TaskGraph, recorder: &Recorder) {
    for (id, spec) in graph.iter() {
        for dep in &spec.dependencies {
            assert!(
                recorder.position(&format!("end {}", dep)) < recorder.position(&format!("start {}", id)),
                "{} started before dependency {} finished: {:?}",
                id,
                dep,
                recorder.order()
            );
        }
    }
}

/// Test: Chain runs strictly in order
#[tokio::test]
async fn test_chain_runs_in_dependency_order() {
    let graph = chain_graph(&["a", "b", "c", "d"]);
    let (orchestrator, recorder) = harness(ScriptedFactory::new());

    let results = orchestrator.run_graph(graph.clone()).await.unwrap();

    assert_eq!(results.len(), 4);
    assert_gated(&graph, &recorder);
    assert_eq!(recorder.peak(), 1);
}

/// Test: Diamond gating with a slow branch
/// Given root -> (left slow, right fast) -> sink
/// When run as a graph
/// Then sink waits for the slow branch and the branches overlap
#[tokio::test]
async fn test_diamond_waits_for_slowest_branch() {
    let graph = diamond_graph();
    let factory = ScriptedFactory::new()
        .with("left", Behaviour::ok().after(60))
        .with("right", Behaviour::ok().after(5));
    let (orchestrator, recorder) = harness(factory);

    let results = orchestrator.run_graph(graph.clone()).await.unwrap();

    assert!(results.values().all(|r| r.success));
    assert_gated(&graph, &recorder);
    assert!(recorder.position("end right") < recorder.position("end left"));
    assert_eq!(recorder.peak(), 2, "independent branches should overlap");
}

/// Test: Gating holds under randomised delays
/// Given several random DAGs of 15 tasks with random delays
/// When each is run as a graph
/// Then no task ever starts before its dependencies finished
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_gating_under_random_delays() {
    for _ in 0..5 {
        let names = task_names(15);
        let graph = random_dag(&names, 0.25);
        let (orchestrator, recorder) =
            harness(ScriptedFactory::new().with_random_delays(&names, 20));

        let results = orchestrator.run_graph(graph.clone()).await.unwrap();

        assert_eq!(results.len(), names.len());
        assert_gated(&graph, &recorder);
    }
}

/// Test: Coverage for graphs of size 0, 1 and N
#[tokio::test]
async fn test_result_keys_match_submitted_ids() {
    for size in [0usize, 1, 9] {
        let names = task_names(size);
        let graph = random_dag(&names, 0.3);
        let (orchestrator, _) = harness(ScriptedFactory::new());

        let results = orchestrator.run_graph(graph.clone()).await.unwrap();

        let expected: Vec<&TaskId> = graph.ids().collect();
        let actual: Vec<&TaskId> = results.keys().collect();
        assert_eq!(actual, expected, "size {}", size);
    }
}

/// Test: Completion, not success, satisfies a dependency
/// Given a task depending on a failing and a panicking task
/// When run as a graph
/// Then the dependent still runs, without their summaries in its context
#[tokio::test]
async fn test_failed_dependencies_still_release_dependents() {
    let graph = TaskGraph::new()
        .with_task("flaky", TaskSpec::new("flaky"))
        .with_task("crashy", TaskSpec::new("crashy"))
        .with_task("solid", TaskSpec::new("solid"))
        .with_task(
            "report",
            TaskSpec::new("report")
                .with_context("summarise")
                .with_dependencies(["flaky", "solid", "crashy"]),
        );
    let factory = ScriptedFactory::new()
        .with("flaky", Behaviour::fail())
        .with("crashy", Behaviour::panic());
    let (orchestrator, recorder) = harness(factory);

    let results = orchestrator.run_graph(graph).await.unwrap();

    assert!(!results[&TaskId::new("flaky")].success);
    assert!(!results[&TaskId::new("crashy")].success);
    assert!(results[&TaskId::new("report")].success);
    assert_eq!(
        recorder.context_of("report").unwrap(),
        "summarise\n\nDependency solid result:\nsolid done"
    );
}

/// Test: Dependency summaries follow declared order, not completion order
#[tokio::test]
async fn test_dependency_context_uses_declared_order() {
    let graph = TaskGraph::new()
        .with_task("slow", TaskSpec::new("slow"))
        .with_task("quick", TaskSpec::new("quick"))
        .with_task(
            "merge",
            TaskSpec::new("merge").with_dependencies(["slow", "quick"]),
        );
    let factory = ScriptedFactory::new()
        .with("slow", Behaviour::ok().after(40))
        .with("quick", Behaviour::ok().after(1));
    let (orchestrator, recorder) = harness(factory);

    orchestrator.run_graph(graph).await.unwrap();

    assert_eq!(
        recorder.context_of("merge").unwrap(),
        "\n\nDependency slow result:\nslow done\n\nDependency quick result:\nquick done"
    );
}

/// Test: Cycles are rejected before anything runs
#[tokio::test]
async fn test_cycle_is_rejected() {
    let graph = TaskGraph::new()
        .with_task("a", TaskSpec::new("a").with_dependencies(["c"]))
        .with_task("b", TaskSpec::new("b").with_dependencies(["a"]))
        .with_task("c", TaskSpec::new("c").with_dependencies(["b"]))
        .with_task("free", TaskSpec::new("free"));
    let (orchestrator, recorder) = harness(ScriptedFactory::new());

    let err = tokio::time::timeout(Duration::from_secs(5), orchestrator.run_graph(graph))
        .await
        .expect("a cycle must not hang")
        .unwrap_err();

    assert!(matches!(err, Error::InvalidGraph(_)));
    assert!(err.to_string().starts_with("invalid dependency graph"));
    assert_eq!(recorder.created(), 0);
}

/// Test: Dangling references are rejected before anything runs
#[tokio::test]
async fn test_unknown_dependency_is_rejected() {
    let mut tasks = HashMap::new();
    tasks.insert(TaskId::new("deploy"), TaskSpec::new("deploy").with_dependencies(["build"]));
    let (orchestrator, recorder) = harness(ScriptedFactory::new());

    let err = orchestrator.run_graph(tasks).await.unwrap_err();

    assert!(matches!(err, Error::InvalidGraph(_)));
    assert!(err.to_string().contains("build"));
    assert_eq!(recorder.created(), 0);
}

/// Test: A factory failure aborts the graph
/// Given a graph where one root cannot be built and another is slow
/// When run as a graph
/// Then the call fails with a setup error and the dependents never run
#[tokio::test]
async fn test_factory_failure_aborts_graph() {
    let graph = TaskGraph::new()
        .with_task("bad", TaskSpec::new("bad"))
        .with_task("after_bad", TaskSpec::new("after_bad").with_dependencies(["bad"]))
        .with_task("slow", TaskSpec::new("slow"));
    let factory = ScriptedFactory::new()
        .unbuildable("bad")
        .with("slow", Behaviour::ok().after(500));
    let (orchestrator, recorder) = harness(factory);

    let err = orchestrator.run_graph(graph).await.unwrap_err();

    assert!(matches!(err, Error::Setup { ref task, .. } if task == "bad"));
    assert!(!recorder.started("after_bad"));
    assert!(orchestrator.list_active().is_empty());
}

/// Test: Later entries win when the same id is inserted twice
#[tokio::test]
async fn test_duplicate_ids_last_write_wins() {
    let mut graph = TaskGraph::new();
    graph.insert("job", TaskSpec::new("first"));
    graph.insert("job", TaskSpec::new("second"));
    let (orchestrator, recorder) = harness(ScriptedFactory::new());

    let results = orchestrator.run_graph(graph).await.unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[&TaskId::new("job")].summary, "second done");
    assert!(!recorder.started("first"));
}

/// Test: A configured graph limit bounds concurrent runs
#[tokio::test]
async fn test_graph_limit() {
    let names = task_names(8);
    let graph: TaskGraph = names
        .iter()
        .map(|n| (n.clone(), TaskSpec::new(n.clone())))
        .collect();
    let factory = names
        .iter()
        .fold(ScriptedFactory::new(), |f, n| f.with(n, Behaviour::ok().after(20)));
    let recorder = factory.recorder.clone();
    let orchestrator =
        swarm::Orchestrator::new(std::sync::Arc::new(factory)).with_graph_limit(Some(3));

    let results: BTreeMap<TaskId, _> = orchestrator.run_graph(graph).await.unwrap();

    assert_eq!(results.len(), 8);
    assert_eq!(recorder.peak(), 3);
}

/// Test: The largest possible graph limit is accepted
/// Given a graph limit of usize::MAX
/// When the graph runs
/// Then independent tasks run together and every task completes
#[tokio::test]
async fn test_maximal_graph_limit_runs_unbounded() {
    let names = task_names(4);
    let graph: TaskGraph = names
        .iter()
        .map(|n| (n.clone(), TaskSpec::new(n.clone())))
        .collect();
    let factory = names
        .iter()
        .fold(ScriptedFactory::new(), |f, n| f.with(n, Behaviour::ok().after(20)));
    let recorder = factory.recorder.clone();
    let orchestrator = swarm::Orchestrator::new(std::sync::Arc::new(factory))
        .with_graph_limit(Some(usize::MAX));

    let results = orchestrator.run_graph(graph).await.unwrap();

    assert_eq!(results.len(), 4);
    assert!(results.values().all(|r| r.success));
    assert_eq!(recorder.peak(), 4);
}
