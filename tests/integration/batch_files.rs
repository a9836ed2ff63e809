//! Batch files run end to end with shell units.
#![cfg(unix)]

use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use swarm::batch::Batch;
use swarm::config::Config;
use swarm::error::Error;
use swarm::orchestration::{Orchestrator, ShellUnitFactory, Strategy};

/// A batch file written into its own temporary directory.
struct BatchFile {
    _dir: TempDir,
    path: PathBuf,
}

impl BatchFile {
    fn new(name: &str, contents: &str) -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let path = dir.path().join(name);
        std::fs::write(&path, contents).expect("Failed to write batch file");
        Self { _dir: dir, path }
    }

    fn load(&self) -> Batch {
        Batch::load(&self.path).expect("Failed to load batch")
    }
}

fn shell_orchestrator() -> Orchestrator {
    Orchestrator::from_config(Arc::new(ShellUnitFactory::new()), &Config::default())
}

/// Test: Graph batch threads dependency output through SWARM_CONTEXT
#[tokio::test]
async fn test_graph_batch_end_to_end() {
    let file = BatchFile::new(
        "pipeline.toml",
        r#"
[graph.fetch]
description = "echo fetched"

[graph.show]
description = "printf '%s' \"$SWARM_CONTEXT\""
dependencies = ["fetch"]
"#,
    );
    let batch = file.load();
    let strategy = batch.resolve_strategy(None, Strategy::Parallel);
    assert_eq!(strategy, Strategy::Graph);

    let report = batch
        .run(&shell_orchestrator(), strategy, 2)
        .await
        .unwrap();

    assert!(report.all_succeeded());
    assert_eq!(report.get("fetch").unwrap().summary, "fetched");
    assert_eq!(
        report.get("show").unwrap().summary,
        "Dependency fetch result:\nfetched"
    );
}

/// Test: Parallel JSON batch reports failures per task
#[tokio::test]
async fn test_parallel_batch_reports_failures() {
    let file = BatchFile::new(
        "jobs.json",
        r#"{
            "strategy": "parallel",
            "tasks": [
                {"description": "echo alpha"},
                {"description": "echo broken >&2; exit 2"},
                {"task": "true"}
            ]
        }"#,
    );
    let batch = file.load();

    let report = batch
        .run(&shell_orchestrator(), batch.resolve_strategy(None, Strategy::Sequential), 2)
        .await
        .unwrap();

    assert_eq!(report.strategy, Strategy::Parallel);
    assert_eq!(report.failed(), 1);
    assert_eq!(
        report.render_text(),
        "[ok] unit_0: alpha\n[fail] unit_1: broken\n[ok] unit_2: completed with no output"
    );
}

/// Test: Sequential batch chains stdout into the next command's context
#[tokio::test]
async fn test_sequential_batch_chains_output() {
    let file = BatchFile::new(
        "chain.toml",
        r#"
strategy = "sequential"

[[tasks]]
description = "echo one"

[[tasks]]
description = "printf '%s' \"$SWARM_CONTEXT\""
context = "own notes"
"#,
    );
    let batch = file.load();

    let report = batch
        .run(&shell_orchestrator(), Strategy::Sequential, 1)
        .await
        .unwrap();

    assert!(report.all_succeeded());
    assert_eq!(
        report.get("unit_1").unwrap().summary,
        "Previous step result:\none\n\nown notes"
    );
}

/// Test: A list batch can be run as a graph
#[tokio::test]
async fn test_list_batch_as_graph() {
    let file = BatchFile::new(
        "list.toml",
        r#"
[[tasks]]
description = "echo a"

[[tasks]]
description = "echo b"
"#,
    );
    let report = file
        .load()
        .run(&shell_orchestrator(), Strategy::Graph, 1)
        .await
        .unwrap();

    let keys: Vec<&str> = report.entries.iter().map(|e| e.key.as_str()).collect();
    assert_eq!(keys, vec!["task_0", "task_1"]);
}

/// Test: Invalid batches fail before anything runs
#[tokio::test]
async fn test_invalid_batch_is_rejected() {
    let file = BatchFile::new(
        "cycle.toml",
        r#"
[graph.a]
description = "touch should-not-exist"
dependencies = ["b"]

[graph.b]
description = "touch should-not-exist"
dependencies = ["a"]
"#,
    );
    let batch = file.load();
    assert!(matches!(batch.validate(), Err(Error::InvalidGraph(_))));

    let err = batch
        .run(&shell_orchestrator(), Strategy::Graph, 1)
        .await
        .unwrap_err();
    assert!(err.is_batch_error());
}

#[test]
fn test_malformed_batch_file() {
    let file = BatchFile::new("bad.toml", "[[tasks]]\nmodel = 3\n");
    assert!(matches!(Batch::load(&file.path), Err(Error::TomlParse(_))));
}
