// tests/runtime_fake_executor.rs
//
// Full runs through the async runtime, with a scripted executor.

mod common;
use crate::common::builders::{graph_with_payload, pipeline_graph, two_branch_graph};
use crate::common::fake_executor::{Observed, Script, ScriptedExecutor};
use crate::common::{init_tracing, with_timeout};

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use dagrun::dag::{TaskPayload, TaskState};
use dagrun::engine::{CancelMode, RunOptions, RunOutcome, Runtime, run_dag};
use dagrun::types::FailurePolicy;

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn pipeline_runs_every_task_in_dependency_order() -> TestResult {
    init_tracing();
    let exec = ScriptedExecutor::new()
        .default_delay(Duration::from_millis(5))
        .into_arc();

    let report = with_timeout(run_dag(pipeline_graph(), exec.clone(), RunOptions::default())).await?;

    assert_eq!(report.outcome, RunOutcome::Success);
    assert_eq!(report.succeeded.len(), 6);

    // Every task starts only after all its predecessors finished.
    let graph = pipeline_graph();
    for task in graph.tasks() {
        let started = exec.position(&Observed::Started(task.to_string())).unwrap();
        for dep in graph.predecessors(task) {
            let finished = exec.position(&Observed::Finished(dep.clone())).unwrap();
            assert!(finished < started, "{dep} must finish before {task} starts");
        }
    }
    Ok(())
}

#[tokio::test]
async fn fan_out_tasks_run_concurrently() -> TestResult {
    init_tracing();
    let exec = ScriptedExecutor::new()
        .delay("C1", Duration::from_millis(100))
        .delay("C2", Duration::from_millis(100))
        .delay("C3", Duration::from_millis(100))
        .into_arc();

    let report = with_timeout(run_dag(pipeline_graph(), exec.clone(), RunOptions::default())).await?;

    assert!(report.is_success());
    assert_eq!(exec.peak_concurrency(), 3);

    // D waits for the slowest branch.
    let d = exec.position(&Observed::Started("D".into())).unwrap();
    for c in ["C1", "C2", "C3"] {
        assert!(exec.position(&Observed::Finished(c.into())).unwrap() < d);
    }
    Ok(())
}

#[tokio::test]
async fn failure_skips_downstream_and_reports_lists() -> TestResult {
    init_tracing();
    let exec = ScriptedExecutor::new().script("B", Script::Fail(2)).into_arc();

    let report = with_timeout(run_dag(pipeline_graph(), exec.clone(), RunOptions::default())).await?;

    assert_eq!(report.outcome, RunOutcome::Failed);
    assert_eq!(report.failed, ["B"]);
    assert_eq!(report.skipped, ["C1", "C2", "C3", "D"]);
    assert_eq!(report.task("B").unwrap().exit_code, Some(2));
    assert_eq!(exec.started(), ["A", "B"]);
    Ok(())
}

#[tokio::test]
async fn independent_branch_finishes_despite_failure() -> TestResult {
    init_tracing();
    let exec = ScriptedExecutor::new()
        .script("X1", Script::Fail(1))
        .delay("Y1", Duration::from_millis(20))
        .into_arc();

    let report = with_timeout(run_dag(two_branch_graph(), exec.clone(), RunOptions::default())).await?;

    assert_eq!(report.succeeded, ["Y1", "Y2"]);
    assert_eq!(report.failed, ["X1"]);
    assert_eq!(report.skipped, ["X2"]);
    Ok(())
}

#[tokio::test]
async fn halt_run_policy_stops_unrelated_branches() -> TestResult {
    init_tracing();
    let exec = ScriptedExecutor::new()
        .script("X1", Script::Fail(1))
        .delay("Y1", Duration::from_millis(50))
        .into_arc();
    let options = RunOptions {
        failure_policy: FailurePolicy::HaltRun,
        ..RunOptions::default()
    };

    let report = with_timeout(run_dag(two_branch_graph(), exec.clone(), options)).await?;

    assert_eq!(report.succeeded, ["Y1"]);
    assert_eq!(report.skipped, ["X2", "Y2"]);
    assert!(!exec.started().contains(&"Y2".to_string()));
    Ok(())
}

#[tokio::test]
async fn retries_until_success() -> TestResult {
    init_tracing();
    let graph = graph_with_payload(&["flaky"], TaskPayload::command(["true"]).with_retries(2));
    let exec = ScriptedExecutor::new()
        .script("flaky", Script::FailTimes(1))
        .into_arc();

    let report = with_timeout(run_dag(graph, exec.clone(), RunOptions::default())).await?;

    assert!(report.is_success());
    assert_eq!(report.task("flaky").unwrap().attempts, 2);
    assert_eq!(exec.attempts_of("flaky"), 2);
    Ok(())
}

#[tokio::test]
async fn retries_are_bounded() -> TestResult {
    init_tracing();
    let graph = graph_with_payload(&["broken"], TaskPayload::command(["false"]).with_retries(1));
    let exec = ScriptedExecutor::new()
        .script("broken", Script::Fail(9))
        .into_arc();

    let report = with_timeout(run_dag(graph, exec.clone(), RunOptions::default())).await?;

    assert_eq!(report.failed, ["broken"]);
    assert_eq!(report.task("broken").unwrap().attempts, 2);
    assert_eq!(exec.attempts_of("broken"), 2);
    Ok(())
}

#[tokio::test]
async fn per_attempt_timeout_fails_the_task() -> TestResult {
    init_tracing();
    let graph = graph_with_payload(
        &["slow"],
        TaskPayload::command(["sleep", "10"]).with_timeout(Duration::from_millis(20)),
    );
    let exec = ScriptedExecutor::new()
        .delay("slow", Duration::from_secs(10))
        .into_arc();

    let report = with_timeout(run_dag(graph, exec.clone(), RunOptions::default())).await?;

    assert_eq!(report.failed, ["slow"]);
    assert!(report.task("slow").unwrap().output.contains("timed out"));
    // The timed-out call is cleaned up by the executor.
    assert_eq!(exec.cancelled(), ["slow"]);
    Ok(())
}

#[tokio::test]
async fn executor_errors_and_panics_become_failures() -> TestResult {
    init_tracing();
    let exec = ScriptedExecutor::new()
        .script("X1", Script::Error("runtime missing".into()))
        .script("Y1", Script::Panic)
        .into_arc();

    let report = with_timeout(run_dag(two_branch_graph(), exec, RunOptions::default())).await?;

    assert_eq!(report.failed, ["X1", "Y1"]);
    assert_eq!(report.skipped, ["X2", "Y2"]);
    assert!(report.task("X1").unwrap().output.contains("runtime missing"));
    assert!(report.task("Y1").unwrap().output.contains("panicked"));
    Ok(())
}

#[tokio::test]
async fn drain_cancellation_lets_running_tasks_finish() -> TestResult {
    init_tracing();
    let exec = ScriptedExecutor::new().script("A", Script::Block).into_arc();

    let runtime = Runtime::new(pipeline_graph(), exec.clone(), RunOptions::default());
    let token = runtime.cancellation_token();
    let handle = tokio::spawn(runtime.run());

    while exec.started().is_empty() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    token.cancel();
    tokio::time::sleep(Duration::from_millis(10)).await;
    exec.release();

    let report = with_timeout(handle).await??;
    assert!(report.cancelled);
    assert_eq!(report.succeeded, ["A"]);
    assert_eq!(report.skipped, ["B", "C1", "C2", "C3", "D"]);
    assert_eq!(exec.started(), ["A"]);
    assert!(exec.cancelled().is_empty());
    Ok(())
}

#[tokio::test]
async fn abort_cancellation_fails_running_tasks() -> TestResult {
    init_tracing();
    let exec = ScriptedExecutor::new()
        .script("X1", Script::Block)
        .script("Y1", Script::Block)
        .into_arc();
    let options = RunOptions {
        on_cancel: CancelMode::Abort,
        ..RunOptions::default()
    };

    let parent = CancellationToken::new();
    let runtime = Runtime::new(two_branch_graph(), exec.clone(), options)
        .with_cancellation(parent.child_token());
    let handle = tokio::spawn(runtime.run());

    while exec.started().len() < 2 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    parent.cancel();

    let report = with_timeout(handle).await??;
    assert!(report.cancelled);
    assert_eq!(report.failed, ["X1", "Y1"]);
    assert_eq!(report.skipped, ["X2", "Y2"]);
    assert_eq!(report.state_of("X1"), Some(TaskState::Failed));
    // Cleanup for aborted calls has finished by the time the report exists.
    assert_eq!(exec.cancelled(), ["X1", "Y1"]);
    Ok(())
}

#[tokio::test]
async fn run_deadline_cancels_the_run() -> TestResult {
    init_tracing();
    let exec = ScriptedExecutor::new().script("A", Script::Block).into_arc();
    let options = RunOptions {
        on_cancel: CancelMode::Abort,
        timeout: Some(Duration::from_millis(30)),
        ..RunOptions::default()
    };

    let report = with_timeout(run_dag(pipeline_graph(), exec, options)).await?;

    assert!(report.cancelled);
    assert_eq!(report.failed, ["A"]);
    assert!(report.task("A").unwrap().output.contains("deadline"));
    assert_eq!(report.skipped.len(), 5);
    Ok(())
}

#[tokio::test]
async fn concurrent_runs_share_one_graph() -> TestResult {
    init_tracing();
    let graph = pipeline_graph();
    let failing = ScriptedExecutor::new().script("C2", Script::Fail(1)).into_arc();
    let passing = ScriptedExecutor::new()
        .default_delay(Duration::from_millis(2))
        .into_arc();

    let (bad, good) = with_timeout(async {
        tokio::join!(
            run_dag(Arc::clone(&graph), failing, RunOptions::default()),
            run_dag(Arc::clone(&graph), passing, RunOptions::default()),
        )
    })
    .await;

    let (bad, good) = (bad?, good?);
    assert_eq!(bad.failed, ["C2"]);
    assert_eq!(bad.skipped, ["D"]);
    assert!(good.is_success());
    Ok(())
}

#[tokio::test]
async fn every_run_gets_its_own_run_id() -> TestResult {
    init_tracing();
    let graph = pipeline_graph();
    let exec = ScriptedExecutor::new().into_arc();

    let first = with_timeout(run_dag(Arc::clone(&graph), exec.clone(), RunOptions::default())).await?;
    let second = with_timeout(run_dag(Arc::clone(&graph), exec.clone(), RunOptions::default())).await?;

    assert_ne!(first.run_id, second.run_id);
    Ok(())
}

#[tokio::test]
async fn huge_run_timeout_means_no_deadline() -> TestResult {
    init_tracing();
    let exec = ScriptedExecutor::new().into_arc();
    let options = RunOptions {
        timeout: Some(Duration::MAX),
        ..RunOptions::default()
    };

    let report = with_timeout(run_dag(pipeline_graph(), exec, options)).await?;

    assert!(report.is_success());
    assert!(!report.cancelled);
    Ok(())
}
