// src/engine/mod.rs

//! Orchestration engine for dagrun.
//!
//! This module ties together:
//! - the per-run DAG scheduler
//! - the main runtime event loop that reacts to:
//!   - task completion events from the executor
//!   - cancellation requests and run deadlines
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`]. [`report`] holds the run result types.

use std::time::Duration;

/// Canonical task name type used throughout the engine.
pub type TaskName = String;

/// Status reported by an executor for one execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    Succeeded,
    Failed,
}

/// Result of running a task's payload, as reported by a [`TaskExecutor`].
///
/// [`TaskExecutor`]: crate::exec::TaskExecutor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    /// Process exit code, when the workload was a process that exited.
    pub exit_code: Option<i32>,
    /// Diagnostic output (captured logs, error messages).
    pub output: String,
    /// Number of executor calls made for this task (retries included).
    pub attempts: u32,
}

impl ExecutionResult {
    pub fn succeeded(output: impl Into<String>) -> Self {
        Self {
            status: ExecutionStatus::Succeeded,
            exit_code: Some(0),
            output: output.into(),
            attempts: 1,
        }
    }

    pub fn failed(exit_code: Option<i32>, output: impl Into<String>) -> Self {
        Self {
            status: ExecutionStatus::Failed,
            exit_code,
            output: output.into(),
            attempts: 1,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Succeeded
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }
}

/// Options controlling a single run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Label used in logs and in the run report.
    pub dag_id: Option<String>,
    pub failure_policy: FailurePolicy,
    pub on_cancel: CancelMode,
    /// Optional deadline for the whole run, measured from `Runtime::run`.
    pub timeout: Option<Duration>,
}

/// Events flowing into the runtime loop.
#[derive(Debug, Clone)]
pub enum RunEvent {
    /// An executor call for a dispatched task finished (retries included).
    TaskCompleted {
        task: TaskName,
        result: ExecutionResult,
    },
    /// Cancellation requested (Ctrl-C, token, or run deadline).
    CancelRequested { reason: String },
}

pub mod core;
pub mod report;
pub mod runtime;

pub use self::core::{CoreCommand, CoreRuntime, CoreStep};
pub use report::{RunOutcome, RunReport, TaskReport};
pub use runtime::{Runtime, run_dag};
pub use crate::types::{CancelMode, FailurePolicy};
