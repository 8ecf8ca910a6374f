// src/engine/report.rs

//! Run result types.

use std::fmt;

use serde::Serialize;

use crate::dag::TaskState;
use crate::engine::TaskName;

/// Overall outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    /// Every task succeeded.
    Success,
    /// At least one task failed or was skipped.
    Failed,
}

/// Final state and diagnostics of one task.
#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub name: TaskName,
    pub state: TaskState,
    pub exit_code: Option<i32>,
    /// Executor calls made for this task; `0` if it never ran.
    pub attempts: u32,
    pub output: String,
    pub duration_ms: Option<u64>,
}

/// Result of a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub dag_id: Option<String>,
    pub run_id: u64,
    pub outcome: RunOutcome,
    /// Whether the run was cancelled (explicitly or by its deadline).
    pub cancelled: bool,
    /// Per-task reports, in declaration order.
    pub tasks: Vec<TaskReport>,
    pub succeeded: Vec<TaskName>,
    pub failed: Vec<TaskName>,
    pub skipped: Vec<TaskName>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.outcome == RunOutcome::Success
    }

    pub fn task(&self, name: &str) -> Option<&TaskReport> {
        self.tasks.iter().find(|t| t.name == name)
    }

    pub fn state_of(&self, name: &str) -> Option<TaskState> {
        self.task(name).map(|t| t.state)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = self.dag_id.as_deref().unwrap_or("dag");
        let outcome = match self.outcome {
            RunOutcome::Success => "success",
            RunOutcome::Failed => "failed",
        };

        write!(f, "{label} run {}: {outcome}", self.run_id)?;
        if self.cancelled {
            write!(f, " (cancelled)")?;
        }
        writeln!(f)?;

        for task in &self.tasks {
            write!(f, "  {:<32} {:<10}", task.name, task.state.to_string())?;
            if let Some(code) = task.exit_code {
                write!(f, " exit={code}")?;
            }
            if task.attempts > 1 {
                write!(f, " attempts={}", task.attempts)?;
            }
            if let Some(ms) = task.duration_ms {
                write!(f, " {ms}ms")?;
            }
            writeln!(f)?;
        }

        if !self.failed.is_empty() {
            writeln!(f, "failed: {}", self.failed.join(", "))?;
        }
        if !self.skipped.is_empty() {
            writeln!(f, "skipped: {}", self.skipped.join(", "))?;
        }

        Ok(())
    }
}
