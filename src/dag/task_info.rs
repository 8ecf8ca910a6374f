// src/dag/task_info.rs

//! Task definitions, payloads and per-run task state.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::engine::{ExecutionResult, TaskName};

/// How a secret is exposed to the task's workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployType {
    /// Exposed as an environment variable named by `deploy_target`.
    Env,
    /// Mounted as a read-only directory at `deploy_target`.
    Volume,
}

/// Reference to a named secret that the executor injects into the workload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SecretRef {
    pub deploy_type: DeployType,
    /// Environment variable name (`Env`) or mount path (`Volume`).
    pub deploy_target: String,
    /// Name of the secret store entry.
    pub secret: String,
    /// Key inside the secret. For `Env` this selects the value; for `Volume`
    /// it is informational (the whole secret is mounted).
    #[serde(default)]
    pub key: Option<String>,
}

/// Executor-specific description of the work a task performs.
///
/// The scheduler never looks inside; only executors do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPayload {
    /// Container image reference, if the task runs in a container.
    pub image: Option<String>,
    /// Entrypoint override. Empty means "use the image's entrypoint".
    pub cmds: Vec<String>,
    /// Arguments passed after the entrypoint.
    pub args: Vec<String>,
    pub namespace: Option<String>,
    pub env: BTreeMap<String, String>,
    pub secrets: Vec<SecretRef>,
    /// How many times a failed execution is retried before the task fails.
    pub retries: u32,
    /// Upper bound for a single execution attempt.
    pub timeout: Option<Duration>,
}

impl TaskPayload {
    /// Payload that runs `cmds` with no image. Mostly useful for local runs
    /// and tests.
    pub fn command<I, S>(cmds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cmds: cmds.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Payload that runs `cmds` inside `image`.
    pub fn container<I, S>(image: impl Into<String>, cmds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            image: Some(image.into()),
            ..Self::command(cmds)
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Full command line (entrypoint followed by args), for logging.
    pub fn command_line(&self) -> String {
        self.cmds
            .iter()
            .chain(self.args.iter())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A named unit of work in the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub name: TaskName,
    pub payload: TaskPayload,
}

/// Lifecycle state of a task within one run.
///
/// `Pending → Running → Succeeded | Failed`, or `Pending → Skipped`.
/// Terminal states are never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Succeeded | TaskState::Failed | TaskState::Skipped
        )
    }

    /// Whether `self → next` is a legal transition.
    pub fn can_advance_to(self, next: TaskState) -> bool {
        matches!(
            (self, next),
            (TaskState::Pending, TaskState::Running)
                | (TaskState::Pending, TaskState::Skipped)
                | (TaskState::Running, TaskState::Succeeded)
                | (TaskState::Running, TaskState::Failed)
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Pending => "pending",
            TaskState::Running => "running",
            TaskState::Succeeded => "succeeded",
            TaskState::Failed => "failed",
            TaskState::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// Mutable per-run record for one task. Owned by the scheduler.
#[derive(Debug, Clone)]
pub struct TaskRecord {
    pub name: TaskName,
    state: TaskState,
    /// Every state the task has been in, oldest first.
    history: Vec<TaskState>,
    pub result: Option<ExecutionResult>,
    pub started_at: Option<Instant>,
    pub finished_at: Option<Instant>,
}

impl TaskRecord {
    pub fn new(name: TaskName) -> Self {
        Self {
            name,
            state: TaskState::Pending,
            history: vec![TaskState::Pending],
            result: None,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn history(&self) -> &[TaskState] {
        &self.history
    }

    /// Move to `next` if the transition is legal. Returns `false` (and leaves
    /// the record untouched) otherwise.
    pub fn advance(&mut self, next: TaskState) -> bool {
        if !self.state.can_advance_to(next) {
            return false;
        }

        let now = Instant::now();
        if next == TaskState::Running {
            self.started_at = Some(now);
        } else if next.is_terminal() {
            self.finished_at = Some(now);
        }

        self.state = next;
        self.history.push(next);
        true
    }

    /// Wall-clock time between dispatch and completion, if both happened.
    pub fn duration(&self) -> Option<Duration> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some(end.saturating_duration_since(start)),
            _ => None,
        }
    }
}

/// Description of a task that the scheduler wants the executor to run now.
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    pub name: TaskName,
    pub payload: TaskPayload,
    /// Identifier of the run this dispatch belongs to.
    pub run_id: u64,
}

impl ScheduledTask {
    pub fn from_task(task: &Task, run_id: u64) -> Self {
        Self {
            name: task.name.clone(),
            payload: task.payload.clone(),
            run_id,
        }
    }
}
