// src/dag/scheduler_step.rs

//! Step-by-step execution result types for the scheduler.

use crate::dag::task_info::ScheduledTask;
use crate::engine::TaskName;

/// Structured result of a single scheduler "step".
///
/// This is useful for tests that want to manually step the DAG and make
/// assertions about what changed.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStep {
    /// Tasks that became ready and were marked `Running` in this step.
    pub newly_scheduled: Vec<ScheduledTask>,
    /// Tasks that were newly marked `Failed` in this step.
    pub newly_failed: Vec<TaskName>,
    /// Tasks that were newly marked `Skipped` in this step.
    pub newly_skipped: Vec<TaskName>,
    /// Whether this step caused the run to finish.
    pub run_just_finished: bool,
}

impl SchedulerStep {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Names of the newly scheduled tasks.
    pub fn scheduled_names(&self) -> Vec<&str> {
        self.newly_scheduled.iter().map(|t| t.name.as_str()).collect()
    }
}
