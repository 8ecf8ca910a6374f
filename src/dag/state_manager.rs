// src/dag/state_manager.rs

//! Per-run state transitions for tasks in the scheduler.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::dag::task_info::{ScheduledTask, TaskRecord, TaskState};
use crate::dag::DependencyGraph;
use crate::engine::{ExecutionResult, TaskName};

/// Applies state transitions to the per-run task records.
///
/// Every mutation goes through [`TaskRecord::advance`], so an illegal
/// transition can never be recorded.
pub struct StateManager<'a> {
    graph: &'a DependencyGraph,
    tasks: &'a mut HashMap<TaskName, TaskRecord>,
    run_id: u64,
}

impl<'a> StateManager<'a> {
    pub fn new(
        graph: &'a DependencyGraph,
        tasks: &'a mut HashMap<TaskName, TaskRecord>,
        run_id: u64,
    ) -> Self {
        Self {
            graph,
            tasks,
            run_id,
        }
    }

    fn read_only(&self) -> ReadOnlyStateManager<'_> {
        ReadOnlyStateManager::new(self.graph, self.tasks)
    }

    /// Of the given candidates, mark those that are `Pending` with every
    /// predecessor `Succeeded` as `Running` and return them for dispatch.
    ///
    /// Candidates are examined in declaration order so that dispatch batches
    /// are deterministic.
    pub fn collect_new_ready_tasks<'n, I>(&mut self, candidates: I) -> Vec<ScheduledTask>
    where
        I: IntoIterator<Item = &'n str>,
    {
        let wanted: HashSet<&str> = candidates.into_iter().collect();

        // Decide first, then mutate to avoid borrowing issues.
        let ready: Vec<TaskName> = {
            let ro = self.read_only();
            self.graph
                .tasks()
                .filter(|name| wanted.contains(name))
                .filter(|name| ro.state_of(name) == Some(TaskState::Pending))
                .filter(|name| ro.deps_satisfied(name))
                .map(str::to_string)
                .collect()
        };

        let mut scheduled = Vec::with_capacity(ready.len());
        for name in ready {
            let Some(task) = self.graph.task(&name) else {
                warn!(task = %name, "ready task missing from graph");
                continue;
            };
            let Some(record) = self.tasks.get_mut(&name) else {
                warn!(task = %name, "ready task missing from run state");
                continue;
            };

            let advanced = record.advance(TaskState::Running);
            debug_assert!(advanced, "Pending -> Running must be legal for {name}");

            info!(
                task = %name,
                run_id = self.run_id,
                cmd = %task.payload.command_line(),
                "dependencies satisfied; dispatching task"
            );
            scheduled.push(ScheduledTask::from_task(task, self.run_id));
        }

        scheduled
    }

    /// Record the executor's verdict for a running task.
    ///
    /// Returns `false` if the task is not `Running` (unknown, never
    /// dispatched, or already terminal); in that case nothing changes.
    pub fn record_completion(&mut self, task: &str, result: &ExecutionResult) -> bool {
        let Some(record) = self.tasks.get_mut(task) else {
            return false;
        };

        let next = if result.is_success() {
            TaskState::Succeeded
        } else {
            TaskState::Failed
        };

        if !record.advance(next) {
            return false;
        }
        record.result = Some(result.clone());
        true
    }

    /// Mark every still-`Pending` transitive successor of `failed` as
    /// `Skipped`. Returns the newly skipped names in declaration order.
    pub fn mark_descendants_skipped(&mut self, failed: &str) -> Vec<TaskName> {
        let descendants: HashSet<TaskName> = self.graph.descendants(failed).into_iter().collect();
        self.skip_pending_where(|name| descendants.contains(name), failed)
    }

    /// Mark every `Pending` task in the run as `Skipped`.
    pub fn mark_all_pending_skipped(&mut self, cause: &str) -> Vec<TaskName> {
        self.skip_pending_where(|_| true, cause)
    }

    fn skip_pending_where<F>(&mut self, pred: F, cause: &str) -> Vec<TaskName>
    where
        F: Fn(&str) -> bool,
    {
        let mut skipped = Vec::new();

        for name in self.graph.tasks() {
            if !pred(name) {
                continue;
            }
            if let Some(record) = self.tasks.get_mut(name)
                && record.state() == TaskState::Pending
                && record.advance(TaskState::Skipped)
            {
                debug!(task = %name, run_id = self.run_id, %cause, "task skipped");
                skipped.push(name.to_string());
            }
        }

        skipped
    }

    /// Force every `Running` task to `Failed` with the given diagnostic.
    pub fn fail_running(&mut self, reason: &str) -> Vec<TaskName> {
        let mut failed = Vec::new();

        for name in self.graph.tasks() {
            if let Some(record) = self.tasks.get_mut(name)
                && record.state() == TaskState::Running
                && record.advance(TaskState::Failed)
            {
                record.result = Some(ExecutionResult::failed(None, reason).with_attempts(0));
                warn!(task = %name, run_id = self.run_id, %reason, "running task aborted");
                failed.push(name.to_string());
            }
        }

        failed
    }

    /// Check if all tasks are in a terminal state.
    pub fn all_tasks_terminal(&self) -> bool {
        self.tasks.values().all(|r| r.state().is_terminal())
    }
}

/// A read-only view of the run state for dependency checks.
///
/// This is used when we only have shared access to the task records (e.g. in
/// `Scheduler::deps_satisfied`).
pub struct ReadOnlyStateManager<'a> {
    graph: &'a DependencyGraph,
    tasks: &'a HashMap<TaskName, TaskRecord>,
}

impl<'a> ReadOnlyStateManager<'a> {
    pub fn new(graph: &'a DependencyGraph, tasks: &'a HashMap<TaskName, TaskRecord>) -> Self {
        Self { graph, tasks }
    }

    pub fn state_of(&self, task: &str) -> Option<TaskState> {
        self.tasks.get(task).map(TaskRecord::state)
    }

    /// Whether every predecessor of `task` has `Succeeded` in this run.
    ///
    /// A task without predecessors is always satisfied.
    pub fn deps_satisfied(&self, task: &str) -> bool {
        self.graph.predecessors(task).iter().all(|dep| {
            match self.state_of(dep) {
                Some(TaskState::Succeeded) => true,
                Some(_) => false,
                None => {
                    warn!(task = %task, dep = %dep, "dependency missing from run state");
                    false
                }
            }
        })
    }
}
