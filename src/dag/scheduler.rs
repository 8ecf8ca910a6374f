use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, info, warn};

use crate::dag::graph::DependencyGraph;
use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::state_manager::{ReadOnlyStateManager, StateManager};
use crate::dag::task_info::{TaskRecord, TaskState};
use crate::engine::{ExecutionResult, RunOutcome, RunReport, TaskName, TaskReport};
use crate::types::FailurePolicy;

static NEXT_RUN_ID: AtomicU64 = AtomicU64::new(1);

/// Scheduler holds a shared, immutable DAG plus the mutable state of one run.
///
/// It is responsible for:
/// - deciding when a task is "ready" to run (all predecessors succeeded)
/// - marking tasks as running/succeeded/failed/skipped
/// - scheduling successors when a task succeeds
/// - applying the failure policy when a task fails
///
/// It performs no IO; the async runtime feeds it completion events one at a
/// time, which makes it the single writer of task state.
#[derive(Debug)]
pub struct Scheduler {
    graph: Arc<DependencyGraph>,
    tasks: HashMap<TaskName, TaskRecord>,
    policy: FailurePolicy,
    run_id: u64,
    started: bool,
    cancelled: bool,
    finished: bool,
}

impl Scheduler {
    /// Construct a scheduler for a new run. Every task starts `Pending`.
    ///
    /// Each call gets a run id that is unique within this process.
    pub fn new(graph: Arc<DependencyGraph>, policy: FailurePolicy) -> Self {
        let run_id = NEXT_RUN_ID.fetch_add(1, Ordering::Relaxed);
        Self::with_run_id(graph, policy, run_id)
    }

    pub fn with_run_id(graph: Arc<DependencyGraph>, policy: FailurePolicy, run_id: u64) -> Self {
        let tasks = graph
            .tasks()
            .map(|name| (name.to_string(), TaskRecord::new(name.to_string())))
            .collect();

        Self {
            graph,
            tasks,
            policy,
            run_id,
            started: false,
            cancelled: false,
            finished: false,
        }
    }

    pub fn graph(&self) -> &Arc<DependencyGraph> {
        &self.graph
    }

    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Returns `true` once every task is in a terminal state.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Current state of the given task.
    pub fn state_of(&self, task: &str) -> Option<TaskState> {
        self.tasks.get(task).map(TaskRecord::state)
    }

    /// Full transition history of the given task, oldest first.
    pub fn history_of(&self, task: &str) -> Option<&[TaskState]> {
        self.tasks.get(task).map(TaskRecord::history)
    }

    /// Names of tasks currently `Running`, in declaration order.
    pub fn running_tasks(&self) -> Vec<TaskName> {
        self.tasks_in_state(TaskState::Running)
    }

    pub fn tasks_in_state(&self, state: TaskState) -> Vec<TaskName> {
        self.graph
            .tasks()
            .filter(|name| self.state_of(name) == Some(state))
            .map(str::to_string)
            .collect()
    }

    /// Whether every predecessor of `task` has succeeded in this run.
    ///
    /// Returns `None` if the task is unknown.
    pub fn deps_satisfied(&self, task: &str) -> Option<bool> {
        if !self.tasks.contains_key(task) {
            return None;
        }
        let mgr = ReadOnlyStateManager::new(&self.graph, &self.tasks);
        Some(mgr.deps_satisfied(task))
    }

    /// Start the run: every task without predecessors is dispatched.
    ///
    /// Calling this more than once is a no-op.
    pub fn start(&mut self) -> SchedulerStep {
        if self.started {
            warn!(run_id = self.run_id, "start called twice; ignoring");
            return SchedulerStep::empty();
        }
        self.started = true;

        info!(
            run_id = self.run_id,
            tasks = self.graph.len(),
            "scheduler: starting DAG run"
        );

        let graph = Arc::clone(&self.graph);
        let mut manager = StateManager::new(&graph, &mut self.tasks, self.run_id);
        let newly_scheduled = manager.collect_new_ready_tasks(graph.roots());

        SchedulerStep {
            newly_scheduled,
            run_just_finished: self.maybe_finish_run(),
            ..SchedulerStep::empty()
        }
    }

    /// Handle completion of a dispatched task.
    ///
    /// Completions for unknown tasks, or for tasks that are not `Running`
    /// (never dispatched, or already terminal), are ignored.
    pub fn step_completion(&mut self, task: &str, result: &ExecutionResult) -> SchedulerStep {
        let graph = Arc::clone(&self.graph);
        let mut manager = StateManager::new(&graph, &mut self.tasks, self.run_id);

        if !manager.record_completion(task, result) {
            warn!(
                task = %task,
                run_id = self.run_id,
                state = ?self.state_of(task),
                "completion for task that is not running; ignoring"
            );
            return SchedulerStep::empty();
        }

        let mut step = SchedulerStep::empty();

        if result.is_success() {
            debug!(task = %task, run_id = self.run_id, "task completed successfully");
            if !self.cancelled {
                step.newly_scheduled =
                    manager.collect_new_ready_tasks(graph.successors(task).iter().map(String::as_str));
            }
        } else {
            warn!(
                task = %task,
                run_id = self.run_id,
                exit_code = ?result.exit_code,
                policy = ?self.policy,
                "task failed; applying failure policy"
            );
            step.newly_failed.push(task.to_string());
            step.newly_skipped = match self.policy {
                FailurePolicy::SkipDownstream => manager.mark_descendants_skipped(task),
                FailurePolicy::HaltRun => manager.mark_all_pending_skipped(task),
            };
        }

        step.run_just_finished = self.maybe_finish_run();
        step
    }

    /// Cancel the run: every `Pending` task becomes `Skipped`. Running tasks
    /// are left alone; see [`Scheduler::abort_running`].
    pub fn cancel(&mut self) -> SchedulerStep {
        if self.finished {
            return SchedulerStep::empty();
        }
        self.cancelled = true;

        info!(run_id = self.run_id, "scheduler: run cancelled; skipping pending tasks");

        let graph = Arc::clone(&self.graph);
        let mut manager = StateManager::new(&graph, &mut self.tasks, self.run_id);
        let newly_skipped = manager.mark_all_pending_skipped("cancelled");

        SchedulerStep {
            newly_skipped,
            run_just_finished: self.maybe_finish_run(),
            ..SchedulerStep::empty()
        }
    }

    /// Mark every `Running` task as `Failed` with `reason` as diagnostic.
    ///
    /// Used when running executor calls are forcibly aborted.
    pub fn abort_running(&mut self, reason: &str) -> SchedulerStep {
        let graph = Arc::clone(&self.graph);
        let mut manager = StateManager::new(&graph, &mut self.tasks, self.run_id);
        let newly_failed = manager.fail_running(reason);

        SchedulerStep {
            newly_failed,
            run_just_finished: self.maybe_finish_run(),
            ..SchedulerStep::empty()
        }
    }

    /// Outcome of the run so far: `Success` only if every task succeeded.
    pub fn outcome(&self) -> RunOutcome {
        if self
            .tasks
            .values()
            .all(|r| r.state() == TaskState::Succeeded)
        {
            RunOutcome::Success
        } else {
            RunOutcome::Failed
        }
    }

    /// Snapshot of the run as a [`RunReport`].
    pub fn report(&self, dag_id: Option<String>) -> RunReport {
        let tasks: Vec<TaskReport> = self
            .graph
            .tasks()
            .filter_map(|name| self.tasks.get(name))
            .map(|record| TaskReport {
                name: record.name.clone(),
                state: record.state(),
                exit_code: record.result.as_ref().and_then(|r| r.exit_code),
                attempts: record.result.as_ref().map(|r| r.attempts).unwrap_or(0),
                output: record
                    .result
                    .as_ref()
                    .map(|r| r.output.clone())
                    .unwrap_or_default(),
                duration_ms: record
                    .duration()
                    .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
            })
            .collect();

        RunReport {
            dag_id,
            run_id: self.run_id,
            outcome: self.outcome(),
            cancelled: self.cancelled,
            tasks,
            succeeded: self.tasks_in_state(TaskState::Succeeded),
            failed: self.tasks_in_state(TaskState::Failed),
            skipped: self.tasks_in_state(TaskState::Skipped),
        }
    }

    /// Determine whether all tasks are terminal and mark the run finished.
    ///
    /// Returns `true` if this call transitioned the run to finished.
    fn maybe_finish_run(&mut self) -> bool {
        if self.finished {
            return false;
        }

        let graph = Arc::clone(&self.graph);
        let manager = StateManager::new(&graph, &mut self.tasks, self.run_id);

        if manager.all_tasks_terminal() {
            info!(
                run_id = self.run_id,
                outcome = ?self.outcome(),
                "scheduler: all tasks terminal; marking run as finished"
            );
            self.finished = true;
            true
        } else {
            false
        }
    }
}
