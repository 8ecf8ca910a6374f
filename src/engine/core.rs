// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! This module contains a synchronous, deterministic "core runtime" that
//! consumes [`RunEvent`]s and produces:
//! - an updated scheduler state
//! - a list of "commands" describing what the IO shell should do next
//!
//! The async/IO-heavy shell (`engine::runtime::Runtime`) is responsible for:
//! - reading events from channels
//! - spawning executor calls for dispatched tasks
//! - aborting executor calls when asked to
//! - cancellation tokens and run deadlines
//!
//! The core can be unit tested without any Tokio, channels, or processes.

use tracing::info;

use crate::dag::{ScheduledTask, Scheduler};
use crate::engine::{RunEvent, RunOptions, RunReport, TaskName};
use crate::types::CancelMode;

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Hand these tasks to the executor.
    DispatchTasks(Vec<ScheduledTask>),
    /// Abort the in-flight executor calls of these tasks.
    AbortTasks(Vec<TaskName>),
}

/// Decision returned by the core after handling a single event.
#[derive(Debug, Clone)]
pub struct CoreStep {
    /// Commands the IO shell should execute.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

/// Pure core runtime state.
///
/// This owns the per-run scheduler and the run options. It has **no**
/// channels, no Tokio types, and does not perform any IO.
#[derive(Debug)]
pub struct CoreRuntime {
    scheduler: Scheduler,
    options: RunOptions,
}

impl CoreRuntime {
    pub fn new(scheduler: Scheduler, options: RunOptions) -> Self {
        Self { scheduler, options }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Whether the run has finished (every task terminal).
    pub fn is_finished(&self) -> bool {
        self.scheduler.is_finished()
    }

    /// Kick off the run by dispatching every root task.
    pub fn start(&mut self) -> CoreStep {
        let step = self.scheduler.start();

        let mut commands = Vec::new();
        if !step.newly_scheduled.is_empty() {
            commands.push(CoreCommand::DispatchTasks(step.newly_scheduled));
        }

        CoreStep {
            commands,
            keep_running: !self.scheduler.is_finished(),
        }
    }

    /// Handle a single runtime event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: RunEvent) -> CoreStep {
        let mut commands = Vec::new();

        match event {
            RunEvent::TaskCompleted { task, result } => {
                let step = self.scheduler.step_completion(&task, &result);
                if !step.newly_scheduled.is_empty() {
                    commands.push(CoreCommand::DispatchTasks(step.newly_scheduled));
                }
            }
            RunEvent::CancelRequested { reason } => {
                info!(
                    run_id = self.scheduler.run_id(),
                    %reason,
                    on_cancel = ?self.options.on_cancel,
                    "cancellation requested"
                );
                self.scheduler.cancel();

                if self.options.on_cancel == CancelMode::Abort {
                    let running = self.scheduler.running_tasks();
                    if !running.is_empty() {
                        self.scheduler
                            .abort_running(&format!("aborted: {reason}"));
                        commands.push(CoreCommand::AbortTasks(running));
                    }
                }
            }
        }

        CoreStep {
            commands,
            keep_running: !self.scheduler.is_finished(),
        }
    }

    /// Snapshot of the run as a report.
    pub fn report(&self) -> RunReport {
        self.scheduler.report(self.options.dag_id.clone())
    }
}
