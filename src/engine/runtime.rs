// src/engine/runtime.rs

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::dag::{DependencyGraph, ScheduledTask, Scheduler};
use crate::engine::{
    CoreCommand, CoreRuntime, ExecutionResult, RunEvent, RunOptions, RunReport, TaskName,
};
use crate::errors::Result;
use crate::exec::TaskExecutor;

/// Drives one DAG run: feeds `RunEvent`s into the pure [`CoreRuntime`] and
/// delegates the actual work to a [`TaskExecutor`].
///
/// Every ready task is spawned onto Tokio immediately; its completion comes
/// back through a channel and is handled by this loop, which is the only
/// place task state is mutated.
pub struct Runtime {
    core: CoreRuntime,
    executor: Arc<dyn TaskExecutor>,
    event_tx: mpsc::Sender<RunEvent>,
    event_rx: mpsc::Receiver<RunEvent>,
    cancel: CancellationToken,
    /// In-flight executor calls, by task name.
    in_flight: HashMap<TaskName, (AbortHandle, ScheduledTask)>,
    /// `TaskExecutor::cancel` calls for aborted tasks.
    cleanup: JoinSet<()>,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("in_flight", &self.in_flight.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Runtime {
    pub fn new(
        graph: Arc<DependencyGraph>,
        executor: Arc<dyn TaskExecutor>,
        options: RunOptions,
    ) -> Self {
        let scheduler = Scheduler::new(graph, options.failure_policy);
        Self::from_scheduler(scheduler, executor, options)
    }

    /// Build a runtime around an existing (not yet started) scheduler.
    pub fn from_scheduler(
        scheduler: Scheduler,
        executor: Arc<dyn TaskExecutor>,
        options: RunOptions,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::channel::<RunEvent>(64);
        Self {
            core: CoreRuntime::new(scheduler, options),
            executor,
            event_tx,
            event_rx,
            cancel: CancellationToken::new(),
            in_flight: HashMap::new(),
            cleanup: JoinSet::new(),
        }
    }

    /// Use `token` to cancel this run. Cancelling a parent token cancels
    /// every run created with one of its children.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that cancels this run when triggered.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Main event loop. Returns once every task is terminal.
    pub async fn run(mut self) -> Result<RunReport> {
        let run_id = self.core.scheduler().run_id();
        let dag_id = self.core.options().dag_id.clone().unwrap_or_default();
        // A deadline too far out to represent is no deadline.
        let deadline = self
            .core
            .options()
            .timeout
            .and_then(|t| Instant::now().checked_add(t));

        info!(%dag_id, run_id, "dagrun runtime started");

        let step = self.core.start();
        for command in step.commands {
            self.execute_command(command);
        }
        let mut keep_running = step.keep_running;
        let mut cancel_seen = false;

        while keep_running {
            let event = tokio::select! {
                maybe = self.event_rx.recv() => match maybe {
                    Some(e) => e,
                    // We hold a sender ourselves, so this never happens.
                    None => break,
                },
                _ = self.cancel.cancelled(), if !cancel_seen => {
                    cancel_seen = true;
                    RunEvent::CancelRequested { reason: "cancellation requested".to_string() }
                }
                _ = sleep_until_deadline(deadline), if !cancel_seen => {
                    cancel_seen = true;
                    warn!(%dag_id, run_id, "run deadline exceeded");
                    RunEvent::CancelRequested { reason: "run deadline exceeded".to_string() }
                }
            };

            debug!(?event, "runtime received event");

            if let RunEvent::TaskCompleted { task, .. } = &event {
                self.in_flight.remove(task);
            }

            // Feed the event into the pure core and get commands back.
            let step = self.core.step(event);
            for command in step.commands {
                self.execute_command(command);
            }
            keep_running = step.keep_running;
        }

        // Aborted containers and the like are gone before the report is out.
        while let Some(res) = self.cleanup.join_next().await {
            if let Err(e) = res {
                warn!(error = %e, "executor cleanup task failed");
            }
        }

        let report = self.core.report();
        info!(
            %dag_id,
            run_id,
            outcome = ?report.outcome,
            failed = ?report.failed,
            skipped = ?report.skipped,
            "runtime exiting"
        );
        Ok(report)
    }

    /// Execute a single command from the core.
    fn execute_command(&mut self, command: CoreCommand) {
        match command {
            CoreCommand::DispatchTasks(tasks) => {
                for task in tasks {
                    self.dispatch(task);
                }
            }
            CoreCommand::AbortTasks(names) => {
                for name in names {
                    if let Some((handle, task)) = self.in_flight.remove(&name) {
                        info!(task = %name, "aborting in-flight executor call");
                        handle.abort();

                        let executor = Arc::clone(&self.executor);
                        self.cleanup.spawn(async move {
                            cancel_call(executor.as_ref(), &task).await;
                        });
                    }
                }
            }
        }
    }

    /// Spawn the executor call for one task.
    ///
    /// The call runs in its own Tokio task so a panicking executor is reported
    /// as a failed task instead of taking the run loop down with it.
    fn dispatch(&mut self, task: ScheduledTask) {
        let name = task.name.clone();
        let span = info_span!("task", task = %name, run_id = task.run_id);

        let executor = Arc::clone(&self.executor);
        let call = tokio::spawn(execute_with_retries(executor, task.clone()).instrument(span));
        self.in_flight
            .insert(name.clone(), (call.abort_handle(), task));

        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let result = match call.await {
                Ok(result) => result,
                Err(e) if e.is_cancelled() => ExecutionResult::failed(None, "executor call aborted"),
                Err(e) => ExecutionResult::failed(None, format!("executor panicked: {e}")),
            };
            // The run may already be over (aborted tasks); nobody is listening then.
            let _ = tx.send(RunEvent::TaskCompleted { task: name, result }).await;
        });
    }
}

/// Call the executor up to `retries + 1` times, applying the per-attempt
/// timeout. Executor errors and timeouts become failed results.
async fn execute_with_retries(executor: Arc<dyn TaskExecutor>, task: ScheduledTask) -> ExecutionResult {
    let max_attempts = task.payload.retries.saturating_add(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        let call = executor.execute(&task);
        let outcome = match task.payload.timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(res) => res,
                Err(_) => {
                    cancel_call(executor.as_ref(), &task).await;
                    Ok(ExecutionResult::failed(
                        None,
                        format!("timed out after {limit:?}"),
                    ))
                }
            },
            None => call.await,
        };

        let result = match outcome {
            Ok(result) => result,
            Err(err) => ExecutionResult::failed(None, format!("executor error: {err}")),
        }
        .with_attempts(attempt);

        if result.is_success() || attempt >= max_attempts {
            return result;
        }

        warn!(
            task = %task.name,
            attempt,
            max_attempts,
            exit_code = ?result.exit_code,
            "task attempt failed; retrying"
        );
    }
}

/// Let the executor clean up after a dropped call. Failures are only logged:
/// the task's outcome is already decided.
async fn cancel_call(executor: &dyn TaskExecutor, task: &ScheduledTask) {
    if let Err(e) = executor.cancel(task).await {
        warn!(task = %task.name, run_id = task.run_id, error = %e, "executor cleanup failed");
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Run `graph` once to completion with `executor`.
///
/// Any number of runs may share the same graph and executor concurrently.
pub async fn run_dag(
    graph: Arc<DependencyGraph>,
    executor: Arc<dyn TaskExecutor>,
    options: RunOptions,
) -> Result<RunReport> {
    Runtime::new(graph, executor, options).run().await
}
