// src/exec/backend.rs

//! Pluggable executor abstraction.
//!
//! The runtime talks to a `TaskExecutor` instead of launching workloads
//! itself. This keeps the scheduling core independent of the execution
//! substrate and makes it easy to swap in a fake executor in tests.
//!
//! - [`ContainerExecutor`](super::ContainerExecutor) runs each task in a
//!   container through a docker-compatible CLI.
//! - [`ProcessExecutor`](super::ProcessExecutor) runs the task's command as a
//!   local process.
//! - Tests provide their own implementation that, for example, records which
//!   tasks were started and returns scripted results.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::dag::ScheduledTask;
use crate::engine::ExecutionResult;
use crate::errors::Result;

/// Boxed, sendable future returned by executors.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Trait abstracting how a scheduled task's payload is executed.
///
/// The call may take arbitrarily long. An `Err` means the executor itself
/// could not do its job (e.g. the container runtime is missing); the runtime
/// records it as a failed execution of the task, exactly like an
/// `ExecutionResult` with a failed status.
pub trait TaskExecutor: Send + Sync {
    fn execute<'a>(&'a self, task: &'a ScheduledTask) -> BoxFuture<'a, Result<ExecutionResult>>;

    /// Clean up after an `execute` call that was dropped before finishing
    /// (aborted run, per-attempt timeout), e.g. remove a container that
    /// outlived its client. The runtime awaits this before moving on.
    ///
    /// The default does nothing.
    fn cancel<'a>(&'a self, task: &'a ScheduledTask) -> BoxFuture<'a, Result<()>> {
        let _ = task;
        Box::pin(async { Ok(()) })
    }
}

impl<E: TaskExecutor + ?Sized> TaskExecutor for Arc<E> {
    fn execute<'a>(&'a self, task: &'a ScheduledTask) -> BoxFuture<'a, Result<ExecutionResult>> {
        (**self).execute(task)
    }

    fn cancel<'a>(&'a self, task: &'a ScheduledTask) -> BoxFuture<'a, Result<()>> {
        (**self).cancel(task)
    }
}
