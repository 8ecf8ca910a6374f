// src/exec/mod.rs

//! Task execution layer.
//!
//! This module is responsible for actually running the payloads of the
//! tasks the scheduler dispatches, and reporting back an `ExecutionResult`.
//!
//! - [`backend`] provides the `TaskExecutor` trait the runtime is written
//!   against, which tests can replace with a fake implementation.
//! - [`container`] launches each task in a container via a docker-compatible
//!   CLI (`docker`, `podman`).
//! - [`process`] runs the task's command as a local process.
//! - [`task_runner`] spawns a process and captures its output.
//! - [`secrets`] resolves secret references against a host directory.

pub mod backend;
pub mod container;
pub mod process;
pub mod secrets;
pub mod task_runner;

pub use backend::{BoxFuture, TaskExecutor};
pub use container::{ContainerExecutor, ContainerInvocation};
pub use process::ProcessExecutor;
