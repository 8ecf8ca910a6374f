// src/dag/mod.rs

//! DAG representation and scheduling.
//!
//! - [`graph`] holds the builder and the validated, immutable task graph.
//! - [`scheduler`] contains the per-run state machine that decides
//!   which tasks are ready to run, and what happens when one fails.
//! - [`task_info`] provides task payloads, states and scheduled task types.
//! - [`scheduler_step`] defines the result type for scheduler steps.
//! - [`state_manager`] manages per-run state transitions.

pub mod graph;
pub mod scheduler;
pub mod scheduler_step;
pub mod state_manager;
pub mod task_info;

pub use graph::{DagBuilder, DependencyGraph};
pub use scheduler::Scheduler;
pub use scheduler_step::SchedulerStep;
pub use task_info::{DeployType, ScheduledTask, SecretRef, Task, TaskPayload, TaskState};
