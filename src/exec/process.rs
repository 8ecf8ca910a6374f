// src/exec/process.rs

//! Local process executor: runs the task's command directly on the host.

use std::path::PathBuf;

use anyhow::anyhow;
use tokio::process::Command;
use tracing::info;

use crate::dag::ScheduledTask;
use crate::engine::ExecutionResult;
use crate::errors::Result;
use crate::exec::backend::{BoxFuture, TaskExecutor};
use crate::exec::secrets::{self, ResolvedSecret};
use crate::exec::task_runner::{DEFAULT_MAX_OUTPUT_LINES, run_process};

/// Executor that ignores the image and runs `cmds + args` as a local process.
///
/// Only `env` secrets are supported; a task with a `volume` secret fails.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    secrets_dir: Option<PathBuf>,
    max_output_lines: usize,
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessExecutor {
    pub fn new() -> Self {
        Self {
            secrets_dir: None,
            max_output_lines: DEFAULT_MAX_OUTPUT_LINES,
        }
    }

    pub fn with_secrets_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.secrets_dir = Some(dir.into());
        self
    }

    pub fn with_max_output_lines(mut self, n: usize) -> Self {
        self.max_output_lines = n;
        self
    }

    fn command(&self, task: &ScheduledTask) -> Result<Command> {
        let payload = &task.payload;
        let mut parts = payload.cmds.iter().chain(payload.args.iter());
        let program = parts
            .next()
            .ok_or_else(|| anyhow!("task '{}' has no command to run", task.name))?;

        let mut cmd = Command::new(program);
        cmd.args(parts).envs(&payload.env);

        for secret in secrets::resolve_all(&payload.secrets, self.secrets_dir.as_deref())? {
            match secret {
                ResolvedSecret::Env { name, value } => {
                    cmd.env(name, value);
                }
                ResolvedSecret::Volume { source, target } => {
                    return Err(anyhow!(
                        "task '{}': volume secret {:?} cannot be mounted at '{}' for a local process",
                        task.name,
                        source,
                        target
                    )
                    .into());
                }
            }
        }

        Ok(cmd)
    }
}

impl TaskExecutor for ProcessExecutor {
    fn execute<'a>(&'a self, task: &'a ScheduledTask) -> BoxFuture<'a, Result<ExecutionResult>> {
        Box::pin(async move {
            let cmd = self.command(task)?;

            info!(
                task = %task.name,
                run_id = task.run_id,
                cmd = %task.payload.command_line(),
                "starting task process"
            );

            Ok(run_process(cmd, task, self.max_output_lines).await?)
        })
    }
}
