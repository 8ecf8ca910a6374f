// src/exec/container.rs

//! Container executor: runs each task with a docker-compatible CLI.

use std::path::PathBuf;
use std::process::Stdio;

use anyhow::{Context, anyhow};
use tokio::process::Command;
use tracing::{info, warn};

use crate::dag::ScheduledTask;
use crate::engine::ExecutionResult;
use crate::errors::Result;
use crate::exec::backend::{BoxFuture, TaskExecutor};
use crate::exec::secrets::{self, ResolvedSecret};
use crate::exec::task_runner::{DEFAULT_MAX_OUTPUT_LINES, run_process};

/// Fully resolved command line for one container launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInvocation {
    pub program: String,
    pub args: Vec<String>,
    /// Variables set on the CLI process itself. Secret values travel this way
    /// (`-e NAME` without a value) so they never show up in the argument list.
    pub env: Vec<(String, String)>,
}

/// Executor that launches `<runtime> run --rm ... <image> ...` per task.
#[derive(Debug, Clone)]
pub struct ContainerExecutor {
    runtime: String,
    secrets_dir: Option<PathBuf>,
    max_output_lines: usize,
}

impl Default for ContainerExecutor {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl ContainerExecutor {
    /// `runtime` is the CLI binary, e.g. `docker` or `podman`.
    pub fn new(runtime: impl Into<String>) -> Self {
        Self {
            runtime: runtime.into(),
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

    /// Build the CLI invocation for a task without running it.
    pub fn invocation(&self, task: &ScheduledTask) -> Result<ContainerInvocation> {
        let payload = &task.payload;
        let image = payload
            .image
            .as_deref()
            .ok_or_else(|| anyhow!("task '{}' has no container image", task.name))?;

        let mut args: Vec<String> = vec![
            "run".into(),
            "--rm".into(),
            "--name".into(),
            container_name(&task.name, task.run_id),
            "--label".into(),
            format!("dagrun.task={}", task.name),
        ];
        if let Some(ns) = &payload.namespace {
            args.push("--label".into());
            args.push(format!("dagrun.namespace={ns}"));
        }

        for (key, value) in &payload.env {
            args.push("-e".into());
            args.push(format!("{key}={value}"));
        }

        let mut env = Vec::new();
        for secret in secrets::resolve_all(&payload.secrets, self.secrets_dir.as_deref())? {
            match secret {
                ResolvedSecret::Env { name, value } => {
                    args.push("-e".into());
                    args.push(name.clone());
                    env.push((name, value));
                }
                ResolvedSecret::Volume { source, target } => {
                    args.push("-v".into());
                    args.push(format!("{}:{}:ro", source.display(), target));
                }
            }
        }

        let mut cmds = payload.cmds.iter();
        if let Some(entrypoint) = cmds.next() {
            args.push("--entrypoint".into());
            args.push(entrypoint.clone());
        }

        args.push(image.to_string());
        args.extend(cmds.cloned());
        args.extend(payload.args.iter().cloned());

        Ok(ContainerInvocation {
            program: self.runtime.clone(),
            args,
            env,
        })
    }

    /// Invocation that force-removes the task's container, running or not.
    pub fn removal(&self, task: &ScheduledTask) -> ContainerInvocation {
        ContainerInvocation {
            program: self.runtime.clone(),
            args: vec![
                "rm".into(),
                "-f".into(),
                container_name(&task.name, task.run_id),
            ],
            env: Vec::new(),
        }
    }
}

impl TaskExecutor for ContainerExecutor {
    fn execute<'a>(&'a self, task: &'a ScheduledTask) -> BoxFuture<'a, Result<ExecutionResult>> {
        Box::pin(async move {
            let invocation = self.invocation(task)?;

            info!(
                task = %task.name,
                run_id = task.run_id,
                runtime = %invocation.program,
                image = ?task.payload.image,
                cmd = %task.payload.command_line(),
                "starting container"
            );

            let mut cmd = Command::new(&invocation.program);
            cmd.args(&invocation.args).envs(invocation.env.iter().cloned());

            Ok(run_process(cmd, task, self.max_output_lines).await?)
        })
    }

    /// Killing the `run` client leaves the container running, so remove it
    /// explicitly.
    fn cancel<'a>(&'a self, task: &'a ScheduledTask) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let removal = self.removal(task);
            info!(
                task = %task.name,
                run_id = task.run_id,
                container = ?removal.args.last(),
                "removing container of aborted task"
            );

            let out = Command::new(&removal.program)
                .args(&removal.args)
                .stdin(Stdio::null())
                .output()
                .await
                .with_context(|| format!("running `{} rm` for task '{}'", removal.program, task.name))?;

            if !out.status.success() {
                warn!(
                    task = %task.name,
                    exit_code = ?out.status.code(),
                    stderr = %String::from_utf8_lossy(&out.stderr).trim(),
                    "container removal failed"
                );
            }
            Ok(())
        })
    }
}

/// Container names only allow `[a-zA-Z0-9_.-]`. The process id keeps names
/// from separate `dagrun` processes apart; the run id does the same within
/// one process.
pub fn container_name(task: &str, run_id: u64) -> String {
    let sanitized: String = task
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect();
    format!(
        "dagrun-{}-{}-{}",
        sanitized.trim_matches('-'),
        std::process::id(),
        run_id
    )
}
