// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::types::{CancelMode, FailurePolicy};

/// Command-line arguments for `dagrun`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "dagrun",
    version,
    about = "Run a DAG of containerized tasks once, honouring dependencies.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the DAG definition (TOML).
    ///
    /// Default: `$DAGRUN_CONFIG`, else `Dagrun.toml` in the current directory.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `DAGRUN_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the tasks in topological order, but don't
    /// execute anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Print the graph in Graphviz DOT format and exit.
    #[arg(long)]
    pub dot: bool,

    /// Run task commands as local processes instead of containers.
    #[arg(long)]
    pub local: bool,

    /// Container CLI used to launch tasks (docker, podman, ...).
    #[arg(long, value_name = "BIN", default_value = "docker")]
    pub container_runtime: String,

    /// Directory holding secrets as `<secret>/<key>` files.
    #[arg(long, value_name = "DIR")]
    pub secrets_dir: Option<PathBuf>,

    /// Print the run report as JSON on stdout.
    #[arg(long)]
    pub json: bool,

    /// Override `[config].failure_policy` (skip_downstream, halt_run).
    #[arg(long, value_name = "POLICY")]
    pub failure_policy: Option<FailurePolicy>,

    /// Override `[config].on_cancel` (drain, abort).
    #[arg(long, value_name = "MODE")]
    pub on_cancel: Option<CancelMode>,

    /// Override `[config].timeout`, e.g. `30m`.
    #[arg(long, value_name = "DURATION")]
    pub timeout: Option<String>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
