// src/config/model.rs

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::dag::{DependencyGraph, SecretRef};
use crate::engine::RunOptions;
use crate::types::{CancelMode, FailurePolicy};

/// Top-level DAG definition as read from a TOML file.
///
/// ```toml
/// [dag]
/// id = "k8s_pod_op"
///
/// [config]
/// failure_policy = "skip_downstream"
///
/// [default]
/// namespace = "default"
///
/// [task.afe]
/// image = "automl.afe:latest"
/// cmds = ["echo", "AFE"]
///
/// [task.pps]
/// image = "automl.pps:latest"
/// cmds = ["echo", "PPS"]
/// after = ["afe"]
///
/// [[chain]]
/// stages = [["pps"], ["trn_1", "trn_2"], ["sel"]]
/// ```
///
/// All sections except `[task.*]` are optional and have reasonable defaults.
/// This is the unchecked form; [`ConfigFile`] is obtained from it through
/// `TryFrom`, which validates everything and builds the graph.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub dag: DagSection,

    /// Run behaviour from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// Payload defaults from `[default]`.
    #[serde(default)]
    pub default: DefaultSection,

    /// All tasks from `[task.<name>]`, keyed by task name.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,

    /// Fan-out/fan-in edge declarations from `[[chain]]`.
    #[serde(default)]
    pub chain: Vec<ChainConfig>,
}

/// `[dag]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DagSection {
    /// Identifier used in logs and reports.
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub description: Option<String>,
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ConfigSection {
    /// `"skip_downstream"` (default) or `"halt_run"`.
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// `"drain"` (default) or `"abort"`.
    #[serde(default)]
    pub on_cancel: CancelMode,

    /// Deadline for the whole run, e.g. `"2h"`.
    #[serde(default)]
    pub timeout: Option<String>,
}

/// `[default]` section: values applied to every task that does not set them.
///
/// `env` is merged key by key, with the task's own entries winning.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DefaultSection {
    #[serde(default)]
    pub image: Option<String>,

    #[serde(default)]
    pub namespace: Option<String>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    #[serde(default)]
    pub retries: Option<u32>,

    #[serde(default)]
    pub timeout: Option<String>,
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TaskConfig {
    /// Container image, e.g. `"automl.trn:latest"`.
    #[serde(default)]
    pub image: Option<String>,

    /// Entrypoint override (`cmds = ["echo", "TRN_1"]`).
    #[serde(default)]
    pub cmds: Vec<String>,

    /// Arguments appended after the entrypoint.
    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub namespace: Option<String>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Secrets injected by the executor (`[[task.<name>.secrets]]`).
    #[serde(default)]
    pub secrets: Vec<SecretRef>,

    /// Dependency list: this task waits for all tasks listed here.
    #[serde(default)]
    pub after: Vec<String>,

    #[serde(default)]
    pub retries: Option<u32>,

    /// Per-attempt timeout, e.g. `"10m"`.
    #[serde(default)]
    pub timeout: Option<String>,
}

/// `[[chain]]` entry: consecutive stages are fully connected, so
/// `stages = [["a"], ["b1", "b2"], ["c"]]` declares `a → b1, a → b2,
/// b1 → c, b2 → c`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ChainConfig {
    pub stages: Vec<Vec<String>>,
}

/// Validated DAG definition: the raw sections plus the built graph and the
/// parsed run options.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub dag: DagSection,
    pub config: ConfigSection,
    pub default: DefaultSection,
    pub task: BTreeMap<String, TaskConfig>,
    pub chain: Vec<ChainConfig>,
    graph: Arc<DependencyGraph>,
    run_timeout: Option<Duration>,
}

impl ConfigFile {
    /// Only called from validation, after every check passed.
    pub(crate) fn new_unchecked(
        raw: RawConfigFile,
        graph: DependencyGraph,
        run_timeout: Option<Duration>,
    ) -> Self {
        Self {
            dag: raw.dag,
            config: raw.config,
            default: raw.default,
            task: raw.task,
            chain: raw.chain,
            graph: Arc::new(graph),
            run_timeout,
        }
    }

    /// The validated dependency graph, shareable across runs.
    pub fn graph(&self) -> Arc<DependencyGraph> {
        Arc::clone(&self.graph)
    }

    /// Run options derived from `[dag]` and `[config]`.
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            dag_id: self.dag.id.clone(),
            failure_policy: self.config.failure_policy,
            on_cancel: self.config.on_cancel,
            timeout: self.run_timeout,
        }
    }
}
