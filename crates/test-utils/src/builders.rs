#![allow(dead_code)]

use std::sync::Arc;

use dagrun::config::{ChainConfig, ConfigFile, RawConfigFile, TaskConfig};
use dagrun::dag::{DagBuilder, DependencyGraph, TaskPayload};
use dagrun::types::{CancelMode, FailurePolicy};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn with_dag_id(mut self, id: &str) -> Self {
        self.config.dag.id = Some(id.to_string());
        self
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn with_chain(mut self, stages: &[&[&str]]) -> Self {
        self.config.chain.push(ChainConfig {
            stages: stages
                .iter()
                .map(|stage| stage.iter().map(|s| s.to_string()).collect())
                .collect(),
        });
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.config.failure_policy = policy;
        self
    }

    pub fn with_on_cancel(mut self, mode: CancelMode) -> Self {
        self.config.config.on_cancel = mode;
        self
    }

    pub fn with_default_image(mut self, image: &str) -> Self {
        self.config.default.image = Some(image.to_string());
        self
    }

    pub fn with_default_env(mut self, key: &str, value: &str) -> Self {
        self.config.default.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    /// `cmd` is split on whitespace into `cmds`.
    pub fn new(cmd: &str) -> Self {
        Self {
            task: TaskConfig {
                cmds: cmd.split_whitespace().map(str::to_string).collect(),
                ..TaskConfig::default()
            },
        }
    }

    pub fn image(mut self, image: &str) -> Self {
        self.task.image = Some(image.to_string());
        self
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.task.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn retries(mut self, n: u32) -> Self {
        self.task.retries = Some(n);
        self
    }

    pub fn timeout(mut self, duration: &str) -> Self {
        self.task.timeout = Some(duration.to_string());
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}

/// Graph with the given task names and no edges.
pub fn tasks_only(names: &[&str]) -> DagBuilder {
    let mut builder = DagBuilder::new();
    for name in names {
        builder
            .add_task(*name, TaskPayload::command(["echo", *name]))
            .expect("task names in tests are unique");
    }
    builder
}

/// `A → B → {C1, C2, C3} → D`
pub fn pipeline_graph() -> Arc<DependencyGraph> {
    let mut builder = tasks_only(&["A", "B", "C1", "C2", "C3", "D"]);
    builder
        .chain([vec!["A"], vec!["B"], vec!["C1", "C2", "C3"], vec!["D"]])
        .expect("pipeline edges are valid");
    Arc::new(builder.build().expect("pipeline is acyclic"))
}

/// Two independent branches: `X1 → X2` and `Y1 → Y2`.
pub fn two_branch_graph() -> Arc<DependencyGraph> {
    let mut builder = tasks_only(&["X1", "X2", "Y1", "Y2"]);
    builder.add_edge("X1", "X2").expect("valid edge");
    builder.add_edge("Y1", "Y2").expect("valid edge");
    Arc::new(builder.build().expect("branches are acyclic"))
}

/// Graph where every task carries the same payload modifier, e.g. retries.
pub fn graph_with_payload(names: &[&str], payload: TaskPayload) -> Arc<DependencyGraph> {
    let mut builder = DagBuilder::new();
    for name in names {
        builder
            .add_task(*name, payload.clone())
            .expect("task names in tests are unique");
    }
    Arc::new(builder.build().expect("no edges, no cycles"))
}
