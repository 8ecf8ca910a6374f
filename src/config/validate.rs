// src/config/validate.rs

use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::config::model::{ConfigFile, DefaultSection, RawConfigFile, TaskConfig};
use crate::dag::{DagBuilder, DependencyGraph, DeployType, TaskPayload};
use crate::errors::{DagrunError, Result};
use crate::types::parse_duration;

static TASK_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.\-]*$").expect("task name regex is valid")
});

static ENV_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("env name regex is valid")
});

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = DagrunError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        ensure_has_tasks(&raw)?;
        let run_timeout = validate_global_config(&raw)?;
        for (name, task) in raw.task.iter() {
            validate_task(name, task)?;
        }
        let graph = build_graph(&raw)?;
        Ok(ConfigFile::new_unchecked(raw, graph, run_timeout))
    }
}

impl FromStr for ConfigFile {
    type Err = DagrunError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let raw: RawConfigFile = toml::from_str(s)?;
        ConfigFile::try_from(raw)
    }
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(DagrunError::ConfigError(
            "config must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

/// Check `[config]` / `[default]`; returns the parsed run deadline.
fn validate_global_config(cfg: &RawConfigFile) -> Result<Option<Duration>> {
    // failure_policy and on_cancel are strongly typed and validated during
    // deserialization, so only the durations need checking here.
    let run_timeout = parse_optional_duration(cfg.config.timeout.as_deref(), "[config].timeout")?;
    parse_optional_duration(cfg.default.timeout.as_deref(), "[default].timeout")?;

    for key in cfg.default.env.keys() {
        ensure_env_name(key, "[default].env")?;
    }

    Ok(run_timeout)
}

fn validate_task(name: &str, task: &TaskConfig) -> Result<()> {
    if !TASK_NAME.is_match(name) {
        return Err(DagrunError::ConfigError(format!(
            "invalid task name '{}': use letters, digits, '_', '.' or '-'",
            name
        )));
    }

    parse_optional_duration(task.timeout.as_deref(), &format!("[task.{name}].timeout"))?;

    for key in task.env.keys() {
        ensure_env_name(key, &format!("[task.{name}].env"))?;
    }

    for secret in &task.secrets {
        match secret.deploy_type {
            DeployType::Env => {
                ensure_env_name(&secret.deploy_target, &format!("[task.{name}].secrets"))?;
                if secret.key.is_none() {
                    return Err(DagrunError::ConfigError(format!(
                        "task '{}': env secret '{}' needs a `key`",
                        name, secret.secret
                    )));
                }
            }
            DeployType::Volume => {
                if !secret.deploy_target.starts_with('/') {
                    return Err(DagrunError::ConfigError(format!(
                        "task '{}': volume secret '{}' must mount at an absolute path (got '{}')",
                        name, secret.secret, secret.deploy_target
                    )));
                }
            }
        }
    }

    Ok(())
}

/// Build the dependency graph: tasks first, then `after` edges, then
/// `[[chain]]` edges. Structural errors (unknown tasks, self-loops, duplicate
/// edges, cycles) come straight from the graph builder.
fn build_graph(cfg: &RawConfigFile) -> Result<DependencyGraph> {
    let mut builder = DagBuilder::new();

    for (name, task) in cfg.task.iter() {
        builder.add_task(name.clone(), task_payload(task, &cfg.default)?)?;
    }

    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            builder.add_edge(dep, name)?;
        }
    }

    for (idx, chain) in cfg.chain.iter().enumerate() {
        if chain.stages.len() < 2 || chain.stages.iter().any(Vec::is_empty) {
            return Err(DagrunError::ConfigError(format!(
                "[[chain]] #{} needs at least two non-empty stages",
                idx + 1
            )));
        }
        builder.chain(&chain.stages)?;
    }

    builder.build()
}

/// Merge a task's section with `[default]` into its payload.
fn task_payload(task: &TaskConfig, defaults: &DefaultSection) -> Result<TaskPayload> {
    let mut env = defaults.env.clone();
    env.extend(task.env.iter().map(|(k, v)| (k.clone(), v.clone())));

    let timeout = match task.timeout.as_deref() {
        Some(s) => Some(parse_duration(s).map_err(DagrunError::ConfigError)?),
        None => parse_optional_duration(defaults.timeout.as_deref(), "[default].timeout")?,
    };

    Ok(TaskPayload {
        image: task.image.clone().or_else(|| defaults.image.clone()),
        cmds: task.cmds.clone(),
        args: task.args.clone(),
        namespace: task.namespace.clone().or_else(|| defaults.namespace.clone()),
        env,
        secrets: task.secrets.clone(),
        retries: task.retries.or(defaults.retries).unwrap_or(0),
        timeout,
    })
}

fn parse_optional_duration(value: Option<&str>, field: &str) -> Result<Option<Duration>> {
    value
        .map(|s| {
            parse_duration(s).map_err(|e| DagrunError::ConfigError(format!("{field}: {e}")))
        })
        .transpose()
}

fn ensure_env_name(key: &str, field: &str) -> Result<()> {
    if ENV_NAME.is_match(key) {
        Ok(())
    } else {
        Err(DagrunError::ConfigError(format!(
            "{field}: invalid environment variable name '{key}'"
        )))
    }
}
