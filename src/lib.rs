// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod types;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{ConfigFile, default_config_path, load_and_validate};
use crate::engine::{RunReport, Runtime};
use crate::exec::{ContainerExecutor, ProcessExecutor, TaskExecutor};
use crate::types::parse_duration;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - DAG definition loading and validation
/// - executor selection (container or local process)
/// - the runtime for a single run
/// - Ctrl-C handling (cancels the run)
///
/// Returns `None` when nothing was executed (`--dry-run`, `--dot`).
pub async fn run(args: CliArgs) -> Result<Option<RunReport>> {
    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let cfg = load_and_validate(&config_path)
        .with_context(|| format!("loading DAG definition from {:?}", config_path))?;

    if args.dot {
        print!("{}", cfg.graph().to_dot());
        return Ok(None);
    }

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(None);
    }

    let mut options = cfg.run_options();
    if let Some(policy) = args.failure_policy {
        options.failure_policy = policy;
    }
    if let Some(mode) = args.on_cancel {
        options.on_cancel = mode;
    }
    if let Some(ref t) = args.timeout {
        options.timeout = Some(parse_duration(t).map_err(anyhow::Error::msg)?);
    }

    let executor: Arc<dyn TaskExecutor> = if args.local {
        let mut exec = ProcessExecutor::new();
        if let Some(ref dir) = args.secrets_dir {
            exec = exec.with_secrets_dir(dir);
        }
        Arc::new(exec)
    } else {
        let mut exec = ContainerExecutor::new(&args.container_runtime);
        if let Some(ref dir) = args.secrets_dir {
            exec = exec.with_secrets_dir(dir);
        }
        Arc::new(exec)
    };

    info!(
        dag_id = ?options.dag_id,
        tasks = cfg.graph().len(),
        policy = ?options.failure_policy,
        local = args.local,
        "starting DAG run"
    );

    let runtime = Runtime::new(cfg.graph(), executor, options);

    // Ctrl-C → cancel the run.
    {
        let token = runtime.cancellation_token();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            token.cancel();
        });
    }

    let report = runtime.run().await?;
    Ok(Some(report))
}

/// Simple dry-run output: print tasks in topological order with their
/// payloads and dependencies.
fn print_dry_run(cfg: &ConfigFile) {
    let graph = cfg.graph();
    let options = cfg.run_options();

    println!("dagrun dry-run");
    if let Some(ref id) = cfg.dag.id {
        println!("  dag.id = {id}");
    }
    if let Some(ref description) = cfg.dag.description {
        println!("  dag.description = {description}");
    }
    println!("  config.failure_policy = {:?}", options.failure_policy);
    println!("  config.on_cancel = {:?}", options.on_cancel);
    if let Some(timeout) = options.timeout {
        println!("  config.timeout = {timeout:?}");
    }
    println!();

    println!("tasks ({}), in topological order:", graph.len());
    for name in graph.topological_order() {
        let Some(task) = graph.task(&name) else {
            continue;
        };
        let payload = &task.payload;

        println!("  - {name}");
        if let Some(ref image) = payload.image {
            println!("      image: {image}");
        }
        let cmd = payload.command_line();
        if !cmd.is_empty() {
            println!("      cmd: {cmd}");
        }
        if let Some(ref ns) = payload.namespace {
            println!("      namespace: {ns}");
        }
        if !payload.env.is_empty() {
            println!("      env: {:?}", payload.env.keys().collect::<Vec<_>>());
        }
        for secret in &payload.secrets {
            println!(
                "      secret: {} ({:?} -> {})",
                secret.secret, secret.deploy_type, secret.deploy_target
            );
        }
        let preds = graph.predecessors(&name);
        if !preds.is_empty() {
            println!("      after: {:?}", preds);
        }
        if payload.retries > 0 {
            println!("      retries: {}", payload.retries);
        }
        if let Some(t) = payload.timeout {
            println!("      timeout: {t:?}");
        }
    }

    debug!("dry-run complete (no execution)");
}
