// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Environment variable that overrides the default config location.
pub const CONFIG_ENV_VAR: &str = "DAGRUN_CONFIG";

/// Load a DAG definition from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation (names, graph structure, cycles). Use [`load_and_validate`] for
/// that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    debug!(path = ?path, tasks = config.task.len(), "loaded DAG definition");
    Ok(config)
}

/// Load a DAG definition from path and validate it.
///
/// This is the recommended entry point for the rest of the application:
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls, then merged
///   with `[default]`).
/// - Checks for:
///   - invalid task / environment variable names,
///   - unknown `after` references, self-dependencies, duplicate edges,
///   - DAG cycles,
///   - malformed durations.
///
/// The result carries the validated `DependencyGraph`, ready to run.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// Helper to resolve the default config path: `$DAGRUN_CONFIG` if set,
/// otherwise `Dagrun.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("Dagrun.toml"))
}
