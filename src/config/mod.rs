// src/config/mod.rs

//! DAG definition loading and validation for dagrun.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a definition file from disk (`loader.rs`).
//! - Validate it and build the dependency graph (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{
    ChainConfig, ConfigFile, ConfigSection, DagSection, DefaultSection, RawConfigFile, TaskConfig,
};
