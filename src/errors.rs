// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DagrunError {
    #[error("Duplicate task: {0}")]
    DuplicateTask(String),

    #[error("Unknown task: {0}")]
    UnknownTask(String),

    #[error("Task '{0}' cannot depend on itself")]
    SelfLoop(String),

    #[error("Duplicate edge: {predecessor} -> {successor}")]
    DuplicateEdge {
        predecessor: String,
        successor: String,
    },

    #[error("Cycle detected in DAG involving task '{0}'")]
    CycleDetected(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DagrunError {
    /// Whether this error was raised while defining the graph (as opposed to
    /// IO or parsing). Definition errors are always fatal to the run.
    pub fn is_definition_error(&self) -> bool {
        matches!(
            self,
            DagrunError::DuplicateTask(_)
                | DagrunError::UnknownTask(_)
                | DagrunError::SelfLoop(_)
                | DagrunError::DuplicateEdge { .. }
                | DagrunError::CycleDetected(_)
        )
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, DagrunError>;
