// src/exec/secrets.rs

//! Resolution of [`SecretRef`]s against a host secrets directory.
//!
//! Layout: `<secrets_dir>/<secret>/<key>`, one file per key, mirroring how a
//! cluster secret looks once mounted as a volume.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

use crate::dag::{DeployType, SecretRef};

/// A secret ready to be handed to a workload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedSecret {
    /// Environment variable `name` with the secret's value.
    Env { name: String, value: String },
    /// Host directory to mount read-only at `target`.
    Volume { source: PathBuf, target: String },
}

/// Resolve a single secret reference.
pub fn resolve(secret: &SecretRef, secrets_dir: Option<&Path>) -> Result<ResolvedSecret> {
    let dir = secrets_dir.ok_or_else(|| {
        anyhow!(
            "task references secret '{}' but no secrets directory is configured",
            secret.secret
        )
    })?;
    let secret_dir = dir.join(&secret.secret);

    match secret.deploy_type {
        DeployType::Env => {
            let key = secret.key.as_deref().ok_or_else(|| {
                anyhow!(
                    "secret '{}' deployed as env '{}' needs a key",
                    secret.secret,
                    secret.deploy_target
                )
            })?;
            let path = secret_dir.join(key);
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading secret value from {:?}", path))?;

            Ok(ResolvedSecret::Env {
                name: secret.deploy_target.clone(),
                value: raw.trim_end_matches(['\n', '\r']).to_string(),
            })
        }
        DeployType::Volume => {
            if !secret_dir.is_dir() {
                return Err(anyhow!(
                    "secret directory {:?} for '{}' does not exist",
                    secret_dir,
                    secret.secret
                ));
            }
            Ok(ResolvedSecret::Volume {
                source: secret_dir,
                target: secret.deploy_target.clone(),
            })
        }
    }
}

/// Resolve all secret references of a task, failing on the first error.
pub fn resolve_all(secrets: &[SecretRef], secrets_dir: Option<&Path>) -> Result<Vec<ResolvedSecret>> {
    secrets.iter().map(|s| resolve(s, secrets_dir)).collect()
}
