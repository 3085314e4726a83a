// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Chart deployment via the Helm CLI.
//!
//! The reconcilers deploy charts through [`ChartDeployer`]; [`HelmClient`]
//! implements it by running `helm upgrade --install` and `helm uninstall`.
//! Both operations are idempotent: installing an existing release upgrades it,
//! and uninstalling a missing release succeeds.
//!
//! Release values are rendered as one YAML document (base values deep-merged
//! beneath the overrides) and passed to Helm on standard input.

use std::process::Stdio;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::HelmClientConfig;
use crate::errors::ChartError;

/// Where to fetch a chart from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChartRef {
    /// Chart name within the repository
    pub name: String,
    /// Repository URL
    pub repo: String,
    /// Chart version
    pub version: String,
}

/// Desired state of one release.
#[derive(Clone, Debug, PartialEq)]
pub struct ReleaseSpec {
    /// Release name
    pub name: String,
    /// Namespace the release lives in (must exist)
    pub namespace: String,
    /// Chart to install
    pub chart: ChartRef,
    /// Values applied first
    pub base_values: Value,
    /// Values merged over the base values
    pub override_values: Value,
    /// Roll back resources created by a failed upgrade
    pub cleanup_on_fail: bool,
}

impl ReleaseSpec {
    /// The values Helm receives: overrides deep-merged over the base values.
    #[must_use]
    pub fn merged_values(&self) -> Value {
        let mut values = self.base_values.clone();
        merge_values(&mut values, &self.override_values);
        values
    }
}

/// Deep-merge `overrides` into `base`. Mappings merge key by key; anything else replaces.
pub fn merge_values(base: &mut Value, overrides: &Value) {
    match (base, overrides) {
        (Value::Object(base), Value::Object(overrides)) => {
            for (key, value) in overrides {
                match base.get_mut(key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overrides) => *base = overrides.clone(),
    }
}

/// Installs and removes chart releases.
#[async_trait]
pub trait ChartDeployer: Send + Sync {
    /// Install the release, or upgrade it if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the release cannot be installed or upgraded.
    async fn ensure_release(&self, release: &ReleaseSpec) -> Result<(), ChartError>;

    /// Uninstall the release; absence is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing release cannot be removed.
    async fn uninstall_release(&self, name: &str, namespace: &str) -> Result<(), ChartError>;
}

/// [`ChartDeployer`] backed by the Helm executable.
#[derive(Clone, Debug)]
pub struct HelmClient {
    config: HelmClientConfig,
}

impl HelmClient {
    /// Create a client with the given settings.
    #[must_use]
    pub fn new(config: HelmClientConfig) -> Self {
        Self { config }
    }

    /// Arguments for `helm upgrade --install`, values read from stdin.
    #[must_use]
    pub fn upgrade_args(&self, release: &ReleaseSpec) -> Vec<String> {
        let mut args = vec![
            "upgrade".to_string(),
            release.name.clone(),
            release.chart.name.clone(),
            "--install".to_string(),
            "--repo".to_string(),
            release.chart.repo.clone(),
            "--version".to_string(),
            release.chart.version.clone(),
            "--namespace".to_string(),
            release.namespace.clone(),
            "--history-max".to_string(),
            self.config.history_max_revisions.to_string(),
            "--timeout".to_string(),
            self.config.default_timeout.clone(),
            "--values".to_string(),
            "-".to_string(),
        ];
        if release.cleanup_on_fail {
            args.push("--cleanup-on-fail".to_string());
        }
        if self.config.insecure_skip_tls_verify {
            args.push("--insecure-skip-tls-verify".to_string());
        }
        args
    }

    /// Arguments for `helm uninstall`.
    #[must_use]
    pub fn uninstall_args(&self, name: &str, namespace: &str) -> Vec<String> {
        vec![
            "uninstall".to_string(),
            name.to_string(),
            "--namespace".to_string(),
            namespace.to_string(),
            "--timeout".to_string(),
            self.config.default_timeout.clone(),
        ]
    }

    fn io_error(&self, source: std::io::Error) -> ChartError {
        ChartError::Io {
            executable: self.config.executable.clone(),
            source,
        }
    }
}

/// Whether Helm's stderr reports that the release does not exist.
#[must_use]
pub fn is_release_not_found(stderr: &str) -> bool {
    stderr.contains("release: not found")
}

#[async_trait]
impl ChartDeployer for HelmClient {
    async fn ensure_release(&self, release: &ReleaseSpec) -> Result<(), ChartError> {
        let values = serde_yaml::to_string(&release.merged_values()).map_err(|source| {
            ChartError::Values {
                release: release.name.clone(),
                source,
            }
        })?;

        debug!(
            release = %release.name,
            namespace = %release.namespace,
            chart = %release.chart.name,
            version = %release.chart.version,
            "Running helm upgrade --install"
        );

        let mut child = Command::new(&self.config.executable)
            .args(self.upgrade_args(release))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.io_error(e))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(values.as_bytes())
                .await
                .map_err(|e| self.io_error(e))?;
            // Dropping stdin closes the pipe so helm sees end-of-input
        }

        let output = child.wait_with_output().await.map_err(|e| self.io_error(e))?;
        if !output.status.success() {
            return Err(ChartError::CommandFailed {
                command: "upgrade".to_string(),
                release: release.name.clone(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        info!(
            "Ensured Helm release {}/{}",
            release.namespace, release.name
        );
        Ok(())
    }

    async fn uninstall_release(&self, name: &str, namespace: &str) -> Result<(), ChartError> {
        let output = Command::new(&self.config.executable)
            .args(self.uninstall_args(name, namespace))
            .output()
            .await
            .map_err(|e| self.io_error(e))?;

        if output.status.success() {
            info!("Uninstalled Helm release {}/{}", namespace, name);
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if is_release_not_found(&stderr) {
            debug!("Helm release {}/{} not present", namespace, name);
            return Ok(());
        }

        Err(ChartError::CommandFailed {
            command: "uninstall".to_string(),
            release: name.to_string(),
            stderr: stderr.trim().to_string(),
        })
    }
}


#[cfg(test)]
#[path = "helm_tests.rs"]
mod helm_tests;
