// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Mirror of the shared TLS secret into the services namespace.
//!
//! With automatic TLS and a shared secret configured, the secret of that name in
//! the controller's namespace is copied into the services namespace whenever it
//! changes, and the copy is deleted when the source goes away. The copy carries
//! an annotation pointing back at its source.
//!
//! When mirroring is not configured the loop idles, so the controller's task set
//! stays the same either way.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use kube::api::ObjectMeta;
use tracing::{debug, error, info, warn};

use crate::cluster::ClusterApi;
use crate::config::SyncConfig;
use crate::constants::IDLE_SLEEP_SECS;
use crate::metrics;

/// Metric action for a written copy
pub const MIRROR_ACTION_UPDATE: &str = "update";

/// Metric action for a deleted copy
pub const MIRROR_ACTION_DELETE: &str = "delete";

/// Watches one secret and keeps a copy of it in the services namespace.
pub struct TlsSecretMirror<C> {
    cluster: C,
    config: Arc<SyncConfig>,
}

impl<C: ClusterApi> TlsSecretMirror<C> {
    #[must_use]
    pub fn new(cluster: C, config: Arc<SyncConfig>) -> Self {
        Self { cluster, config }
    }

    /// Name of the mirrored secret, or `None` when mirroring is off.
    #[must_use]
    pub fn source_name(&self) -> Option<&str> {
        let tls = &self.config.ingress.tls;
        if !tls.enabled || self.config.self_namespace == self.config.target_namespace {
            return None;
        }
        tls.secret_name.as_deref()
    }

    /// The copy of `source` to write into the services namespace.
    #[must_use]
    pub fn mirrored(&self, source: &Secret) -> Secret {
        let name = source.metadata.name.clone().unwrap_or_default();
        let annotations = BTreeMap::from([(
            self.config.tls_mirror_annotation.clone(),
            format!("{}/{}", self.config.self_namespace, name),
        )]);
        Secret {
            metadata: ObjectMeta {
                name: Some(name),
                labels: Some(self.config.ownership_labels().created_only()),
                annotations: Some(annotations),
                ..Default::default()
            },
            type_: source.type_.clone(),
            data: source.data.clone(),
            ..Default::default()
        }
    }

    /// Bring the copy in line with the source's current state.
    ///
    /// # Errors
    ///
    /// Returns an error if the copy cannot be written or deleted.
    pub async fn apply(&self, name: &str, source: Option<&Secret>) -> Result<()> {
        let namespace = &self.config.target_namespace;
        if let Some(source) = source {
            self.cluster
                .create_or_replace(namespace, &self.mirrored(source))
                .await?;
            metrics::record_mirror_change(MIRROR_ACTION_UPDATE);
            info!("Mirrored TLS secret {} into {}", name, namespace);
        } else {
            self.cluster.delete::<Secret>(namespace, name).await?;
            metrics::record_mirror_change(MIRROR_ACTION_DELETE);
            info!("Removed mirrored TLS secret {}/{}", namespace, name);
        }
        Ok(())
    }

    /// Run the mirror.
    ///
    /// # Errors
    ///
    /// Returns an error if the watch on the source secret ends.
    pub async fn run(&self) -> Result<()> {
        let Some(name) = self.source_name() else {
            info!("TLS secret mirroring not configured");
            loop {
                tokio::time::sleep(Duration::from_secs(IDLE_SLEEP_SECS)).await;
            }
        };

        let source_namespace = &self.config.self_namespace;
        info!(
            "Mirroring TLS secret {}/{} into {}",
            source_namespace, name, self.config.target_namespace
        );

        let mut changes = self.cluster.watch_one::<Secret>(source_namespace, name);
        while let Some(change) = changes.next().await {
            match change {
                Ok(secret) => {
                    debug!(present = secret.is_some(), "TLS secret {} changed", name);
                    if let Err(e) = self.apply(name, secret.as_ref()).await {
                        error!("Failed to mirror TLS secret {}: {:#}", name, e);
                    }
                }
                Err(e) => warn!("Error watching TLS secret {}: {}", name, e),
            }
        }

        bail!("Watch on TLS secret {source_namespace}/{name} ended")
    }
}

#[cfg(test)]
#[path = "mirror_tests.rs"]
mod mirror_tests;
