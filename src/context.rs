// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for the service reconciler.
//!
//! Every reconcile and remove receives a `&Context` that contains:
//! - the cluster object API
//! - the chart deployer used for the OIDC proxy
//! - an HTTP client for OIDC discovery and registration
//! - the configuration and the ingress adapter resolved at startup
//!
//! The context is read-only once built, so it can be shared by the concurrent
//! startup reconciles without locking.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context as _, Result};

use crate::cluster::ClusterApi;
use crate::config::SyncConfig;
use crate::helm::ChartDeployer;
use crate::ingress::{AdapterRegistry, IngressAdapter};
use crate::labels::OwnershipLabels;
use crate::reconcilers::retry::RetryPolicy;

/// Everything a reconcile needs besides the service itself.
pub struct Context<C, H> {
    /// Cluster object API
    pub cluster: C,

    /// Chart deployment mechanism
    pub deployer: H,

    /// HTTP client for OIDC discovery and dynamic registration
    pub http_client: reqwest::Client,

    /// Controller configuration
    pub config: Arc<SyncConfig>,

    /// Adapter for the configured ingress class
    pub adapter: Arc<dyn IngressAdapter>,

    /// Retry policy for reconcile and remove
    pub retry: RetryPolicy,

    labels: OwnershipLabels,
}

impl<C: ClusterApi, H: ChartDeployer> Context<C, H> {
    /// Build a context with an already-resolved adapter.
    #[must_use]
    pub fn new(
        cluster: C,
        deployer: H,
        config: Arc<SyncConfig>,
        adapter: Arc<dyn IngressAdapter>,
    ) -> Self {
        Self {
            retry: RetryPolicy::from_config(&config),
            labels: config.ownership_labels(),
            http_client: reqwest::Client::new(),
            cluster,
            deployer,
            config,
            adapter,
        }
    }

    /// Build a context, resolving the adapter from the configured ingress class.
    ///
    /// # Errors
    ///
    /// Returns an error if the ingress class cannot be read or no adapter
    /// handles its controller.
    pub async fn resolve(
        cluster: C,
        deployer: H,
        config: Arc<SyncConfig>,
        registry: &AdapterRegistry,
    ) -> Result<Self> {
        let class_name = &config.ingress.class_name;
        let controller = cluster
            .ingress_class_controller(class_name)
            .await
            .with_context(|| format!("Failed to read IngressClass '{class_name}'"))?;
        let adapter = registry.resolve(&controller)?;
        tracing::info!(
            "Using ingress adapter for controller '{}' (class '{}')",
            controller,
            class_name
        );
        Ok(Self::new(cluster, deployer, config, adapter))
    }

    /// Ownership label keys in effect.
    #[must_use]
    pub fn ownership(&self) -> &OwnershipLabels {
        &self.labels
    }

    /// Labels marking an object as belonging to `service`.
    #[must_use]
    pub fn labels_for(&self, service: &str) -> BTreeMap<String, String> {
        self.labels.for_service(service)
    }

    /// Public domain of a service.
    #[must_use]
    pub fn service_domain(&self, service: &str) -> String {
        format!("{service}.{}", self.config.ingress.base_domain)
    }

    /// Namespace managed objects live in.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.config.target_namespace
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod context_tests;
