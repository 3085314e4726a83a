// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Control loops keeping the cluster in step with the registered services.
//!
//! # Available Reconcilers
//!
//! ## Services
//!
//! - [`run`] - Startup sync followed by the serial event loop
//! - [`reconcile_service`] - Creates/replaces every object exposing one service
//! - [`remove_service`] - Deletes every object owned by one service
//!
//! ## Building blocks
//!
//! - [`tls`] - Certificate secrets and TLS on routes
//! - [`auth`] - OIDC proxy or external auth on routes
//! - [`oidc`] - OIDC client records and the oauth2-proxy release
//! - [`retry`] - Retry-with-give-up for per-service operations
//!
//! ## TLS
//!
//! - [`TlsSecretMirror`] - Copies the shared TLS secret into the services namespace
//!
//! # Example: Running the reconciler
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use zenith_sync::cluster::KubeCluster;
//! use zenith_sync::config::SyncConfig;
//! use zenith_sync::context::Context;
//! use zenith_sync::helm::HelmClient;
//! use zenith_sync::ingress::AdapterRegistry;
//! use zenith_sync::reconcilers::run;
//! use zenith_sync::source::FileSource;
//!
//! async fn sync(client: kube::Client, config: SyncConfig) -> anyhow::Result<()> {
//!     let helm = HelmClient::new(config.helm_client.clone());
//!     let ctx = Context::resolve(
//!         KubeCluster::new(client),
//!         helm,
//!         Arc::new(config),
//!         &AdapterRegistry::builtin(),
//!     )
//!     .await?;
//!     run(&ctx, &FileSource::new("/etc/zenith/services.yaml")).await
//! }
//! ```

pub mod auth;
pub mod mirror;
pub mod oidc;
pub mod resources;
pub mod retry;
pub mod service;
pub mod tls;

#[cfg(test)]
pub(crate) mod test_support;

pub use mirror::TlsSecretMirror;
pub use retry::{retry_with_give_up, RetryOutcome, RetryPolicy};
pub use service::{reconcile_service, remove_service, run, try_reconcile_service, try_remove_service};
