// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # Zenith Sync - Tunnelled Services for Kubernetes
//!
//! Zenith Sync exposes services registered through a tunnel as reachable,
//! authenticated, TLS-terminated endpoints inside a Kubernetes cluster.
//!
//! ## Overview
//!
//! For every registered service the controller maintains:
//!
//! - a `Service` and `Endpoints` pointing at the tunnel endpoints
//! - an `Ingress` for `<name>.<base-domain>`, adapted to the cluster's ingress controller
//! - TLS, from a supplied certificate or an automatically-provisioned secret
//! - authentication, through a per-service OIDC proxy or an external auth service
//!
//! A second loop mirrors the shared wildcard TLS secret into the services namespace.
//!
//! ## Modules
//!
//! - [`reconcilers`] - Service reconciler and TLS secret mirror
//! - [`source`] - Registration sources feeding the reconciler
//! - [`cluster`] - Kubernetes object API used by the reconcilers
//! - [`ingress`] - Ingress intents and per-controller adapters
//! - [`helm`] - Chart deployment for the OIDC proxy
//! - [`context`] - Shared context for reconciles
//! - [`config`] - Controller configuration
//!
//! ## Example
//!
//! ```rust,no_run
//! use zenith_sync::model::{Endpoint, ReconciliationEvent, ServiceConfig, ServiceRegistration};
//! use zenith_sync::source::ChannelSource;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let (source, handle) = ChannelSource::new(Vec::new());
//! handle
//!     .publish(ReconciliationEvent::Created(ServiceRegistration {
//!         name: "jupyter".to_string(),
//!         endpoints: vec![Endpoint {
//!             address: "10.0.0.7".to_string(),
//!             port: 31001,
//!         }],
//!         config: ServiceConfig::default().with("auth-type", "oidc"),
//!     }))
//!     .await?;
//! # let _ = source;
//! # Ok(())
//! # }
//! ```

pub mod cluster;
pub mod config;
pub mod constants;
pub mod context;
pub mod errors;
pub mod helm;
pub mod ingress;
pub mod labels;
pub mod metrics;
pub mod model;
pub mod reconcilers;
pub mod source;
