// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The service reconciler.
//!
//! Converts registration events into the cluster objects exposing each service:
//!
//! - a `Service` with one named port, and `Endpoints` listing exactly the
//!   registered addresses
//! - an `Ingress` for `<name>.<base-domain>` with TLS and authentication attached
//! - secrets for supplied certificates and the OIDC client record
//! - the OIDC proxy release and its route, when OIDC is used
//!
//! # Run loop
//!
//! On startup every registered service is reconciled and every service that has
//! objects in the cluster but is no longer registered is removed, all
//! concurrently. Events are then applied one at a time in arrival order.
//!
//! Each reconcile and remove is retried under the context's [`RetryPolicy`];
//! giving up on one service never stops the loop.
//!
//! [`RetryPolicy`]: super::retry::RetryPolicy

use std::collections::BTreeSet;

use anyhow::{bail, Context as _, Result};
use futures::future::join_all;
use futures::StreamExt;
use k8s_openapi::api::core::v1::{Endpoints, Secret, Service};
use k8s_openapi::api::networking::v1::Ingress;
use kube::Resource;
use tracing::{info, warn};

use super::auth::apply_auth;
use super::oidc::oidc_release_name;
use super::resources::{build_endpoints, build_service};
use super::retry::{retry_with_give_up, RetryOutcome};
use super::tls::apply_tls;
use crate::cluster::{kind_of, ClusterApi, ClusterObject};
use crate::constants::{CFG_BACKEND_PROTOCOL, CFG_READ_TIMEOUT, DEFAULT_BACKEND_PROTOCOL};
use crate::context::Context;
use crate::helm::ChartDeployer;
use crate::ingress::IngressIntent;
use crate::metrics::{self, OPERATION_RECONCILE, OPERATION_REMOVE};
use crate::model::{ReconciliationEvent, ServiceRegistration};
use crate::source::RegistrationSource;

/// Create or replace every object exposing a service.
///
/// # Errors
///
/// Returns an error if any object cannot be written, a supplied certificate is
/// invalid, or OIDC provisioning fails. Objects written before the failure are
/// left in place; the next attempt rewrites them.
pub async fn reconcile_service<C: ClusterApi, H: ChartDeployer>(
    ctx: &Context<C, H>,
    service: &ServiceRegistration,
) -> Result<()> {
    info!(
        service = %service.name,
        "Reconciling service {} ({})",
        service.name,
        service.endpoint_summary()
    );
    let namespace = ctx.namespace();
    let labels = ctx.labels_for(&service.name);

    ctx.cluster
        .create_or_replace(namespace, &build_service(&service.name, labels.clone()))
        .await?;
    ctx.cluster
        .create_or_replace(namespace, &build_endpoints(service, labels.clone()))
        .await?;

    let domain = ctx.service_domain(&service.name);
    let mut ingress = IngressIntent::new(&service.name, &ctx.config.ingress.class_name, &domain);
    ctx.adapter.configure_defaults(&mut ingress);
    ingress.extend_annotations(&ctx.config.ingress.annotations);

    let protocol = service
        .config
        .get_str(CFG_BACKEND_PROTOCOL)
        .unwrap_or_else(|| DEFAULT_BACKEND_PROTOCOL.to_string());
    ctx.adapter.configure_backend_protocol(&mut ingress, &protocol);

    if let Some(raw) = service.config.get_str(CFG_READ_TIMEOUT) {
        match raw.trim().parse::<u64>() {
            Ok(seconds) => ctx.adapter.configure_read_timeout(&mut ingress, seconds),
            Err(_) => warn!(
                service = %service.name,
                "Ignoring {} '{}': not a whole number of seconds",
                CFG_READ_TIMEOUT,
                raw
            ),
        }
    }

    apply_tls(
        &ctx.cluster,
        &ctx.config,
        ctx.adapter.as_ref(),
        service,
        &mut ingress,
    )
    .await?;
    apply_auth(ctx, service, &domain, &mut ingress).await?;

    ctx.cluster
        .create_or_replace(namespace, &ingress.into_ingress(labels))
        .await?;

    info!(service = %service.name, "Service {} available at {}", service.name, domain);
    Ok(())
}

/// Delete every object owned by a service, then its OIDC proxy release.
///
/// Secrets without the ownership labels, such as certificates issued into the
/// namespace by an external issuer, are kept.
///
/// # Errors
///
/// Returns an error if any deletion fails.
pub async fn remove_service<C: ClusterApi, H: ChartDeployer>(
    ctx: &Context<C, H>,
    name: &str,
) -> Result<()> {
    info!(service = %name, "Removing service {}", name);
    let namespace = ctx.namespace();
    let selector = ctx.ownership().selector_for(name);

    ctx.cluster.delete_all::<Ingress>(namespace, &selector).await?;
    ctx.cluster.delete_all::<Endpoints>(namespace, &selector).await?;
    ctx.cluster.delete_all::<Service>(namespace, &selector).await?;
    ctx.cluster.delete_all::<Secret>(namespace, &selector).await?;

    let release = oidc_release_name(name);
    ctx.deployer
        .uninstall_release(&release, namespace)
        .await
        .with_context(|| format!("Failed to uninstall OIDC proxy {release}"))?;

    info!(service = %name, "Removed service {}", name);
    Ok(())
}

/// [`reconcile_service`] under the context's retry policy.
pub async fn try_reconcile_service<C: ClusterApi, H: ChartDeployer>(
    ctx: &Context<C, H>,
    service: &ServiceRegistration,
) -> RetryOutcome {
    retry_with_give_up(&ctx.retry, OPERATION_RECONCILE, &service.name, |_| {
        reconcile_service(ctx, service)
    })
    .await
}

/// [`remove_service`] under the context's retry policy.
pub async fn try_remove_service<C: ClusterApi, H: ChartDeployer>(
    ctx: &Context<C, H>,
    name: &str,
) -> RetryOutcome {
    retry_with_give_up(&ctx.retry, OPERATION_REMOVE, name, |_| {
        remove_service(ctx, name)
    })
    .await
}

/// Names of every service with objects in the cluster.
///
/// Every managed kind is consulted, so a service whose removal stopped partway
/// through is still found.
///
/// # Errors
///
/// Returns an error if any managed kind cannot be listed.
pub async fn existing_service_names<C: ClusterApi, H: ChartDeployer>(
    ctx: &Context<C, H>,
) -> Result<BTreeSet<String>> {
    let mut names = owned_names::<Ingress, C, H>(ctx).await?;
    names.extend(owned_names::<Endpoints, C, H>(ctx).await?);
    names.extend(owned_names::<Service, C, H>(ctx).await?);
    names.extend(owned_names::<Secret, C, H>(ctx).await?);
    Ok(names)
}

async fn owned_names<K: ClusterObject, C: ClusterApi, H: ChartDeployer>(
    ctx: &Context<C, H>,
) -> Result<BTreeSet<String>> {
    let key = &ctx.ownership().service_name;
    let objects: Vec<K> = ctx
        .cluster
        .list(ctx.namespace(), &ctx.ownership().selector_any_service())
        .await
        .with_context(|| format!("Failed to list managed {}", kind_of::<K>()))?;
    Ok(objects
        .into_iter()
        .filter_map(|object| object.meta().labels.as_ref()?.get(key).cloned())
        .collect())
}

/// Apply one event.
pub async fn handle_event<C: ClusterApi, H: ChartDeployer>(
    ctx: &Context<C, H>,
    event: &ReconciliationEvent,
) -> RetryOutcome {
    match event {
        ReconciliationEvent::Deleted { name } => try_remove_service(ctx, name).await,
        ReconciliationEvent::Created(service) | ReconciliationEvent::Updated(service) => {
            try_reconcile_service(ctx, service).await
        }
    }
}

/// Keep the cluster in step with the registration source.
///
/// Runs until the source's event stream ends, which is an error.
///
/// # Errors
///
/// Returns an error if the source cannot be subscribed to, the managed
/// services cannot be listed, or the event stream ends.
pub async fn run<C: ClusterApi, H: ChartDeployer, S: RegistrationSource>(
    ctx: &Context<C, H>,
    source: &S,
) -> Result<()> {
    let (initial, mut events) = source
        .subscribe()
        .await
        .context("Failed to subscribe to registration source")?;
    let existing = existing_service_names(ctx).await?;

    let registered: BTreeSet<&str> = initial.iter().map(|s| s.name.as_str()).collect();
    let orphans: Vec<&String> = existing
        .iter()
        .filter(|name| !registered.contains(name.as_str()))
        .collect();

    info!(
        "Starting sync: {} registered services, {} orphaned",
        initial.len(),
        orphans.len()
    );
    metrics::record_initial_sync(initial.len(), orphans.len());

    let reconciles = join_all(initial.iter().map(|service| try_reconcile_service(ctx, service)));
    let removals = join_all(orphans.iter().map(|name| try_remove_service(ctx, name)));
    let (reconciled, removed) = futures::join!(reconciles, removals);

    let failed = reconciled
        .iter()
        .chain(removed.iter())
        .filter(|outcome| !outcome.succeeded())
        .count();
    info!("Initial sync complete ({} services failed)", failed);

    while let Some(event) = events.next().await {
        handle_event(ctx, &event).await;
    }

    bail!("Registration event stream ended")
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod service_tests;
