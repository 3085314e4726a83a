// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! TLS attachment for service routes.
//!
//! # Precedence
//!
//! 1. A certificate supplied by the service is written to `tls-<name>` and used,
//!    even when automatic TLS is disabled.
//! 2. Otherwise, with automatic TLS enabled, the configured (usually wildcard)
//!    secret is referenced, falling back to `tls-<name>`. The secret need not
//!    exist yet; the configured TLS annotations let an external issuer create it.
//! 3. Otherwise the route is plain HTTP.
//!
//! A client CA supplied by the service is written to `tls-client-ca-<name>` and
//! handed to the adapter to require client certificates.

use anyhow::{Context, Result};
use tracing::debug;

use super::resources::{
    build_client_ca_secret, build_tls_secret, client_ca_secret_name, decode_directive,
    tls_secret_name,
};
use crate::cluster::ClusterApi;
use crate::config::SyncConfig;
use crate::constants::{CFG_TLS_CERT, CFG_TLS_CLIENT_CA, CFG_TLS_KEY};
use crate::ingress::{IngressAdapter, IngressIntent};
use crate::model::ServiceRegistration;

/// Secret terminating TLS for the service's domain, if any.
#[must_use]
pub fn tls_secret_for(config: &SyncConfig, service: &ServiceRegistration) -> Option<String> {
    if service.config.contains(CFG_TLS_CERT) {
        Some(tls_secret_name(&service.name))
    } else if config.ingress.tls.enabled {
        Some(
            config
                .ingress
                .tls
                .secret_name
                .clone()
                .unwrap_or_else(|| tls_secret_name(&service.name)),
        )
    } else {
        None
    }
}

/// Whether the service is reached over HTTPS.
#[must_use]
pub fn serves_https(config: &SyncConfig, service: &ServiceRegistration) -> bool {
    config.ingress.tls.enabled || service.config.contains(CFG_TLS_CERT)
}

/// Attach TLS to the route, writing any secrets the service supplied.
///
/// # Errors
///
/// Returns an error if a supplied certificate is incomplete or not base64, or if
/// a secret cannot be written.
pub async fn apply_tls<C: ClusterApi>(
    cluster: &C,
    config: &SyncConfig,
    adapter: &dyn IngressAdapter,
    service: &ServiceRegistration,
    ingress: &mut IngressIntent,
) -> Result<()> {
    let namespace = &config.target_namespace;
    let labels = config.ownership_labels().for_service(&service.name);

    if let Some(cert) = service.config.get_str(CFG_TLS_CERT) {
        let key = service.config.get_str(CFG_TLS_KEY).with_context(|| {
            format!("Service {} supplies {CFG_TLS_CERT} without {CFG_TLS_KEY}", service.name)
        })?;
        let secret = build_tls_secret(
            &tls_secret_name(&service.name),
            decode_directive(CFG_TLS_CERT, &cert)?,
            decode_directive(CFG_TLS_KEY, &key)?,
            labels.clone(),
        );
        cluster.create_or_replace(namespace, &secret).await?;
        debug!(service = %service.name, "Using service-supplied TLS certificate");
    } else if config.ingress.tls.enabled {
        ingress.extend_annotations(&config.ingress.tls.annotations);
    }

    if let Some(secret_name) = tls_secret_for(config, service) {
        ingress.set_tls_secret(&secret_name);
    }

    if let Some(ca) = service.config.get_str(CFG_TLS_CLIENT_CA) {
        let secret_name = client_ca_secret_name(&service.name);
        let secret = build_client_ca_secret(
            &secret_name,
            decode_directive(CFG_TLS_CLIENT_CA, &ca)?,
            labels,
        );
        cluster.create_or_replace(namespace, &secret).await?;
        adapter.configure_tls_client_certificates(ingress, namespace, &secret_name);
    }

    Ok(())
}

#[cfg(test)]
#[path = "tls_tests.rs"]
mod tls_tests;
