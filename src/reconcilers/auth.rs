// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Authentication attachment for service routes.
//!
//! A service selects its strategy with `auth-type`:
//!
//! - `oidc`: an oauth2-proxy release per service, reached through an
//!   unauthenticated `/_oidc` route on the service's domain, checks every request
//! - `external` (the default): requests are checked by the configured external
//!   auth service, if one is configured
//!
//! `skip-auth` disables both. Whenever OIDC is not in use, the proxy release and
//! its route are torn down so switching strategy leaves nothing behind.

use std::collections::BTreeMap;

use anyhow::{Context as _, Result};
use k8s_openapi::api::networking::v1::Ingress;
use tracing::{debug, info, warn};

use super::oidc::{oidc_release_name, reconcile_proxy, IDENTITY_HEADERS};
use super::tls::tls_secret_for;
use crate::cluster::ClusterApi;
use crate::config::ExternalAuthConfig;
use crate::constants::{
    AUTH_TYPE_EXTERNAL, AUTH_TYPE_OIDC, CFG_AUTH_EXTERNAL_PARAMS, CFG_AUTH_TYPE, CFG_SKIP_AUTH,
    OIDC_PATH_PREFIX, OIDC_PROXY_PORT_NAME, OIDC_SPLIT_COOKIE_COUNT,
};
use crate::context::Context;
use crate::helm::ChartDeployer;
use crate::ingress::{AuthDelegation, IngressIntent};
use crate::model::ServiceRegistration;

/// Authentication strategy in effect for a service.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthStrategy {
    /// Authentication disabled
    Skip,
    /// Per-service OIDC proxy
    Oidc,
    /// External auth-request service
    External,
    /// An `auth-type` this controller does not know; no authentication is applied
    Unknown,
}

impl AuthStrategy {
    /// Strategy selected by a service's configuration.
    #[must_use]
    pub fn for_service(service: &ServiceRegistration) -> Self {
        if service.config.get_bool(CFG_SKIP_AUTH, false) {
            return Self::Skip;
        }
        match service
            .config
            .get_str(CFG_AUTH_TYPE)
            .as_deref()
            .unwrap_or(AUTH_TYPE_EXTERNAL)
        {
            AUTH_TYPE_OIDC => Self::Oidc,
            AUTH_TYPE_EXTERNAL => Self::External,
            _ => Self::Unknown,
        }
    }
}

/// Cookies oauth2-proxy splits a large session across.
#[must_use]
pub fn split_cookie_names() -> Vec<String> {
    (1..=OIDC_SPLIT_COOKIE_COUNT)
        .map(|i| format!("_oauth2_proxy_{i}"))
        .collect()
}

/// Delegation to a service's OIDC proxy.
#[must_use]
pub fn oidc_delegation(
    namespace: &str,
    cluster_services_domain: &str,
    service: &str,
) -> AuthDelegation {
    let release = oidc_release_name(service);
    AuthDelegation {
        auth_url: format!(
            "http://{release}.{namespace}.{cluster_services_domain}{OIDC_PATH_PREFIX}/auth"
        ),
        signin_url: Some(format!(
            "https://$host{OIDC_PATH_PREFIX}/start?rd=$escaped_request_uri&$args"
        )),
        next_url_param: None,
        request_headers: BTreeMap::new(),
        response_headers: IDENTITY_HEADERS
            .iter()
            .map(|(name, _)| (*name).to_string())
            .collect(),
        response_cookies: split_cookie_names(),
    }
}

/// Delegation to the external auth service, or `None` if none is configured.
#[must_use]
pub fn external_delegation(
    config: &ExternalAuthConfig,
    service: &ServiceRegistration,
) -> Option<AuthDelegation> {
    let auth_url = config.url.clone()?;
    let mut request_headers = config.request_headers.clone();
    for (name, value) in service.config.get_map(CFG_AUTH_EXTERNAL_PARAMS) {
        let header = format!("{}{name}", config.param_header_prefix);
        if !is_header_token(&header) || !is_safe_header_value(&value) {
            warn!(
                service = %service.name,
                "Ignoring external auth parameter {:?}: not a valid header", name
            );
            continue;
        }
        request_headers.insert(header, value);
    }
    Some(AuthDelegation {
        auth_url,
        signin_url: config.signin_url.clone(),
        next_url_param: Some(config.next_url_param.clone()),
        request_headers,
        response_headers: config.response_headers.clone(),
        response_cookies: Vec::new(),
    })
}

/// Whether `name` is an HTTP header field name (an RFC 7230 token).
fn is_header_token(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b))
}

/// Whether a registration-supplied value can be quoted into controller config.
fn is_safe_header_value(value: &str) -> bool {
    !value
        .chars()
        .any(|c| c.is_control() || matches!(c, '"' | '\\' | ';' | '{' | '}'))
}

/// The unauthenticated route serving the proxy's own endpoints.
fn oidc_route<C: ClusterApi, H: ChartDeployer>(
    ctx: &Context<C, H>,
    service: &ServiceRegistration,
    service_domain: &str,
) -> Ingress {
    let release = oidc_release_name(&service.name);
    let mut route = IngressIntent::new(&release, &ctx.config.ingress.class_name, service_domain)
        .with_path(OIDC_PATH_PREFIX)
        .with_backend(&release, OIDC_PROXY_PORT_NAME);
    ctx.adapter.configure_defaults(&mut route);
    route.extend_annotations(&ctx.config.ingress.annotations);
    if let Some(secret_name) = tls_secret_for(&ctx.config, service) {
        route.set_tls_secret(&secret_name);
    }
    route.into_ingress(ctx.labels_for(&service.name))
}

/// Remove the OIDC proxy and its route, if present.
///
/// # Errors
///
/// Returns an error if either cannot be removed.
pub async fn teardown_oidc<C: ClusterApi, H: ChartDeployer>(
    ctx: &Context<C, H>,
    service: &str,
) -> Result<()> {
    let release = oidc_release_name(service);
    ctx.cluster
        .delete::<Ingress>(ctx.namespace(), &release)
        .await
        .with_context(|| format!("Failed to delete OIDC ingress {release}"))?;
    ctx.deployer
        .uninstall_release(&release, ctx.namespace())
        .await
        .with_context(|| format!("Failed to uninstall OIDC proxy {release}"))?;
    Ok(())
}

/// Attach the service's authentication strategy to its route.
///
/// # Errors
///
/// Returns an error if the OIDC proxy cannot be provisioned or torn down.
pub async fn apply_auth<C: ClusterApi, H: ChartDeployer>(
    ctx: &Context<C, H>,
    service: &ServiceRegistration,
    service_domain: &str,
    ingress: &mut IngressIntent,
) -> Result<()> {
    let strategy = AuthStrategy::for_service(service);

    if strategy == AuthStrategy::Oidc {
        reconcile_proxy(ctx, service, service_domain).await?;
        let route = oidc_route(ctx, service, service_domain);
        ctx.cluster.create_or_replace(ctx.namespace(), &route).await?;
        let delegation = oidc_delegation(
            ctx.namespace(),
            &ctx.config.cluster_services_domain,
            &service.name,
        );
        ctx.adapter.configure_authentication(ingress, &delegation);
        info!(service = %service.name, "Configured OIDC authentication");
        return Ok(());
    }

    teardown_oidc(ctx, &service.name).await?;

    match strategy {
        AuthStrategy::External => {
            if let Some(delegation) = external_delegation(&ctx.config.ingress.external_auth, service)
            {
                ctx.adapter.configure_authentication(ingress, &delegation);
                debug!(service = %service.name, "Configured external authentication");
            } else {
                debug!(service = %service.name, "No external auth service configured");
            }
        }
        AuthStrategy::Unknown => {
            warn!(
                service = %service.name,
                "Unknown auth-type {:?}, no authentication applied",
                service.config.get_str(CFG_AUTH_TYPE)
            );
        }
        AuthStrategy::Skip | AuthStrategy::Oidc => {}
    }
    Ok(())
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod auth_tests;
