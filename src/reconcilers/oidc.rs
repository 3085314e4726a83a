// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! OIDC client records and the oauth2-proxy release.
//!
//! # Client record
//!
//! Each service using OIDC has a secret `oidc-<name>-<hash>` holding the proxy's
//! cookie secret and the OIDC client credentials. `<hash>` is the first 8 hex
//! characters of the SHA-256 of the issuer URL, so changing issuer starts a new
//! record (and a new dynamic registration) instead of reusing stale credentials.
//!
//! Reconciling the record is read-modify-write:
//!
//! - the cookie secret is generated once and then kept
//! - credentials supplied by the service always overwrite the stored ones
//! - with no credentials supplied or stored, a client is registered dynamically
//!   with the issuer
//! - the secret is written only when its data changed
//!
//! # Proxy release
//!
//! The oauth2-proxy chart is configured through its alpha config. Its checksum is
//! set as a pod annotation so the proxy restarts when the config changes.

use std::collections::BTreeMap;

use anyhow::{Context as _, Result};
use base64::{engine::general_purpose::URL_SAFE, Engine};
use rand::Rng;
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use url::Url;

use super::resources::{build_string_secret, secret_string_data};
use super::tls::serves_https;
use crate::cluster::ClusterApi;
use crate::config::SyncConfig;
use crate::constants::{
    CFG_OIDC_ALLOW_UNVERIFIED_EMAIL, CFG_OIDC_CLIENT_ID, CFG_OIDC_CLIENT_SECRET,
    CFG_OIDC_COOKIE_EXPIRE, CFG_OIDC_ISSUER, CFG_OIDC_REGISTRATION_TOKEN, CFG_OIDC_REQUIRE_EMAIL,
    COOKIE_SECRET_BYTES, DEFAULT_OIDC_COOKIE_EXPIRE, ISSUER_HASH_PREFIX_LEN,
    OIDC_CLIENT_ID_KEY, OIDC_CLIENT_SECRET_KEY, OIDC_COOKIE_SECRET_KEY, OIDC_DISCOVERY_PATH,
    OIDC_PATH_PREFIX, OIDC_RELEASE_PREFIX,
};
use crate::context::Context;
use crate::errors::OidcError;
use crate::helm::{ChartDeployer, ChartRef, ReleaseSpec};
use crate::labels::CHECKSUM_CONFIG_ALPHA_ANNOTATION;
use crate::model::ServiceRegistration;

/// Identity headers the proxy injects, with the claim each one carries.
pub const IDENTITY_HEADERS: [(&str, &str); 3] = [
    ("X-Remote-User", "preferred_username"),
    ("X-Remote-Group", "groups"),
    ("X-Access-Token", "access_token"),
];

/// Credentials the proxy runs with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OidcClient {
    /// Secret used to sign the proxy's session cookies
    pub cookie_secret: String,
    /// OIDC client ID
    pub client_id: String,
    /// OIDC client secret
    pub client_secret: String,
}

/// Name of the proxy release (and its service and ingress) for a service.
#[must_use]
pub fn oidc_release_name(service: &str) -> String {
    format!("{OIDC_RELEASE_PREFIX}{service}")
}

/// Name of the client record secret for a release and issuer.
#[must_use]
pub fn oidc_secret_name(release_name: &str, issuer: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(issuer.as_bytes()));
    format!("{release_name}-{}", &digest[..ISSUER_HASH_PREFIX_LEN])
}

/// Fresh cookie secret: random bytes, URL-safe base64.
#[must_use]
pub fn generate_cookie_secret() -> String {
    let mut bytes = [0u8; COOKIE_SECRET_BYTES];
    rand::thread_rng().fill(&mut bytes);
    URL_SAFE.encode(bytes)
}

/// Redirect URI registered for a service's client.
#[must_use]
pub fn redirect_uri(https: bool, service_domain: &str) -> String {
    let scheme = if https { "https" } else { "http" };
    format!("{scheme}://{service_domain}{OIDC_PATH_PREFIX}/callback")
}

fn issuer_of(service: &ServiceRegistration) -> Result<String> {
    service.config.get_str(CFG_OIDC_ISSUER).with_context(|| {
        format!(
            "Service {} selects OIDC authentication without {CFG_OIDC_ISSUER}",
            service.name
        )
    })
}

#[derive(Deserialize)]
struct DiscoveryDocument {
    registration_endpoint: Option<String>,
}

#[derive(Deserialize)]
struct RegistrationResponse {
    client_id: String,
    #[serde(default)]
    client_secret: Option<String>,
}

async fn send(request: reqwest::RequestBuilder, url: &str) -> Result<reqwest::Response, OidcError> {
    let response = request.send().await.map_err(|source| OidcError::Http {
        url: url.to_string(),
        source,
    })?;
    if !response.status().is_success() {
        return Err(OidcError::Status {
            url: url.to_string(),
            status: response.status().as_u16(),
        });
    }
    Ok(response)
}

/// Register a web client with the issuer, returning its ID and secret.
///
/// The registration endpoint comes from the issuer's discovery document; a
/// relative endpoint is resolved against the issuer.
///
/// # Errors
///
/// Returns an error if the issuer is not a URL, either request fails or is
/// refused, or the issuer does not support dynamic registration.
pub async fn register_client(
    http: &reqwest::Client,
    issuer: &str,
    registration_token: Option<&str>,
    redirect_uri: &str,
) -> Result<(String, String), OidcError> {
    let issuer_url = Url::parse(issuer).map_err(|source| OidcError::InvalidIssuer {
        issuer: issuer.to_string(),
        source,
    })?;

    let discovery_url = format!("{}{OIDC_DISCOVERY_PATH}", issuer.trim_end_matches('/'));
    let discovery: DiscoveryDocument = send(http.get(&discovery_url), &discovery_url)
        .await?
        .json()
        .await
        .map_err(|source| OidcError::Http {
            url: discovery_url.clone(),
            source,
        })?;

    let endpoint = discovery
        .registration_endpoint
        .ok_or_else(|| OidcError::RegistrationUnsupported {
            issuer: issuer.to_string(),
        })?;
    let endpoint = issuer_url
        .join(&endpoint)
        .map_err(|source| OidcError::InvalidIssuer {
            issuer: issuer.to_string(),
            source,
        })?
        .to_string();

    let mut request = http.post(&endpoint).json(&json!({
        "application_type": "web",
        "response_types": ["code"],
        "grant_types": ["authorization_code"],
        "redirect_uris": [redirect_uri],
    }));
    if let Some(token) = registration_token {
        request = request.bearer_auth(token);
    }

    let registration: RegistrationResponse = send(request, &endpoint)
        .await?
        .json()
        .await
        .map_err(|source| OidcError::Http {
            url: endpoint.clone(),
            source,
        })?;

    Ok((
        registration.client_id,
        registration.client_secret.unwrap_or_default(),
    ))
}

/// Read, update and (if changed) write the client record for a service.
///
/// # Errors
///
/// Returns an error if the service has no issuer, the record cannot be read for
/// a reason other than absence, registration fails, or the write fails.
pub async fn reconcile_client_record<C: ClusterApi, H: ChartDeployer>(
    ctx: &Context<C, H>,
    service: &ServiceRegistration,
    service_domain: &str,
) -> Result<OidcClient> {
    let issuer = issuer_of(service)?;
    let secret_name = oidc_secret_name(&oidc_release_name(&service.name), &issuer);

    let existing: BTreeMap<String, String> = match ctx
        .cluster
        .fetch::<k8s_openapi::api::core::v1::Secret>(ctx.namespace(), &secret_name)
        .await
    {
        Ok(secret) => secret_string_data(&secret),
        Err(e) if e.is_not_found() => BTreeMap::new(),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read OIDC secret {secret_name}"))
        }
    };

    let mut next = existing.clone();
    next.entry(OIDC_COOKIE_SECRET_KEY.to_string())
        .or_insert_with(generate_cookie_secret);

    if let Some(client_id) = service.config.get_str(CFG_OIDC_CLIENT_ID) {
        let client_secret = service
            .config
            .get_str(CFG_OIDC_CLIENT_SECRET)
            .with_context(|| {
                format!(
                    "Service {} sets {CFG_OIDC_CLIENT_ID} without {CFG_OIDC_CLIENT_SECRET}",
                    service.name
                )
            })?;
        next.insert(OIDC_CLIENT_ID_KEY.to_string(), client_id);
        next.insert(OIDC_CLIENT_SECRET_KEY.to_string(), client_secret);
    } else if !next.contains_key(OIDC_CLIENT_ID_KEY) {
        info!("Registering OIDC client for {} at {}", service.name, issuer);
        let token = service.config.get_str(CFG_OIDC_REGISTRATION_TOKEN);
        let (client_id, client_secret) = register_client(
            &ctx.http_client,
            &issuer,
            token.as_deref(),
            &redirect_uri(serves_https(&ctx.config, service), service_domain),
        )
        .await
        .with_context(|| format!("Failed to register OIDC client for {}", service.name))?;
        next.insert(OIDC_CLIENT_ID_KEY.to_string(), client_id);
        next.insert(OIDC_CLIENT_SECRET_KEY.to_string(), client_secret);
    }

    if next == existing {
        debug!(service = %service.name, "OIDC secret {} unchanged", secret_name);
    } else {
        let secret = build_string_secret(&secret_name, &next, ctx.labels_for(&service.name));
        ctx.cluster.create_or_patch(ctx.namespace(), &secret).await?;
        info!(service = %service.name, "Updated OIDC secret {}", secret_name);
    }

    Ok(OidcClient {
        cookie_secret: next.remove(OIDC_COOKIE_SECRET_KEY).unwrap_or_default(),
        client_id: next.remove(OIDC_CLIENT_ID_KEY).unwrap_or_default(),
        client_secret: next.remove(OIDC_CLIENT_SECRET_KEY).unwrap_or_default(),
    })
}

/// The proxy's alpha config and the SHA-256 of its YAML rendering.
///
/// # Errors
///
/// Returns an error if the service has no issuer or the config cannot be rendered.
pub fn alpha_config(
    config: &SyncConfig,
    service: &ServiceRegistration,
    client: &OidcClient,
) -> Result<(Value, String)> {
    let require_email = service.config.get_bool(CFG_OIDC_REQUIRE_EMAIL, false);
    // Unverified addresses are fine when addresses are not required at all
    let allow_unverified =
        !require_email || service.config.get_bool(CFG_OIDC_ALLOW_UNVERIFIED_EMAIL, true);
    // Without a required email, use a claim every token has
    let email_claim = if require_email { "email" } else { "sub" };

    let headers: Vec<Value> = IDENTITY_HEADERS
        .iter()
        .map(|(name, claim)| json!({"name": name, "values": [{"claim": claim}]}))
        .collect();

    let alpha = json!({
        "injectResponseHeaders": headers,
        "upstreamConfig": {
            "upstreams": [{"id": "static", "path": "/", "static": true}],
        },
        "providers": [{
            "id": "oidc",
            "provider": "oidc",
            "clientID": client.client_id,
            "clientSecret": client.client_secret,
            "loginURLParameters": config.ingress.oidc.forwarded_query_params,
            "oidcConfig": {
                "issuerURL": issuer_of(service)?,
                "insecureAllowUnverifiedEmail": allow_unverified,
                "emailClaim": email_claim,
                "audienceClaims": ["aud"],
            },
        }],
    });

    let rendered = serde_yaml::to_string(&alpha).context("Failed to render OIDC alpha config")?;
    let checksum = format!("{:x}", Sha256::digest(rendered.as_bytes()));
    Ok((alpha, checksum))
}

/// The oauth2-proxy release for a service.
///
/// # Errors
///
/// Returns an error if the alpha config cannot be built.
pub fn proxy_release(
    config: &SyncConfig,
    service: &ServiceRegistration,
    service_domain: &str,
    client: &OidcClient,
) -> Result<ReleaseSpec> {
    let release_name = oidc_release_name(&service.name);
    let (alpha, checksum) = alpha_config(config, service, client)?;
    let cookie_expire = service
        .config
        .get_str(CFG_OIDC_COOKIE_EXPIRE)
        .unwrap_or_else(|| DEFAULT_OIDC_COOKIE_EXPIRE.to_string());

    let overrides = json!({
        "fullnameOverride": release_name,
        "alphaConfig": {
            "enabled": true,
            "configData": alpha,
        },
        "config": {
            "configFile": "",
        },
        "podAnnotations": {
            (CHECKSUM_CONFIG_ALPHA_ANNOTATION): checksum,
        },
        "proxyVarsAsSecrets": false,
        "extraArgs": {
            "proxy-prefix": OIDC_PATH_PREFIX,
            "cookie-secret": client.cookie_secret,
            "cookie-expire": cookie_expire,
            "whitelist-domain": service_domain,
            "email-domain": "*",
        },
        // The /_oidc route is managed separately
        "ingress": {
            "enabled": false,
        },
    });

    let oidc = &config.ingress.oidc;
    Ok(ReleaseSpec {
        name: release_name,
        namespace: config.target_namespace.clone(),
        chart: ChartRef {
            name: oidc.oauth2_proxy_chart_name.clone(),
            repo: oidc.oauth2_proxy_chart_repo.clone(),
            version: oidc.oauth2_proxy_chart_version.clone(),
        },
        base_values: oidc.oauth2_proxy_default_values.clone(),
        override_values: overrides,
        cleanup_on_fail: true,
    })
}

/// Ensure the client record and the proxy release for a service.
///
/// # Errors
///
/// Returns an error if the record cannot be reconciled or the release fails.
pub async fn reconcile_proxy<C: ClusterApi, H: ChartDeployer>(
    ctx: &Context<C, H>,
    service: &ServiceRegistration,
    service_domain: &str,
) -> Result<()> {
    let client = reconcile_client_record(ctx, service, service_domain).await?;
    let release = proxy_release(&ctx.config, service, service_domain, &client)?;
    ctx.deployer
        .ensure_release(&release)
        .await
        .with_context(|| format!("Failed to deploy OIDC proxy {}", release.name))?;
    Ok(())
}

#[cfg(test)]
#[path = "oidc_tests.rs"]
mod oidc_tests;
