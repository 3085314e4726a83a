// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Controller configuration.
//!
//! Configuration is read from a YAML document. Every field has a default, so an
//! empty document is a valid (if not very useful) configuration. The shape mirrors
//! the concerns of the controller: where managed objects live, how they are
//! labelled, how ingress/TLS/auth are configured, and how Helm is invoked.
//!
//! # Example
//!
//! ```rust
//! use zenith_sync::config::SyncConfig;
//!
//! let config = SyncConfig::from_yaml_str(
//!     r"
//! target_namespace: tenant-services
//! ingress:
//!   base_domain: apps.example.org
//!   tls:
//!     enabled: true
//!     secret_name: wildcard-tls
//! ",
//! )
//! .unwrap();
//!
//! assert_eq!(config.ingress.base_domain, "apps.example.org");
//! assert_eq!(config.reconciliation_retries, 3);
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::constants::{
    DEFAULT_CLUSTER_SERVICES_DOMAIN, DEFAULT_HELM_EXECUTABLE, DEFAULT_HELM_HISTORY_MAX,
    DEFAULT_HELM_TIMEOUT, DEFAULT_INGRESS_CLASS_NAME, DEFAULT_METRICS_ADDRESS,
    DEFAULT_NEXT_URL_PARAM, DEFAULT_OAUTH2_PROXY_CHART_NAME, DEFAULT_OAUTH2_PROXY_CHART_REPO,
    DEFAULT_OAUTH2_PROXY_CHART_VERSION, DEFAULT_PARAM_HEADER_PREFIX,
    DEFAULT_RECONCILIATION_RETRIES, DEFAULT_SELF_NAMESPACE, DEFAULT_TARGET_NAMESPACE,
};
use crate::labels::{
    OwnershipLabels, DEFAULT_CREATED_BY_LABEL, DEFAULT_SERVICE_NAME_LABEL,
    DEFAULT_TLS_MIRROR_ANNOTATION,
};

/// Top-level controller configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Namespace where services, endpoints, ingresses and secrets are created
    pub target_namespace: String,

    /// Namespace the controller runs in; source of the mirrored wildcard secret
    pub self_namespace: String,

    /// Label key marking objects created by the controller
    pub created_by_label: String,

    /// Label key carrying the owning service name
    pub service_name_label: String,

    /// Annotation key pointing a mirrored secret at its source
    pub tls_mirror_annotation: String,

    /// Maximum number of attempts for each reconcile/remove
    pub reconciliation_retries: u32,

    /// Optional backoff between attempts; attempts are immediate when unset
    pub retry_backoff: Option<RetryBackoffConfig>,

    /// Cluster-internal DNS suffix, used to address the OIDC proxy
    pub cluster_services_domain: String,

    /// Ingress configuration
    pub ingress: IngressConfig,

    /// Helm client configuration
    pub helm_client: HelmClientConfig,

    /// Address for the `/metrics` and `/healthz` endpoints
    pub metrics_address: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            target_namespace: DEFAULT_TARGET_NAMESPACE.to_string(),
            self_namespace: std::env::var("POD_NAMESPACE")
                .unwrap_or_else(|_| DEFAULT_SELF_NAMESPACE.to_string()),
            created_by_label: DEFAULT_CREATED_BY_LABEL.to_string(),
            service_name_label: DEFAULT_SERVICE_NAME_LABEL.to_string(),
            tls_mirror_annotation: DEFAULT_TLS_MIRROR_ANNOTATION.to_string(),
            reconciliation_retries: DEFAULT_RECONCILIATION_RETRIES,
            retry_backoff: None,
            cluster_services_domain: DEFAULT_CLUSTER_SERVICES_DOMAIN.to_string(),
            ingress: IngressConfig::default(),
            helm_client: HelmClientConfig::default(),
            metrics_address: DEFAULT_METRICS_ADDRESS.to_string(),
        }
    }
}

impl SyncConfig {
    /// Parse configuration from YAML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid YAML for this shape.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        // An empty document deserializes to unit, not to a map
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).context("Failed to parse sync configuration")
    }

    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {}", path.display()))?;
        Self::from_yaml_str(&text)
    }

    /// The ownership label keys for this deployment.
    #[must_use]
    pub fn ownership_labels(&self) -> OwnershipLabels {
        OwnershipLabels {
            created_by: self.created_by_label.clone(),
            service_name: self.service_name_label.clone(),
        }
    }
}

/// Bounded exponential backoff between reconcile attempts.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryBackoffConfig {
    /// Delay before the second attempt, in milliseconds
    pub initial_interval_ms: u64,
    /// Upper bound on the delay between attempts, in milliseconds
    pub max_interval_ms: u64,
    /// Growth factor applied after each attempt
    pub multiplier: f64,
}

impl Default for RetryBackoffConfig {
    fn default() -> Self {
        Self {
            initial_interval_ms: 100,
            max_interval_ms: 10_000,
            multiplier: 2.0,
        }
    }
}

/// Ingress configuration shared by every managed route.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct IngressConfig {
    /// Base domain; each service is exposed at `<name>.<base_domain>`
    pub base_domain: String,

    /// Name of the `IngressClass` to use
    pub class_name: String,

    /// Annotations applied to every ingress after the controller defaults
    pub annotations: BTreeMap<String, String>,

    /// TLS configuration
    pub tls: TlsConfig,

    /// External auth configuration
    pub external_auth: ExternalAuthConfig,

    /// OIDC proxy configuration
    pub oidc: OidcConfig,
}

impl Default for IngressConfig {
    fn default() -> Self {
        Self {
            base_domain: String::new(),
            class_name: DEFAULT_INGRESS_CLASS_NAME.to_string(),
            annotations: BTreeMap::new(),
            tls: TlsConfig::default(),
            external_auth: ExternalAuthConfig::default(),
            oidc: OidcConfig::default(),
        }
    }
}

/// Automatic TLS configuration.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    /// Whether ingresses get a TLS section when the service supplies no certificate
    pub enabled: bool,

    /// Shared (usually wildcard) secret; `tls-<name>` per service when unset
    pub secret_name: Option<String>,

    /// Annotations applied when auto-TLS is used, e.g. for cert-manager
    pub annotations: BTreeMap<String, String>,
}

/// External auth-request configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ExternalAuthConfig {
    /// Auth-check URL; external auth is disabled when unset
    pub url: Option<String>,

    /// URL users are sent to when the auth check fails
    pub signin_url: Option<String>,

    /// Query parameter carrying the original URL on sign-in
    pub next_url_param: String,

    /// Headers set on every auth request
    pub request_headers: BTreeMap<String, String>,

    /// Headers copied from the auth response to the upstream request
    pub response_headers: Vec<String>,

    /// Prefix applied to per-service parameter headers
    pub param_header_prefix: String,
}

impl Default for ExternalAuthConfig {
    fn default() -> Self {
        Self {
            url: None,
            signin_url: None,
            next_url_param: DEFAULT_NEXT_URL_PARAM.to_string(),
            request_headers: BTreeMap::new(),
            response_headers: Vec::new(),
            param_header_prefix: DEFAULT_PARAM_HEADER_PREFIX.to_string(),
        }
    }
}

/// oauth2-proxy chart configuration for OIDC authentication.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct OidcConfig {
    /// Chart name
    pub oauth2_proxy_chart_name: String,

    /// Chart repository URL
    pub oauth2_proxy_chart_repo: String,

    /// Chart version
    pub oauth2_proxy_chart_version: String,

    /// Values applied beneath the per-service overrides
    pub oauth2_proxy_default_values: serde_json::Value,

    /// Query parameters forwarded from the sign-in request to the identity provider
    pub forwarded_query_params: Vec<String>,
}

impl Default for OidcConfig {
    fn default() -> Self {
        Self {
            oauth2_proxy_chart_name: DEFAULT_OAUTH2_PROXY_CHART_NAME.to_string(),
            oauth2_proxy_chart_repo: DEFAULT_OAUTH2_PROXY_CHART_REPO.to_string(),
            oauth2_proxy_chart_version: DEFAULT_OAUTH2_PROXY_CHART_VERSION.to_string(),
            oauth2_proxy_default_values: serde_json::Value::Object(serde_json::Map::new()),
            forwarded_query_params: Vec::new(),
        }
    }
}

/// Helm invocation settings.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct HelmClientConfig {
    /// Path to the Helm executable
    pub executable: String,

    /// Timeout passed to Helm operations (Go duration syntax)
    pub default_timeout: String,

    /// Maximum number of revisions kept per release
    pub history_max_revisions: u32,

    /// Skip TLS verification when fetching charts
    pub insecure_skip_tls_verify: bool,
}

impl Default for HelmClientConfig {
    fn default() -> Self {
        Self {
            executable: DEFAULT_HELM_EXECUTABLE.to_string(),
            default_timeout: DEFAULT_HELM_TIMEOUT.to_string(),
            history_max_revisions: DEFAULT_HELM_HISTORY_MAX,
            insecure_skip_tls_verify: false,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
