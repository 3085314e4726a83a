// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the Zenith sync controller.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// Identity
// ============================================================================

/// Value written to the created-by label on every managed object
pub const CREATED_BY_VALUE: &str = "zenith-sync";

/// Field manager used for server-side patches
pub const FIELD_MANAGER: &str = "zenith-sync";

// ============================================================================
// Service / Endpoints Shape
// ============================================================================

/// Name of the single port on every managed `Service` and `Endpoints` object
pub const DYNAMIC_PORT_NAME: &str = "dynamic";

/// Port exposed by every managed `Service`
pub const SERVICE_PORT: i32 = 80;

/// Protocol of the managed service port
pub const SERVICE_PROTOCOL: &str = "TCP";

/// Default backend protocol when a service does not specify one
pub const DEFAULT_BACKEND_PROTOCOL: &str = "http";

// ============================================================================
// Ingress Shape
// ============================================================================

/// Path served by the primary ingress
pub const ROOT_PATH: &str = "/";

/// Path type used for every managed ingress path
pub const PATH_TYPE_PREFIX: &str = "Prefix";

/// Path prefix owned by the OIDC proxy
pub const OIDC_PATH_PREFIX: &str = "/_oidc";

/// Named port exposed by the oauth2-proxy service
pub const OIDC_PROXY_PORT_NAME: &str = "http";

// ============================================================================
// Secret Naming
// ============================================================================

/// Prefix for the TLS secret of a service (`tls-<name>`)
pub const TLS_SECRET_PREFIX: &str = "tls-";

/// Prefix for the client CA secret of a service (`tls-client-ca-<name>`)
pub const TLS_CLIENT_CA_SECRET_PREFIX: &str = "tls-client-ca-";

/// Prefix for the OIDC proxy release and its ingress (`oidc-<name>`)
pub const OIDC_RELEASE_PREFIX: &str = "oidc-";

/// Number of hex characters of the issuer hash used in the OIDC secret name
pub const ISSUER_HASH_PREFIX_LEN: usize = 8;

/// Secret type for TLS certificate/key pairs
pub const SECRET_TYPE_TLS: &str = "kubernetes.io/tls";

/// Certificate key inside a TLS secret
pub const TLS_CERT_KEY: &str = "tls.crt";

/// Private key inside a TLS secret
pub const TLS_KEY_KEY: &str = "tls.key";

/// CA certificate key inside a client CA secret
pub const CA_CERT_KEY: &str = "ca.crt";

// ============================================================================
// OIDC Client Record Keys
// ============================================================================

/// Secret key holding the oauth2-proxy cookie secret
pub const OIDC_COOKIE_SECRET_KEY: &str = "cookie-secret";

/// Secret key holding the OIDC client ID
pub const OIDC_CLIENT_ID_KEY: &str = "client-id";

/// Secret key holding the OIDC client secret
pub const OIDC_CLIENT_SECRET_KEY: &str = "client-secret";

/// Number of random bytes in a generated cookie secret
pub const COOKIE_SECRET_BYTES: usize = 32;

/// Well-known discovery document path, relative to the issuer
pub const OIDC_DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

/// Number of split oauth2-proxy cookies forwarded to the client
pub const OIDC_SPLIT_COOKIE_COUNT: usize = 3;

/// Default oauth2-proxy cookie lifetime
pub const DEFAULT_OIDC_COOKIE_EXPIRE: &str = "24h";

// ============================================================================
// Per-Service Configuration Keys
// ============================================================================

/// Disables authentication for the service when truthy
pub const CFG_SKIP_AUTH: &str = "skip-auth";

/// Selects the authentication strategy (`external` or `oidc`)
pub const CFG_AUTH_TYPE: &str = "auth-type";

/// Parameters forwarded to the external auth service as request headers
pub const CFG_AUTH_EXTERNAL_PARAMS: &str = "auth-external-params";

/// OIDC issuer URL
pub const CFG_OIDC_ISSUER: &str = "auth-oidc-issuer";

/// Statically-configured OIDC client ID
pub const CFG_OIDC_CLIENT_ID: &str = "auth-oidc-client-id";

/// Statically-configured OIDC client secret
pub const CFG_OIDC_CLIENT_SECRET: &str = "auth-oidc-client-secret";

/// Bearer token presented during dynamic client registration
pub const CFG_OIDC_REGISTRATION_TOKEN: &str = "auth-oidc-client-registration-token";

/// Require an email claim from the identity provider
pub const CFG_OIDC_REQUIRE_EMAIL: &str = "auth-oidc-require-email";

/// Accept unverified email addresses
pub const CFG_OIDC_ALLOW_UNVERIFIED_EMAIL: &str = "auth-oidc-allow-unverified-email";

/// oauth2-proxy cookie lifetime
pub const CFG_OIDC_COOKIE_EXPIRE: &str = "auth-oidc-cookie-expire";

/// Base64-encoded TLS certificate supplied by the service
pub const CFG_TLS_CERT: &str = "tls-cert";

/// Base64-encoded TLS private key supplied by the service
pub const CFG_TLS_KEY: &str = "tls-key";

/// Base64-encoded CA used to verify client certificates
pub const CFG_TLS_CLIENT_CA: &str = "tls-client-ca";

/// Protocol spoken by the backend
pub const CFG_BACKEND_PROTOCOL: &str = "backend-protocol";

/// Proxy read timeout in seconds
pub const CFG_READ_TIMEOUT: &str = "read-timeout";

/// Authentication strategy value selecting the OIDC proxy
pub const AUTH_TYPE_OIDC: &str = "oidc";

/// Authentication strategy value selecting the external auth service
pub const AUTH_TYPE_EXTERNAL: &str = "external";

// ============================================================================
// Reconciliation Defaults
// ============================================================================

/// Default number of attempts for reconcile and remove operations
pub const DEFAULT_RECONCILIATION_RETRIES: u32 = 3;

/// Sleep interval of the idle mirror loop (one day)
pub const IDLE_SLEEP_SECS: u64 = 86_400;

/// Poll interval of the file-backed registration source
pub const FILE_SOURCE_POLL_SECS: u64 = 5;

/// Buffer size of the in-process registration channel
pub const SOURCE_CHANNEL_CAPACITY: usize = 256;

// ============================================================================
// Helm Defaults
// ============================================================================

/// Default Helm executable
pub const DEFAULT_HELM_EXECUTABLE: &str = "helm";

/// Default timeout for Helm operations
pub const DEFAULT_HELM_TIMEOUT: &str = "5m";

/// Default number of release revisions Helm keeps
pub const DEFAULT_HELM_HISTORY_MAX: u32 = 10;

/// Default oauth2-proxy chart name
pub const DEFAULT_OAUTH2_PROXY_CHART_NAME: &str = "oauth2-proxy";

/// Default oauth2-proxy chart repository
pub const DEFAULT_OAUTH2_PROXY_CHART_REPO: &str = "https://oauth2-proxy.github.io/manifests";

/// Default oauth2-proxy chart version
pub const DEFAULT_OAUTH2_PROXY_CHART_VERSION: &str = "7.7.1";

// ============================================================================
// Networking Defaults
// ============================================================================

/// Default namespace for managed services
pub const DEFAULT_TARGET_NAMESPACE: &str = "zenith-services";

/// Default namespace the controller runs in
pub const DEFAULT_SELF_NAMESPACE: &str = "zenith";

/// Default cluster-internal DNS suffix
pub const DEFAULT_CLUSTER_SERVICES_DOMAIN: &str = "svc.cluster.local";

/// Default ingress class name
pub const DEFAULT_INGRESS_CLASS_NAME: &str = "nginx";

/// Default query parameter carrying the post-login redirect
pub const DEFAULT_NEXT_URL_PARAM: &str = "next";

/// Default prefix applied to external auth parameter headers
pub const DEFAULT_PARAM_HEADER_PREFIX: &str = "X-Auth-";

/// Default address of the metrics server
pub const DEFAULT_METRICS_ADDRESS: &str = "0.0.0.0:8080";
