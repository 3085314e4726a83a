// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for the seams of the controller.
//!
//! This module provides specialized error types for:
//! - Kubernetes object operations ([`ClusterError`])
//! - Helm chart deployment ([`ChartError`])
//! - OIDC discovery and dynamic client registration ([`OidcError`])
//! - Ingress adapter resolution ([`AdapterError`])
//!
//! Composed operations (reconcile, remove, the control loops) return
//! `anyhow::Result` and wrap these with context.

use thiserror::Error;

/// Errors from the cluster object API.
#[derive(Error, Debug)]
pub enum ClusterError {
    /// The named object does not exist (HTTP 404)
    ///
    /// Tolerated as absence by every caller that reads; never retried as a failure.
    #[error("{kind} '{name}' not found")]
    NotFound {
        /// Kind of the object
        kind: String,
        /// Name of the object
        name: String,
    },

    /// The API server rejected or failed the request
    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    /// A watch stream failed
    #[error("Watch error: {0}")]
    Watch(#[from] kube::runtime::watcher::Error),

    /// An object could not be converted to or from its wire form
    #[error("Failed to convert {kind} object: {source}")]
    Serialization {
        /// Kind of the object
        kind: String,
        /// Underlying serde error
        #[source]
        source: serde_json::Error,
    },

    /// Any other failure (e.g. malformed label selector)
    #[error("{0}")]
    Other(String),
}

impl ClusterError {
    /// Whether this error means the object is absent.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Api(kube::Error::Api(response)) => response.code == 404,
            _ => false,
        }
    }
}

/// Errors from the chart deployment mechanism.
#[derive(Error, Debug)]
pub enum ChartError {
    /// The Helm executable could not be started or its IO failed
    #[error("Failed to run {executable}: {source}")]
    Io {
        /// Executable that was invoked
        executable: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Helm ran but exited unsuccessfully
    #[error("helm {command} for release '{release}' failed: {stderr}")]
    CommandFailed {
        /// Helm subcommand (e.g. `upgrade`)
        command: String,
        /// Release name
        release: String,
        /// Captured standard error
        stderr: String,
    },

    /// Release values could not be rendered
    #[error("Failed to render values for release '{release}': {source}")]
    Values {
        /// Release name
        release: String,
        /// Underlying YAML error
        #[source]
        source: serde_yaml::Error,
    },
}

/// Errors from OIDC discovery and dynamic client registration.
#[derive(Error, Debug)]
pub enum OidcError {
    /// The HTTP exchange itself failed
    #[error("HTTP request to {url} failed: {source}")]
    Http {
        /// URL that was requested
        url: String,
        /// Underlying reqwest error
        #[source]
        source: reqwest::Error,
    },

    /// The identity provider answered with a non-success status
    #[error("{url} returned HTTP {status}")]
    Status {
        /// URL that was requested
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// The discovery document has no registration endpoint
    #[error("Issuer {issuer} does not advertise a registration_endpoint")]
    RegistrationUnsupported {
        /// Issuer URL
        issuer: String,
    },

    /// The issuer URL is not a valid URL
    #[error("Invalid issuer URL '{issuer}': {source}")]
    InvalidIssuer {
        /// Issuer URL as given
        issuer: String,
        /// Parse error
        #[source]
        source: url::ParseError,
    },
}

/// Errors resolving the ingress adapter for a controller.
#[derive(Error, Debug)]
pub enum AdapterError {
    /// No adapter is registered for the ingress class controller
    #[error("No ingress adapter for controller '{controller}' (supported: {supported})")]
    UnsupportedController {
        /// Controller identifier read from the `IngressClass`
        controller: String,
        /// Comma-separated identifiers that are supported
        supported: String,
    },
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
