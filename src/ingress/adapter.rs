// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The capability interface every ingress controller family implements.
//!
//! Adapters translate controller-agnostic requests (defaults, backend protocol,
//! read timeout, client certificates, auth delegation) into the annotations
//! their controller understands. The adapter for a deployment is chosen at
//! startup from the controller identifier of the configured `IngressClass`,
//! by looking it up in an [`AdapterRegistry`].

use std::collections::BTreeMap;
use std::sync::Arc;

use super::nginx::NginxAdapter;
use super::IngressIntent;
use crate::errors::AdapterError;

/// Delegation of authentication to an auth-request service.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthDelegation {
    /// URL checked for every request
    pub auth_url: String,
    /// Where unauthenticated users are sent
    pub signin_url: Option<String>,
    /// Query parameter carrying the original URL to the sign-in page
    pub next_url_param: Option<String>,
    /// Headers set on the auth request
    pub request_headers: BTreeMap<String, String>,
    /// Headers copied from the auth response to the upstream request
    pub response_headers: Vec<String>,
    /// Cookies copied from the auth response to the client
    pub response_cookies: Vec<String>,
}

/// Translates route features into controller-specific configuration.
pub trait IngressAdapter: Send + Sync {
    /// Controller identifier this adapter handles, as found in `IngressClass.spec.controller`.
    fn controller(&self) -> &'static str;

    /// Apply the controller defaults every route gets.
    fn configure_defaults(&self, ingress: &mut IngressIntent);

    /// Tell the controller which protocol the backend speaks.
    fn configure_backend_protocol(&self, ingress: &mut IngressIntent, protocol: &str);

    /// Set how long the controller waits on the backend.
    fn configure_read_timeout(&self, ingress: &mut IngressIntent, seconds: u64);

    /// Require client certificates signed by the CA in `namespace/secret_name`.
    fn configure_tls_client_certificates(
        &self,
        ingress: &mut IngressIntent,
        namespace: &str,
        secret_name: &str,
    );

    /// Delegate authentication of every request.
    fn configure_authentication(&self, ingress: &mut IngressIntent, auth: &AuthDelegation);
}

/// Adapters keyed by controller identifier.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: BTreeMap<&'static str, Arc<dyn IngressAdapter>>,
}

impl AdapterRegistry {
    /// Registry holding every adapter shipped with the controller.
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::default();
        registry.register(Arc::new(NginxAdapter));
        registry
    }

    /// Add an adapter, replacing any existing one for the same controller.
    pub fn register(&mut self, adapter: Arc<dyn IngressAdapter>) {
        self.adapters.insert(adapter.controller(), adapter);
    }

    /// Controller identifiers with a registered adapter.
    #[must_use]
    pub fn controllers(&self) -> Vec<&'static str> {
        self.adapters.keys().copied().collect()
    }

    /// The adapter for a controller.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::UnsupportedController`] if nothing handles `controller`.
    pub fn resolve(&self, controller: &str) -> Result<Arc<dyn IngressAdapter>, AdapterError> {
        self.adapters
            .get(controller)
            .cloned()
            .ok_or_else(|| AdapterError::UnsupportedController {
                controller: controller.to_string(),
                supported: self.controllers().join(", "),
            })
    }
}

#[cfg(test)]
#[path = "adapter_tests.rs"]
mod adapter_tests;
