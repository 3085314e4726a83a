// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Controller-agnostic ingress routes.
//!
//! An [`IngressIntent`] is assembled in stages before a single write:
//!
//! 1. the [`IngressAdapter`] applies its controller defaults
//! 2. operator annotations from configuration are layered on top
//! 3. backend protocol and read timeout are applied
//! 4. TLS and authentication are attached
//!
//! Later stages win over earlier ones, so feature-specific annotations are never
//! clobbered by the defaults.

pub mod adapter;
pub mod nginx;

pub use adapter::{AdapterRegistry, AuthDelegation, IngressAdapter};
pub use nginx::NginxAdapter;

use std::collections::BTreeMap;

use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, IngressTLS, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::constants::{DYNAMIC_PORT_NAME, PATH_TYPE_PREFIX, ROOT_PATH};

/// One route, built up in stages before it is written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IngressIntent {
    name: String,
    class_name: String,
    host: String,
    path: String,
    backend_service: String,
    backend_port_name: String,
    annotations: BTreeMap<String, String>,
    tls_secret_name: Option<String>,
}

impl IngressIntent {
    /// A route named `name` sending `/` on `host` to the service of the same name.
    #[must_use]
    pub fn new(name: &str, class_name: &str, host: &str) -> Self {
        Self {
            name: name.to_string(),
            class_name: class_name.to_string(),
            host: host.to_string(),
            path: ROOT_PATH.to_string(),
            backend_service: name.to_string(),
            backend_port_name: DYNAMIC_PORT_NAME.to_string(),
            annotations: BTreeMap::new(),
            tls_secret_name: None,
        }
    }

    /// Route a different path prefix.
    #[must_use]
    pub fn with_path(mut self, path: &str) -> Self {
        self.path = path.to_string();
        self
    }

    /// Send traffic to another service port.
    #[must_use]
    pub fn with_backend(mut self, service: &str, port_name: &str) -> Self {
        self.backend_service = service.to_string();
        self.backend_port_name = port_name.to_string();
        self
    }

    /// Set one annotation, replacing any earlier value.
    pub fn annotate(&mut self, key: &str, value: impl Into<String>) {
        self.annotations.insert(key.to_string(), value.into());
    }

    /// Set every annotation in `annotations`, replacing earlier values.
    pub fn extend_annotations(&mut self, annotations: &BTreeMap<String, String>) {
        self.annotations
            .extend(annotations.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    /// Current value of an annotation.
    #[must_use]
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }

    /// All annotations set so far.
    #[must_use]
    pub fn annotations(&self) -> &BTreeMap<String, String> {
        &self.annotations
    }

    /// Terminate TLS for the host using the given secret.
    pub fn set_tls_secret(&mut self, secret_name: &str) {
        self.tls_secret_name = Some(secret_name.to_string());
    }

    /// The TLS secret, if TLS is attached.
    #[must_use]
    pub fn tls_secret(&self) -> Option<&str> {
        self.tls_secret_name.as_deref()
    }

    /// Render the `Ingress` object with the given labels.
    #[must_use]
    pub fn into_ingress(self, labels: BTreeMap<String, String>) -> Ingress {
        let tls = self.tls_secret_name.map(|secret_name| {
            vec![IngressTLS {
                hosts: Some(vec![self.host.clone()]),
                secret_name: Some(secret_name),
            }]
        });

        Ingress {
            metadata: ObjectMeta {
                name: Some(self.name),
                labels: Some(labels),
                annotations: if self.annotations.is_empty() {
                    None
                } else {
                    Some(self.annotations)
                },
                ..Default::default()
            },
            spec: Some(IngressSpec {
                ingress_class_name: Some(self.class_name),
                rules: Some(vec![IngressRule {
                    host: Some(self.host),
                    http: Some(HTTPIngressRuleValue {
                        paths: vec![HTTPIngressPath {
                            path: Some(self.path),
                            path_type: PATH_TYPE_PREFIX.to_string(),
                            backend: IngressBackend {
                                service: Some(IngressServiceBackend {
                                    name: self.backend_service,
                                    port: Some(ServiceBackendPort {
                                        name: Some(self.backend_port_name),
                                        number: None,
                                    }),
                                }),
                                ..Default::default()
                            },
                        }],
                    }),
                }]),
                tls,
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}
