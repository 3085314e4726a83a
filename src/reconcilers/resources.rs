// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Builders for the core objects of a service.
//!
//! Every builder takes the ownership labels to stamp on the object, so the
//! labels are applied identically on each create/replace and selector queries
//! stay exhaustive.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use k8s_openapi::api::core::v1::{
    EndpointAddress, EndpointPort, EndpointSubset, Endpoints, Secret, Service, ServicePort,
    ServiceSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use k8s_openapi::ByteString;

use crate::constants::{
    CA_CERT_KEY, DYNAMIC_PORT_NAME, SECRET_TYPE_TLS, SERVICE_PORT, SERVICE_PROTOCOL,
    TLS_CERT_KEY, TLS_CLIENT_CA_SECRET_PREFIX, TLS_KEY_KEY, TLS_SECRET_PREFIX,
};
use crate::model::ServiceRegistration;

fn metadata(name: &str, labels: BTreeMap<String, String>) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        labels: Some(labels),
        ..Default::default()
    }
}

/// Name of the secret holding a service-supplied certificate.
#[must_use]
pub fn tls_secret_name(service: &str) -> String {
    format!("{TLS_SECRET_PREFIX}{service}")
}

/// Name of the secret holding a service-supplied client CA.
#[must_use]
pub fn client_ca_secret_name(service: &str) -> String {
    format!("{TLS_CLIENT_CA_SECRET_PREFIX}{service}")
}

/// Selector-less `Service` with one port targeting the `dynamic` endpoint port.
#[must_use]
pub fn build_service(name: &str, labels: BTreeMap<String, String>) -> Service {
    Service {
        metadata: metadata(name, labels),
        spec: Some(ServiceSpec {
            ports: Some(vec![ServicePort {
                name: Some(DYNAMIC_PORT_NAME.to_string()),
                protocol: Some(SERVICE_PROTOCOL.to_string()),
                port: SERVICE_PORT,
                target_port: Some(IntOrString::String(DYNAMIC_PORT_NAME.to_string())),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// `Endpoints` listing exactly the registered endpoints, one subset each.
///
/// Each endpoint may use a different port, so they cannot share a subset.
#[must_use]
pub fn build_endpoints(service: &ServiceRegistration, labels: BTreeMap<String, String>) -> Endpoints {
    Endpoints {
        metadata: metadata(&service.name, labels),
        subsets: Some(
            service
                .endpoints
                .iter()
                .map(|endpoint| EndpointSubset {
                    addresses: Some(vec![EndpointAddress {
                        ip: endpoint.address.clone(),
                        ..Default::default()
                    }]),
                    ports: Some(vec![EndpointPort {
                        name: Some(DYNAMIC_PORT_NAME.to_string()),
                        port: i32::from(endpoint.port),
                        protocol: Some(SERVICE_PROTOCOL.to_string()),
                        ..Default::default()
                    }]),
                    ..Default::default()
                })
                .collect(),
        ),
    }
}

/// Decode a base64 directive value into secret bytes.
///
/// # Errors
///
/// Returns an error naming the directive if the value is not valid base64.
pub fn decode_directive(directive: &str, value: &str) -> Result<ByteString> {
    let bytes = BASE64
        .decode(value.trim())
        .with_context(|| format!("Directive '{directive}' is not valid base64"))?;
    Ok(ByteString(bytes))
}

/// `kubernetes.io/tls` secret holding a certificate and key.
#[must_use]
pub fn build_tls_secret(
    name: &str,
    certificate: ByteString,
    key: ByteString,
    labels: BTreeMap<String, String>,
) -> Secret {
    Secret {
        metadata: metadata(name, labels),
        type_: Some(SECRET_TYPE_TLS.to_string()),
        data: Some(BTreeMap::from([
            (TLS_CERT_KEY.to_string(), certificate),
            (TLS_KEY_KEY.to_string(), key),
        ])),
        ..Default::default()
    }
}

/// Opaque secret holding a CA certificate under `ca.crt`.
#[must_use]
pub fn build_client_ca_secret(
    name: &str,
    ca_certificate: ByteString,
    labels: BTreeMap<String, String>,
) -> Secret {
    Secret {
        metadata: metadata(name, labels),
        data: Some(BTreeMap::from([(CA_CERT_KEY.to_string(), ca_certificate)])),
        ..Default::default()
    }
}

/// Opaque secret holding string values.
#[must_use]
pub fn build_string_secret(
    name: &str,
    data: &BTreeMap<String, String>,
    labels: BTreeMap<String, String>,
) -> Secret {
    Secret {
        metadata: metadata(name, labels),
        data: Some(
            data.iter()
                .map(|(k, v)| (k.clone(), ByteString(v.as_bytes().to_vec())))
                .collect(),
        ),
        ..Default::default()
    }
}

/// Secret data as strings; values that are not UTF-8 are skipped.
#[must_use]
pub fn secret_string_data(secret: &Secret) -> BTreeMap<String, String> {
    secret
        .data
        .iter()
        .flatten()
        .filter_map(|(k, v)| String::from_utf8(v.0.clone()).ok().map(|v| (k.clone(), v)))
        .collect()
}

#[cfg(test)]
#[path = "resources_tests.rs"]
mod resources_tests;
