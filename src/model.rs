// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Service registrations and the events that carry them.
//!
//! A [`ServiceRegistration`] is produced and destroyed entirely by the
//! registration source; the controller only consumes and reflects it.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One backend address a service is reachable on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// IP address of the tunnel endpoint
    pub address: String,
    /// Dynamic port allocated for the tunnel
    pub port: u16,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// Per-service directives, keyed by directive name (e.g. `auth-type`).
///
/// Values are scalars except `auth-external-params`, which is a mapping.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceConfig(BTreeMap<String, Value>);

impl ServiceConfig {
    /// Whether the directive is present at all.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// The directive rendered as a string; numbers and booleans are stringified.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// The directive interpreted as a boolean, or `default` when absent.
    ///
    /// Strings `true`, `yes`, `on` and `1` (any case) are truthy.
    #[must_use]
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.0.get(key) {
            None | Some(Value::Null) => default,
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_i64().is_some_and(|n| n != 0),
            Some(Value::String(s)) => {
                matches!(s.to_ascii_lowercase().as_str(), "true" | "yes" | "on" | "1")
            }
            Some(_) => default,
        }
    }

    /// The directive interpreted as a string mapping; empty when absent or not a mapping.
    #[must_use]
    pub fn get_map(&self, key: &str) -> BTreeMap<String, String> {
        let Some(Value::Object(map)) = self.0.get(key) else {
            return BTreeMap::new();
        };
        map.iter()
            .map(|(k, v)| {
                let value = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), value)
            })
            .collect()
    }

    /// Set a directive, returning the updated config.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }
}

impl FromIterator<(String, Value)> for ServiceConfig {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A backend service as announced by the registration source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServiceRegistration {
    /// Unique, cluster-safe identifier
    pub name: String,
    /// Addresses the service is reachable on; at least one
    pub endpoints: Vec<Endpoint>,
    /// Per-service directives
    #[serde(default)]
    pub config: ServiceConfig,
}

impl ServiceRegistration {
    /// Comma-separated endpoint list for log messages.
    #[must_use]
    pub fn endpoint_summary(&self) -> String {
        self.endpoints
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A change to the set of registered services.
///
/// Events for the same name are causally ordered and must be applied in order.
#[derive(Clone, Debug, PartialEq)]
pub enum ReconciliationEvent {
    /// A service appeared
    Created(ServiceRegistration),
    /// An existing service changed
    Updated(ServiceRegistration),
    /// A service went away
    Deleted {
        /// Name of the removed service
        name: String,
    },
}

impl ReconciliationEvent {
    /// Name of the service the event is about.
    #[must_use]
    pub fn service_name(&self) -> &str {
        match self {
            Self::Created(service) | Self::Updated(service) => &service.name,
            Self::Deleted { name } => name,
        }
    }
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod model_tests;
