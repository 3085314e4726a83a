// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common label and annotation keys used across all reconcilers.
//!
//! The ownership label pair is the only mechanism for discovering and garbage
//! collecting the objects of a service, so every create/replace goes through
//! [`OwnershipLabels::for_service`] and every query through the selector helpers here.

use std::collections::BTreeMap;

use crate::constants::CREATED_BY_VALUE;

// ============================================================================
// Default Keys
// ============================================================================

/// Default label marking an object as created by this controller
pub const DEFAULT_CREATED_BY_LABEL: &str = "app.kubernetes.io/created-by";

/// Default label carrying the name of the owning service
pub const DEFAULT_SERVICE_NAME_LABEL: &str = "zenith.stackhpc.com/service-name";

/// Default annotation pointing a mirrored secret back at its source (`<namespace>/<name>`)
pub const DEFAULT_TLS_MIRROR_ANNOTATION: &str = "zenith.stackhpc.com/mirrors";

/// Pod annotation carrying the checksum of the oauth2-proxy alpha config
pub const CHECKSUM_CONFIG_ALPHA_ANNOTATION: &str = "checksum/config-alpha";

/// The ownership label keys in effect for a deployment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnershipLabels {
    /// Key of the created-by label
    pub created_by: String,
    /// Key of the service-name label
    pub service_name: String,
}

impl Default for OwnershipLabels {
    fn default() -> Self {
        Self {
            created_by: DEFAULT_CREATED_BY_LABEL.to_string(),
            service_name: DEFAULT_SERVICE_NAME_LABEL.to_string(),
        }
    }
}

impl OwnershipLabels {
    /// Labels identifying an object as belonging to `service`.
    #[must_use]
    pub fn for_service(&self, service: &str) -> BTreeMap<String, String> {
        BTreeMap::from([
            (self.created_by.clone(), CREATED_BY_VALUE.to_string()),
            (self.service_name.clone(), service.to_string()),
        ])
    }

    /// Labels identifying an object as created by this controller, with no owning service.
    #[must_use]
    pub fn created_only(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(self.created_by.clone(), CREATED_BY_VALUE.to_string())])
    }

    /// Selector matching every object owned by `service`.
    #[must_use]
    pub fn selector_for(&self, service: &str) -> String {
        format!(
            "{}={},{}={}",
            self.created_by, CREATED_BY_VALUE, self.service_name, service
        )
    }

    /// Selector matching every object owned by any service.
    ///
    /// The service-name key is an existence requirement, the wildcard form of
    /// [`Self::selector_for`].
    #[must_use]
    pub fn selector_any_service(&self) -> String {
        format!("{}={},{}", self.created_by, CREATED_BY_VALUE, self.service_name)
    }
}

#[cfg(test)]
#[path = "labels_tests.rs"]
mod labels_tests;
