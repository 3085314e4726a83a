// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cluster object API used by the reconcilers.
//!
//! The reconcilers never talk to `kube::Api` directly; they go through
//! [`ClusterApi`], which exposes the handful of operations they need per
//! object kind:
//!
//! - **fetch** - read one object, failing with [`ClusterError::NotFound`] when absent
//! - **create or replace** - idempotent full write of one object
//! - **create or patch** - create, or merge-patch the existing object
//! - **delete / delete all** - by name, or by label selector
//! - **list** - by label selector
//! - **watch one** - initial state of one named object followed by every change
//!
//! [`KubeCluster`] implements it against the API server.

mod kube_api;
#[cfg(test)]
pub(crate) mod memory;

pub use kube_api::KubeCluster;

use async_trait::async_trait;
use futures::stream::BoxStream;
use kube::core::NamespaceResourceScope;
use kube::Resource;
use serde::{de::DeserializeOwned, Serialize};

use crate::errors::ClusterError;

/// Namespaced object kinds the controller reads and writes.
pub trait ClusterObject:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + std::fmt::Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}

impl<T> ClusterObject for T where
    T: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + std::fmt::Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// Name of an object's kind, for logs and errors.
#[must_use]
pub fn kind_of<K: ClusterObject>() -> String {
    K::kind(&()).to_string()
}

/// Operations on cluster objects, per kind.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Read one object.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::NotFound`] if the object does not exist, or another
    /// variant if the read itself fails.
    async fn fetch<K: ClusterObject>(&self, namespace: &str, name: &str) -> Result<K, ClusterError>;

    /// Create the object, or replace it wholesale if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the object has no name or the write fails.
    async fn create_or_replace<K: ClusterObject>(
        &self,
        namespace: &str,
        object: &K,
    ) -> Result<(), ClusterError>;

    /// Create the object, or merge-patch it into the existing one.
    ///
    /// Fields of the existing object absent from `object` are preserved.
    ///
    /// # Errors
    ///
    /// Returns an error if the object has no name or the write fails.
    async fn create_or_patch<K: ClusterObject>(
        &self,
        namespace: &str,
        object: &K,
    ) -> Result<(), ClusterError>;

    /// Delete one object; absence is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails for any reason other than absence.
    async fn delete<K: ClusterObject>(&self, namespace: &str, name: &str) -> Result<(), ClusterError>;

    /// Delete every object matching a label selector.
    ///
    /// # Errors
    ///
    /// Returns an error if listing or any delete fails.
    async fn delete_all<K: ClusterObject>(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<(), ClusterError>;

    /// List every object matching a label selector.
    ///
    /// # Errors
    ///
    /// Returns an error if the list fails.
    async fn list<K: ClusterObject>(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<K>, ClusterError>;

    /// Watch one named object.
    ///
    /// The first item is the current state (`None` when absent); every later item
    /// is the state after a change.
    fn watch_one<K: ClusterObject>(
        &self,
        namespace: &str,
        name: &str,
    ) -> BoxStream<'static, Result<Option<K>, ClusterError>>;

    /// Controller identifier of a (cluster-scoped) `IngressClass`.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::NotFound`] if the class does not exist.
    async fn ingress_class_controller(&self, class_name: &str) -> Result<String, ClusterError>;
}

/// Label selector requirements, in the subset of the syntax the controller writes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SelectorRequirement {
    /// `key=value`
    Equals(String, String),
    /// `key`
    Exists(String),
}

/// Parse a label selector of the form `k1=v1,k2,...`.
///
/// # Errors
///
/// Returns [`ClusterError::Other`] for requirements this parser does not support.
pub fn parse_selector(selector: &str) -> Result<Vec<SelectorRequirement>, ClusterError> {
    selector
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            if part.contains("!=") || part.contains(" in ") || part.starts_with('!') {
                return Err(ClusterError::Other(format!(
                    "Unsupported label selector requirement '{part}'"
                )));
            }
            Ok(match part.split_once('=') {
                Some((key, value)) => SelectorRequirement::Equals(
                    key.trim().to_string(),
                    value.trim_start_matches('=').trim().to_string(),
                ),
                None => SelectorRequirement::Exists(part.to_string()),
            })
        })
        .collect()
}

/// Whether a label map satisfies every requirement.
#[must_use]
pub fn selector_matches(
    requirements: &[SelectorRequirement],
    labels: &std::collections::BTreeMap<String, String>,
) -> bool {
    requirements.iter().all(|requirement| match requirement {
        SelectorRequirement::Equals(key, value) => labels.get(key) == Some(value),
        SelectorRequirement::Exists(key) => labels.contains_key(key),
    })
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod mod_tests;
