// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! [`ClusterApi`] against a real API server.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use k8s_openapi::api::networking::v1::IngressClass;
use kube::api::{DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, Client, ResourceExt};
use tracing::{debug, info};

use super::{kind_of, ClusterApi, ClusterObject};
use crate::constants::FIELD_MANAGER;
use crate::errors::ClusterError;

/// Cluster object API backed by a `kube::Client`.
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    /// Wrap a Kubernetes client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K: ClusterObject>(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn object_name<K: ClusterObject>(object: &K) -> Result<String, ClusterError> {
    object
        .meta()
        .name
        .clone()
        .ok_or_else(|| ClusterError::Other(format!("{} must have a name", kind_of::<K>())))
}

fn is_conflict(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(response) if response.code == 409)
}

fn is_missing(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(response) if response.code == 404)
}

#[async_trait]
impl ClusterApi for KubeCluster {
    async fn fetch<K: ClusterObject>(&self, namespace: &str, name: &str) -> Result<K, ClusterError> {
        self.api::<K>(namespace)
            .get_opt(name)
            .await?
            .ok_or_else(|| ClusterError::NotFound {
                kind: kind_of::<K>(),
                name: name.to_string(),
            })
    }

    async fn create_or_replace<K: ClusterObject>(
        &self,
        namespace: &str,
        object: &K,
    ) -> Result<(), ClusterError> {
        let name = object_name(object)?;
        let api = self.api::<K>(namespace);

        debug!(
            namespace = %namespace,
            name = %name,
            kind = %kind_of::<K>(),
            "Creating or replacing resource"
        );

        if let Some(existing) = api.get_opt(&name).await? {
            // Replace against the version we read so a concurrent writer surfaces as a conflict
            let mut object = object.clone();
            object.meta_mut().resource_version = existing.resource_version();
            info!("Replacing {} {}/{}", kind_of::<K>(), namespace, name);
            api.replace(&name, &PostParams::default(), &object).await?;
        } else {
            info!("Creating {} {}/{}", kind_of::<K>(), namespace, name);
            api.create(&PostParams::default(), object).await?;
        }

        Ok(())
    }

    async fn create_or_patch<K: ClusterObject>(
        &self,
        namespace: &str,
        object: &K,
    ) -> Result<(), ClusterError> {
        let name = object_name(object)?;
        let api = self.api::<K>(namespace);

        match api.create(&PostParams::default(), object).await {
            Ok(_) => {
                info!("Created {} {}/{}", kind_of::<K>(), namespace, name);
                Ok(())
            }
            Err(e) if is_conflict(&e) => {
                debug!(
                    "{} {}/{} already exists, patching",
                    kind_of::<K>(),
                    namespace,
                    name
                );
                api.patch(
                    &name,
                    &PatchParams {
                        field_manager: Some(FIELD_MANAGER.to_string()),
                        ..PatchParams::default()
                    },
                    &Patch::Merge(object),
                )
                .await?;
                info!("Patched {} {}/{}", kind_of::<K>(), namespace, name);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete<K: ClusterObject>(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        match self
            .api::<K>(namespace)
            .delete(name, &DeleteParams::default())
            .await
        {
            Ok(_) => {
                info!("Deleted {} {}/{}", kind_of::<K>(), namespace, name);
                Ok(())
            }
            Err(e) if is_missing(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_all<K: ClusterObject>(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<(), ClusterError> {
        // Not every kind supports deletecollection (e.g. Service), so delete one by one
        for object in self.list::<K>(namespace, selector).await? {
            self.delete::<K>(namespace, &object.name_any()).await?;
        }
        Ok(())
    }

    async fn list<K: ClusterObject>(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<K>, ClusterError> {
        let list = self
            .api::<K>(namespace)
            .list(&ListParams::default().labels(selector))
            .await?;
        Ok(list.items)
    }

    fn watch_one<K: ClusterObject>(
        &self,
        namespace: &str,
        name: &str,
    ) -> BoxStream<'static, Result<Option<K>, ClusterError>> {
        // Errors are still yielded, but reconnects back off instead of spinning
        watcher::watch_object(self.api::<K>(namespace), name)
            .default_backoff()
            .map_err(ClusterError::from)
            .boxed()
    }

    async fn ingress_class_controller(&self, class_name: &str) -> Result<String, ClusterError> {
        let api: Api<IngressClass> = Api::all(self.client.clone());
        let class = api
            .get_opt(class_name)
            .await?
            .ok_or_else(|| ClusterError::NotFound {
                kind: "IngressClass".to_string(),
                name: class_name.to_string(),
            })?;
        class
            .spec
            .and_then(|spec| spec.controller)
            .ok_or_else(|| {
                ClusterError::Other(format!("IngressClass '{class_name}' has no controller"))
            })
    }
}

#[cfg(test)]
#[path = "kube_api_tests.rs"]
mod kube_api_tests;
