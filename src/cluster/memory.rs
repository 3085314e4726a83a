// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory [`ClusterApi`] for reconciler tests.
//!
//! Objects are stored in their JSON form keyed by `(kind, namespace, name)`.
//! Label selectors, merge-patch and 404 semantics follow the API server closely
//! enough for the reconcilers; writes can be made to fail on demand.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::broadcast;

use super::{kind_of, parse_selector, selector_matches, ClusterApi, ClusterObject};
use crate::errors::ClusterError;

type Key = (String, String, String);

#[derive(Default)]
struct State {
    objects: BTreeMap<Key, Value>,
    ingress_classes: BTreeMap<String, String>,
    failing_names: BTreeSet<String>,
    writes: BTreeMap<Key, usize>,
}

/// Shared in-memory cluster; clones see the same state.
#[derive(Clone)]
pub(crate) struct MemoryCluster {
    state: Arc<Mutex<State>>,
    changes: broadcast::Sender<Key>,
}

impl Default for MemoryCluster {
    fn default() -> Self {
        let (changes, _) = broadcast::channel(1024);
        Self {
            state: Arc::new(Mutex::new(State::default())),
            changes,
        }
    }
}

fn key_for<K: ClusterObject>(namespace: &str, name: &str) -> Key {
    (kind_of::<K>(), namespace.to_string(), name.to_string())
}

fn to_value<K: ClusterObject>(object: &K) -> Result<Value, ClusterError> {
    serde_json::to_value(object).map_err(|source| ClusterError::Serialization {
        kind: kind_of::<K>(),
        source,
    })
}

fn from_value<K: ClusterObject>(value: Value) -> Result<K, ClusterError> {
    serde_json::from_value(value).map_err(|source| ClusterError::Serialization {
        kind: kind_of::<K>(),
        source,
    })
}

fn labels_of(value: &Value) -> BTreeMap<String, String> {
    value["metadata"]["labels"]
        .as_object()
        .map(|labels| {
            labels
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

/// RFC 7386 JSON merge patch.
fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(serde_json::Map::new());
    }
    if let Value::Object(target) = target {
        for (key, value) in patch {
            if value.is_null() {
                target.remove(key);
            } else {
                merge_patch(target.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}

impl MemoryCluster {
    /// Register an `IngressClass` with the given controller.
    pub(crate) fn add_ingress_class(&self, name: &str, controller: &str) {
        self.lock()
            .ingress_classes
            .insert(name.to_string(), controller.to_string());
    }

    /// Make every write to an object with this name fail.
    pub(crate) fn fail_writes_to(&self, name: &str) {
        self.lock().failing_names.insert(name.to_string());
    }

    /// Insert an object directly, bypassing failure injection.
    pub(crate) fn insert<K: ClusterObject>(&self, namespace: &str, object: &K) {
        let name = object.meta().name.clone().unwrap_or_default();
        let key = key_for::<K>(namespace, &name);
        let value = to_value(object).expect("test object serializes");
        self.lock().objects.insert(key.clone(), value);
        let _ = self.changes.send(key);
    }

    /// Read an object, `None` when absent.
    pub(crate) fn get<K: ClusterObject>(&self, namespace: &str, name: &str) -> Option<K> {
        let value = self.lock().objects.get(&key_for::<K>(namespace, name)).cloned()?;
        Some(from_value(value).expect("stored object deserializes"))
    }

    /// Names of every stored object of a kind in a namespace.
    pub(crate) fn names<K: ClusterObject>(&self, namespace: &str) -> Vec<String> {
        let kind = kind_of::<K>();
        self.lock()
            .objects
            .keys()
            .filter(|(k, ns, _)| *k == kind && ns == namespace)
            .map(|(_, _, name)| name.clone())
            .collect()
    }

    /// Number of successful writes to an object.
    pub(crate) fn write_count<K: ClusterObject>(&self, namespace: &str, name: &str) -> usize {
        self.lock()
            .writes
            .get(&key_for::<K>(namespace, name))
            .copied()
            .unwrap_or(0)
    }

    /// Snapshot of every stored object, for whole-state comparisons.
    pub(crate) fn snapshot(&self) -> BTreeMap<Key, Value> {
        self.lock().objects.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("memory cluster lock poisoned")
    }

    fn write(&self, key: Key, value: Value) -> Result<(), ClusterError> {
        {
            let mut state = self.lock();
            if state.failing_names.contains(&key.2) {
                return Err(ClusterError::Other(format!(
                    "injected failure writing {} '{}'",
                    key.0, key.2
                )));
            }
            state.objects.insert(key.clone(), value);
            *state.writes.entry(key.clone()).or_default() += 1;
        }
        let _ = self.changes.send(key);
        Ok(())
    }

    fn remove(&self, key: &Key) {
        let removed = self.lock().objects.remove(key).is_some();
        if removed {
            let _ = self.changes.send(key.clone());
        }
    }
}

#[async_trait]
impl ClusterApi for MemoryCluster {
    async fn fetch<K: ClusterObject>(&self, namespace: &str, name: &str) -> Result<K, ClusterError> {
        let value = self
            .lock()
            .objects
            .get(&key_for::<K>(namespace, name))
            .cloned()
            .ok_or_else(|| ClusterError::NotFound {
                kind: kind_of::<K>(),
                name: name.to_string(),
            })?;
        from_value(value)
    }

    async fn create_or_replace<K: ClusterObject>(
        &self,
        namespace: &str,
        object: &K,
    ) -> Result<(), ClusterError> {
        let name = object
            .meta()
            .name
            .clone()
            .ok_or_else(|| ClusterError::Other("object must have a name".into()))?;
        let mut value = to_value(object)?;
        value["metadata"]["namespace"] = Value::String(namespace.to_string());
        self.write(key_for::<K>(namespace, &name), value)
    }

    async fn create_or_patch<K: ClusterObject>(
        &self,
        namespace: &str,
        object: &K,
    ) -> Result<(), ClusterError> {
        let name = object
            .meta()
            .name
            .clone()
            .ok_or_else(|| ClusterError::Other("object must have a name".into()))?;
        let key = key_for::<K>(namespace, &name);
        let patch = to_value(object)?;
        let mut value = self
            .lock()
            .objects
            .get(&key)
            .cloned()
            .unwrap_or(Value::Object(serde_json::Map::new()));
        merge_patch(&mut value, &patch);
        value["metadata"]["namespace"] = Value::String(namespace.to_string());
        self.write(key, value)
    }

    async fn delete<K: ClusterObject>(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        self.remove(&key_for::<K>(namespace, name));
        Ok(())
    }

    async fn delete_all<K: ClusterObject>(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<(), ClusterError> {
        let requirements = parse_selector(selector)?;
        let kind = kind_of::<K>();
        let doomed: Vec<Key> = self
            .lock()
            .objects
            .iter()
            .filter(|((k, ns, _), value)| {
                *k == kind && ns == namespace && selector_matches(&requirements, &labels_of(value))
            })
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            self.remove(key);
        }
        Ok(())
    }

    async fn list<K: ClusterObject>(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<K>, ClusterError> {
        let requirements = parse_selector(selector)?;
        let kind = kind_of::<K>();
        let values: Vec<Value> = self
            .lock()
            .objects
            .iter()
            .filter(|((k, ns, _), value)| {
                *k == kind && ns == namespace && selector_matches(&requirements, &labels_of(value))
            })
            .map(|(_, value)| value.clone())
            .collect();
        values.into_iter().map(from_value::<K>).collect()
    }

    fn watch_one<K: ClusterObject>(
        &self,
        namespace: &str,
        name: &str,
    ) -> BoxStream<'static, Result<Option<K>, ClusterError>> {
        let key = key_for::<K>(namespace, name);
        // Subscribe before reading the initial state so no change is missed
        let receiver = self.changes.subscribe();
        let current = self.lock().objects.get(&key).cloned();
        let initial = stream::once(async move { current.map(from_value::<K>).transpose() });

        let state = Arc::clone(&self.state);
        let changes = stream::unfold(receiver, move |mut receiver| {
            let key = key.clone();
            let state = Arc::clone(&state);
            async move {
                loop {
                    match receiver.recv().await {
                        Ok(changed) if changed == key => {
                            let value = state
                                .lock()
                                .expect("memory cluster lock poisoned")
                                .objects
                                .get(&key)
                                .cloned();
                            return Some((value.map(from_value::<K>).transpose(), receiver));
                        }
                        Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                        Err(broadcast::error::RecvError::Closed) => return None,
                    }
                }
            }
        });

        initial.chain(changes).boxed()
    }

    async fn ingress_class_controller(&self, class_name: &str) -> Result<String, ClusterError> {
        self.lock()
            .ingress_classes
            .get(class_name)
            .cloned()
            .ok_or_else(|| ClusterError::NotFound {
                kind: "IngressClass".to_string(),
                name: class_name.to_string(),
            })
    }
}
