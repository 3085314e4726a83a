// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Registration sources feeding the service reconciler.
//!
//! A source hands out a point-in-time snapshot of the registered services and a
//! stream of the changes after it. Two sources are provided:
//!
//! - [`ChannelSource`]: in-process, fed through a [`SourceHandle`]; used when the
//!   registration transport runs in the same process, and in tests
//! - [`FileSource`]: a YAML file of registrations, polled for changes

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::constants::{FILE_SOURCE_POLL_SECS, SOURCE_CHANNEL_CAPACITY};
use crate::model::{ReconciliationEvent, ServiceRegistration};

/// Event stream of a subscription.
pub type EventStream = BoxStream<'static, ReconciliationEvent>;

/// Supplies registered services and their changes.
#[async_trait]
pub trait RegistrationSource: Send + Sync {
    /// Snapshot of the registered services, and every change after it.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read.
    async fn subscribe(&self) -> Result<(Vec<ServiceRegistration>, EventStream)>;
}

// ============================================================================
// Channel source
// ============================================================================

/// Publishes events to a [`ChannelSource`].
#[derive(Clone, Debug)]
pub struct SourceHandle {
    sender: mpsc::Sender<ReconciliationEvent>,
}

impl SourceHandle {
    /// Send an event, waiting for buffer space.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscriber has gone away.
    pub async fn publish(&self, event: ReconciliationEvent) -> Result<()> {
        self.sender
            .send(event)
            .await
            .context("Registration subscriber has gone away")
    }
}

/// In-process source backed by a bounded channel.
///
/// The source can be subscribed once; the stream ends when every
/// [`SourceHandle`] has been dropped.
pub struct ChannelSource {
    pending: Mutex<Option<(Vec<ServiceRegistration>, mpsc::Receiver<ReconciliationEvent>)>>,
}

impl ChannelSource {
    /// A source whose snapshot is `initial`, plus the handle feeding it.
    #[must_use]
    pub fn new(initial: Vec<ServiceRegistration>) -> (Self, SourceHandle) {
        let (sender, receiver) = mpsc::channel(SOURCE_CHANNEL_CAPACITY);
        (
            Self {
                pending: Mutex::new(Some((initial, receiver))),
            },
            SourceHandle { sender },
        )
    }
}

#[async_trait]
impl RegistrationSource for ChannelSource {
    async fn subscribe(&self) -> Result<(Vec<ServiceRegistration>, EventStream)> {
        let pending = self
            .pending
            .lock()
            .map_err(|_| anyhow::anyhow!("Channel source lock poisoned"))?
            .take();
        let Some((initial, receiver)) = pending else {
            bail!("Channel source already subscribed");
        };
        let events = stream::unfold(receiver, |mut receiver| async move {
            receiver.recv().await.map(|event| (event, receiver))
        })
        .boxed();
        Ok((initial, events))
    }
}

// ============================================================================
// File source
// ============================================================================

/// Source reading a YAML list of registrations from a file.
///
/// A missing file is an empty registry. The file is re-read every poll interval
/// and the difference to the previous read is emitted as events; a file that
/// fails to parse is skipped until it is valid again.
#[derive(Clone, Debug)]
pub struct FileSource {
    path: PathBuf,
    poll_interval: Duration,
}

impl FileSource {
    /// Source polling `path` at the default interval.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            poll_interval: Duration::from_secs(FILE_SOURCE_POLL_SECS),
        }
    }

    /// Change the poll interval.
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

/// Read a registrations file, keyed by service name.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub async fn read_registrations(path: &Path) -> Result<BTreeMap<String, ServiceRegistration>> {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", path.display()));
        }
    };
    if text.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    let services: Vec<ServiceRegistration> = serde_yaml::from_str(&text)
        .with_context(|| format!("Failed to parse registrations in {}", path.display()))?;
    Ok(services
        .into_iter()
        .map(|service| (service.name.clone(), service))
        .collect())
}

/// Events turning `previous` into `current`.
#[must_use]
pub fn diff_registrations(
    previous: &BTreeMap<String, ServiceRegistration>,
    current: &BTreeMap<String, ServiceRegistration>,
) -> Vec<ReconciliationEvent> {
    let mut events = Vec::new();
    for name in previous.keys() {
        if !current.contains_key(name) {
            events.push(ReconciliationEvent::Deleted { name: name.clone() });
        }
    }
    for (name, service) in current {
        match previous.get(name) {
            None => events.push(ReconciliationEvent::Created(service.clone())),
            Some(old) if old != service => events.push(ReconciliationEvent::Updated(service.clone())),
            Some(_) => {}
        }
    }
    events
}

#[async_trait]
impl RegistrationSource for FileSource {
    async fn subscribe(&self) -> Result<(Vec<ServiceRegistration>, EventStream)> {
        let snapshot = read_registrations(&self.path).await?;
        let initial = snapshot.values().cloned().collect();

        let path = self.path.clone();
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately; the snapshot covers it
        interval.tick().await;

        let events = stream::unfold(
            (snapshot, interval, path),
            |(mut known, mut interval, path)| async move {
                loop {
                    interval.tick().await;
                    match read_registrations(&path).await {
                        Ok(current) => {
                            let events = diff_registrations(&known, &current);
                            known = current;
                            if !events.is_empty() {
                                debug!("{} registration changes in {}", events.len(), path.display());
                                return Some((stream::iter(events), (known, interval, path)));
                            }
                        }
                        Err(e) => warn!("Ignoring unreadable registrations file: {:#}", e),
                    }
                }
            },
        )
        .flatten()
        .boxed();

        Ok((initial, events))
    }
}

#[cfg(test)]
#[path = "source_tests.rs"]
mod source_tests;
