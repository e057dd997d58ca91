use crate::error::SignalingError;
use crate::signaling::{SignalWatch, SignalingStore, StoredSignal};
use async_trait::async_trait;
use dashmap::DashMap;
use pairlink_core::{SignalPath, SignalingMessage};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

/// Process-local signaling store. Used directly when both endpoints share a
/// process and as the backing state of the relay server.
///
/// A key is only tracked while it holds a message or is being observed.
/// Versions come from one store-wide counter, so a key that is dropped and
/// written again never repeats a version an observer has already seen.
#[derive(Clone, Default)]
pub struct InMemorySignalingStore {
    slots: Arc<DashMap<SignalPath, watch::Sender<StoredSignal>>>,
    versions: Arc<AtomicU64>,
}

impl InMemorySignalingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self, path: &SignalPath) -> StoredSignal {
        self.slots
            .get(path)
            .map(|slot| slot.borrow().clone())
            .unwrap_or_default()
    }

    /// Number of keys currently tracked.
    pub fn key_count(&self) -> usize {
        self.slots.len()
    }

    fn next_version(&self) -> u64 {
        self.versions.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Forgets `path` if it holds no message and nobody observes it.
    fn prune(&self, path: &SignalPath) {
        let pruned = self.slots.remove_if(path, |_, slot| {
            slot.receiver_count() == 0 && slot.borrow().message.is_none()
        });
        if pruned.is_some() {
            debug!(%path, "empty signaling key dropped");
        }
    }

    fn subscribe(&self, path: &SignalPath) -> watch::Receiver<StoredSignal> {
        self.slots
            .entry(path.clone())
            .or_insert_with(|| watch::channel(StoredSignal::default()).0)
            .subscribe()
    }

    /// Long-poll helper: resolves as soon as the key's version differs from
    /// `known_version`, or with the unchanged value after `timeout`.
    pub async fn wait_for_change(
        &self,
        path: &SignalPath,
        known_version: u64,
        timeout: Duration,
    ) -> StoredSignal {
        let mut rx = self.subscribe(path);
        let changed = tokio::time::timeout(timeout, async {
            loop {
                if rx.borrow_and_update().version != known_version {
                    return;
                }
                if rx.changed().await.is_err() {
                    return;
                }
            }
        })
        .await;

        if changed.is_err() {
            debug!(%path, known_version, "long-poll timed out without change");
        }
        let current = rx.borrow().clone();
        drop(rx);
        self.prune(path);
        current
    }
}

#[async_trait]
impl SignalingStore for InMemorySignalingStore {
    async fn set(
        &self,
        path: &SignalPath,
        message: &SignalingMessage,
    ) -> Result<(), SignalingError> {
        let version = self.next_version();
        self.slots
            .entry(path.clone())
            .or_insert_with(|| watch::channel(StoredSignal::default()).0)
            .send_modify(|slot| {
                slot.version = version;
                slot.message = Some(message.clone());
            });
        debug!(%path, "signal stored");
        Ok(())
    }

    async fn get(&self, path: &SignalPath) -> Result<Option<SignalingMessage>, SignalingError> {
        Ok(self.snapshot(path).message)
    }

    async fn remove(&self, path: &SignalPath) -> Result<(), SignalingError> {
        if let Some(slot) = self.slots.get(path) {
            slot.send_if_modified(|slot| {
                if slot.message.is_none() {
                    return false;
                }
                slot.version = self.next_version();
                slot.message = None;
                true
            });
        }
        self.prune(path);
        Ok(())
    }

    async fn watch(&self, path: &SignalPath) -> Result<SignalWatch, SignalingError> {
        Ok(SignalWatch::new(path.clone(), self.subscribe(path)))
    }
}
