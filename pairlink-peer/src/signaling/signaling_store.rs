use crate::error::SignalingError;
use async_trait::async_trait;
use pairlink_core::{SignalPath, SignalingMessage};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

/// Value of one signaling key together with its write counter.
///
/// `version` increases on every write or removal so observers can tell a
/// rewrite of identical content from no change at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSignal {
    pub version: u64,
    pub message: Option<SignalingMessage>,
}

/// Rendezvous mailbox shared by both endpoints of a session.
///
/// Keys are last-write-wins; nothing beyond that is assumed about ordering.
#[async_trait]
pub trait SignalingStore: Send + Sync + 'static {
    async fn set(&self, path: &SignalPath, message: &SignalingMessage)
    -> Result<(), SignalingError>;

    async fn get(&self, path: &SignalPath) -> Result<Option<SignalingMessage>, SignalingError>;

    async fn remove(&self, path: &SignalPath) -> Result<(), SignalingError>;

    /// Observe a key. The returned watch starts at the key's current value.
    async fn watch(&self, path: &SignalPath) -> Result<SignalWatch, SignalingError>;
}

/// Push-notified view of one signaling key.
pub struct SignalWatch {
    path: SignalPath,
    rx: watch::Receiver<StoredSignal>,
}

impl SignalWatch {
    pub fn new(path: SignalPath, rx: watch::Receiver<StoredSignal>) -> Self {
        Self { path, rx }
    }

    pub fn current(&self) -> StoredSignal {
        self.rx.borrow().clone()
    }

    /// Waits until the key holds a message accepted by `accept`. The current
    /// value is checked first, so a message written before the watch was
    /// opened is not missed.
    pub async fn wait_for<F>(&mut self, mut accept: F) -> Result<SignalingMessage, SignalingError>
    where
        F: FnMut(&SignalingMessage) -> bool + Send,
    {
        loop {
            let found = {
                let current = self.rx.borrow_and_update();
                current.message.as_ref().filter(|msg| accept(msg)).cloned()
            };
            if let Some(msg) = found {
                return Ok(msg);
            }

            if self.rx.changed().await.is_err() {
                debug!(path = %self.path, "signaling watch closed");
                return Err(SignalingError::WatchClosed);
            }
        }
    }
}
