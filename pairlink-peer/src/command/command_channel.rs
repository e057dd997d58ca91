use crate::error::SessionError;
use crate::transport::PeerTransport;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Connecting,
    Open,
    Closing,
    Closed,
}

struct ChannelInner {
    transport: Option<Arc<dyn PeerTransport>>,
    state: ChannelState,
}

/// The session's text channel to the peer.
///
/// The session attaches the current transport while it is alive and
/// detaches it on teardown, so components holding this object can never
/// write into a transport that has been replaced.
pub struct CommandChannel {
    inner: RwLock<ChannelInner>,
}

impl CommandChannel {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(ChannelInner {
                transport: None,
                state: ChannelState::Closed,
            }),
        }
    }

    pub async fn state(&self) -> ChannelState {
        self.inner.read().await.state
    }

    pub async fn is_open(&self) -> bool {
        self.state().await == ChannelState::Open
    }

    pub(crate) async fn attach(&self, transport: Arc<dyn PeerTransport>) {
        let mut inner = self.inner.write().await;
        if inner.state == ChannelState::Closed {
            inner.state = ChannelState::Connecting;
        }
        inner.transport = Some(transport);
    }

    pub(crate) async fn mark_open(&self) {
        self.inner.write().await.state = ChannelState::Open;
    }

    pub(crate) async fn mark_closing(&self) {
        let mut inner = self.inner.write().await;
        if inner.state == ChannelState::Open {
            inner.state = ChannelState::Closing;
        }
    }

    pub(crate) async fn mark_closed(&self) {
        self.inner.write().await.state = ChannelState::Closed;
    }

    pub(crate) async fn detach(&self) -> Option<Arc<dyn PeerTransport>> {
        let mut inner = self.inner.write().await;
        inner.state = ChannelState::Closed;
        inner.transport.take()
    }

    /// Sends one text message. Fails with [`SessionError::ChannelClosed`]
    /// unless the channel is open.
    pub async fn send(&self, text: &str) -> Result<(), SessionError> {
        let transport = {
            let inner = self.inner.read().await;
            match (&inner.transport, inner.state) {
                (Some(transport), ChannelState::Open) => Arc::clone(transport),
                _ => return Err(SessionError::ChannelClosed),
            }
        };

        transport.send_text(text).await?;
        debug!(connection = %transport.connection_id(), text, "message sent");
        Ok(())
    }
}

impl Default for CommandChannel {
    fn default() -> Self {
        Self::new()
    }
}
