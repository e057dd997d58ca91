use crate::error::TransportError;
use crate::transport::TransportEvent;
use async_trait::async_trait;
use pairlink_core::{ConnectionId, SignalingMessage};
use std::sync::Arc;
use tokio::sync::mpsc;

/// ICE gathering progress of a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatheringState {
    New,
    Gathering,
    Complete,
}

/// One peer connection plus its command channel.
///
/// Connection state changes, channel lifecycle and inbound messages are not
/// returned from these methods; they are pushed to the event queue the
/// transport was created with.
#[async_trait]
pub trait PeerTransport: Send + Sync + 'static {
    fn connection_id(&self) -> ConnectionId;

    /// Creates the ordered command channel. Only the offerer does this; the
    /// answerer receives the channel from the remote side.
    async fn open_command_channel(&self, label: &str) -> Result<(), TransportError>;

    async fn create_offer(&self) -> Result<SignalingMessage, TransportError>;

    async fn create_answer(&self) -> Result<SignalingMessage, TransportError>;

    async fn set_local_description(&self, desc: SignalingMessage) -> Result<(), TransportError>;

    async fn set_remote_description(&self, desc: SignalingMessage)
    -> Result<(), TransportError>;

    fn gathering_state(&self) -> GatheringState;

    /// Resolves once ICE gathering has completed. Returns immediately when
    /// it already has.
    async fn gathering_complete(&self);

    async fn local_description(&self) -> Option<SignalingMessage>;

    async fn send_text(&self, text: &str) -> Result<(), TransportError>;

    async fn close(&self) -> Result<(), TransportError>;
}

/// Builds transports for a session. Every call must return a brand new
/// transport object; transports are never reused across rebuilds.
#[async_trait]
pub trait TransportFactory: Send + Sync + 'static {
    async fn create(
        &self,
        id: ConnectionId,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Arc<dyn PeerTransport>, TransportError>;
}
