use bytes::Bytes;
use pairlink_core::ConnectionId;

/// Everything a transport reports to its session, delivered through one
/// queue so the session actor can match on it in order.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// ICE/DTLS negotiation is in progress.
    Connecting(ConnectionId),

    Connected(ConnectionId),

    Disconnected(ConnectionId),

    Failed(ConnectionId),

    Closed(ConnectionId),

    /// The command channel is open and can carry messages.
    ChannelOpen(ConnectionId),

    ChannelClosed(ConnectionId),

    /// A message arrived on the command channel.
    Message(ConnectionId, Bytes),

    /// Bytes queued in the command channel after a send.
    BufferedAmountChanged(ConnectionId, usize),
}

impl TransportEvent {
    pub fn connection(&self) -> ConnectionId {
        match self {
            TransportEvent::Connecting(id)
            | TransportEvent::Connected(id)
            | TransportEvent::Disconnected(id)
            | TransportEvent::Failed(id)
            | TransportEvent::Closed(id)
            | TransportEvent::ChannelOpen(id)
            | TransportEvent::ChannelClosed(id)
            | TransportEvent::Message(id, _)
            | TransportEvent::BufferedAmountChanged(id, _) => *id,
        }
    }

    /// Name used in logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            TransportEvent::Connecting(_) => "connecting",
            TransportEvent::Connected(_) => "connected",
            TransportEvent::Disconnected(_) => "disconnected",
            TransportEvent::Failed(_) => "failed",
            TransportEvent::Closed(_) => "closed",
            TransportEvent::ChannelOpen(_) => "channel-open",
            TransportEvent::ChannelClosed(_) => "channel-closed",
            TransportEvent::Message(..) => "message",
            TransportEvent::BufferedAmountChanged(..) => "buffered-amount",
        }
    }
}
