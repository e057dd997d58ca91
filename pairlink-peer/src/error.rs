use std::time::Duration;
use thiserror::Error;

/// Failures of the underlying peer transport (ICE/DTLS/SCTP).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error(transparent)]
    WebRtc(#[from] webrtc::Error),

    #[error("command channel has not been created")]
    NoCommandChannel,

    #[error("command channel is not open")]
    ChannelNotOpen,

    #[error("transport is closed")]
    Closed,

    /// Failure reported by a custom [`PeerTransport`] or
    /// [`TransportFactory`] implementation.
    ///
    /// [`PeerTransport`]: crate::transport::PeerTransport
    /// [`TransportFactory`]: crate::transport::TransportFactory
    #[error("{0}")]
    Other(String),
}

/// Failures talking to the signaling store.
#[derive(Debug, Error)]
pub enum SignalingError {
    #[error("signaling request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("signaling relay answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed signaling payload: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("signaling watch closed")]
    WatchClosed,
}

/// Failures while producing or applying a non-trickle description.
#[derive(Debug, Error)]
pub enum NegotiationError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("ICE gathering did not complete within {0:?}")]
    GatheringTimeout(Duration),

    #[error("local description read back before ICE gathering completed")]
    IncompleteGathering,

    #[error("transport has no local description")]
    MissingLocalDescription,

    #[error("expected {expected} description, got {actual}")]
    UnexpectedType {
        expected: pairlink_core::SdpType,
        actual: pairlink_core::SdpType,
    },
}

/// Errors surfaced by a session and its connect attempts.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Signaling(#[from] SignalingError),

    #[error(transparent)]
    Negotiation(#[from] NegotiationError),

    #[error("command channel is closed")]
    ChannelClosed,

    #[error("peer did not answer within {0:?}")]
    AnswerTimeout(Duration),

    #[error("connection not established within {0:?}")]
    ConnectTimeout(Duration),

    #[error("transport reported {0} while connecting")]
    TransportLost(&'static str),

    #[error("operation cancelled")]
    Cancelled,

    #[error("session actor has stopped")]
    ActorGone,
}

/// Error reported by a command handler. The detail becomes the human
/// readable suffix of the error acknowledgment.
#[derive(Debug, Error)]
#[error("{detail}")]
pub struct CommandError {
    pub detail: String,
}

impl CommandError {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}
