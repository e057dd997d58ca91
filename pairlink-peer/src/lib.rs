//! Reconnecting peer-to-peer sessions between an offerer and an answerer.
//!
//! A session negotiates one WebRTC connection through a [`SignalingStore`],
//! carries text commands over an ordered data channel, and rebuilds the
//! connection from scratch whenever it dies.
//!
//! [`SignalingStore`]: signaling::SignalingStore

pub mod command;
pub mod config;
pub mod error;
pub mod negotiation;
pub mod session;
pub mod signaling;
pub mod transport;

pub use command::{CommandDispatcher, StatusSink};
pub use config::{BackoffPolicy, HealthConfig, SessionConfig};
pub use error::{CommandError, NegotiationError, SessionError, SignalingError, TransportError};
pub use session::{SessionBuilder, SessionHandle, SessionSnapshot, SessionStatus};
