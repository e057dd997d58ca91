mod command;
mod connection;
mod session;
mod signaling;
pub mod tokens;

pub use command::CommandFrame;
pub use connection::ConnectionId;
pub use session::{Role, SESSION_ID_LEN, SessionId, SessionIdError};
pub use signaling::{IceServerConfig, SdpType, SignalPath, SignalingMessage};
