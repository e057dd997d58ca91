mod connect;
mod health;
mod reconnect;
mod session;
mod session_command;
mod session_handle;
mod status;

pub use health::*;
pub use reconnect::*;
pub use session::SessionActor;
pub use session_command::*;
pub use session_handle::*;
pub use status::*;
