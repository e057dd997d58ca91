mod command_channel;
mod command_router;
mod dispatcher;

pub use command_channel::*;
pub use command_router::*;
pub use dispatcher::*;
