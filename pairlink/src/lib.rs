pub use pairlink_core::model::{CommandFrame, Role, SessionId};

pub mod core {
    pub use pairlink_core::model::*;
}

pub mod peer {
    pub use pairlink_peer::*;
}

#[cfg(feature = "relay")]
pub mod relay {
    pub use pairlink_relay::*;
}
