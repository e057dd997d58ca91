use crate::session::ReconnectionState;
use pairlink_core::{ConnectionId, Role, SessionId};
use std::fmt;

/// Lifecycle of a session as seen by its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Created but never started.
    Idle,
    /// Negotiating, or waiting to retry after a failed attempt.
    Connecting,
    Connected,
    /// Gave up after too many failed attempts. `start` begins again.
    Failed,
    /// Shut down explicitly.
    Closed,
}

impl SessionStatus {
    pub fn is_active(self) -> bool {
        matches!(self, SessionStatus::Connecting | SessionStatus::Connected)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Connecting => "connecting",
            SessionStatus::Connected => "connected",
            SessionStatus::Failed => "failed",
            SessionStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view published on every state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub role: Role,
    pub session: Option<SessionId>,
    pub status: SessionStatus,
    pub reconnection: ReconnectionState,
    /// Id of the transport currently being built or in use.
    pub connection: Option<ConnectionId>,
}

impl SessionSnapshot {
    pub fn new(role: Role, max_attempts: u32) -> Self {
        Self {
            role,
            session: None,
            status: SessionStatus::Idle,
            reconnection: ReconnectionState {
                max_attempts,
                ..Default::default()
            },
            connection: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status == SessionStatus::Connected
    }
}
