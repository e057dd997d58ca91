//! Status and control tokens exchanged over the command channel.
//!
//! The core only interprets ping/pong/closing tokens; feature tokens are
//! produced by dispatcher implementations through the helpers below.

use crate::model::session::Role;

pub const UNKNOWN_COMMAND: &str = "UNKNOWN_COMMAND";
pub const COMMAND_ERROR: &str = "COMMAND_ERROR";

/// Ping sent to the endpoint with the given role (`PING_CHILD`).
pub fn ping(target: Role) -> String {
    format!("PING_{}", target.wire_label())
}

/// Reply from the pinged endpoint (`PONG_CHILD`).
pub fn pong(responder: Role) -> String {
    format!("PONG_{}", responder.wire_label())
}

/// Announcement that the endpoint is shutting down (`PARENT_CLOSING`).
pub fn closing(sender: Role) -> String {
    format!("{}_CLOSING", sender.wire_label())
}

pub fn unknown_command(command: &str) -> String {
    format!("{UNKNOWN_COMMAND}: {command}")
}

pub fn command_error(command: &str, detail: &str) -> String {
    format!("{COMMAND_ERROR}: {command}: {}", single_line(detail))
}

pub fn started(feature: &str) -> String {
    format!("{feature}_STARTED")
}

pub fn stopped(feature: &str) -> String {
    format!("{feature}_STOPPED")
}

pub fn permission_requested(feature: &str) -> String {
    format!("{feature}_PERMISSION_REQUESTED")
}

pub fn error(feature: &str, detail: &str) -> String {
    format!("{feature}_ERROR: {}", single_line(detail))
}

const STATUS_SUFFIXES: [&str; 4] = ["_STARTED", "_STOPPED", "_PERMISSION_REQUESTED", "_ERROR"];

/// Whether `token` is an acknowledgment or status rather than a command.
/// Replies are delivered to subscribers but never answered.
pub fn is_reply(token: &str) -> bool {
    if token.starts_with(UNKNOWN_COMMAND) || token.starts_with(COMMAND_ERROR) {
        return true;
    }
    let head = token.split(':').next().unwrap_or_default().trim();
    STATUS_SUFFIXES
        .iter()
        .any(|suffix| head.len() > suffix.len() && head.ends_with(suffix))
}

// Error suffixes are human readable text, never multi-line traces.
fn single_line(detail: &str) -> String {
    detail.lines().next().unwrap_or_default().trim().to_owned()
}

/// Control tokens the core handles itself, from the point of view of `local`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlToken {
    /// The peer pings us; we must answer with our pong.
    Ping,
    /// The peer answered our ping.
    Pong,
    /// The peer announced it is going away.
    PeerClosing,
}

impl ControlToken {
    pub fn classify(local: Role, token: &str) -> Option<Self> {
        let peer = local.peer();
        if token == ping(local) {
            Some(ControlToken::Ping)
        } else if token == pong(peer) {
            Some(ControlToken::Pong)
        } else if token == closing(peer) {
            Some(ControlToken::PeerClosing)
        } else {
            None
        }
    }
}
