use crate::command::CommandChannel;
use crate::error::CommandError;
use async_trait::async_trait;
use pairlink_core::CommandFrame;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::warn;

/// Feature layer behind the command channel (camera, microphone, ...).
///
/// For every dispatched command the implementation must send exactly one
/// acknowledgment or status through the [`StatusSink`] it is given
/// (`CAMERA_STARTED`, `CAMERA_ERROR: busy`, ...). Returning an error instead
/// makes the session send a `COMMAND_ERROR` acknowledgment on its behalf, so
/// an implementation that fails must not have acknowledged yet.
#[async_trait]
pub trait CommandDispatcher: Send + Sync + 'static {
    /// Whether `command` is in this dispatcher's command table.
    fn supports(&self, command: &str) -> bool;

    async fn dispatch(&self, frame: CommandFrame, status: StatusSink) -> Result<(), CommandError>;

    /// Called when the connection the commands arrived on is torn down.
    /// Feature controllers bound to it should be released here.
    async fn on_teardown(&self) {}
}

/// Path for a handler's status messages back to the peer.
#[derive(Clone)]
pub struct StatusSink {
    channel: Arc<CommandChannel>,
    sent: Arc<AtomicUsize>,
}

impl StatusSink {
    pub fn new(channel: Arc<CommandChannel>) -> Self {
        Self {
            channel,
            sent: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Forwards `message` verbatim. A status sent while the channel is
    /// closed is lost; that is logged, not returned.
    pub async fn send_status(&self, message: impl Into<String> + Send) {
        let message = message.into();
        self.sent.fetch_add(1, Ordering::Relaxed);
        if let Err(e) = self.channel.send(&message).await {
            warn!(status = %message, "Status message lost: {}", e);
        }
    }

    /// Number of statuses sent through this sink so far.
    pub fn sent(&self) -> usize {
        self.sent.load(Ordering::Relaxed)
    }
}
