use pairlink_core::SessionId;
use tokio::sync::oneshot;

/// Requests from [`SessionHandle`](crate::session::SessionHandle)s to the
/// session actor. The actor acknowledges each once it has been applied.
#[derive(Debug)]
pub enum SessionCommand {
    /// Begin (or restart) negotiating the given session.
    Start {
        session: SessionId,
        reply: oneshot::Sender<()>,
    },

    /// Announce closing, tear everything down and clear signaling state.
    Shutdown { reply: oneshot::Sender<()> },
}
