use crate::command::{CommandChannel, CommandDispatcher, StatusSink};
use crate::session::HealthCheckMonitor;
use bytes::Bytes;
use pairlink_core::tokens::{self, ControlToken};
use pairlink_core::{CommandFrame, Role};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// What happened to one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
    /// A ping, pong or closing token, handled without the dispatcher.
    Control(ControlToken),
    /// Handed to subscribers only; no dispatcher is installed.
    Delivered,
    /// An acknowledgment or status from the peer. Handed to subscribers
    /// only and never answered.
    Reply,
    Dispatched,
    Unknown,
    Failed,
}

/// Turns inbound channel messages into control handling, subscriber
/// notifications and dispatcher calls.
///
/// Messages are handled one at a time in arrival order; the session feeds
/// them from a single task.
pub struct CommandRouter {
    role: Role,
    channel: Arc<CommandChannel>,
    health: Arc<HealthCheckMonitor>,
    dispatcher: Option<Arc<dyn CommandDispatcher>>,
    inbound_tx: broadcast::Sender<String>,
    armed: AtomicBool,
}

impl CommandRouter {
    pub fn new(
        role: Role,
        channel: Arc<CommandChannel>,
        health: Arc<HealthCheckMonitor>,
        dispatcher: Option<Arc<dyn CommandDispatcher>>,
        inbound_tx: broadcast::Sender<String>,
    ) -> Self {
        Self {
            role,
            channel,
            health,
            dispatcher,
            inbound_tx,
            armed: AtomicBool::new(false),
        }
    }

    /// Commands reach the dispatcher only while the session is connected.
    pub fn set_armed(&self, armed: bool) {
        self.armed.store(armed, Ordering::Release);
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    pub async fn handle_message(&self, raw: &Bytes) -> Routed {
        // Any traffic from the peer proves the link is alive.
        self.health.record_inbound();

        let text = String::from_utf8_lossy(raw);
        let frame = CommandFrame::parse(&text);

        if let Some(token) = ControlToken::classify(self.role, &frame.command) {
            self.handle_control(token).await;
            return Routed::Control(token);
        }

        // Nobody listening is fine.
        let _ = self.inbound_tx.send(text.trim().to_owned());

        if tokens::is_reply(&frame.command) {
            debug!(reply = %frame.command, "reply received");
            return Routed::Reply;
        }

        let Some(dispatcher) = self.dispatcher.as_ref() else {
            return Routed::Delivered;
        };

        if frame.is_empty() || !dispatcher.supports(&frame.command) {
            info!(command = %frame.command, "Unknown command");
            self.reply(&tokens::unknown_command(&frame.command)).await;
            return Routed::Unknown;
        }

        if !self.is_armed() {
            warn!(command = %frame.command, "Command arrived before the session was connected");
            self.reply(&tokens::command_error(&frame.command, "not connected"))
                .await;
            return Routed::Failed;
        }

        self.dispatch(Arc::clone(dispatcher), frame).await
    }

    async fn handle_control(&self, token: ControlToken) {
        match token {
            ControlToken::Ping => self.reply(&tokens::pong(self.role)).await,
            ControlToken::Pong => debug!("pong received"),
            ControlToken::PeerClosing => info!("peer announced it is closing"),
        }
    }

    async fn dispatch(&self, dispatcher: Arc<dyn CommandDispatcher>, frame: CommandFrame) -> Routed {
        let command = frame.command.clone();
        let sink = StatusSink::new(Arc::clone(&self.channel));

        debug!(command = %command, args = ?frame.args, "dispatching command");

        // Run the handler in its own task so a panic surfaces as a JoinError
        // instead of taking the router down.
        let task = tokio::spawn({
            let sink = sink.clone();
            async move { dispatcher.dispatch(frame, sink).await }
        });

        match task.await {
            Ok(Ok(())) => {
                if sink.sent() == 0 {
                    warn!(command = %command, "Handler finished without acknowledging");
                }
                Routed::Dispatched
            }
            Ok(Err(e)) => {
                warn!(command = %command, "Command failed: {}", e);
                self.reply(&tokens::command_error(&command, &e.detail)).await;
                Routed::Failed
            }
            Err(e) => {
                error!(command = %command, "Command handler crashed: {:?}", e);
                self.reply(&tokens::command_error(&command, "handler crashed"))
                    .await;
                Routed::Failed
            }
        }
    }

    async fn reply(&self, text: &str) {
        if let Err(e) = self.channel.send(text).await {
            warn!(reply = text, "Failed to reply: {}", e);
        }
    }
}
