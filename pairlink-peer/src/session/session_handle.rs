use crate::command::{CommandChannel, CommandDispatcher, CommandRouter};
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::session::session::{SessionActor, SessionParts};
use crate::session::{HealthCheckMonitor, SessionCommand, SessionSnapshot, SessionStatus};
use crate::signaling::SignalingStore;
use crate::transport::{TransportFactory, WebRtcTransportFactory};
use pairlink_core::{CommandFrame, Role, SessionId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::info;

/// Assembles a session and spawns its actor.
pub struct SessionBuilder {
    role: Role,
    store: Arc<dyn SignalingStore>,
    config: SessionConfig,
    factory: Option<Arc<dyn TransportFactory>>,
    dispatcher: Option<Arc<dyn CommandDispatcher>>,
}

impl SessionBuilder {
    pub fn new(role: Role, store: Arc<dyn SignalingStore>) -> Self {
        Self {
            role,
            store,
            config: SessionConfig::default(),
            factory: None,
            dispatcher: None,
        }
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Defaults to WebRTC transports built from the config's ICE servers.
    pub fn with_transport_factory(mut self, factory: Arc<dyn TransportFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn CommandDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Spawns the session actor on the current runtime. The session stays
    /// idle until [`SessionHandle::start`] is called.
    pub fn spawn(self) -> SessionHandle {
        let factory = self.factory.unwrap_or_else(|| {
            Arc::new(WebRtcTransportFactory::new(self.config.transport.clone()))
        });

        let (command_tx, command_rx) = mpsc::channel(32);
        let (snapshot_tx, snapshot_rx) =
            watch::channel(SessionSnapshot::new(self.role, self.config.max_attempts));
        let (inbound_tx, _) = broadcast::channel(256);

        let channel = Arc::new(CommandChannel::new());
        let health = Arc::new(HealthCheckMonitor::new());
        let router = Arc::new(CommandRouter::new(
            self.role,
            Arc::clone(&channel),
            Arc::clone(&health),
            self.dispatcher.clone(),
            inbound_tx.clone(),
        ));

        info!(role = %self.role, "Creating session");
        let actor = SessionActor::new(SessionParts {
            role: self.role,
            config: Arc::new(self.config),
            factory,
            store: self.store,
            dispatcher: self.dispatcher,
            channel: Arc::clone(&channel),
            health: Arc::clone(&health),
            router,
            command_rx,
            snapshot_tx,
        });
        tokio::spawn(actor.run());

        SessionHandle {
            role: self.role,
            command_tx,
            snapshot_rx,
            inbound_tx,
            channel,
            health,
        }
    }
}

/// Cloneable control surface of a running session. The session shuts down
/// once every handle has been dropped.
#[derive(Clone)]
pub struct SessionHandle {
    role: Role,
    command_tx: mpsc::Sender<SessionCommand>,
    snapshot_rx: watch::Receiver<SessionSnapshot>,
    inbound_tx: broadcast::Sender<String>,
    channel: Arc<CommandChannel>,
    health: Arc<HealthCheckMonitor>,
}

impl SessionHandle {
    pub fn role(&self) -> Role {
        self.role
    }

    /// Begins negotiating `session`. Calling it again for a session that is
    /// already connecting or connected does nothing.
    pub async fn start(&self, session: SessionId) -> Result<(), SessionError> {
        let (reply, done) = oneshot::channel();
        self.command_tx
            .send(SessionCommand::Start { session, reply })
            .await
            .map_err(|_| SessionError::ActorGone)?;
        done.await.map_err(|_| SessionError::ActorGone)
    }

    /// Always safe to call, including before `start` and more than once.
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        let (reply, done) = oneshot::channel();
        if self
            .command_tx
            .send(SessionCommand::Shutdown { reply })
            .await
            .is_err()
        {
            // The actor already shut down on its own.
            return Ok(());
        }
        let _ = done.await;
        Ok(())
    }

    pub async fn send(&self, frame: &CommandFrame) -> Result<(), SessionError> {
        self.channel.send(&frame.to_wire()).await
    }

    pub async fn send_text(&self, text: &str) -> Result<(), SessionError> {
        self.channel.send(text).await
    }

    /// Messages from the peer other than ping/pong/closing tokens.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.inbound_tx.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.snapshot_rx.borrow().status
    }

    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Waits until a published snapshot satisfies `accept`.
    pub async fn wait_until<F>(&self, accept: F) -> Result<SessionSnapshot, SessionError>
    where
        F: FnMut(&SessionSnapshot) -> bool,
    {
        let mut rx = self.snapshot_rx.clone();
        let snapshot = rx
            .wait_for(accept)
            .await
            .map_err(|_| SessionError::ActorGone)?;
        Ok(snapshot.clone())
    }

    pub async fn is_channel_open(&self) -> bool {
        self.channel.is_open().await
    }

    pub fn time_since_last_pong(&self) -> Option<Duration> {
        self.health.time_since_last_pong()
    }

    pub fn last_pong_at_ms(&self) -> Option<u64> {
        self.health.last_pong_at_ms()
    }
}
