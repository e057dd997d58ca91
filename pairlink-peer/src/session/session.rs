use crate::command::{CommandChannel, CommandDispatcher, CommandRouter, Routed};
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::session::connect::{ConnectJob, Internal};
use crate::session::{
    HealthCheckMonitor, HealthOutcome, ReconnectionSupervisor, RetryDecision, SessionCommand,
    SessionSnapshot, SessionStatus,
};
use crate::signaling::SignalingStore;
use crate::transport::{PeerTransport, TransportEvent, TransportFactory};
use bytes::Bytes;
use pairlink_core::tokens::{self, ControlToken};
use pairlink_core::{ConnectionId, Role, SessionId, SignalPath};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{Sleep, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Everything the actor shares with the handles it was spawned with.
pub(crate) struct SessionParts {
    pub role: Role,
    pub config: Arc<SessionConfig>,
    pub factory: Arc<dyn TransportFactory>,
    pub store: Arc<dyn SignalingStore>,
    pub dispatcher: Option<Arc<dyn CommandDispatcher>>,
    pub channel: Arc<CommandChannel>,
    pub health: Arc<HealthCheckMonitor>,
    pub router: Arc<CommandRouter>,
    pub command_rx: mpsc::Receiver<SessionCommand>,
    pub snapshot_tx: watch::Sender<SessionSnapshot>,
}

/// Owner of one peer-to-peer session.
///
/// All connection state lives here and is only touched from [`run`], so
/// transport callbacks, timers and caller requests are applied one at a time.
/// Background work (connect attempts, retries, pings) runs in spawned tasks
/// that report back through the internal queue and are cancelled through a
/// token derived from the session scope.
///
/// [`run`]: SessionActor::run
pub struct SessionActor {
    role: Role,
    config: Arc<SessionConfig>,
    factory: Arc<dyn TransportFactory>,
    store: Arc<dyn SignalingStore>,
    dispatcher: Option<Arc<dyn CommandDispatcher>>,
    channel: Arc<CommandChannel>,
    health: Arc<HealthCheckMonitor>,
    router: Arc<CommandRouter>,
    supervisor: ReconnectionSupervisor,

    session: Option<SessionId>,
    status: SessionStatus,
    connection: Option<ConnectionId>,
    transport: Option<Arc<dyn PeerTransport>>,
    last_answered_offer: Option<String>,
    generation: u64,

    scope: CancellationToken,
    job: Option<CancellationToken>,
    health_job: Option<CancellationToken>,
    connect_deadline: Option<Pin<Box<Sleep>>>,

    command_rx: mpsc::Receiver<SessionCommand>,
    transport_rx: mpsc::Receiver<TransportEvent>,
    transport_tx: mpsc::Sender<TransportEvent>,
    internal_rx: mpsc::UnboundedReceiver<Internal>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    inbound_tx: mpsc::Sender<(ConnectionId, Bytes)>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
}

impl SessionActor {
    pub(crate) fn new(parts: SessionParts) -> Self {
        let (transport_tx, transport_rx) = mpsc::channel(256);
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::channel(256);

        tokio::spawn(route_inbound(
            Arc::clone(&parts.router),
            inbound_rx,
            internal_tx.clone(),
        ));

        Self {
            role: parts.role,
            supervisor: ReconnectionSupervisor::new(
                parts.config.max_attempts,
                parts.config.backoff,
            ),
            config: parts.config,
            factory: parts.factory,
            store: parts.store,
            dispatcher: parts.dispatcher,
            channel: parts.channel,
            health: parts.health,
            router: parts.router,
            session: None,
            status: SessionStatus::Idle,
            connection: None,
            transport: None,
            last_answered_offer: None,
            generation: 0,
            scope: CancellationToken::new(),
            job: None,
            health_job: None,
            connect_deadline: None,
            command_rx: parts.command_rx,
            transport_rx,
            transport_tx,
            internal_rx,
            internal_tx,
            inbound_tx,
            snapshot_tx: parts.snapshot_tx,
        }
    }

    pub async fn run(mut self) {
        info!(role = %self.role, "Session event loop started");

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(c) => self.handle_command(c).await,
                        None => {
                            info!("All session handles dropped. Shutting down session.");
                            self.shutdown().await;
                            break;
                        }
                    }
                }

                Some(event) = self.transport_rx.recv() => {
                    self.handle_transport_event(event).await;
                }

                Some(msg) = self.internal_rx.recv() => {
                    self.handle_internal(msg).await;
                }

                _ = wait_deadline(&mut self.connect_deadline) => {
                    self.connect_deadline = None;
                    let limit = self.config.connect_timeout;
                    warn!("Connection not established within {:?}", limit);
                    self.on_attempt_failed(SessionError::ConnectTimeout(limit)).await;
                }
            }
        }

        info!("Session event loop finished");
    }

    async fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::Start { session, reply } => {
                self.start(session).await;
                let _ = reply.send(());
            }
            SessionCommand::Shutdown { reply } => {
                self.shutdown().await;
                let _ = reply.send(());
            }
        }
    }

    async fn start(&mut self, session: SessionId) {
        if self.session.as_ref() == Some(&session) && self.status.is_active() {
            debug!(%session, status = %self.status, "Start ignored, session already running");
            return;
        }

        if self.status.is_active() {
            info!("Switching sessions, tearing down the current one");
            self.stop_everything().await;
        }

        info!(%session, role = %self.role, "Starting session");
        self.session = Some(session);
        self.supervisor.reset();
        self.last_answered_offer = None;
        self.set_status(SessionStatus::Connecting);
        self.spawn_attempt(Duration::ZERO);
    }

    async fn shutdown(&mut self) {
        if self.status == SessionStatus::Closed {
            return;
        }

        if self.channel.is_open().await {
            if let Err(e) = self.channel.send(&tokens::closing(self.role)).await {
                debug!("Closing announcement not sent: {}", e);
            }
            self.channel.mark_closing().await;
        }

        self.stop_everything().await;

        if let Some(session) = self.session.clone() {
            self.clear_signaling(&session).await;
        }

        self.supervisor.reset();
        self.set_status(SessionStatus::Closed);
        info!("Session shut down");
    }

    /// Cancels every background task and releases the transport. Reports
    /// still queued from cancelled tasks become stale.
    async fn stop_everything(&mut self) {
        self.scope.cancel();
        self.scope = CancellationToken::new();
        self.job = None;
        self.health_job = None;
        self.connect_deadline = None;
        self.generation += 1;
        self.router.set_armed(false);
        self.release_transport().await;
    }

    async fn clear_signaling(&self, session: &SessionId) {
        let paths = match self.role {
            Role::Offerer => [SignalPath::offer(session), SignalPath::answer(session)],
            Role::Answerer => [SignalPath::answer(session), SignalPath::offer(session)],
        };
        for path in &paths {
            if let Err(e) = self.store.remove(path).await {
                warn!(%path, "Failed to clear signaling key: {}", e);
            }
        }
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        let connection = event.connection();
        let name = event.name();

        if self.connection != Some(connection) {
            trace!(%connection, event = name, "Ignoring event from stale transport");
            return;
        }

        match event {
            TransportEvent::Connecting(_) => debug!(%connection, "Transport connecting"),

            TransportEvent::Connected(_) => self.on_connected().await,

            TransportEvent::Disconnected(_)
            | TransportEvent::Failed(_)
            | TransportEvent::Closed(_) => self.on_transport_lost(name).await,

            TransportEvent::ChannelOpen(_) => {
                info!(%connection, "Command channel open");
                self.channel.mark_open().await;
            }

            TransportEvent::ChannelClosed(_) => {
                info!(%connection, "Command channel closed");
                self.channel.mark_closed().await;
            }

            TransportEvent::Message(_, data) => {
                if self.inbound_tx.send((connection, data)).await.is_err() {
                    error!("Inbound router has stopped");
                }
            }

            TransportEvent::BufferedAmountChanged(_, amount) => {
                trace!(%connection, amount, "Buffered amount changed");
            }
        }
    }

    async fn handle_internal(&mut self, msg: Internal) {
        match msg {
            Internal::TransportReady {
                generation,
                transport,
            } => {
                let connection = transport.connection_id();
                if generation != self.generation || self.connection != Some(connection) {
                    debug!(%connection, "Closing transport from abandoned attempt");
                    tokio::spawn(async move {
                        let _ = transport.close().await;
                    });
                    return;
                }
                self.channel.attach(Arc::clone(&transport)).await;
                self.transport = Some(transport);
            }

            Internal::OfferAccepted { generation, sdp } => {
                if generation == self.generation {
                    self.last_answered_offer = Some(sdp);
                }
            }

            Internal::Negotiated { generation } => {
                if generation != self.generation || self.status != SessionStatus::Connecting {
                    return;
                }
                info!("Signaling complete, waiting for connection");
                self.connect_deadline = Some(Box::pin(sleep(self.config.connect_timeout)));
            }

            Internal::AttemptFailed { generation, error } => {
                if generation == self.generation {
                    self.on_attempt_failed(error).await;
                }
            }

            Internal::RetryDue { generation } => {
                if generation == self.generation && self.status == SessionStatus::Connecting {
                    self.teardown_and_restart("retry").await;
                }
            }

            Internal::HealthStale { connection } => {
                if self.connection == Some(connection) && self.status == SessionStatus::Connected {
                    self.teardown_and_restart("health check timed out").await;
                }
            }

            Internal::PeerClosing { connection } => {
                if self.connection == Some(connection) && self.status == SessionStatus::Connected {
                    self.teardown_and_restart("peer closing").await;
                }
            }
        }
    }

    async fn on_connected(&mut self) {
        if self.status == SessionStatus::Connected {
            return;
        }

        self.connect_deadline = None;
        self.cancel_job();
        self.supervisor.on_connected();
        self.health.reset();
        self.router.set_armed(true);
        self.set_status(SessionStatus::Connected);
        info!(connection = ?self.connection, "Session connected");

        if self.config.health.pinger == self.role {
            self.start_health();
        }
    }

    async fn on_transport_lost(&mut self, reason: &'static str) {
        match self.status {
            SessionStatus::Connected => {
                warn!(reason, "Connection lost");
                self.teardown_and_restart(reason).await;
            }
            SessionStatus::Connecting => {
                self.on_attempt_failed(SessionError::TransportLost(reason))
                    .await;
            }
            status => debug!(reason, %status, "Transport loss ignored"),
        }
    }

    /// Tears the current transport down and schedules a rebuild after the
    /// drain delay. Does nothing while a rebuild is already in flight.
    async fn teardown_and_restart(&mut self, reason: &str) {
        if !self.supervisor.try_begin() {
            debug!(reason, "Reconnection already in flight");
            return;
        }

        info!(
            reason,
            attempts = self.supervisor.attempts(),
            "Tearing down connection"
        );
        self.stop_health();
        self.connect_deadline = None;
        self.cancel_job();
        self.router.set_armed(false);
        self.release_transport().await;
        self.set_status(SessionStatus::Connecting);
        self.spawn_attempt(self.config.drain_delay);
    }

    async fn on_attempt_failed(&mut self, error: SessionError) {
        warn!(attempts = self.supervisor.attempts(), "Connect attempt failed: {}", error);

        self.connect_deadline = None;
        self.cancel_job();
        self.stop_health();
        self.router.set_armed(false);
        self.release_transport().await;

        match self.supervisor.record_failure() {
            RetryDecision::RetryAfter(delay) => {
                info!(
                    attempts = self.supervisor.attempts(),
                    "Retrying in {:?}",
                    delay
                );
                self.set_status(SessionStatus::Connecting);
                self.schedule_retry(delay);
            }
            RetryDecision::Exhausted => self.set_status(SessionStatus::Failed),
        }
    }

    fn spawn_attempt(&mut self, drain: Duration) {
        let Some(session) = self.session.clone() else {
            return;
        };

        self.cancel_job();
        self.generation += 1;
        let connection = ConnectionId::new();
        self.connection = Some(connection);

        let token = self.scope.child_token();
        self.job = Some(token.clone());

        let job = ConnectJob {
            role: self.role,
            session,
            config: Arc::clone(&self.config),
            factory: Arc::clone(&self.factory),
            store: Arc::clone(&self.store),
            events: self.transport_tx.clone(),
            internal: self.internal_tx.clone(),
        };
        debug!(%connection, generation = self.generation, ?drain, "Spawning connect attempt");
        tokio::spawn(job.run(
            self.generation,
            connection,
            drain,
            self.last_answered_offer.clone(),
            token,
        ));
        self.publish();
    }

    fn schedule_retry(&mut self, delay: Duration) {
        self.cancel_job();
        self.generation += 1;
        let generation = self.generation;
        let token = self.scope.child_token();
        self.job = Some(token.clone());

        let internal = self.internal_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = sleep(delay) => {
                    let _ = internal.send(Internal::RetryDue { generation });
                }
            }
        });
    }

    fn cancel_job(&mut self) {
        if let Some(token) = self.job.take() {
            token.cancel();
        }
    }

    fn start_health(&mut self) {
        self.stop_health();
        let Some(connection) = self.connection else {
            return;
        };

        let token = self.scope.child_token();
        self.health_job = Some(token.clone());

        let monitor = Arc::clone(&self.health);
        let channel = Arc::clone(&self.channel);
        let ping = tokens::ping(self.role.peer());
        let config = self.config.health.clone();
        let internal = self.internal_tx.clone();
        tokio::spawn(async move {
            if monitor.run(channel, ping, config, token).await == HealthOutcome::Stale {
                let _ = internal.send(Internal::HealthStale { connection });
            }
        });
    }

    fn stop_health(&mut self) {
        if let Some(token) = self.health_job.take() {
            token.cancel();
        }
    }

    /// Closes the channel and the transport. Events still queued from the
    /// old transport are ignored afterwards.
    async fn release_transport(&mut self) {
        self.connection = None;
        let transport = self.transport.take();
        self.channel.detach().await;

        let Some(transport) = transport else {
            return;
        };
        if let Err(e) = transport.close().await {
            warn!(connection = %transport.connection_id(), "Failed to close transport: {}", e);
        }
        if let Some(dispatcher) = &self.dispatcher {
            dispatcher.on_teardown().await;
        }
        self.health.clear();
    }

    fn set_status(&mut self, status: SessionStatus) {
        if self.status != status {
            info!(from = %self.status, to = %status, "Session status changed");
        }
        self.status = status;
        self.publish();
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(SessionSnapshot {
            role: self.role,
            session: self.session.clone(),
            status: self.status,
            reconnection: self.supervisor.state(),
            connection: self.connection,
        });
    }
}

async fn wait_deadline(deadline: &mut Option<Pin<Box<Sleep>>>) {
    match deadline {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

/// Feeds inbound messages to the router one at a time.
async fn route_inbound(
    router: Arc<CommandRouter>,
    mut inbound_rx: mpsc::Receiver<(ConnectionId, Bytes)>,
    internal: mpsc::UnboundedSender<Internal>,
) {
    while let Some((connection, data)) = inbound_rx.recv().await {
        if router.handle_message(&data).await == Routed::Control(ControlToken::PeerClosing) {
            let _ = internal.send(Internal::PeerClosing { connection });
        }
    }
    debug!("Inbound router finished");
}
