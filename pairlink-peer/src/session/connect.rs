use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::negotiation::NonTrickleSdpExchange;
use crate::signaling::SignalingStore;
use crate::transport::{PeerTransport, TransportEvent, TransportFactory};
use pairlink_core::{ConnectionId, Role, SdpType, SessionId, SignalPath};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Progress reports from background jobs to the session actor. Each carries
/// the generation it was started under; the actor drops reports from
/// generations it has moved past.
pub(crate) enum Internal {
    TransportReady {
        generation: u64,
        transport: Arc<dyn PeerTransport>,
    },
    /// The answerer picked up this offer and is about to answer it.
    OfferAccepted { generation: u64, sdp: String },
    /// Descriptions exchanged; the transport is now establishing ICE.
    Negotiated { generation: u64 },
    AttemptFailed {
        generation: u64,
        error: SessionError,
    },
    RetryDue { generation: u64 },
    HealthStale { connection: ConnectionId },
    PeerClosing { connection: ConnectionId },
}

/// One connect attempt: build a transport and run the signaling exchange for
/// the session's role.
#[derive(Clone)]
pub(crate) struct ConnectJob {
    pub role: Role,
    pub session: SessionId,
    pub config: Arc<SessionConfig>,
    pub factory: Arc<dyn TransportFactory>,
    pub store: Arc<dyn SignalingStore>,
    pub events: mpsc::Sender<TransportEvent>,
    pub internal: mpsc::UnboundedSender<Internal>,
}

impl ConnectJob {
    pub async fn run(
        self,
        generation: u64,
        connection: ConnectionId,
        drain: Duration,
        last_answered: Option<String>,
        token: CancellationToken,
    ) {
        if !drain.is_zero() {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = sleep(drain) => {}
            }
        }

        // A shutdown during the drain must not produce a new transport.
        if token.is_cancelled() {
            debug!(%connection, "attempt cancelled before rebuilding");
            return;
        }

        let result = tokio::select! {
            _ = token.cancelled() => Err(SessionError::Cancelled),
            res = self.connect(generation, connection, last_answered) => res,
        };

        let report = match result {
            Ok(()) => Internal::Negotiated { generation },
            Err(SessionError::Cancelled) => {
                debug!(%connection, "attempt cancelled");
                return;
            }
            Err(error) => Internal::AttemptFailed { generation, error },
        };
        let _ = self.internal.send(report);
    }

    async fn connect(
        &self,
        generation: u64,
        connection: ConnectionId,
        last_answered: Option<String>,
    ) -> Result<(), SessionError> {
        match self.role {
            Role::Offerer => {
                let transport = self.create_transport(generation, connection).await;
                self.offer(transport.as_ref()).await
            }
            Role::Answerer => self.answer(generation, connection, last_answered).await,
        }
    }

    /// Retries until a transport is built. These retries are not attempts.
    async fn create_transport(
        &self,
        generation: u64,
        connection: ConnectionId,
    ) -> Arc<dyn PeerTransport> {
        loop {
            match self.factory.create(connection, self.events.clone()).await {
                Ok(transport) => {
                    let _ = self.internal.send(Internal::TransportReady {
                        generation,
                        transport: Arc::clone(&transport),
                    });
                    return transport;
                }
                Err(e) => {
                    warn!(
                        %connection,
                        "Failed to create transport, retrying in {:?}: {}",
                        self.config.transport_retry_delay,
                        e
                    );
                    sleep(self.config.transport_retry_delay).await;
                }
            }
        }
    }

    async fn offer(&self, transport: &dyn PeerTransport) -> Result<(), SessionError> {
        let exchange = NonTrickleSdpExchange::new(self.config.gathering_timeout);
        let offer_path = SignalPath::offer(&self.session);
        let answer_path = SignalPath::answer(&self.session);

        transport
            .open_command_channel(&self.config.channel_label)
            .await?;

        // An answer left over from an earlier offer must not be applied to
        // this one.
        self.store.remove(&answer_path).await?;

        let offer = exchange.create_offer(transport).await?;
        let mut answers = self.store.watch(&answer_path).await?;
        self.store.set(&offer_path, &offer).await?;
        info!(session = %self.session, "Offer published, waiting for answer");

        let wait = answers.wait_for(|msg| msg.is(SdpType::Answer));
        let answer = match self.config.answer_timeout {
            Some(limit) => tokio::time::timeout(limit, wait)
                .await
                .map_err(|_| SessionError::AnswerTimeout(limit))??,
            None => wait.await?,
        };

        exchange.apply_remote_answer(transport, &answer).await?;
        info!(session = %self.session, "Answer applied");
        Ok(())
    }

    async fn answer(
        &self,
        generation: u64,
        connection: ConnectionId,
        last_answered: Option<String>,
    ) -> Result<(), SessionError> {
        let exchange = NonTrickleSdpExchange::new(self.config.gathering_timeout);
        let offer_path = SignalPath::offer(&self.session);

        let mut offers = self.store.watch(&offer_path).await?;
        info!(session = %self.session, "Waiting for offer");

        let stored = offers.current().message;
        if stored.is_some_and(|m| last_answered.as_deref() == Some(m.sdp.as_str())) {
            debug!(session = %self.session, "Stored offer was already answered, waiting for a new one");
        }

        // Answering the same offer twice would pair a new transport with a
        // description the offerer has already consumed.
        let offer = offers
            .wait_for(|msg| msg.is(SdpType::Offer) && last_answered.as_deref() != Some(msg.sdp.as_str()))
            .await?;
        let _ = self.internal.send(Internal::OfferAccepted {
            generation,
            sdp: offer.sdp.clone(),
        });

        let transport = self.create_transport(generation, connection).await;
        let answer = exchange.create_answer(transport.as_ref(), &offer).await?;
        self.store
            .set(&SignalPath::answer(&self.session), &answer)
            .await?;
        info!(session = %self.session, "Answer published");
        Ok(())
    }
}
