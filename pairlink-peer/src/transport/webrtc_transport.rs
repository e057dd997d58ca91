use crate::error::TransportError;
use crate::transport::{
    GatheringState, PeerTransport, TransportConfig, TransportEvent, TransportFactory,
};
use async_trait::async_trait;
use pairlink_core::{ConnectionId, SdpType, SignalingMessage};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::setting_engine::SettingEngine;
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_init::RTCDataChannelInit;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::data_channel_state::RTCDataChannelState;
use webrtc::ice_transport::ice_gathering_state::RTCIceGatheringState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

type ChannelSlot = Arc<Mutex<Option<Arc<RTCDataChannel>>>>;

/// Peer connection backed by webrtc-rs.
pub struct WebRtcTransport {
    id: ConnectionId,
    peer_connection: Arc<RTCPeerConnection>,
    channel: ChannelSlot,
    event_tx: mpsc::Sender<TransportEvent>,
    closed: AtomicBool,
}

impl WebRtcTransport {
    /// Builds a new peer connection. `event_tx` receives every state change,
    /// channel lifecycle event and inbound message of this connection.
    pub async fn new(
        id: ConnectionId,
        config: &TransportConfig,
        event_tx: mpsc::Sender<TransportEvent>,
    ) -> Result<Self, TransportError> {
        // Codecs are registered even though only the data channel is used;
        // the default interceptors expect them.
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)?;

        let mut setting_engine = SettingEngine::default();
        setting_engine.set_include_loopback_candidate(config.include_loopback_candidates);

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .with_setting_engine(setting_engine)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: config
                .ice_servers
                .iter()
                .map(|server| RTCIceServer {
                    urls: server.urls.clone(),
                    username: server.username.clone().unwrap_or_default(),
                    credential: server.credential.clone().unwrap_or_default(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(api.new_peer_connection(rtc_config).await?);
        let channel: ChannelSlot = Arc::new(Mutex::new(None));

        let state_tx = event_tx.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let tx = state_tx.clone();

                Box::pin(async move {
                    info!(connection = %id, state = %s, "peer connection state changed");
                    let event = match s {
                        RTCPeerConnectionState::Connecting => TransportEvent::Connecting(id),
                        RTCPeerConnectionState::Connected => TransportEvent::Connected(id),
                        RTCPeerConnectionState::Disconnected => TransportEvent::Disconnected(id),
                        RTCPeerConnectionState::Failed => TransportEvent::Failed(id),
                        RTCPeerConnectionState::Closed => TransportEvent::Closed(id),
                        _ => return,
                    };
                    let _ = tx.send(event).await;
                })
            },
        ));

        // Answerer side: the channel is created by the remote offerer.
        let dc_tx = event_tx.clone();
        let dc_slot = Arc::clone(&channel);
        peer_connection.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
            let tx = dc_tx.clone();
            let slot = Arc::clone(&dc_slot);

            Box::pin(async move {
                debug!(connection = %id, label = dc.label(), "remote command channel announced");
                wire_data_channel(id, &dc, &tx);
                *slot.lock().await = Some(dc);
            })
        }));

        Ok(Self {
            id,
            peer_connection,
            channel,
            event_tx,
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        Ok(())
    }
}

fn wire_data_channel(
    id: ConnectionId,
    dc: &Arc<RTCDataChannel>,
    event_tx: &mpsc::Sender<TransportEvent>,
) {
    let tx_open = event_tx.clone();
    dc.on_open(Box::new(move || {
        let tx = tx_open.clone();
        Box::pin(async move {
            info!(connection = %id, "command channel open");
            let _ = tx.send(TransportEvent::ChannelOpen(id)).await;
        })
    }));

    let tx_close = event_tx.clone();
    dc.on_close(Box::new(move || {
        let tx = tx_close.clone();
        Box::pin(async move {
            debug!(connection = %id, "command channel closed");
            let _ = tx.send(TransportEvent::ChannelClosed(id)).await;
        })
    }));

    let tx_msg = event_tx.clone();
    dc.on_message(Box::new(move |msg: DataChannelMessage| {
        let tx = tx_msg.clone();
        Box::pin(async move {
            let _ = tx.send(TransportEvent::Message(id, msg.data)).await;
        })
    }));
}

fn to_rtc(desc: SignalingMessage) -> Result<RTCSessionDescription, TransportError> {
    let rtc = match desc.kind {
        SdpType::Offer => RTCSessionDescription::offer(desc.sdp)?,
        SdpType::Answer => RTCSessionDescription::answer(desc.sdp)?,
    };
    Ok(rtc)
}

fn from_rtc(desc: RTCSessionDescription) -> Option<SignalingMessage> {
    match desc.sdp_type {
        RTCSdpType::Offer => Some(SignalingMessage::offer(desc.sdp)),
        RTCSdpType::Answer | RTCSdpType::Pranswer => Some(SignalingMessage::answer(desc.sdp)),
        _ => None,
    }
}

#[async_trait]
impl PeerTransport for WebRtcTransport {
    fn connection_id(&self) -> ConnectionId {
        self.id
    }

    async fn open_command_channel(&self, label: &str) -> Result<(), TransportError> {
        self.ensure_open()?;
        let init = RTCDataChannelInit {
            ordered: Some(true),
            ..Default::default()
        };
        let dc = self.peer_connection.create_data_channel(label, Some(init)).await?;
        wire_data_channel(self.id, &dc, &self.event_tx);
        *self.channel.lock().await = Some(dc);
        Ok(())
    }

    async fn create_offer(&self) -> Result<SignalingMessage, TransportError> {
        self.ensure_open()?;
        let offer = self.peer_connection.create_offer(None).await?;
        Ok(SignalingMessage::offer(offer.sdp))
    }

    async fn create_answer(&self) -> Result<SignalingMessage, TransportError> {
        self.ensure_open()?;
        let answer = self.peer_connection.create_answer(None).await?;
        Ok(SignalingMessage::answer(answer.sdp))
    }

    async fn set_local_description(&self, desc: SignalingMessage) -> Result<(), TransportError> {
        self.ensure_open()?;
        self.peer_connection
            .set_local_description(to_rtc(desc)?)
            .await?;
        Ok(())
    }

    async fn set_remote_description(
        &self,
        desc: SignalingMessage,
    ) -> Result<(), TransportError> {
        self.ensure_open()?;
        self.peer_connection
            .set_remote_description(to_rtc(desc)?)
            .await?;
        Ok(())
    }

    fn gathering_state(&self) -> GatheringState {
        match self.peer_connection.ice_gathering_state() {
            RTCIceGatheringState::Complete => GatheringState::Complete,
            RTCIceGatheringState::Gathering => GatheringState::Gathering,
            _ => GatheringState::New,
        }
    }

    async fn gathering_complete(&self) {
        let mut done = self.peer_connection.gathering_complete_promise().await;
        let _ = done.recv().await;
    }

    async fn local_description(&self) -> Option<SignalingMessage> {
        self.peer_connection
            .local_description()
            .await
            .and_then(from_rtc)
    }

    async fn send_text(&self, text: &str) -> Result<(), TransportError> {
        self.ensure_open()?;
        let channel = self
            .channel
            .lock()
            .await
            .clone()
            .ok_or(TransportError::NoCommandChannel)?;

        if channel.ready_state() != RTCDataChannelState::Open {
            return Err(TransportError::ChannelNotOpen);
        }

        channel.send_text(text.to_owned()).await?;

        // Never block here: the session actor may be the caller.
        let buffered = channel.buffered_amount().await;
        let _ = self
            .event_tx
            .try_send(TransportEvent::BufferedAmountChanged(self.id, buffered));
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        if let Some(channel) = self.channel.lock().await.take() {
            if let Err(e) = channel.close().await {
                warn!(connection = %self.id, "Failed to close command channel: {}", e);
            }
        }
        self.peer_connection.close().await?;
        Ok(())
    }
}

/// Creates a fresh [`WebRtcTransport`] for every connect attempt.
#[derive(Clone, Default)]
pub struct WebRtcTransportFactory {
    config: TransportConfig,
}

impl WebRtcTransportFactory {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl TransportFactory for WebRtcTransportFactory {
    async fn create(
        &self,
        id: ConnectionId,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Arc<dyn PeerTransport>, TransportError> {
        let transport = WebRtcTransport::new(id, &self.config, events).await?;
        Ok(Arc::new(transport))
    }
}
