use pairlink_core::{CommandFrame, Role};
use pairlink_peer::session::SessionBuilder;
use pairlink_peer::signaling::InMemorySignalingStore;
use pairlink_peer::transport::TransportConfig;
use pairlink_peer::{HealthConfig, SessionConfig, SessionStatus};
use std::sync::Arc;
use std::time::Duration;

use crate::integration::init_tracing;
use crate::utils::{RecordingDispatcher, test_session, wait_for_status};

/// Timeout for a real ICE/DTLS/SCTP handshake on loopback (ms).
const CONNECTION_TIMEOUT_MS: u64 = 30000;

fn loopback_config() -> SessionConfig {
    SessionConfig::default()
        .with_transport(TransportConfig::loopback())
        .with_drain_delay(Duration::from_millis(100))
        .with_health(HealthConfig {
            interval: Duration::from_secs(1),
            pong_timeout: Some(Duration::from_secs(10)),
            pinger: Role::Answerer,
        })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_webrtc_sessions_connect_and_exchange_commands() {
    init_tracing();

    let store = InMemorySignalingStore::new();
    let session = test_session();
    let dispatcher = RecordingDispatcher::new();

    let offerer = SessionBuilder::new(Role::Offerer, Arc::new(store.clone()))
        .with_config(loopback_config())
        .with_dispatcher(Arc::new(dispatcher.clone()))
        .spawn();
    let answerer = SessionBuilder::new(Role::Answerer, Arc::new(store.clone()))
        .with_config(loopback_config())
        .spawn();
    let mut replies = answerer.subscribe();

    answerer.start(session.clone()).await.unwrap();
    offerer.start(session.clone()).await.unwrap();

    wait_for_status(&offerer, SessionStatus::Connected, CONNECTION_TIMEOUT_MS)
        .await
        .expect("Offerer not connected");
    wait_for_status(&answerer, SessionStatus::Connected, CONNECTION_TIMEOUT_MS)
        .await
        .expect("Answerer not connected");

    let answerer_ready = answerer.clone();
    let opened = crate::utils::wait_until(CONNECTION_TIMEOUT_MS, || {
        let a = answerer_ready.clone();
        async move { a.is_channel_open().await }
    })
    .await;
    assert!(opened, "command channel never opened");

    answerer
        .send(&CommandFrame::token("CAMERA_ON"))
        .await
        .expect("send command");

    let reply = loop {
        let msg = tokio::time::timeout(Duration::from_secs(10), replies.recv())
            .await
            .expect("no reply")
            .unwrap();
        if msg == "CAMERA_STARTED" {
            break msg;
        }
    };
    assert_eq!(reply, "CAMERA_STARTED");
    assert_eq!(dispatcher.commands().await, vec!["CAMERA_ON"]);

    // The answerer pings every second; the offerer's pongs keep it fresh.
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(answerer.time_since_last_pong() < Some(Duration::from_secs(3)));

    offerer.shutdown().await.unwrap();
    answerer.shutdown().await.unwrap();
    assert_eq!(offerer.status(), SessionStatus::Closed);
    assert_eq!(answerer.status(), SessionStatus::Closed);
}
