use pairlink_core::{Role, tokens};
use pairlink_peer::signaling::InMemorySignalingStore;
use pairlink_peer::{HealthConfig, SessionStatus};
use std::time::Duration;

use crate::integration::init_tracing;
use crate::utils::{
    MockNetwork, STATE_TIMEOUT_MS, connect_offerer_manually, spawn_session, test_config,
    test_session, wait_for_offer, wait_for_status, wait_until,
};

fn probing_config() -> pairlink_peer::SessionConfig {
    test_config().with_health(HealthConfig {
        interval: Duration::from_secs(1),
        pong_timeout: Some(Duration::from_secs(3)),
        pinger: Role::Offerer,
    })
}

#[tokio::test(start_paused = true)]
async fn test_silent_peer_triggers_rebuild() {
    init_tracing();

    let network = MockNetwork::new();
    let store = InMemorySignalingStore::new();
    let session = test_session();
    let offerer = spawn_session(Role::Offerer, &network, &store, probing_config());

    offerer.start(session.clone()).await.unwrap();
    let first = connect_offerer_manually(&network, &store, &session, 1)
        .await
        .unwrap();
    wait_for_status(&offerer, SessionStatus::Connected, STATE_TIMEOUT_MS)
        .await
        .unwrap();

    wait_for_offer(&network, &store, &session, 2).await.unwrap();

    assert!(first.is_closed());
    assert!(first.sent_count(&tokens::ping(Role::Answerer)).await >= 2);
    assert_eq!(offerer.snapshot().reconnection.attempts, 0);
}

#[tokio::test(start_paused = true)]
async fn test_pongs_keep_connection_alive() {
    init_tracing();

    let network = MockNetwork::new();
    let store = InMemorySignalingStore::new();
    let session = test_session();
    let offerer = spawn_session(Role::Offerer, &network, &store, probing_config());

    offerer.start(session.clone()).await.unwrap();
    let transport = connect_offerer_manually(&network, &store, &session, 1)
        .await
        .unwrap();
    wait_for_status(&offerer, SessionStatus::Connected, STATE_TIMEOUT_MS)
        .await
        .unwrap();

    for _ in 0..10 {
        tokio::time::sleep(Duration::from_secs(1)).await;
        transport.deliver(&tokens::pong(Role::Answerer)).await;
    }

    assert_eq!(offerer.status(), SessionStatus::Connected);
    assert_eq!(network.created(Role::Offerer).await, 1);
    assert!(offerer.time_since_last_pong() <= Some(Duration::from_secs(1)));
    assert!(offerer.last_pong_at_ms().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_ping_is_answered_with_pong() {
    init_tracing();

    let network = MockNetwork::new();
    let store = InMemorySignalingStore::new();
    let session = test_session();
    let offerer = spawn_session(Role::Offerer, &network, &store, test_config());
    let mut inbound = offerer.subscribe();

    offerer.start(session.clone()).await.unwrap();
    let transport = connect_offerer_manually(&network, &store, &session, 1)
        .await
        .unwrap();
    wait_for_status(&offerer, SessionStatus::Connected, STATE_TIMEOUT_MS)
        .await
        .unwrap();

    transport.deliver("PING_CHILD").await;

    let pong = tokens::pong(Role::Offerer);
    let replied = wait_until(STATE_TIMEOUT_MS, || {
        let t = transport.clone();
        let pong = pong.clone();
        async move { t.sent_count(&pong).await == 1 }
    })
    .await;
    assert!(replied, "expected PONG_CHILD");
    assert!(inbound.try_recv().is_err(), "control tokens are not broadcast");
}

#[tokio::test(start_paused = true)]
async fn test_peer_closing_triggers_rebuild() {
    init_tracing();

    let network = MockNetwork::new();
    let store = InMemorySignalingStore::new();
    let session = test_session();
    let offerer = spawn_session(Role::Offerer, &network, &store, test_config());

    offerer.start(session.clone()).await.unwrap();
    let first = connect_offerer_manually(&network, &store, &session, 1)
        .await
        .unwrap();
    wait_for_status(&offerer, SessionStatus::Connected, STATE_TIMEOUT_MS)
        .await
        .unwrap();

    first.deliver(&tokens::closing(Role::Answerer)).await;

    wait_for_offer(&network, &store, &session, 2).await.unwrap();
    assert!(first.is_closed());
    assert_eq!(offerer.status(), SessionStatus::Connecting);
}
