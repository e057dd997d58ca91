use pairlink_core::Role;
use pairlink_peer::SessionStatus;
use pairlink_peer::signaling::InMemorySignalingStore;
use pairlink_peer::transport::TransportEvent;
use std::time::Duration;

use crate::integration::init_tracing;
use crate::utils::{
    MockNetwork, STATE_TIMEOUT_MS, connect_offerer_manually, spawn_session, test_config,
    test_session, wait_for_offer, wait_for_status,
};

#[tokio::test(start_paused = true)]
async fn test_burst_of_terminal_events_rebuilds_once() {
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

    first.emit(TransportEvent::Disconnected).await;
    first.emit(TransportEvent::Failed).await;
    first.emit(TransportEvent::ChannelClosed).await;
    first.emit(TransportEvent::Closed).await;

    let second = wait_for_offer(&network, &store, &session, 2).await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert!(first.is_closed(), "old transport must be closed");
    assert!(!second.is_closed());
    assert_eq!(network.created(Role::Offerer).await, 2);
    assert_eq!(network.live(Role::Offerer).await, 1);

    let snapshot = offerer.snapshot();
    assert_eq!(snapshot.status, SessionStatus::Connecting);
    assert!(snapshot.reconnection.is_reconnecting);
    assert_eq!(snapshot.reconnection.attempts, 0);
    assert_eq!(snapshot.connection, Some(second.id()));
}

#[tokio::test(start_paused = true)]
async fn test_rebuilt_connection_resets_state() {
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

    first.fail().await;
    connect_offerer_manually(&network, &store, &session, 2)
        .await
        .unwrap();

    let snapshot = wait_for_status(&offerer, SessionStatus::Connected, STATE_TIMEOUT_MS)
        .await
        .unwrap();
    assert_eq!(snapshot.reconnection.attempts, 0);
    assert!(!snapshot.reconnection.is_reconnecting);
    assert!(offerer.is_channel_open().await);
}
