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
async fn test_events_from_replaced_transport_are_ignored() {
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
    let second = wait_for_offer(&network, &store, &session, 2).await.unwrap();

    // The dead transport comes back to life; nobody may listen.
    first.emit(TransportEvent::Connected).await;
    first.emit(TransportEvent::ChannelOpen).await;
    first.deliver("PING_CHILD").await;
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(offerer.status(), SessionStatus::Connecting);
    assert_eq!(offerer.snapshot().connection, Some(second.id()));
    assert!(!offerer.is_channel_open().await);
    assert!(first.sent().await.is_empty());

    // A late failure of the old transport must not trigger another rebuild.
    first.fail().await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(network.created(Role::Offerer).await, 2);
    assert!(!second.is_closed());
}
