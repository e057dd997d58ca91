use pairlink_core::{Role, SessionId};
use pairlink_peer::SessionStatus;
use pairlink_peer::signaling::InMemorySignalingStore;
use std::time::Duration;

use crate::integration::init_tracing;
use crate::utils::{
    MockNetwork, STATE_TIMEOUT_MS, connect_offerer_manually, spawn_session, test_config,
    test_session, wait_for_offer, wait_for_status,
};

#[tokio::test(start_paused = true)]
async fn test_start_twice_builds_one_transport() {
    init_tracing();

    let network = MockNetwork::new();
    let store = InMemorySignalingStore::new();
    let session = test_session();
    let offerer = spawn_session(Role::Offerer, &network, &store, test_config());

    offerer.start(session.clone()).await.unwrap();
    offerer.start(session.clone()).await.unwrap();
    wait_for_offer(&network, &store, &session, 1).await.unwrap();

    offerer.start(session.clone()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(network.created(Role::Offerer).await, 1);
    assert_eq!(offerer.status(), SessionStatus::Connecting);
}

#[tokio::test(start_paused = true)]
async fn test_start_while_connected_is_noop() {
    init_tracing();

    let network = MockNetwork::new();
    let store = InMemorySignalingStore::new();
    let session = test_session();
    let offerer = spawn_session(Role::Offerer, &network, &store, test_config());

    offerer.start(session.clone()).await.unwrap();
    let transport = connect_offerer_manually(&network, &store, &session, 1)
        .await
        .unwrap();
    wait_for_status(&offerer, SessionStatus::Connected, STATE_TIMEOUT_MS)
        .await
        .unwrap();

    offerer.start(session.clone()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(offerer.status(), SessionStatus::Connected);
    assert_eq!(network.created(Role::Offerer).await, 1);
    assert!(!transport.is_closed());
}

#[tokio::test(start_paused = true)]
async fn test_start_other_session_replaces_current() {
    init_tracing();

    let network = MockNetwork::new();
    let store = InMemorySignalingStore::new();
    let first = test_session();
    let second = SessionId::parse("TEST-SESS-0002").unwrap();
    let offerer = spawn_session(Role::Offerer, &network, &store, test_config());

    offerer.start(first.clone()).await.unwrap();
    let old = wait_for_offer(&network, &store, &first, 1).await.unwrap();

    offerer.start(second.clone()).await.unwrap();
    let new = wait_for_offer(&network, &store, &second, 2).await.unwrap();

    assert!(old.is_closed());
    assert!(!new.is_closed());
    assert_eq!(offerer.snapshot().session, Some(second));
}
