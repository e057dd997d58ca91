use pairlink_core::{Role, SdpType, SignalPath};
use pairlink_peer::SessionStatus;
use pairlink_peer::signaling::InMemorySignalingStore;
use pairlink_peer::transport::{GatheringState, PeerTransport};
use tokio::time::Instant;

use crate::integration::init_tracing;
use crate::utils::{
    MOCK_GATHERING_DELAY, MockNetwork, STATE_TIMEOUT_MS, spawn_session, test_config,
    test_session, wait_for_offer, wait_for_status,
};

#[tokio::test(start_paused = true)]
async fn test_offer_answer_connects() {
    init_tracing();

    let network = MockNetwork::new();
    let store = InMemorySignalingStore::new();
    let session = test_session();

    let offerer = spawn_session(Role::Offerer, &network, &store, test_config());
    let answerer = spawn_session(Role::Answerer, &network, &store, test_config());
    assert_eq!(offerer.status(), SessionStatus::Idle);

    answerer.start(session.clone()).await.expect("start answerer");
    offerer.start(session.clone()).await.expect("start offerer");

    let offered = wait_for_status(&offerer, SessionStatus::Connected, STATE_TIMEOUT_MS)
        .await
        .expect("Offerer not connected");
    wait_for_status(&answerer, SessionStatus::Connected, STATE_TIMEOUT_MS)
        .await
        .expect("Answerer not connected");

    assert_eq!(offered.session, Some(session.clone()));
    assert_eq!(offered.reconnection.attempts, 0);
    assert!(!offered.reconnection.is_reconnecting);

    assert_eq!(network.created(Role::Offerer).await, 1);
    assert_eq!(network.created(Role::Answerer).await, 1);

    let offer = store.snapshot(&SignalPath::offer(&session));
    let answer = store.snapshot(&SignalPath::answer(&session));
    assert!(offer.message.is_some_and(|m| m.is(SdpType::Offer)));
    assert!(answer.message.is_some_and(|m| m.is(SdpType::Answer)));

    let channel = network.latest(Role::Offerer).await.expect("offerer transport");
    assert_eq!(channel.label().await.as_deref(), Some("commands"));
    assert!(offerer.is_channel_open().await);
    assert!(answerer.is_channel_open().await);
}

#[tokio::test(start_paused = true)]
async fn test_offer_is_published_after_gathering_completes() {
    init_tracing();

    let network = MockNetwork::new();
    let store = InMemorySignalingStore::new();
    let session = test_session();

    let offerer = spawn_session(Role::Offerer, &network, &store, test_config());
    let started = Instant::now();
    offerer.start(session.clone()).await.expect("start offerer");

    let transport = wait_for_offer(&network, &store, &session, 1)
        .await
        .expect("offer never published");

    assert!(started.elapsed() >= MOCK_GATHERING_DELAY);
    assert_eq!(transport.gathering_state(), GatheringState::Complete);
    assert_eq!(offerer.status(), SessionStatus::Connecting);
}
