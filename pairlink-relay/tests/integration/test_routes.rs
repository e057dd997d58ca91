use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use pairlink_core::{SessionId, SignalPath, SignalingMessage};
use pairlink_peer::signaling::{InMemorySignalingStore, StoredSignal};
use pairlink_relay::router;
use serde_json::json;
use tower::ServiceExt;

use super::init_tracing;

const OFFER_URI: &str = "/sessions/ABCD-EFGH-JKLM/offer";

async fn send(store: &InMemorySignalingStore, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router(store.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

fn put(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::put(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_put_then_get_returns_last_write() {
    init_tracing();
    let store = InMemorySignalingStore::new();

    let (status, _) = send(&store, put(OFFER_URI, json!({"type": "offer", "sdp": "v=0 first"}))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&store, put(OFFER_URI, json!({"type": "offer", "sdp": "v=0 second"}))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&store, Request::get(OFFER_URI).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    let message: SignalingMessage = serde_json::from_slice(&body).unwrap();
    assert_eq!(message, SignalingMessage::offer("v=0 second"));

    // Grouped and raw forms of the id address the same key.
    let session = SessionId::parse("abcdefghjklm").unwrap();
    assert_eq!(store.snapshot(&SignalPath::offer(&session)).version, 2);
}

#[tokio::test]
async fn test_missing_key_is_not_found() {
    init_tracing();
    let store = InMemorySignalingStore::new();

    let (status, _) = send(&store, Request::get(OFFER_URI).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_clears_key() {
    init_tracing();
    let store = InMemorySignalingStore::new();

    send(&store, put(OFFER_URI, json!({"type": "offer", "sdp": "v=0"}))).await;
    let (status, _) = send(&store, Request::delete(OFFER_URI).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&store, Request::get(OFFER_URI).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(store.key_count(), 0);
}

#[tokio::test]
async fn test_invalid_requests_are_rejected() {
    init_tracing();
    let store = InMemorySignalingStore::new();

    let (status, _) = send(
        &store,
        Request::get("/sessions/SHORT/offer").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &store,
        Request::get("/sessions/ABCD-EFGH-JKLM/candidate").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&store, put(OFFER_URI, json!({"type": "answer", "sdp": "v=0"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test(start_paused = true)]
async fn test_watch_returns_after_timeout_without_change() {
    init_tracing();
    let store = InMemorySignalingStore::new();

    let request = Request::get(format!("{OFFER_URI}/watch?version=0&timeout_ms=1000"))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&store, request).await;

    assert_eq!(status, StatusCode::OK);
    let signal: StoredSignal = serde_json::from_slice(&body).unwrap();
    assert_eq!(signal, StoredSignal::default());
    assert_eq!(store.key_count(), 0, "an idle long-poll must not leave a key behind");
}

#[tokio::test]
async fn test_watch_wakes_on_write() {
    init_tracing();
    let store = InMemorySignalingStore::new();

    let watcher = {
        let store = store.clone();
        tokio::spawn(async move {
            let request = Request::get(format!("{OFFER_URI}/watch?version=0&timeout_ms=10000"))
                .body(Body::empty())
                .unwrap();
            send(&store, request).await
        })
    };

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    send(&store, put(OFFER_URI, json!({"type": "offer", "sdp": "v=0 fresh"}))).await;

    let (status, body) = watcher.await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let signal: StoredSignal = serde_json::from_slice(&body).unwrap();
    assert_eq!(signal.version, 1);
    assert_eq!(signal.message, Some(SignalingMessage::offer("v=0 fresh")));
}
