use crate::error::RelayError;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use pairlink_core::{SdpType, SessionId, SignalPath, SignalingMessage};
use pairlink_peer::signaling::{InMemorySignalingStore, SignalingStore, StoredSignal};
use serde::Deserialize;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, info};

/// Upper bound for a single long-poll, whatever the client asks for.
pub const MAX_WATCH_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct WatchParams {
    #[serde(default)]
    version: u64,
    #[serde(default)]
    timeout_ms: u64,
}

pub fn router(store: InMemorySignalingStore) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/sessions/{session}/{kind}",
            get(get_signal).put(put_signal).delete(delete_signal),
        )
        .route("/sessions/{session}/{kind}/watch", get(watch_signal))
        .with_state(store)
}

/// Serves the relay on `listener` until the server fails.
pub async fn serve(listener: TcpListener, store: InMemorySignalingStore) -> std::io::Result<()> {
    info!("Signaling relay listening on {:?}", listener.local_addr()?);
    axum::serve(listener, router(store)).await
}

async fn health() -> &'static str {
    "ok"
}

fn signal_path(session: &str, kind: &str) -> Result<SignalPath, RelayError> {
    let session = SessionId::parse(session)?;
    let kind = kind.parse::<SdpType>().map_err(RelayError::InvalidKind)?;
    Ok(SignalPath::new(session, kind))
}

async fn get_signal(
    State(store): State<InMemorySignalingStore>,
    Path((session, kind)): Path<(String, String)>,
) -> Result<Json<SignalingMessage>, RelayError> {
    let path = signal_path(&session, &kind)?;
    store
        .snapshot(&path)
        .message
        .map(Json)
        .ok_or(RelayError::NotFound)
}

async fn put_signal(
    State(store): State<InMemorySignalingStore>,
    Path((session, kind)): Path<(String, String)>,
    Json(message): Json<SignalingMessage>,
) -> Result<StatusCode, RelayError> {
    let path = signal_path(&session, &kind)?;
    if message.kind != path.kind {
        return Err(RelayError::KindMismatch {
            expected: path.kind,
            actual: message.kind,
        });
    }

    // The in-memory store cannot fail.
    let _ = store.set(&path, &message).await;
    info!(%path, bytes = message.sdp.len(), "Signal stored");
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_signal(
    State(store): State<InMemorySignalingStore>,
    Path((session, kind)): Path<(String, String)>,
) -> Result<StatusCode, RelayError> {
    let path = signal_path(&session, &kind)?;
    let _ = store.remove(&path).await;
    debug!(%path, "Signal removed");
    Ok(StatusCode::NO_CONTENT)
}

async fn watch_signal(
    State(store): State<InMemorySignalingStore>,
    Path((session, kind)): Path<(String, String)>,
    Query(params): Query<WatchParams>,
) -> Result<Json<StoredSignal>, RelayError> {
    let path = signal_path(&session, &kind)?;
    let timeout = Duration::from_millis(params.timeout_ms).min(MAX_WATCH_TIMEOUT);
    let signal = store.wait_for_change(&path, params.version, timeout).await;
    Ok(Json(signal))
}
