use anyhow::Result;
use pairlink_core::{SdpType, SessionId, SignalPath, SignalingMessage};
use pairlink_peer::signaling::{HttpSignalingStore, InMemorySignalingStore, SignalingStore};
use std::time::Duration;
use tokio::net::TcpListener;

use super::init_tracing;

async fn spawn_relay() -> Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(pairlink_relay::serve(listener, InMemorySignalingStore::new()));
    Ok(format!("http://{addr}"))
}

#[tokio::test]
async fn test_http_store_round_trip_through_relay() -> Result<()> {
    init_tracing();
    let base = spawn_relay().await?;
    let store = HttpSignalingStore::new(base).with_poll_timeout(Duration::from_secs(2));
    let session = SessionId::parse("WXYZ-2345-6789")?;
    let offer = SignalPath::offer(&session);

    assert_eq!(store.get(&offer).await?, None);

    store.set(&offer, &SignalingMessage::offer("v=0 hello")).await?;
    assert_eq!(
        store.get(&offer).await?,
        Some(SignalingMessage::offer("v=0 hello"))
    );

    store.remove(&offer).await?;
    assert_eq!(store.get(&offer).await?, None);
    Ok(())
}

#[tokio::test]
async fn test_http_watch_sees_later_write() -> Result<()> {
    init_tracing();
    let base = spawn_relay().await?;
    let writer = HttpSignalingStore::new(base.clone());
    let reader = HttpSignalingStore::new(base).with_poll_timeout(Duration::from_secs(2));
    let session = SessionId::parse("WXYZ-2345-6789")?;
    let answer = SignalPath::answer(&session);

    let mut watch = reader.watch(&answer).await?;
    assert_eq!(watch.current().message, None);

    let write = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        writer
            .set(&answer, &SignalingMessage::answer("v=0 answer"))
            .await
    });

    let received = tokio::time::timeout(
        Duration::from_secs(10),
        watch.wait_for(|m| m.is(SdpType::Answer)),
    )
    .await??;
    write.await??;

    assert_eq!(received.sdp, "v=0 answer");
    Ok(())
}
