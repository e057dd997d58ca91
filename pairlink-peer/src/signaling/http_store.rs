use crate::error::SignalingError;
use crate::signaling::{SignalWatch, SignalingStore, StoredSignal};
use async_trait::async_trait;
use pairlink_core::{SignalPath, SignalingMessage};
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Signaling store backed by a `pairlink-relay` server.
///
/// Watches are implemented with the relay's long-poll endpoint; one
/// background task per watch runs until the watch is dropped.
#[derive(Clone)]
pub struct HttpSignalingStore {
    client: Client,
    base_url: String,
    poll_timeout: Duration,
    retry_delay: Duration,
}

impl HttpSignalingStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            poll_timeout: Duration::from_secs(25),
            retry_delay: Duration::from_secs(1),
        }
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn endpoint(&self, path: &SignalPath) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn poll(
        &self,
        path: &SignalPath,
        known_version: u64,
        timeout: Duration,
    ) -> Result<StoredSignal, SignalingError> {
        let response = self
            .client
            .get(format!("{}/watch", self.endpoint(path)))
            .query(&[
                ("version", known_version.to_string()),
                ("timeout_ms", timeout.as_millis().to_string()),
            ])
            .timeout(timeout + Duration::from_secs(10))
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }
}

async fn check_status(response: Response) -> Result<Response, SignalingError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SignalingError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl SignalingStore for HttpSignalingStore {
    async fn set(
        &self,
        path: &SignalPath,
        message: &SignalingMessage,
    ) -> Result<(), SignalingError> {
        let response = self
            .client
            .put(self.endpoint(path))
            .json(message)
            .send()
            .await?;
        check_status(response).await?;
        debug!(%path, "signal published to relay");
        Ok(())
    }

    async fn get(&self, path: &SignalPath) -> Result<Option<SignalingMessage>, SignalingError> {
        let response = self.client.get(self.endpoint(path)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(check_status(response).await?.json().await?))
    }

    async fn remove(&self, path: &SignalPath) -> Result<(), SignalingError> {
        let response = self.client.delete(self.endpoint(path)).send().await?;
        check_status(response).await?;
        Ok(())
    }

    async fn watch(&self, path: &SignalPath) -> Result<SignalWatch, SignalingError> {
        // A zero timeout returns the current value right away.
        let initial = self.poll(path, 0, Duration::ZERO).await?;
        let mut version = initial.version;
        let (tx, rx) = watch::channel(initial);

        let store = self.clone();
        let task_path = path.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    polled = store.poll(&task_path, version, store.poll_timeout) => match polled {
                        Ok(signal) if signal.version != version => {
                            version = signal.version;
                            if tx.send(signal).is_err() {
                                break;
                            }
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!(path = %task_path, "Signaling poll failed: {}", e);
                            tokio::time::sleep(store.retry_delay).await;
                        }
                    },
                }
            }
            debug!(path = %task_path, "signaling watch stopped");
        });

        Ok(SignalWatch::new(path.clone(), rx))
    }
}
