use async_trait::async_trait;
use pairlink::core::{CommandFrame, tokens};
use pairlink::peer::{CommandDispatcher, CommandError, StatusSink};
use std::collections::HashSet;
use tokio::sync::Mutex;
use tracing::info;

/// Demo feature table: every configured feature `F` understands `F_ON` and
/// `F_OFF` and reports `F_STARTED` / `F_STOPPED`.
pub struct FeatureDispatcher {
    features: Vec<String>,
    active: Mutex<HashSet<String>>,
}

impl FeatureDispatcher {
    pub fn new(features: Vec<String>) -> Self {
        Self {
            features: features
                .into_iter()
                .map(|f| f.trim().to_uppercase())
                .filter(|f| !f.is_empty())
                .collect(),
            active: Mutex::new(HashSet::new()),
        }
    }

    pub fn describe(&self) -> String {
        if self.features.is_empty() {
            return "none".to_owned();
        }
        self.features.join(", ")
    }

    fn split<'a>(&self, command: &'a str) -> Option<(&'a str, bool)> {
        let (feature, on) = if let Some(feature) = command.strip_suffix("_ON") {
            (feature, true)
        } else {
            (command.strip_suffix("_OFF")?, false)
        };
        self.features
            .iter()
            .any(|f| f == feature)
            .then_some((feature, on))
    }
}

#[async_trait]
impl CommandDispatcher for FeatureDispatcher {
    fn supports(&self, command: &str) -> bool {
        self.split(command).is_some()
    }

    async fn dispatch(&self, frame: CommandFrame, status: StatusSink) -> Result<(), CommandError> {
        let (feature, on) = self
            .split(&frame.command)
            .ok_or_else(|| CommandError::new("unsupported command"))?;

        let mut active = self.active.lock().await;
        if on {
            if !active.insert(feature.to_owned()) {
                status
                    .send_status(tokens::error(feature, "already running"))
                    .await;
                return Ok(());
            }
            info!(%feature, "Feature started");
            status.send_status(tokens::started(feature)).await;
        } else {
            active.remove(feature);
            info!(%feature, "Feature stopped");
            status.send_status(tokens::stopped(feature)).await;
        }
        Ok(())
    }

    async fn on_teardown(&self) {
        let mut active = self.active.lock().await;
        for feature in active.drain() {
            info!(%feature, "Releasing feature after teardown");
        }
    }
}
