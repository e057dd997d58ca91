use crate::command::CommandChannel;
use crate::config::HealthConfig;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const NEVER: u64 = u64::MAX;

/// How a ping loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthOutcome {
    Stopped,
    /// No inbound traffic for longer than the configured pong timeout.
    Stale,
}

/// Liveness record of the current connection.
///
/// Every inbound message counts as a pong. Timestamps are kept as offsets
/// from a fixed epoch so they can live in atomics.
pub struct HealthCheckMonitor {
    epoch: Instant,
    last_pong: AtomicU64,
    last_pong_wall_ms: AtomicU64,
}

impl HealthCheckMonitor {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            last_pong: AtomicU64::new(NEVER),
            last_pong_wall_ms: AtomicU64::new(NEVER),
        }
    }

    pub fn record_inbound(&self) {
        let offset = self.epoch.elapsed().as_millis() as u64;
        self.last_pong.store(offset, Ordering::Release);
        self.last_pong_wall_ms.store(unix_millis(), Ordering::Release);
    }

    /// Treats "now" as the last sign of life, used when a fresh connection
    /// comes up.
    pub fn reset(&self) {
        self.record_inbound();
    }

    pub fn clear(&self) {
        self.last_pong.store(NEVER, Ordering::Release);
        self.last_pong_wall_ms.store(NEVER, Ordering::Release);
    }

    pub fn time_since_last_pong(&self) -> Option<Duration> {
        let offset = self.last_pong.load(Ordering::Acquire);
        if offset == NEVER {
            return None;
        }
        let now = self.epoch.elapsed().as_millis() as u64;
        Some(Duration::from_millis(now.saturating_sub(offset)))
    }

    /// Wall clock time of the last pong in Unix milliseconds.
    pub fn last_pong_at_ms(&self) -> Option<u64> {
        match self.last_pong_wall_ms.load(Ordering::Acquire) {
            NEVER => None,
            ms => Some(ms),
        }
    }

    pub fn is_stale(&self, timeout: Duration) -> bool {
        self.time_since_last_pong()
            .is_some_and(|silence| silence > timeout)
    }

    /// Sends `ping` every interval while the channel is open and reports
    /// [`HealthOutcome::Stale`] once the pong timeout is exceeded.
    pub async fn run(
        self: Arc<Self>,
        channel: Arc<CommandChannel>,
        ping: String,
        config: HealthConfig,
        token: CancellationToken,
    ) -> HealthOutcome {
        let mut ticker = tokio::time::interval(config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = token.cancelled() => return HealthOutcome::Stopped,
                _ = ticker.tick() => {}
            }

            if let Some(timeout) = config.pong_timeout
                && self.is_stale(timeout)
            {
                warn!(
                    silence = ?self.time_since_last_pong(),
                    "No pong within {:?}",
                    timeout
                );
                return HealthOutcome::Stale;
            }

            if !channel.is_open().await {
                continue;
            }

            match channel.send(&ping).await {
                Ok(()) => debug!(ping = %ping, "health ping sent"),
                Err(e) => debug!("Health ping not sent: {}", e),
            }
        }
    }
}

impl Default for HealthCheckMonitor {
    fn default() -> Self {
        Self::new()
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
