use crate::transport::TransportConfig;
use pairlink_core::Role;
use std::time::Duration;

/// Timing and retry knobs of one session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Pause between tearing down a dead transport and building a new one.
    pub drain_delay: Duration,
    pub backoff: BackoffPolicy,
    /// Failed attempts after which the session gives up until the next
    /// explicit `start`.
    pub max_attempts: u32,
    /// Delay before retrying a transport that could not even be created.
    /// These retries never count as attempts.
    pub transport_retry_delay: Duration,
    pub gathering_timeout: Duration,
    /// How long a negotiated transport may take to report `Connected`.
    pub connect_timeout: Duration,
    /// How long the offerer waits for an answer. `None` waits forever.
    pub answer_timeout: Option<Duration>,
    pub health: HealthConfig,
    pub channel_label: String,
    pub transport: TransportConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            drain_delay: Duration::from_millis(500),
            backoff: BackoffPolicy::default(),
            max_attempts: 5,
            transport_retry_delay: Duration::from_secs(1),
            gathering_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(30),
            answer_timeout: None,
            health: HealthConfig::default(),
            channel_label: "commands".to_owned(),
            transport: TransportConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn with_drain_delay(mut self, delay: Duration) -> Self {
        self.drain_delay = delay;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_transport_retry_delay(mut self, delay: Duration) -> Self {
        self.transport_retry_delay = delay;
        self
    }

    pub fn with_gathering_timeout(mut self, timeout: Duration) -> Self {
        self.gathering_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_answer_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.answer_timeout = timeout;
        self
    }

    pub fn with_health(mut self, health: HealthConfig) -> Self {
        self.health = health;
        self
    }

    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }
}

/// Delay before the n-th reconnection attempt: `base_delay * n`, capped at
/// `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl BackoffPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
        }
    }

    pub fn delay_for(&self, attempts: u32) -> Duration {
        self.base_delay
            .checked_mul(attempts.max(1))
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(2), Duration::from_secs(60))
    }
}

#[derive(Debug, Clone)]
pub struct HealthConfig {
    pub interval: Duration,
    /// Silence after which the connection is declared dead and rebuilt.
    /// `None` only records liveness and leaves the decision to the caller.
    pub pong_timeout: Option<Duration>,
    /// Role that sends pings. The other side only answers them.
    pub pinger: Role,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            pong_timeout: Some(Duration::from_secs(90)),
            pinger: Role::Answerer,
        }
    }
}
