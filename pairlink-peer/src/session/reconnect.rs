use crate::config::BackoffPolicy;
use std::time::Duration;
use tracing::{error, info};

/// Reconnection bookkeeping exposed in session snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconnectionState {
    pub attempts: u32,
    pub is_reconnecting: bool,
    pub max_attempts: u32,
}

/// What to do after a failed connect attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    /// Too many failures; wait for an explicit `start`.
    Exhausted,
}

/// Decides when a dead connection is rebuilt.
///
/// Owned by the session actor and only mutated from its task, so the
/// check-and-set in [`try_begin`](Self::try_begin) cannot race.
#[derive(Debug)]
pub struct ReconnectionSupervisor {
    state: ReconnectionState,
    backoff: BackoffPolicy,
}

impl ReconnectionSupervisor {
    pub fn new(max_attempts: u32, backoff: BackoffPolicy) -> Self {
        Self {
            state: ReconnectionState {
                max_attempts,
                ..Default::default()
            },
            backoff,
        }
    }

    pub fn state(&self) -> ReconnectionState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.state.attempts
    }

    pub fn is_reconnecting(&self) -> bool {
        self.state.is_reconnecting
    }

    pub fn is_exhausted(&self) -> bool {
        self.state.attempts >= self.state.max_attempts
    }

    /// Marks a reconnection sequence as in flight. Returns `false` when one
    /// already is, in which case the caller must do nothing.
    pub fn try_begin(&mut self) -> bool {
        if self.state.is_reconnecting {
            return false;
        }
        self.state.is_reconnecting = true;
        true
    }

    pub fn on_connected(&mut self) {
        if self.state.attempts > 0 {
            info!(
                attempts = self.state.attempts,
                "connection restored, resetting attempts"
            );
        }
        self.state.attempts = 0;
        self.state.is_reconnecting = false;
    }

    pub fn record_failure(&mut self) -> RetryDecision {
        self.state.is_reconnecting = false;
        self.state.attempts = self.state.attempts.saturating_add(1);

        if self.is_exhausted() {
            error!(
                attempts = self.state.attempts,
                max_attempts = self.state.max_attempts,
                "max reconnection attempts reached"
            );
            return RetryDecision::Exhausted;
        }

        RetryDecision::RetryAfter(self.backoff.delay_for(self.state.attempts))
    }

    /// Back to a clean slate, e.g. on an explicit `start` or `shutdown`.
    pub fn reset(&mut self) {
        self.state.attempts = 0;
        self.state.is_reconnecting = false;
    }
}
