//! Heartbeat and liveness timers.
//!
//! Two independent timers against a monotonic clock:
//!
//! - **Send timer**: a heartbeat is due every `heartbeat_interval` while the
//!   session is authenticated. The cadence is fixed; inbound traffic does not
//!   postpone it.
//! - **Watchdog**: if nothing has been received for longer than
//!   `connection_timeout`, the link is considered dead regardless of what the
//!   transport reports. A half-open TLS session can look connected while the
//!   application protocol has stalled.

use std::time::{Duration, Instant};

use super::session::SessionConfig;

/// Liveness bookkeeping for one session.
#[derive(Debug, Clone)]
pub struct Liveness {
    heartbeat_interval: Duration,
    connection_timeout: Duration,
    last_inbound: Instant,
    last_heartbeat: Instant,
}

impl Liveness {
    /// Start both clocks at `now`.
    pub fn new(config: &SessionConfig, now: Instant) -> Self {
        Self {
            heartbeat_interval: config.heartbeat_interval,
            connection_timeout: config.connection_timeout,
            last_inbound: now,
            last_heartbeat: now,
        }
    }

    /// Record inbound activity.
    pub fn record_inbound(&mut self, now: Instant) {
        self.last_inbound = now;
    }

    /// Restart the send timer (on successful authentication).
    pub fn restart_heartbeat(&mut self, now: Instant) {
        self.last_heartbeat = now;
    }

    /// Time of the last recorded inbound activity.
    pub fn last_inbound(&self) -> Instant {
        self.last_inbound
    }

    /// Time the last heartbeat was sent (or the send timer was restarted).
    pub fn last_heartbeat(&self) -> Instant {
        self.last_heartbeat
    }

    /// Returns `true` and rearms the send timer if a heartbeat is due.
    pub fn poll_heartbeat(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last_heartbeat) >= self.heartbeat_interval {
            self.last_heartbeat = now;
            true
        } else {
            false
        }
    }

    /// `Some(silence)` if the watchdog timeout has been exceeded.
    #[must_use]
    pub fn check_timeout(&self, now: Instant) -> Option<Duration> {
        let silence = now.saturating_duration_since(self.last_inbound);
        if silence > self.connection_timeout {
            Some(silence)
        } else {
            None
        }
    }
}
