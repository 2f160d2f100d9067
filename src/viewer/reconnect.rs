//! Connection state machine
//!
//! ```text
//!  Disconnected ──begin_attempt──► Connecting ──on_connected──► Connected
//!                                      │                            │
//!                                      └────────on_failure──────────┤
//!                                                                   ▼
//!  Connecting ◄──begin_attempt── (retry fired) ◄──delay── Failed [pending_retry]
//!
//!  close(): any state ──► Closed (terminal)
//! ```
//!
//! At most one retry is outstanding: a failure reported while a retry is
//! pending is absorbed instead of scheduling a second timer.

use std::time::Duration;

use super::config::ReconnectPolicy;

/// Connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
    Closed,
}

/// What to do about a reported failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Start one timer for this delay
    Schedule(Duration),
    /// A retry is already pending; do nothing
    AlreadyScheduled,
    /// The client is closed
    Stopped,
}

/// Reconnection bookkeeping for one shared connection
#[derive(Debug)]
pub struct Reconnector {
    policy: ReconnectPolicy,
    state: ConnectionState,
    pending_retry: bool,
    consecutive_failures: u32,
    attempts: u64,
}

impl Reconnector {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            state: ConnectionState::Disconnected,
            pending_retry: false,
            consecutive_failures: 0,
            attempts: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn pending_retry(&self) -> bool {
        self.pending_retry
    }

    /// Failures since the last successful connection
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Connection attempts started so far
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    /// Start a connection attempt; returns its number
    ///
    /// Refused while a retry timer is pending, while an attempt is already
    /// in flight, or after close.
    pub fn begin_attempt(&mut self) -> Option<u64> {
        match self.state {
            ConnectionState::Disconnected | ConnectionState::Failed if !self.pending_retry => {
                self.state = ConnectionState::Connecting;
                self.attempts += 1;
                Some(self.attempts)
            }
            _ => None,
        }
    }

    pub fn on_connected(&mut self) {
        if self.state == ConnectionState::Connecting {
            self.state = ConnectionState::Connected;
            self.consecutive_failures = 0;
        }
    }

    /// Record an error or unexpected close
    ///
    /// The first failure after a healthy connection waits `initial_delay`;
    /// a failure of the very next attempt waits `repeat_delay`.
    pub fn on_failure(&mut self) -> RetryDecision {
        if self.state == ConnectionState::Closed {
            return RetryDecision::Stopped;
        }
        if self.pending_retry {
            return RetryDecision::AlreadyScheduled;
        }

        let delay = if self.consecutive_failures == 0 {
            self.policy.initial_delay
        } else {
            self.policy.repeat_delay
        };
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.state = ConnectionState::Failed;
        self.pending_retry = true;
        RetryDecision::Schedule(delay)
    }

    /// The retry timer elapsed; returns whether an attempt may start
    pub fn on_retry_fired(&mut self) -> bool {
        if !self.pending_retry || self.state == ConnectionState::Closed {
            return false;
        }
        self.pending_retry = false;
        true
    }

    /// Drop a pending retry without attempting
    pub fn cancel_retry(&mut self) {
        self.pending_retry = false;
    }

    /// Terminal: no further attempts or retries
    pub fn close(&mut self) {
        self.state = ConnectionState::Closed;
        self.pending_retry = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reconnector() -> Reconnector {
        Reconnector::new(ReconnectPolicy {
            initial_delay: Duration::from_secs(3),
            repeat_delay: Duration::from_secs(10),
        })
    }

    #[test]
    fn test_connect_cycle() {
        let mut r = reconnector();
        assert_eq!(r.state(), ConnectionState::Disconnected);
        assert_eq!(r.begin_attempt(), Some(1));
        assert_eq!(r.state(), ConnectionState::Connecting);
        assert_eq!(r.begin_attempt(), None);

        r.on_connected();
        assert_eq!(r.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_single_retry_for_repeated_errors() {
        let mut r = reconnector();
        r.begin_attempt();
        r.on_connected();

        assert_eq!(r.on_failure(), RetryDecision::Schedule(Duration::from_secs(3)));
        assert_eq!(r.on_failure(), RetryDecision::AlreadyScheduled);
        assert_eq!(r.on_failure(), RetryDecision::AlreadyScheduled);
        assert_eq!(r.begin_attempt(), None);

        assert!(r.on_retry_fired());
        assert!(!r.on_retry_fired());
        assert_eq!(r.begin_attempt(), Some(2));
        assert_eq!(r.begin_attempt(), None);
    }

    #[test]
    fn test_repeat_failure_uses_longer_delay() {
        let mut r = reconnector();
        r.begin_attempt();
        r.on_connected();

        assert_eq!(r.on_failure(), RetryDecision::Schedule(Duration::from_secs(3)));
        r.on_retry_fired();
        r.begin_attempt();
        assert_eq!(r.on_failure(), RetryDecision::Schedule(Duration::from_secs(10)));
        assert_eq!(r.consecutive_failures(), 2);

        r.on_retry_fired();
        r.begin_attempt();
        r.on_connected();
        assert_eq!(r.consecutive_failures(), 0);
        assert_eq!(r.on_failure(), RetryDecision::Schedule(Duration::from_secs(3)));
    }

    #[test]
    fn test_close_stops_everything() {
        let mut r = reconnector();
        r.begin_attempt();
        assert!(matches!(r.on_failure(), RetryDecision::Schedule(_)));

        r.close();
        assert!(!r.pending_retry());
        assert!(!r.on_retry_fired());
        assert_eq!(r.on_failure(), RetryDecision::Stopped);
        assert_eq!(r.begin_attempt(), None);
    }

    #[test]
    fn test_cancel_retry_allows_immediate_attempt() {
        let mut r = reconnector();
        r.begin_attempt();
        r.on_failure();
        r.cancel_retry();

        assert_eq!(r.begin_attempt(), Some(2));
    }
}
