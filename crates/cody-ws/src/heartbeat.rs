//! Heartbeat timing
//!
//! The session wakes on a short poll tick and asks [`Heartbeat::poll`]
//! whether the interval has elapsed since the last heartbeat. The error
//! bound is one poll tick.

use std::time::Duration;
use tokio::time::Instant;

/// Default time between heartbeats
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(300);

/// Default poll cadence
pub const DEFAULT_HEARTBEAT_POLL: Duration = Duration::from_secs(1);

/// Elapsed-time marker for the heartbeat
#[derive(Debug, Clone)]
pub struct Heartbeat {
    interval: Duration,
    last_sent: Instant,
}

impl Heartbeat {
    /// Start timing from `now`; nothing is due until a full interval passes
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            last_sent: now,
        }
    }

    /// Configured interval
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Check if a heartbeat is due at `now`
    pub fn is_due(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_sent) >= self.interval
    }

    /// Restart the interval from `now`
    pub fn reset(&mut self, now: Instant) {
        self.last_sent = now;
    }

    /// If due, reset the marker and return true
    pub fn poll(&mut self, now: Instant) -> bool {
        if self.is_due(now) {
            self.last_sent = now;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_due_before_interval() {
        let start = Instant::now();
        let hb = Heartbeat::new(Duration::from_secs(2), start);
        assert!(!hb.is_due(start));
        assert!(!hb.is_due(start + Duration::from_secs(1)));
        assert!(hb.is_due(start + Duration::from_secs(2)));
    }

    #[test]
    fn test_poll_resets_marker() {
        let start = Instant::now();
        let mut hb = Heartbeat::new(Duration::from_secs(2), start);

        let ticks: Vec<bool> = (1..=6)
            .map(|s| hb.poll(start + Duration::from_secs(s)))
            .collect();
        assert_eq!(ticks, vec![false, true, false, true, false, true]);
    }

    #[test]
    fn test_reset() {
        let start = Instant::now();
        let mut hb = Heartbeat::new(Duration::from_secs(2), start);
        hb.reset(start + Duration::from_secs(5));
        assert!(!hb.is_due(start + Duration::from_secs(6)));
        assert!(hb.is_due(start + Duration::from_secs(7)));
    }
}
