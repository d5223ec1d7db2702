//! Minimum spacing between outbound requests

use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Default spacing between signed requests
pub const DEFAULT_THROTTLE_INTERVAL: Duration = Duration::from_secs(1);

/// Enforces a minimum interval between consecutive sends
///
/// Each caller reserves the next free slot under the lock and then sleeps
/// until it, so concurrent callers are spaced as well.
#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl Throttle {
    /// Create a throttle with the given spacing
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: Mutex::new(None),
        }
    }

    /// Configured spacing
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until the caller may send
    pub async fn wait(&self) {
        let slot = self.reserve();
        tokio::time::sleep_until(slot).await;
    }

    fn reserve(&self) -> Instant {
        let now = Instant::now();
        let mut next = self.next_slot.lock();
        let slot = match *next {
            Some(at) if at > now => at,
            _ => now,
        };
        *next = Some(slot + self.interval);
        slot
    }
}

impl Default for Throttle {
    fn default() -> Self {
        Self::new(DEFAULT_THROTTLE_INTERVAL)
    }
}
