//! Time source for the protocol core.
//!
//! Bulk-transfer timeouts, ack timestamps and the pause between redundant
//! transmissions all read time through [`Clock`], so protocol scenarios can
//! run against a [`ManualClock`] without sleeping.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Monotonic time, wall-clock time and blocking delay.
pub trait Clock {
    /// Monotonic now.
    fn now(&self) -> Instant;

    /// Seconds since the Unix epoch (0 if the clock is not set).
    fn unix_time(&self) -> u32;

    /// Block for `duration`.
    fn delay(&self, duration: Duration);
}

/// Real time from the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn unix_time(&self) -> u32 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0)
    }

    fn delay(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[derive(Debug)]
struct ManualState {
    now: Instant,
    unix: u32,
    delays: Vec<Duration>,
}

/// Clock that only moves when told to.
///
/// [`Clock::delay`] advances time instantly and records the requested
/// duration. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    state: Arc<Mutex<ManualState>>,
}

impl ManualClock {
    /// Clock starting at `unix` seconds.
    pub fn new(unix: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(ManualState {
                now: Instant::now(),
                unix,
                delays: Vec::new(),
            })),
        }
    }

    /// Move time forward.
    pub fn advance(&self, by: Duration) {
        let mut state = self.lock();
        state.now += by;
        state.unix = state.unix.wrapping_add(by.as_secs() as u32);
    }

    /// Delays requested so far, in order.
    pub fn delays(&self) -> Vec<Duration> {
        self.lock().delays.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.lock().now
    }

    fn unix_time(&self) -> u32 {
        self.lock().unix
    }

    fn delay(&self, duration: Duration) {
        self.lock().delays.push(duration);
        self.advance(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new(1_000);
        let start = clock.now();
        clock.advance(Duration::from_secs(61));
        assert_eq!(clock.now() - start, Duration::from_secs(61));
        assert_eq!(clock.unix_time(), 1_061);
    }

    #[test]
    fn test_manual_delay_is_recorded() {
        let clock = ManualClock::new(0);
        let shared = clock.clone();
        clock.delay(Duration::from_millis(500));
        assert_eq!(shared.delays(), vec![Duration::from_millis(500)]);
    }

    #[test]
    fn test_system_clock_is_set() {
        // Any host running the tests is past 2020
        assert!(SystemClock.unix_time() > 1_577_836_800);
    }
}
