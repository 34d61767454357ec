//! # Command Watchdog
//!
//! Tracks the time since the last valid command. The watchdog only signals that the deadline has
//! passed, stopping the motors is up to the owner.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A source of the current time.
pub trait Clock {
    fn now(&self) -> Instant;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The system's monotonic clock.
#[derive(Debug, Default, Copy, Clone)]
pub struct SystemClock;

/// A clock which only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

/// Watchdog on the time of the last accepted command.
#[derive(Debug, Copy, Clone)]
pub struct Watchdog {
    last_activity: Instant,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

impl ManualClock {
    /// Create a new clock starting at the current system time.
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Move the clock forward by the given duration.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Watchdog {
    /// Start a new watchdog, treating `start` as the last activity.
    pub fn new(start: Instant) -> Self {
        Self {
            last_activity: start,
        }
    }

    /// Record activity at the given time.
    pub fn touch(&mut self, now: Instant) {
        self.last_activity = now;
    }

    /// Time elapsed between the last activity and `now`, zero if `now` is earlier.
    pub fn since_activity(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity)
    }

    /// Returns true if more than `timeout` has passed since the last activity.
    pub fn expired(&self, now: Instant, timeout: Duration) -> bool {
        self.since_activity(now) > timeout
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(10);

    #[test]
    fn test_expiry_boundary() {
        let t0 = Instant::now();
        let wd = Watchdog::new(t0);

        assert!(!wd.expired(t0, TIMEOUT));
        assert!(!wd.expired(t0 + Duration::from_millis(9_999), TIMEOUT));
        assert!(!wd.expired(t0 + TIMEOUT, TIMEOUT));
        assert!(wd.expired(t0 + Duration::from_millis(10_001), TIMEOUT));
    }

    #[test]
    fn test_touch_resets() {
        let t0 = Instant::now();
        let mut wd = Watchdog::new(t0);

        let t1 = t0 + Duration::from_secs(8);
        wd.touch(t1);

        assert!(!wd.expired(t0 + Duration::from_secs(15), TIMEOUT));
        assert!(wd.expired(t1 + Duration::from_millis(10_001), TIMEOUT));
    }

    #[test]
    fn test_time_before_activity_is_not_expired() {
        let t0 = Instant::now() + Duration::from_secs(60);
        let wd = Watchdog::new(t0);

        assert_eq!(wd.since_activity(Instant::now()), Duration::from_secs(0));
        assert!(!wd.expired(Instant::now(), Duration::from_secs(0)));
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new();
        let shared = clock.clone();
        let start = clock.now();

        shared.advance(Duration::from_millis(250));
        assert_eq!(clock.now() - start, Duration::from_millis(250));
    }
}
