//! Time source shared by the claim factory, validator, and blacklist.
//!
//! Every temporal decision reads "now" through a [`Clock`] at the moment of
//! the call. Production code uses [`SystemClock`]; tests freeze time with
//! [`FixedClock`].

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use time::{Duration, OffsetDateTime};

/// A source of the current instant.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Returns the current instant.
    fn now(&self) -> OffsetDateTime;

    /// Returns the current instant as a unix timestamp.
    fn timestamp(&self) -> i64 {
        self.now().unix_timestamp()
    }
}

/// Wall-clock time in UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// A clock frozen at a unix timestamp until moved explicitly.
#[derive(Debug)]
pub struct FixedClock {
    timestamp: AtomicI64,
}

impl FixedClock {
    /// Creates a clock frozen at `timestamp`.
    #[must_use]
    pub fn at(timestamp: i64) -> Self {
        Self {
            timestamp: AtomicI64::new(timestamp),
        }
    }

    /// Creates a clock frozen at the current wall-clock second.
    #[must_use]
    pub fn frozen_now() -> Self {
        Self::at(OffsetDateTime::now_utc().unix_timestamp())
    }

    /// Moves the clock to `timestamp`.
    pub fn set(&self, timestamp: i64) {
        self.timestamp.store(timestamp, Ordering::SeqCst);
    }

    /// Moves the clock forward (or backward, for negative durations).
    pub fn advance(&self, by: Duration) {
        self.timestamp
            .fetch_add(by.whole_seconds(), Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        let ts = self.timestamp.load(Ordering::SeqCst);
        OffsetDateTime::from_unix_timestamp(ts).unwrap_or(OffsetDateTime::UNIX_EPOCH)
    }

    fn timestamp(&self) -> i64 {
        self.timestamp.load(Ordering::SeqCst)
    }
}

/// Shared handle to a clock.
pub type SharedClock = Arc<dyn Clock>;

/// Returns a shared [`SystemClock`].
#[must_use]
pub fn system_clock() -> SharedClock {
    Arc::new(SystemClock)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock_advances() {
        let clock = FixedClock::at(1_700_000_000);
        assert_eq!(clock.timestamp(), 1_700_000_000);

        clock.advance(Duration::minutes(2));
        assert_eq!(clock.timestamp(), 1_700_000_120);
        assert_eq!(clock.now().unix_timestamp(), 1_700_000_120);

        clock.set(42);
        assert_eq!(clock.timestamp(), 42);
    }

    #[test]
    fn test_system_clock_is_close_to_now() {
        let before = OffsetDateTime::now_utc().unix_timestamp();
        let ts = SystemClock.timestamp();
        assert!(ts >= before && ts - before < 5);
    }
}
