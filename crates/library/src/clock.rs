//! Injectable time source for timestamped records.

use std::sync::atomic::{AtomicI64, Ordering};
use time::{Duration, UtcDateTime};

/// Source of "now" for created/updated timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> UtcDateTime;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;
impl Clock for SystemClock {
    fn now(&self) -> UtcDateTime {
        UtcDateTime::now()
    }
}

/// A clock that only moves when told to, with whole-second precision (the
/// catalog stores Unix timestamps).
#[derive(Debug)]
pub struct FixedClock {
    seconds: AtomicI64,
}
impl FixedClock {
    pub fn new(at: UtcDateTime) -> Self {
        Self {
            seconds: AtomicI64::new(at.unix_timestamp()),
        }
    }

    pub fn set(&self, at: UtcDateTime) {
        self.seconds.store(at.unix_timestamp(), Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.seconds.fetch_add(by.whole_seconds(), Ordering::SeqCst);
    }
}
impl Clock for FixedClock {
    fn now(&self) -> UtcDateTime {
        UtcDateTime::from_unix_timestamp(self.seconds.load(Ordering::SeqCst)).unwrap_or(UtcDateTime::UNIX_EPOCH)
    }
}
