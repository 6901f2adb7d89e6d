//! Time source used for calendar-boundary decisions

use std::sync::Arc;

use chrono::{DateTime, Local, TimeDelta};
use parking_lot::RwLock;

/// Source of "now" for the rotation engine
pub trait Clock: Send + Sync + 'static {
    /// The current local time
    fn now(&self) -> DateTime<Local>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A clock that only moves when told to
///
/// Clones share the same instant, so a test can hand one clone to a writer
/// and advance the other.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<RwLock<DateTime<Local>>>,
}

impl ManualClock {
    /// Create a clock frozen at `now`
    pub fn new(now: DateTime<Local>) -> Self {
        Self {
            now: Arc::new(RwLock::new(now)),
        }
    }

    /// Jump to `now`
    pub fn set(&self, now: DateTime<Local>) {
        *self.now.write() = now;
    }

    /// Move forward by `delta`
    pub fn advance(&self, delta: TimeDelta) {
        let mut now = self.now.write();
        *now += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let start = Local.with_ymd_and_hms(2024, 1, 1, 23, 59, 59).unwrap();
        let clock = ManualClock::new(start);
        let handle = clock.clone();

        handle.advance(TimeDelta::seconds(2));

        assert_eq!(
            clock.now(),
            Local.with_ymd_and_hms(2024, 1, 2, 0, 0, 1).unwrap()
        );
    }
}
