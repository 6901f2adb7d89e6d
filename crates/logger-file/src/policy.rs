//! Rotation decisions

use crate::config::{Granularity, RotationMode};

use chrono::{DateTime, Datelike, Local, TimeZone, Timelike};

/// Why a rotation is due
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The incoming write would take the file to its size threshold
    Size,
    /// A calendar boundary was crossed since the last write
    Time,
}

/// Decides whether the live file must be rotated before a write
#[derive(Debug, Clone, Copy)]
pub struct RotationPolicy {
    mode: RotationMode,
}

impl RotationPolicy {
    /// Build the policy for a rotation mode
    pub const fn new(mode: RotationMode) -> Self {
        Self { mode }
    }

    /// The mode this policy enforces
    pub const fn mode(&self) -> RotationMode {
        self.mode
    }

    /// Whether the file must be rotated before writing `incoming` bytes
    pub fn must_rotate(
        &self,
        current_size: u64,
        last_write: &DateTime<Local>,
        incoming: u64,
        now: &DateTime<Local>,
    ) -> bool {
        self.trigger(current_size, last_write, incoming, now)
            .is_some()
    }

    /// Like [`must_rotate`](Self::must_rotate), reporting which condition fired
    pub fn trigger(
        &self,
        current_size: u64,
        last_write: &DateTime<Local>,
        incoming: u64,
        now: &DateTime<Local>,
    ) -> Option<Trigger> {
        if let Some(max_bytes) = self.mode.max_bytes() {
            // A fresh file never rotates, whatever the threshold.
            if current_size > 0 && current_size.saturating_add(incoming) >= max_bytes {
                return Some(Trigger::Size);
            }
        }

        if let Some(granularity) = self.mode.granularity() {
            if current_size > 0 && crossed_boundary(granularity, last_write, now) {
                return Some(Trigger::Time);
            }
        }

        None
    }
}

/// Calendar bucket containing `at`
fn bucket(granularity: Granularity, at: &DateTime<Local>) -> (i32, u32, u32, u32) {
    match granularity {
        Granularity::Hour => (at.year(), at.month(), at.day(), at.hour()),
        Granularity::Day => (at.year(), at.month(), at.day(), 0),
        Granularity::Month => (at.year(), at.month(), 0, 0),
    }
}

/// Whether `now` falls into a later bucket than `earlier`
///
/// A clock stepping backwards never crosses a boundary.
pub fn crossed_boundary(
    granularity: Granularity,
    earlier: &DateTime<Local>,
    now: &DateTime<Local>,
) -> bool {
    bucket(granularity, now) > bucket(granularity, earlier)
}

/// Backup suffix for the bucket containing `at`, e.g. `20240101`
pub fn bucket_suffix(granularity: Granularity, at: &DateTime<Local>) -> String {
    at.format(granularity.suffix_format()).to_string()
}

/// Local time from unix seconds, falling back to `fallback` for instants the
/// time zone cannot represent
pub(crate) fn local_from_unix(secs: i64, fallback: DateTime<Local>) -> DateTime<Local> {
    Local.timestamp_opt(secs, 0).earliest().unwrap_or(fallback)
}

/// Start of the hour following `now`
pub(crate) fn next_top_of_hour(now: &DateTime<Local>) -> DateTime<Local> {
    let elapsed = i64::from(now.minute()) * 60 + i64::from(now.second());
    let base = *now - chrono::TimeDelta::seconds(elapsed)
        - chrono::TimeDelta::nanoseconds(i64::from(now.nanosecond()));
    base + chrono::TimeDelta::hours(1)
}
