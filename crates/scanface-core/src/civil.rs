//! Fixed-offset civil time.
//!
//! Day boundaries and recorded timestamps use one configured UTC offset
//! (UTC+7 by default), independent of the host's local zone.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};

/// Default civil offset in hours east of UTC.
pub const DEFAULT_UTC_OFFSET_HOURS: i32 = 7;

/// Build an offset from whole hours. `None` if outside (-24, 24).
pub fn fixed_offset(hours: i32) -> Option<FixedOffset> {
    FixedOffset::east_opt(hours.checked_mul(3600)?)
}

/// Express an instant in the civil offset.
pub fn civil_time(ts: DateTime<Utc>, offset: FixedOffset) -> DateTime<FixedOffset> {
    ts.with_timezone(&offset)
}

/// Calendar date of an instant in the civil offset.
pub fn civil_day(ts: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    civil_time(ts, offset).date_naive()
}

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
