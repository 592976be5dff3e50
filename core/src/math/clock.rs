use crate::prelude::{SyncError, SyncResult};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, Utc};

/// Converts between UTC instants and the fixed local time both sources are scheduled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalClock {
    offset: FixedOffset,
}

impl LocalClock {
    pub fn from_hours(hours: i32) -> SyncResult<Self> {
        FixedOffset::east_opt(hours * 3600)
            .map(|offset| Self { offset })
            .ok_or_else(|| SyncError::InvalidInput(format!("invalid UTC offset {hours}h")))
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn local_to_utc(&self, local: NaiveDateTime) -> DateTime<Utc> {
        let naive_utc = local - Duration::seconds(i64::from(self.offset.local_minus_utc()));
        DateTime::<Utc>::from_naive_utc_and_offset(naive_utc, Utc)
    }

    /// Local midnight at the start of `date`, as a UTC instant.
    pub fn midnight(&self, date: NaiveDate) -> DateTime<Utc> {
        self.local_to_utc(date.and_time(NaiveTime::MIN))
    }

    pub fn at(&self, date: NaiveDate, hour: u32) -> DateTime<Utc> {
        self.midnight(date) + Duration::hours(i64::from(hour))
    }

    pub fn to_local(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        instant.with_timezone(&self.offset).naive_local()
    }

    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        self.to_local(instant).date()
    }

    /// Whole seconds from local midnight of `base` to `instant`; may exceed a day.
    pub fn secs_since_midnight_of(&self, base: NaiveDate, instant: DateTime<Utc>) -> f64 {
        (instant - self.midnight(base)).num_seconds() as f64
    }

    pub fn format(&self, instant: DateTime<Utc>) -> String {
        self.to_local(instant).format("%Y-%m-%d %H:%M:%S").to_string()
    }

    pub fn format_time(&self, instant: DateTime<Utc>) -> String {
        self.to_local(instant).format("%H:%M:%S").to_string()
    }
}

impl Default for LocalClock {
    fn default() -> Self {
        Self {
            offset: FixedOffset::east_opt(9 * 3600).unwrap_or_else(|| Utc.fix()),
        }
    }
}
