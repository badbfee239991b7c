//! When the roster consumer runs.

use chrono::{DateTime, NaiveTime, TimeDelta, Utc};

use crate::types::ScheduleConfig;

/// A UTC time of day plus a repeat interval.
///
/// Runs fall on `start, start + repeat, start + 2 * repeat, ...` where
/// `start` is the start time on the current UTC day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSchedule {
    start_time: NaiveTime,
    repeat: TimeDelta,
}

impl RunSchedule {
    /// Create a schedule. A `repeat` below one nanosecond is treated as one.
    #[must_use]
    pub fn new(start_time: NaiveTime, repeat: TimeDelta) -> Self {
        Self {
            start_time,
            repeat: repeat.max(TimeDelta::nanoseconds(1)),
        }
    }

    /// First run of each UTC day
    #[must_use]
    pub fn start_time(&self) -> NaiveTime {
        self.start_time
    }

    /// Interval between runs
    #[must_use]
    pub fn repeat(&self) -> TimeDelta {
        self.repeat
    }

    /// The first run not before `now`
    #[must_use]
    pub fn next_run_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let anchor = now.date_naive().and_time(self.start_time).and_utc();
        if anchor >= now {
            return anchor;
        }

        // A day holds fewer nanoseconds than i64::MAX, so `behind` always fits
        let behind = (now - anchor).num_nanoseconds().unwrap_or(i64::MAX);
        let step = self.repeat.num_nanoseconds().unwrap_or(i64::MAX);
        let periods = behind / step + i64::from(behind % step != 0);
        anchor
            .checked_add_signed(TimeDelta::nanoseconds(periods.saturating_mul(step)))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

impl From<&ScheduleConfig> for RunSchedule {
    fn from(config: &ScheduleConfig) -> Self {
        Self::new(
            config.start_time,
            TimeDelta::from_std(config.repeat).unwrap_or(TimeDelta::MAX),
        )
    }
}
