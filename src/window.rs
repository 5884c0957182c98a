use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Offset, Utc};
use serde::Serialize;

/// Where an instant falls relative to the daily submission window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowStatus {
    Before,
    During,
    After,
}

impl fmt::Display for WindowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WindowStatus::Before => "not open yet",
            WindowStatus::During => "open",
            WindowStatus::After => "closed for the day",
        };
        f.write_str(label)
    }
}

/// Daily submission window in team-local time. Both bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmissionWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub offset: FixedOffset,
}

impl SubmissionWindow {
    pub fn new(start: NaiveTime, end: NaiveTime, offset: FixedOffset) -> Self {
        Self { start, end, offset }
    }

    pub fn local(&self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        instant.with_timezone(&self.offset)
    }

    /// The calendar date a submission made at `instant` counts towards.
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        self.local(instant).date_naive()
    }

    pub fn status(&self, instant: DateTime<Utc>) -> WindowStatus {
        let time = self.local(instant).time();
        if time < self.start {
            WindowStatus::Before
        } else if time > self.end {
            WindowStatus::After
        } else {
            WindowStatus::During
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.status(instant) == WindowStatus::During
    }
}

impl Default for SubmissionWindow {
    /// 09:30 to 12:30 at UTC+1.
    fn default() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(9, 30, 0).unwrap_or(NaiveTime::MIN),
            end: NaiveTime::from_hms_opt(12, 30, 0).unwrap_or(NaiveTime::MIN),
            offset: FixedOffset::east_opt(60 * 60).unwrap_or(Utc.fix()),
        }
    }
}
