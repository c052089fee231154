use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::PipelineConfig;

/// Calendar date range, start inclusive and end exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl TimeWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        TimeWindow { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end
    }

    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}

/// Pair of adjacent windows compared by the change detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindows {
    pub before: TimeWindow,
    pub after: TimeWindow,
}

impl TimeWindows {
    /// before = [now - lookback, now - recent), after = [now - recent, now)
    ///
    /// Offsets are whole days; each bound is the UTC calendar date of the
    /// shifted instant.
    pub fn resolve(now: DateTime<Utc>, lookback_days: i64, recent_days: i64) -> Self {
        let today = now.date_naive();
        let lookback_start = (now - Duration::days(lookback_days)).date_naive();
        let recent_start = (now - Duration::days(recent_days)).date_naive();

        TimeWindows {
            before: TimeWindow::new(lookback_start, recent_start),
            after: TimeWindow::new(recent_start, today),
        }
    }

    pub fn from_config(now: DateTime<Utc>, config: &PipelineConfig) -> Self {
        Self::resolve(now, config.lookback_days, config.recent_days)
    }
}
