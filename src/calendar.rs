//! Business calendar
//!
//! Computes elapsed working time between two instants under configurable
//! working days, optional daily working hours, and holidays. Without working
//! hours the computation is calendar-day based: the full 24h of every working
//! day in range counts and non-working days are excluded entirely. With
//! working hours only time inside the daily window on working days counts.
//!
//! Dates and windows are interpreted against the UTC wall clock; callers
//! normalize instants to UTC before they reach the engine.

use std::collections::HashSet;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("invalid range: start {start} is after end {end}")]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    #[error("calendar configuration has no working days")]
    NoWorkingDays,
    #[error("working hours start {start} is not before end {end}")]
    InvalidWorkingHours { start: NaiveTime, end: NaiveTime },
}

/// Daily working window, e.g. 09:00–17:00.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// Weekdays that count as working days.
    pub working_days: Vec<Weekday>,
    /// Daily working window; `None` means full 24h days.
    pub working_hours: Option<WorkingHours>,
    /// Dates excluded even when they fall on a working weekday.
    #[serde(default)]
    pub holidays: Vec<NaiveDate>,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            working_days: vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ],
            working_hours: None,
            holidays: Vec::new(),
        }
    }
}

/// Validated business calendar. Construction fails on configuration errors so
/// nothing downstream computes against an inconsistent calendar.
#[derive(Debug, Clone)]
pub struct BusinessCalendar {
    working_days: HashSet<Weekday>,
    working_hours: Option<WorkingHours>,
    holidays: HashSet<NaiveDate>,
}

impl BusinessCalendar {
    pub fn new(config: CalendarConfig) -> Result<Self, CalendarError> {
        if config.working_days.is_empty() {
            return Err(CalendarError::NoWorkingDays);
        }
        if let Some(hours) = config.working_hours {
            if hours.start >= hours.end {
                return Err(CalendarError::InvalidWorkingHours {
                    start: hours.start,
                    end: hours.end,
                });
            }
        }
        Ok(Self {
            working_days: config.working_days.into_iter().collect(),
            working_hours: config.working_hours,
            holidays: config.holidays.into_iter().collect(),
        })
    }

    pub fn is_working_day(&self, date: NaiveDate) -> bool {
        self.working_days.contains(&date.weekday()) && !self.holidays.contains(&date)
    }

    /// Working window for one date, or `None` on non-working days.
    fn day_window(&self, date: NaiveDate) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        if !self.is_working_day(date) {
            return None;
        }
        match self.working_hours {
            Some(hours) => Some((
                date.and_time(hours.start).and_utc(),
                date.and_time(hours.end).and_utc(),
            )),
            None => {
                let next = date.succ_opt()?;
                Some((
                    date.and_time(NaiveTime::MIN).and_utc(),
                    next.and_time(NaiveTime::MIN).and_utc(),
                ))
            }
        }
    }

    /// Elapsed working time within `[start, end)`.
    ///
    /// Endpoints on non-working days or outside the daily window clip to the
    /// nearest bounded working period, so e.g. a Saturday start contributes
    /// nothing and counting resumes Monday morning.
    pub fn elapsed(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Duration, CalendarError> {
        if start > end {
            return Err(CalendarError::InvalidRange { start, end });
        }

        let mut total = Duration::zero();
        let mut day = start.date_naive();
        let last = end.date_naive();
        while day <= last {
            if let Some((window_start, window_end)) = self.day_window(day) {
                let lo = start.max(window_start);
                let hi = end.min(window_end);
                if hi > lo {
                    total += hi - lo;
                }
            }
            match day.succ_opt() {
                Some(next) => day = next,
                None => break,
            }
        }
        Ok(total)
    }

    /// Elapsed working time in fractional seconds, the unit metric results
    /// are reported in.
    pub fn elapsed_seconds(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<f64, CalendarError> {
        let elapsed = self.elapsed(start, end)?;
        Ok(elapsed.num_milliseconds() as f64 / 1000.0)
    }
}
