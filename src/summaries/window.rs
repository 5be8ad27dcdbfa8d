//! Local calendar periods resolved to half-open UTC windows.
//!
//! Boundaries come from the IANA rules for the zone at each boundary date, so a
//! day across a DST change is 23 or 25 hours long, never a fixed 24.

use chrono::{Datelike, Duration as ChronoDuration, NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;

/// Steps tried past a midnight that falls inside a DST gap.
const GAP_STEP_MINUTES: i64 = 15;
const MAX_GAP_STEPS: i64 = 4 * 4;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum WindowError {
    #[error("unknown timezone: {0}")]
    UnknownTimezone(String),
    #[error("date out of range: {0}")]
    OutOfRange(String),
    #[error("local midnight of {0} cannot be resolved in {1}")]
    Unresolvable(NaiveDate, &'static str),
}

/// A calendar period in the owner's local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Day(NaiveDate),
    /// ISO week containing the date (Monday start).
    Week(NaiveDate),
    Month { year: i32, month: u32 },
    Year(i32),
}

impl Period {
    /// First and one-past-last local dates of the period.
    pub fn date_bounds(&self) -> Result<(NaiveDate, NaiveDate), WindowError> {
        let out_of_range = || WindowError::OutOfRange(format!("{self:?}"));
        match *self {
            Period::Day(d) => Ok((d, d.succ_opt().ok_or_else(out_of_range)?)),
            Period::Week(d) => {
                let back = i64::from(d.weekday().num_days_from_monday());
                let monday = d
                    .checked_sub_signed(ChronoDuration::days(back))
                    .ok_or_else(out_of_range)?;
                let next = monday
                    .checked_add_signed(ChronoDuration::days(7))
                    .ok_or_else(out_of_range)?;
                Ok((monday, next))
            }
            Period::Month { year, month } => {
                let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(out_of_range)?;
                let (ny, nm) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
                let next = NaiveDate::from_ymd_opt(ny, nm, 1).ok_or_else(out_of_range)?;
                Ok((first, next))
            }
            Period::Year(year) => {
                let first = NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(out_of_range)?;
                let next = NaiveDate::from_ymd_opt(year + 1, 1, 1).ok_or_else(out_of_range)?;
                Ok((first, next))
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Period::Day(_) => "day",
            Period::Week(_) => "week",
            Period::Month { .. } => "month",
            Period::Year(_) => "year",
        }
    }
}

/// `[start, end)` in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SummaryWindow {
    #[serde(with = "time::serde::rfc3339")]
    pub start: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end: OffsetDateTime,
}

impl SummaryWindow {
    pub fn for_period(period: Period, tz: Tz) -> Result<Self, WindowError> {
        let (first, next) = period.date_bounds()?;
        Ok(Self {
            start: local_midnight(first, tz)?,
            end: local_midnight(next, tz)?,
        })
    }

    pub fn contains(&self, at: OffsetDateTime) -> bool {
        self.start <= at && at < self.end
    }

    #[cfg(test)]
    pub fn duration(&self) -> time::Duration {
        self.end - self.start
    }
}

/// Parses an IANA zone name, falling back to `default` when none was given.
pub fn resolve_timezone(name: Option<&str>, default: Tz) -> Result<Tz, WindowError> {
    match name.map(str::trim).filter(|n| !n.is_empty()) {
        None => Ok(default),
        Some(n) => n
            .parse::<Tz>()
            .map_err(|_| WindowError::UnknownTimezone(n.to_string())),
    }
}

/// First instant of `date` in `tz`. An ambiguous midnight takes the earlier
/// instant; a midnight inside a gap moves to the first local time that exists.
fn local_midnight(date: NaiveDate, tz: Tz) -> Result<OffsetDateTime, WindowError> {
    let mut local: NaiveDateTime = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| WindowError::OutOfRange(date.to_string()))?;
    for _ in 0..=MAX_GAP_STEPS {
        if let Some(at) = tz.from_local_datetime(&local).earliest() {
            return OffsetDateTime::from_unix_timestamp(at.timestamp())
                .map_err(|e| WindowError::OutOfRange(e.to_string()));
        }
        local += ChronoDuration::minutes(GAP_STEP_MINUTES);
    }
    Err(WindowError::Unresolvable(date, tz.name()))
}
