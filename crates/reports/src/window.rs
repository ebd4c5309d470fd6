//! Trading-day timestamp materialization.
//!
//! A business day does not align with the calendar day: trading day `D`
//! runs from `D 10:00:00` to `D+1 09:59:59` Eastern time, so an order
//! placed at 08:30 on Tuesday belongs to Monday's report. The
//! [`TimeWindow`] produced here is the precise half-open-by-seconds
//! interval handed to the order fetcher and re-checked against every
//! returned timestamp.

use chrono::{DateTime, Days, NaiveDate, NaiveTime, TimeZone};
use chrono_tz::Tz;
use thiserror::Error;

use crate::calendar::ReportingWindow;

/// Timezone all trading-day boundaries are anchored in.
pub const REPORTING_TIMEZONE: Tz = chrono_tz::America::New_York;

/// Hour of day (ET) at which one trading day ends and the next begins.
pub const TRADING_DAY_CUTOFF_HOUR: u32 = 10;

/// Window construction errors.
#[derive(Debug, Error)]
pub enum WindowError {
    /// The end boundary date precedes the start date.
    #[error("window end boundary {end} precedes start {start}")]
    EndBeforeStart {
        /// First trading day of the window.
        start: NaiveDate,
        /// Requested end boundary date.
        end: NaiveDate,
    },
    /// The boundary time does not exist in the reporting timezone.
    ///
    /// Cannot occur for the 10:00 ET cutoff (DST transitions happen at
    /// 02:00 local), but the conversion is fallible and we refuse to
    /// guess.
    #[error("boundary {date} {time} is not a valid local time in {REPORTING_TIMEZONE}")]
    InvalidLocalTime {
        /// Date of the unrepresentable boundary.
        date: NaiveDate,
        /// Time-of-day of the unrepresentable boundary.
        time: NaiveTime,
    },
    /// Date arithmetic left the representable range.
    #[error("date arithmetic out of range near {0}")]
    DateOutOfRange(NaiveDate),
}

/// An inclusive timestamp interval in the reporting timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    /// First instant covered (inclusive).
    pub start: DateTime<Tz>,
    /// Last instant covered (inclusive).
    pub end: DateTime<Tz>,
}

impl TimeWindow {
    /// Materialize the timestamps for a calendar reporting window.
    ///
    /// The window opens at 10:00:00 ET on the first trading day and
    /// closes at 09:59:59 ET the day after the last covered day, so
    /// early-morning orders on the run day still land in yesterday's
    /// report.
    ///
    /// # Errors
    ///
    /// Returns [`WindowError`] if the boundary timestamps cannot be
    /// represented in the reporting timezone.
    pub fn materialize(window: &ReportingWindow) -> Result<Self, WindowError> {
        let end_boundary = window
            .end
            .checked_add_days(Days::new(1))
            .ok_or(WindowError::DateOutOfRange(window.end))?;
        Self::from_bounds(window.start, end_boundary)
    }

    /// Build a window from explicit boundary dates.
    ///
    /// `start_date` is the first trading day covered; `end_boundary` is
    /// the calendar day *after* the last covered trading day (its
    /// 09:59:59 closes the window). Used by operator-supplied date
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`WindowError::EndBeforeStart`] when the boundary
    /// precedes the start, or a conversion error for unrepresentable
    /// local times.
    pub fn from_bounds(start_date: NaiveDate, end_boundary: NaiveDate) -> Result<Self, WindowError> {
        if end_boundary < start_date {
            return Err(WindowError::EndBeforeStart {
                start: start_date,
                end: end_boundary,
            });
        }

        let open = NaiveTime::from_hms_opt(TRADING_DAY_CUTOFF_HOUR, 0, 0)
            .ok_or(WindowError::DateOutOfRange(start_date))?;
        let close = NaiveTime::from_hms_opt(TRADING_DAY_CUTOFF_HOUR - 1, 59, 59)
            .ok_or(WindowError::DateOutOfRange(end_boundary))?;

        Ok(Self {
            start: local_datetime(start_date, open)?,
            end: local_datetime(end_boundary, close)?,
        })
    }

    /// Whether `instant` falls inside this window (inclusive bounds).
    ///
    /// Applied to every fetched order's `processedAt` to discard drift
    /// from the search index.
    #[must_use]
    pub fn contains<Z: TimeZone>(&self, instant: &DateTime<Z>) -> bool {
        let start = self.start.with_timezone(&chrono::Utc);
        let end = self.end.with_timezone(&chrono::Utc);
        let instant = instant.with_timezone(&chrono::Utc);
        start <= instant && instant <= end
    }
}

fn local_datetime(date: NaiveDate, time: NaiveTime) -> Result<DateTime<Tz>, WindowError> {
    REPORTING_TIMEZONE
        .from_local_datetime(&date.and_time(time))
        .earliest()
        .ok_or(WindowError::InvalidLocalTime { date, time })
}
