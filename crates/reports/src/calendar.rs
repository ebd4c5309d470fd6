//! Business-day calendar and reporting-window resolution.
//!
//! Every scheduled report must cover the last open business day before
//! today plus all closed calendar days since that day up to yesterday:
//!
//! - Friday after a July 4 closure covers Jul 3 + Jul 4
//! - Monday after a normal weekend covers Sat + Sun
//! - Monday after a two-day storm closure covers Fri + Sat + Sun
//!
//! Open/closed status is driven by an injectable per-year configuration
//! (holiday closures and special open Sundays) layered over the standard
//! weekly pattern: open Monday-Saturday, closed Sunday.

use std::collections::{BTreeSet, HashMap};

use chrono::{Datelike, Days, NaiveDate, Weekday};
use thiserror::Error;
use tracing::warn;

/// Hard ceiling on how far back the open-day walk may go.
///
/// The standard weekly pattern guarantees an open day within 7 days, so
/// hitting this limit means the year configuration marks an implausibly
/// long stretch as closed.
pub const MAX_LOOKBACK_DAYS: u32 = 30;

/// Calendar resolution errors.
#[derive(Debug, Error)]
pub enum CalendarError {
    /// No open business day found within [`MAX_LOOKBACK_DAYS`] of `from`.
    #[error("no open business day within {lookback} days before {from}")]
    LookbackExhausted {
        /// The "today" the walk started from.
        from: NaiveDate,
        /// The lookback ceiling that was exhausted.
        lookback: u32,
    },
    /// Date arithmetic left the representable range.
    #[error("date arithmetic out of range near {0}")]
    DateOutOfRange(NaiveDate),
}

/// Closure and exception rules for a single calendar year.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct YearRules {
    /// Dates the shop is closed regardless of weekday.
    pub holiday_closures: BTreeSet<NaiveDate>,
    /// Sundays the shop is open despite the weekly pattern.
    pub open_sundays: BTreeSet<NaiveDate>,
}

/// Per-year calendar rules, injected into [`BusinessCalendar`].
///
/// Years with no entry fall back to the standard weekly pattern (open
/// Mon-Sat, closed Sun, no holidays). The fallback is deliberate but
/// observable: every lookup against an unconfigured year logs a warning
/// so a report running without holiday awareness shows up in the logs.
#[derive(Debug, Clone, Default)]
pub struct CalendarConfig {
    years: HashMap<i32, YearRules>,
}

impl CalendarConfig {
    /// Create an empty configuration (every year standard-pattern).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the rules for one year.
    #[must_use]
    pub fn with_year(mut self, year: i32, rules: YearRules) -> Self {
        self.years.insert(year, rules);
        self
    }

    /// The shipped closure table.
    ///
    /// 2025: closed Sat before Memorial Day, Memorial Day, Independence
    /// Day, Labor Day, Thanksgiving, Christmas, Boxing Day; open the
    /// first three December Sundays.
    #[must_use]
    pub fn standard() -> Self {
        let year = 2025;
        let date = |m, d| NaiveDate::from_ymd_opt(year, m, d);
        let holiday_closures = [
            date(5, 24),
            date(5, 26),
            date(7, 4),
            date(9, 1),
            date(11, 28),
            date(12, 25),
            date(12, 26),
        ]
        .into_iter()
        .flatten()
        .collect();
        let open_sundays = [date(12, 7), date(12, 14), date(12, 21)]
            .into_iter()
            .flatten()
            .collect();

        Self::new().with_year(
            year,
            YearRules {
                holiday_closures,
                open_sundays,
            },
        )
    }

    fn rules_for(&self, year: i32) -> Option<&YearRules> {
        self.years.get(&year)
    }
}

/// The pair of calendar dates a scheduled report must cover.
///
/// `end` is always yesterday; `start` is the most recent open business
/// day before today. `start <= end` always holds, and the two coincide
/// whenever yesterday was open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportingWindow {
    /// Last open business day before "today".
    pub start: NaiveDate,
    /// The calendar day immediately preceding "today".
    pub end: NaiveDate,
}

/// One open/closed rule: returns a ruling or defers to the next rule.
type DayRule = fn(Option<&YearRules>, NaiveDate) -> Option<bool>;

/// Holiday closures override everything, including special open Sundays.
fn holiday_closure_rule(rules: Option<&YearRules>, date: NaiveDate) -> Option<bool> {
    rules
        .filter(|r| r.holiday_closures.contains(&date))
        .map(|_| false)
}

/// Sundays are closed unless listed as special open Sundays.
fn sunday_rule(rules: Option<&YearRules>, date: NaiveDate) -> Option<bool> {
    if date.weekday() == Weekday::Sun {
        Some(rules.is_some_and(|r| r.open_sundays.contains(&date)))
    } else {
        None
    }
}

/// Monday through Saturday are open.
fn weekday_rule(_rules: Option<&YearRules>, _date: NaiveDate) -> Option<bool> {
    Some(true)
}

/// Evaluated top to bottom; the first ruling wins.
const DAY_RULES: &[DayRule] = &[holiday_closure_rule, sunday_rule, weekday_rule];

/// Business-day calendar for the shop.
#[derive(Debug, Clone, Default)]
pub struct BusinessCalendar {
    config: CalendarConfig,
}

impl BusinessCalendar {
    /// Create a calendar from an explicit configuration.
    #[must_use]
    pub const fn new(config: CalendarConfig) -> Self {
        Self { config }
    }

    /// Whether the shop is open on `date`.
    ///
    /// Pure: the same date always yields the same answer for a given
    /// configuration.
    #[must_use]
    pub fn is_open(&self, date: NaiveDate) -> bool {
        let rules = self.config.rules_for(date.year());
        if rules.is_none() {
            warn!(
                year = date.year(),
                "no calendar rules configured for year; using standard weekly pattern"
            );
        }
        DAY_RULES
            .iter()
            .find_map(|rule| rule(rules, date))
            .unwrap_or(true)
    }

    /// The most recent open business day strictly before `today`.
    ///
    /// # Errors
    ///
    /// Returns [`CalendarError::LookbackExhausted`] if no open day exists
    /// within [`MAX_LOOKBACK_DAYS`].
    pub fn find_last_open_day(&self, today: NaiveDate) -> Result<NaiveDate, CalendarError> {
        let mut cursor = today
            .checked_sub_days(Days::new(1))
            .ok_or(CalendarError::DateOutOfRange(today))?;

        for _ in 0..MAX_LOOKBACK_DAYS {
            if self.is_open(cursor) {
                return Ok(cursor);
            }
            cursor = cursor
                .checked_sub_days(Days::new(1))
                .ok_or(CalendarError::DateOutOfRange(cursor))?;
        }

        Err(CalendarError::LookbackExhausted {
            from: today,
            lookback: MAX_LOOKBACK_DAYS,
        })
    }

    /// The reporting window for a run happening on `today`.
    ///
    /// The window always ends yesterday (closed or not) and starts on the
    /// last open business day, so consecutive closures (holiday plus
    /// weekend, say) are all swept into a single report.
    ///
    /// # Errors
    ///
    /// Returns [`CalendarError::LookbackExhausted`] if no open day exists
    /// within the lookback ceiling.
    pub fn reporting_window(&self, today: NaiveDate) -> Result<ReportingWindow, CalendarError> {
        let end = today
            .checked_sub_days(Days::new(1))
            .ok_or(CalendarError::DateOutOfRange(today))?;
        let start = self.find_last_open_day(today)?;

        Ok(ReportingWindow { start, end })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn standard_calendar() -> BusinessCalendar {
        BusinessCalendar::new(CalendarConfig::standard())
    }

    #[test]
    fn test_weekdays_open_sundays_closed() {
        let cal = standard_calendar();
        // Mon Jun 2 through Sat Jun 7, 2025
        for day in 2..=7 {
            assert!(cal.is_open(date(2025, 6, day)), "Jun {day} should be open");
        }
        // Sun Jun 8, 2025
        assert!(!cal.is_open(date(2025, 6, 8)));
    }

    #[test]
    fn test_holiday_closure() {
        let cal = standard_calendar();
        // Jul 4, 2025 is a Friday but closed.
        assert!(!cal.is_open(date(2025, 7, 4)));
    }

    #[test]
    fn test_special_open_sunday() {
        let cal = standard_calendar();
        assert!(cal.is_open(date(2025, 12, 7)));
        assert!(cal.is_open(date(2025, 12, 21)));
        // A December Sunday not on the list stays closed.
        assert!(!cal.is_open(date(2025, 12, 28)));
    }

    #[test]
    fn test_holiday_beats_special_open_sunday() {
        // Configure a Sunday as both a holiday closure and a special
        // open Sunday; the closure must win.
        let sunday = date(2030, 6, 2);
        assert_eq!(sunday.weekday(), Weekday::Sun);
        let config = CalendarConfig::new().with_year(
            2030,
            YearRules {
                holiday_closures: [sunday].into_iter().collect(),
                open_sundays: [sunday].into_iter().collect(),
            },
        );
        assert!(!BusinessCalendar::new(config).is_open(sunday));
    }

    #[test]
    fn test_unconfigured_year_uses_standard_pattern() {
        let cal = standard_calendar();
        // 2031 has no rules: Jul 4 (a Friday) is open, Sundays closed.
        assert!(cal.is_open(date(2031, 7, 4)));
        assert!(!cal.is_open(date(2031, 7, 6)));
    }

    #[test]
    fn test_is_open_is_deterministic() {
        let cal = standard_calendar();
        let d = date(2025, 11, 28);
        assert_eq!(cal.is_open(d), cal.is_open(d));
    }

    #[test]
    fn test_window_ends_yesterday() {
        let cal = standard_calendar();
        let today = date(2025, 6, 4);
        let window = cal.reporting_window(today).unwrap();
        assert_eq!(window.end, date(2025, 6, 3));
        assert_eq!(window.start, date(2025, 6, 3));
    }

    #[test]
    fn test_friday_after_thursday_holiday() {
        // Thanksgiving 2025: Thu Nov 27 is not configured closed, but
        // Fri Nov 28 is. Use a synthetic Thursday holiday instead.
        let thursday = date(2030, 3, 7);
        assert_eq!(thursday.weekday(), Weekday::Thu);
        let config = CalendarConfig::new().with_year(
            2030,
            YearRules {
                holiday_closures: [thursday].into_iter().collect(),
                open_sundays: BTreeSet::new(),
            },
        );
        let cal = BusinessCalendar::new(config);

        let friday = date(2030, 3, 8);
        let window = cal.reporting_window(friday).unwrap();
        // Wednesday was open; Thursday closed.
        assert_eq!(window.start, date(2030, 3, 6));
        assert_eq!(window.end, thursday);
    }

    #[test]
    fn test_monday_after_normal_weekend() {
        let cal = standard_calendar();
        let monday = date(2025, 6, 9);
        let window = cal.reporting_window(monday).unwrap();
        // Saturday open, Sunday closed.
        assert_eq!(window.start, date(2025, 6, 7));
        assert_eq!(window.end, date(2025, 6, 8));
    }

    #[test]
    fn test_multi_day_closure_span() {
        // Thu holiday + Fri holiday + weekend, report on Monday.
        let config = CalendarConfig::new().with_year(
            2030,
            YearRules {
                holiday_closures: [date(2030, 3, 7), date(2030, 3, 8)].into_iter().collect(),
                open_sundays: BTreeSet::new(),
            },
        );
        let cal = BusinessCalendar::new(config);
        // Mon Mar 11, 2030. Sat Mar 9 is open under the weekly pattern.
        let window = cal.reporting_window(date(2030, 3, 11)).unwrap();
        assert_eq!(window.start, date(2030, 3, 9));
        assert_eq!(window.end, date(2030, 3, 10));
        assert!(window.start <= window.end);
    }

    #[test]
    fn test_lookback_exhausted() {
        // Mark 40 consecutive days closed; the walk must fail rather
        // than loop.
        let closures: BTreeSet<NaiveDate> = (0..40)
            .map(|i| date(2030, 1, 1) + Days::new(i))
            .collect();
        let config = CalendarConfig::new().with_year(
            2030,
            YearRules {
                holiday_closures: closures,
                open_sundays: BTreeSet::new(),
            },
        );
        let cal = BusinessCalendar::new(config);
        let err = cal.find_last_open_day(date(2030, 2, 5)).unwrap_err();
        assert!(matches!(err, CalendarError::LookbackExhausted { .. }));
    }
}
