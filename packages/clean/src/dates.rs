//! Date parsing and calendar field derivation.
//!
//! Parsing is deterministic and independent of the wall clock: a value either
//! matches one of the accepted layouts or is rejected.

use chrono::{DateTime, Datelike as _, NaiveDate, NaiveDateTime, Timelike as _, Weekday};

/// Layouts tried for values carrying a time of day, in order.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
];

/// Layouts tried for date-only values, in order.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

/// Canonical layout written back into the date column after parsing.
pub const CANONICAL_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parses a date or datetime string.
///
/// Offsets in RFC 3339 values are honored by keeping the wall-clock time as
/// written. Year-month (`2024-03`) and bare-year (`2024`) values resolve to
/// the first day of the period at midnight.
#[must_use]
pub fn parse_date(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }

    parse_partial_date(s)
}

/// Handles `YYYY-MM` and `YYYY`.
fn parse_partial_date(s: &str) -> Option<NaiveDateTime> {
    let (year, month) = match s.split_once('-') {
        Some((year, month)) => (year, month.parse::<u32>().ok()?),
        None => (s, 1),
    };
    if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::from_ymd_opt(year.parse().ok()?, month, 1)?.and_hms_opt(0, 0, 0)
}

/// Calendar attributes derived from a parsed date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarParts {
    /// Four-digit year.
    pub year: i32,
    /// Month number, 1-12.
    pub month: u32,
    /// Day of week.
    pub weekday: Weekday,
    /// Hour of day, 0-23.
    pub hour: u32,
}

impl From<NaiveDateTime> for CalendarParts {
    fn from(dt: NaiveDateTime) -> Self {
        Self {
            year: dt.year(),
            month: dt.month(),
            weekday: dt.weekday(),
            hour: dt.hour(),
        }
    }
}

/// Full English weekday name (`"Monday"`).
#[must_use]
pub const fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}
