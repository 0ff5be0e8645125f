//! Calendar helpers for `YYYY-MM-DD` dates in local time
//!
//! Dates are plain calendar days (`NaiveDate`), so arithmetic never touches
//! wall-clock offsets and daylight-saving changes cannot shift a day.

use anyhow::{Context, Result};
use chrono::{Datelike, Local, NaiveDate, TimeDelta};

/// Canonical textual form of a date
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Get the current date in the local timezone
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Parse a `YYYY-MM-DD` string
///
/// # Arguments
/// * `date_str` - Date string, e.g. "2026-02-02"
///
/// # Returns
/// The parsed date, or an error describing the expected format
pub fn parse(date_str: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date_str.trim(), DATE_FORMAT).with_context(|| {
        format!(
            "Invalid date format '{}'. Use YYYY-MM-DD (e.g., '2026-02-02')",
            date_str
        )
    })
}

/// Format a date as zero-padded `YYYY-MM-DD`
pub fn format(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Split a date into `(year, month, day)`
pub fn components(date: NaiveDate) -> (i32, u32, u32) {
    (date.year(), date.month(), date.day())
}

/// Shift a date by `days` (negative moves backwards)
///
/// Saturates at the representable range instead of overflowing.
pub fn add_days(date: NaiveDate, days: i64) -> NaiveDate {
    TimeDelta::try_days(days)
        .and_then(|delta| date.checked_add_signed(delta))
        .unwrap_or(if days < 0 {
            NaiveDate::MIN
        } else {
            NaiveDate::MAX
        })
}

/// Whole days from `from` to `to` (`to - from`)
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}
