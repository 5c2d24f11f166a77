// SPDX-License-Identifier: MIT

//! Shared helpers for calendar-day arithmetic.
//!
//! Completeness evaluation, chunking and snapshot derivation all reason in
//! whole calendar days, so the conversions live in one place.

use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Every calendar date in the inclusive range `[start, end]`, ascending.
pub fn expected_dates(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let mut cursor = start;
    while cursor <= end {
        dates.push(cursor);
        cursor += Duration::days(1);
    }
    dates
}

/// Split `[start, end]` into sequential inclusive sub-windows of at most
/// `max_days` calendar days each.
///
/// A range that fits in one window is returned unchanged. `max_days` below 1
/// is treated as 1.
pub fn chunk_date_range(
    start: NaiveDate,
    end: NaiveDate,
    max_days: i64,
) -> Vec<(NaiveDate, NaiveDate)> {
    let max_days = max_days.max(1);
    let mut windows = Vec::new();
    let mut cursor = start;
    while cursor <= end {
        let window_end = (cursor + Duration::days(max_days - 1)).min(end);
        windows.push((cursor, window_end));
        cursor = window_end + Duration::days(1);
    }
    windows
}
