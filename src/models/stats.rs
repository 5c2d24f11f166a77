// SPDX-License-Identifier: MIT

//! Activity statistics aggregation.
//!
//! Pure functions over an activity list: the output is identical whether the
//! list came from the warehouse or straight off a live fetch, which is what
//! lets the dashboard treat cached and reconciled answers uniformly.

use chrono::{Datelike, NaiveDate, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::Activity;
use crate::time_utils::format_utc_rfc3339;

/// Weekday labels, Monday first, matching `Datelike::weekday` numbering.
const WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Aggregated breakdowns for a flat activity list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityStatistics {
    /// Count per calendar day ("YYYY-MM-DD"), ascending
    pub daily: BTreeMap<String, u64>,
    /// Count per hour of day, index 0-23 (UTC)
    pub hourly: Vec<u64>,
    /// Count per weekday, Monday first
    pub weekday: Vec<WeekdayCount>,
    /// Count per remote `TYPE_ID`
    pub by_type: BTreeMap<String, u64>,
    /// Observed first/last data date; `None` for an empty input
    pub date_range: Option<DateRange>,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeekdayCount {
    pub weekday: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Per-user dashboard row (the original per-person table).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserActivitySummary {
    pub user_id: String,
    pub calls: u32,
    pub comments: u32,
    pub tasks: u32,
    pub meetings: u32,
    pub total: u32,
    /// Distinct days with at least one activity
    pub days_count: u32,
    /// Most recent activity timestamp (RFC3339), if any
    pub last_activity: Option<String>,
}

/// Bucket every activity once by day, hour, weekday and type.
pub fn aggregate(activities: &[Activity]) -> ActivityStatistics {
    let mut daily: BTreeMap<String, u64> = BTreeMap::new();
    let mut hourly = vec![0u64; 24];
    let mut weekday_counts = [0u64; 7];
    let mut by_type: BTreeMap<String, u64> = BTreeMap::new();
    let mut range: Option<(NaiveDate, NaiveDate)> = None;

    for activity in activities {
        *daily.entry(activity.data_date.to_string()).or_insert(0) += 1;
        hourly[activity.created_at.hour() as usize] += 1;
        weekday_counts[activity.data_date.weekday().num_days_from_monday() as usize] += 1;
        *by_type.entry(activity.type_id.clone()).or_insert(0) += 1;

        range = Some(match range {
            None => (activity.data_date, activity.data_date),
            Some((start, end)) => (start.min(activity.data_date), end.max(activity.data_date)),
        });
    }

    ActivityStatistics {
        daily,
        hourly,
        weekday: WEEKDAYS
            .iter()
            .zip(weekday_counts)
            .map(|(label, count)| WeekdayCount {
                weekday: label.to_string(),
                count,
            })
            .collect(),
        by_type,
        date_range: range.map(|(start, end)| DateRange { start, end }),
        total: activities.len() as u64,
    }
}

/// Build the per-user rows the dashboard table shows.
///
/// Users are ordered by descending total, ties broken by id for stable
/// output.
pub fn summarize_users(activities: &[Activity]) -> Vec<UserActivitySummary> {
    use crate::models::activity::{TYPE_CALL, TYPE_COMMENT, TYPE_MEETING, TYPE_TASK};
    use std::collections::BTreeSet;

    struct Accum {
        calls: u32,
        comments: u32,
        tasks: u32,
        meetings: u32,
        total: u32,
        days: BTreeSet<NaiveDate>,
        last: Option<chrono::DateTime<chrono::Utc>>,
    }

    let mut per_user: BTreeMap<String, Accum> = BTreeMap::new();
    for activity in activities {
        let entry = per_user.entry(activity.user_id.clone()).or_insert(Accum {
            calls: 0,
            comments: 0,
            tasks: 0,
            meetings: 0,
            total: 0,
            days: BTreeSet::new(),
            last: None,
        });

        match activity.type_id.as_str() {
            TYPE_CALL => entry.calls += 1,
            TYPE_COMMENT => entry.comments += 1,
            TYPE_TASK => entry.tasks += 1,
            TYPE_MEETING => entry.meetings += 1,
            _ => {}
        }
        entry.total += 1;
        entry.days.insert(activity.data_date);
        if entry.last.map_or(true, |last| activity.created_at > last) {
            entry.last = Some(activity.created_at);
        }
    }

    let mut rows: Vec<UserActivitySummary> = per_user
        .into_iter()
        .map(|(user_id, acc)| UserActivitySummary {
            user_id,
            calls: acc.calls,
            comments: acc.comments,
            tasks: acc.tasks,
            meetings: acc.meetings,
            total: acc.total,
            days_count: acc.days.len() as u32,
            last_activity: acc.last.map(format_utc_rfc3339),
        })
        .collect();

    rows.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.user_id.cmp(&b.user_id)));
    rows
}
