// SPDX-License-Identifier: MIT

//! Per-(user, day) activity rollups.
//!
//! Snapshots are always re-derived from the full set of stored activities
//! for their (user, date) key, never patched incrementally, so a partial
//! re-fetch can never shrink a previously complete day's counts below what
//! the warehouse holds.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::activity::{Activity, TYPE_CALL, TYPE_COMMENT, TYPE_MEETING, TYPE_TASK};

/// Materialized rollup for one user on one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySnapshot {
    pub user_id: String,
    pub date: NaiveDate,
    pub calls: u32,
    pub comments: u32,
    pub tasks: u32,
    pub meetings: u32,
    pub total: u32,
}

impl DailySnapshot {
    /// Derive a snapshot from the activities stored for `(user_id, date)`.
    ///
    /// Activities for other users or dates are ignored rather than assumed
    /// absent, so callers may pass a broader slice.
    pub fn from_activities(user_id: &str, date: NaiveDate, activities: &[Activity]) -> Self {
        let mut snapshot = Self {
            user_id: user_id.to_string(),
            date,
            calls: 0,
            comments: 0,
            tasks: 0,
            meetings: 0,
            total: 0,
        };

        for activity in activities {
            if activity.user_id != user_id || activity.data_date != date {
                continue;
            }
            match activity.type_id.as_str() {
                TYPE_CALL => snapshot.calls += 1,
                TYPE_COMMENT => snapshot.comments += 1,
                TYPE_TASK => snapshot.tasks += 1,
                TYPE_MEETING => snapshot.meetings += 1,
                _ => {}
            }
            snapshot.total += 1;
        }

        snapshot
    }
}
