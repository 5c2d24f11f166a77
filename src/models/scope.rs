// SPDX-License-Identifier: MIT

//! Query scope: the (user set, date range, type filter) tuple that bounds a
//! single statistics query. Ephemeral, never persisted.

use chrono::NaiveDate;
use std::collections::BTreeSet;

use crate::time_utils;

/// Data boundary for one query.
///
/// `user_ids` is an ordered set so two scopes naming the same users in a
/// different order normalize to the same [`signature`](Self::signature).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryScope {
    pub user_ids: BTreeSet<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Optional `TYPE_ID` filter; `None` means all activity kinds
    pub type_filter: Option<String>,
    /// Bypass the completeness check and always fetch through
    pub force_refresh: bool,
}

impl QueryScope {
    pub fn new<I, S>(user_ids: I, start_date: NaiveDate, end_date: NaiveDate) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            user_ids: user_ids.into_iter().map(Into::into).collect(),
            start_date,
            end_date,
            type_filter: None,
            force_refresh: false,
        }
    }

    pub fn with_type_filter(mut self, type_filter: Option<String>) -> Self {
        self.type_filter = type_filter;
        self
    }

    pub fn with_force_refresh(mut self, force_refresh: bool) -> Self {
        self.force_refresh = force_refresh;
        self
    }

    /// Every calendar date the scope covers, ascending.
    pub fn expected_dates(&self) -> Vec<NaiveDate> {
        time_utils::expected_dates(self.start_date, self.end_date)
    }

    /// Normalized signature used to serialize concurrent reconciliations
    /// over the same data boundary.
    ///
    /// `force_refresh` is deliberately excluded: a forced and an unforced
    /// query over the same boundary must still share one in-flight fetch.
    pub fn signature(&self) -> String {
        let users: Vec<&str> = self.user_ids.iter().map(String::as_str).collect();
        format!(
            "{}|{}|{}|{}",
            users.join(","),
            self.start_date,
            self.end_date,
            self.type_filter.as_deref().unwrap_or("*")
        )
    }
}
