// SPDX-License-Identifier: MIT

//! Dashboard API routes.

use crate::error::{AppError, Result};
use crate::models::{stats, Activity, QueryScope};
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Presentation-time cap on description length; storage keeps full text.
const DESCRIPTION_PREVIEW_CHARS: usize = 500;

const DEFAULT_PERIOD_DAYS: i64 = 30;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/stats", get(get_stats))
        .route("/api/cache-status", get(get_cache_status))
        .route("/api/retention-sweep", post(retention_sweep))
        .route("/api/users-list", get(get_users_list))
        .route("/api/connection-test", get(connection_test))
}

// ─── Shared query-range parsing ──────────────────────────────

#[derive(Deserialize)]
struct RangeParams {
    /// Comma-separated user ids; empty means the configured roster
    user_ids: Option<String>,
    /// Explicit inclusive range (both must be given together)
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    /// Alternative to an explicit range: this many days back from today
    days: Option<i64>,
}

impl RangeParams {
    fn user_ids(&self) -> Vec<String> {
        split_user_ids(self.user_ids.as_deref())
    }

    fn date_range(&self) -> Result<(NaiveDate, NaiveDate)> {
        resolve_date_range(self.start_date, self.end_date, self.days)
    }
}

fn split_user_ids(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn resolve_date_range(
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    days: Option<i64>,
) -> Result<(NaiveDate, NaiveDate)> {
    match (start_date, end_date) {
        (Some(start), Some(end)) => {
            if start > end {
                return Err(AppError::BadRequest(
                    "start_date must not be after end_date".to_string(),
                ));
            }
            Ok((start, end))
        }
        (None, None) => {
            let days = days.unwrap_or(DEFAULT_PERIOD_DAYS);
            if days < 1 {
                return Err(AppError::BadRequest("days must be at least 1".to_string()));
            }
            let end = Utc::now().date_naive();
            // Checked arithmetic: an absurd `days` is a bad request, not a
            // panic in the handler task.
            let start = end
                .checked_sub_days(Days::new((days - 1) as u64))
                .ok_or_else(|| AppError::BadRequest("days is out of range".to_string()))?;
            Ok((start, end))
        }
        _ => Err(AppError::BadRequest(
            "start_date and end_date must be given together".to_string(),
        )),
    }
}

// ─── Statistics query ────────────────────────────────────────

#[derive(Deserialize)]
struct StatsQuery {
    user_ids: Option<String>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    days: Option<i64>,
    /// Optional TYPE_ID filter
    activity_type: Option<String>,
    #[serde(default)]
    force_refresh: bool,
}

/// Activity as presented to the dashboard. Descriptions are truncated here
/// and only here.
#[derive(Serialize)]
pub struct ActivityView {
    pub id: i64,
    pub user_id: String,
    pub created_at: String,
    pub data_date: NaiveDate,
    pub type_id: String,
    pub subject: String,
    pub description: String,
}

impl ActivityView {
    fn from_activity(activity: &Activity) -> Self {
        Self {
            id: activity.id,
            user_id: activity.user_id.clone(),
            created_at: format_utc_rfc3339(activity.created_at),
            data_date: activity.data_date,
            type_id: activity.type_id.clone(),
            subject: activity.subject.clone(),
            description: truncate_chars(&activity.description, DESCRIPTION_PREVIEW_CHARS),
        }
    }
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub activities: Vec<ActivityView>,
    pub completeness_ratio: f64,
    pub from_cache: bool,
    pub statistics: stats::ActivityStatistics,
    pub user_stats: Vec<stats::UserActivitySummary>,
    pub total_activities: u64,
    pub active_users: u32,
    pub date_range: DateRangeView,
}

#[derive(Serialize)]
pub struct DateRangeView {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// The core query: per-person productivity statistics over a date range,
/// served from the warehouse when it is complete enough and reconciled
/// against Bitrix24 otherwise.
async fn get_stats(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StatsQuery>,
) -> Result<Json<StatsResponse>> {
    let (start_date, end_date) =
        resolve_date_range(params.start_date, params.end_date, params.days)?;
    let scope = QueryScope::new(split_user_ids(params.user_ids.as_deref()), start_date, end_date)
        .with_type_filter(params.activity_type.clone())
        .with_force_refresh(params.force_refresh);

    tracing::debug!(
        %start_date,
        %end_date,
        users = scope.user_ids.len(),
        type_filter = ?scope.type_filter,
        force_refresh = scope.force_refresh,
        "Statistics query"
    );

    let outcome = state.reconciler.query(&scope).await?;

    let statistics = stats::aggregate(&outcome.activities);
    let user_stats = stats::summarize_users(&outcome.activities);

    Ok(Json(StatsResponse {
        total_activities: outcome.activities.len() as u64,
        active_users: user_stats.len() as u32,
        activities: outcome
            .activities
            .iter()
            .map(ActivityView::from_activity)
            .collect(),
        completeness_ratio: outcome.completeness_ratio,
        from_cache: outcome.from_cache,
        statistics,
        user_stats,
        date_range: DateRangeView {
            start: start_date,
            end: end_date,
        },
    }))
}

// ─── Cache status ────────────────────────────────────────────

#[derive(Serialize)]
pub struct CacheStatusResponse {
    pub total_days: u32,
    pub cached_days: u32,
    pub missing_days: u32,
    pub missing_dates: Vec<NaiveDate>,
}

/// Introspection: which days of the scope the warehouse currently covers.
/// Never triggers a fetch.
async fn get_cache_status(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RangeParams>,
) -> Result<Json<CacheStatusResponse>> {
    let (start_date, end_date) = params.date_range()?;
    let mut user_ids = params.user_ids();
    if user_ids.is_empty() {
        user_ids = state.roster.target_user_ids().to_vec();
    }
    let scope = QueryScope::new(user_ids, start_date, end_date);

    let covered = state.warehouse.covered_dates(&scope).await?;
    let expected = scope.expected_dates();

    let missing_dates: Vec<NaiveDate> = expected
        .iter()
        .filter(|date| !covered.contains(date))
        .copied()
        .collect();

    Ok(Json(CacheStatusResponse {
        total_days: expected.len() as u32,
        cached_days: (expected.len() - missing_dates.len()) as u32,
        missing_days: missing_dates.len() as u32,
        missing_dates,
    }))
}

// ─── Retention sweep ─────────────────────────────────────────

#[derive(Deserialize)]
struct RetentionSweepRequest {
    /// Keep data newer than this many days
    retention_days: i64,
}

#[derive(Serialize)]
pub struct RetentionSweepResponse {
    pub horizon: NaiveDate,
    pub deleted_activities: u64,
    pub deleted_snapshots: u64,
}

/// Explicit age-based retention sweep; the only way rows ever leave the
/// warehouse.
async fn retention_sweep(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RetentionSweepRequest>,
) -> Result<Json<RetentionSweepResponse>> {
    if request.retention_days < 1 {
        return Err(AppError::BadRequest(
            "retention_days must be at least 1".to_string(),
        ));
    }

    let horizon = Utc::now()
        .date_naive()
        .checked_sub_days(Days::new(request.retention_days as u64))
        .ok_or_else(|| {
            AppError::BadRequest("retention_days is out of range".to_string())
        })?;
    let (deleted_activities, deleted_snapshots) =
        state.warehouse.sweep_older_than(horizon).await?;

    Ok(Json(RetentionSweepResponse {
        horizon,
        deleted_activities,
        deleted_snapshots,
    }))
}

// ─── Roster & connectivity ───────────────────────────────────

#[derive(Serialize)]
pub struct UsersListResponse {
    pub users: Vec<crate::services::RosterUser>,
    pub total: u32,
}

/// Resolve the configured roster against the portal.
async fn get_users_list(State(state): State<Arc<AppState>>) -> Result<Json<UsersListResponse>> {
    let users = state.roster.list_users().await?;
    Ok(Json(UsersListResponse {
        total: users.len() as u32,
        users,
    }))
}

#[derive(Serialize)]
pub struct ConnectionTestResponse {
    pub connected: bool,
    pub webhook_configured: bool,
}

/// Probe the portal with `user.current`.
async fn connection_test(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ConnectionTestResponse>> {
    let connected = match state.bitrix.current_user().await {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Bitrix24 connection test failed");
            false
        }
    };

    Ok(Json(ConnectionTestResponse {
        connected,
        webhook_configured: !state.config.bitrix_webhook_url.is_empty(),
    }))
}

/// Truncate to a character budget, appending an ellipsis when text was cut.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut preview: String = text.chars().take(max_chars).collect();
    preview.push('…');
    preview
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_short_text_untouched() {
        assert_eq!(truncate_chars("hello", 10), "hello");
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        let text = "привет мир это длинное описание";
        let preview = truncate_chars(text, 10);
        assert_eq!(preview.chars().count(), 11); // 10 + ellipsis
        assert!(preview.ends_with('…'));
    }

    #[test]
    fn test_range_params_explicit_range() {
        let params = RangeParams {
            user_ids: Some("42, 7".to_string()),
            start_date: Some("2025-01-01".parse().unwrap()),
            end_date: Some("2025-01-07".parse().unwrap()),
            days: None,
        };
        let (start, end) = params.date_range().unwrap();
        assert_eq!(start, "2025-01-01".parse().unwrap());
        assert_eq!(end, "2025-01-07".parse().unwrap());
        assert_eq!(params.user_ids(), vec!["42".to_string(), "7".to_string()]);
    }

    #[test]
    fn test_range_params_rejects_inverted_range() {
        let params = RangeParams {
            user_ids: None,
            start_date: Some("2025-02-01".parse().unwrap()),
            end_date: Some("2025-01-01".parse().unwrap()),
            days: None,
        };
        assert!(matches!(
            params.date_range(),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_range_params_days_window() {
        let params = RangeParams {
            user_ids: None,
            start_date: None,
            end_date: None,
            days: Some(7),
        };
        let (start, end) = params.date_range().unwrap();
        assert_eq!((end - start).num_days(), 6); // 7 calendar days inclusive
    }

    #[test]
    fn test_range_params_rejects_overflowing_days() {
        let params = RangeParams {
            user_ids: None,
            start_date: None,
            end_date: None,
            days: Some(99_999_999_999),
        };
        assert!(matches!(
            params.date_range(),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_range_params_rejects_lone_start_date() {
        let params = RangeParams {
            user_ids: None,
            start_date: Some("2025-01-01".parse().unwrap()),
            end_date: None,
            days: None,
        };
        assert!(params.date_range().is_err());
    }
}
