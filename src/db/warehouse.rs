// SPDX-License-Identifier: MIT

//! Durable warehouse for activities and daily snapshots.
//!
//! Two tables back the cache:
//! - `activities`: one row per remote activity record, keyed by the remote
//!   id; re-ingesting the same id replaces the row in place.
//! - `activity_snapshots`: per-(user, day) rollup counts, always re-derived
//!   from `activities`.
//!
//! Every upsert batch commits as a unit, so an abandoned reconciliation
//! leaves only whole batches behind and never corrupts committed data.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{QueryBuilder, Row, SqlitePool};
use std::collections::BTreeSet;
use std::path::Path;
use std::str::FromStr;

use crate::error::{AppError, Result};
use crate::models::{Activity, DailySnapshot, QueryScope};

/// Inline SQL migrations for the warehouse schema.
///
/// Simple inline statements rather than sqlx migration files: the schema is
/// small and self-contained, and every statement is idempotent.
const MIGRATIONS: &[&str] = &[
    r#"
CREATE TABLE IF NOT EXISTS activities (
    id INTEGER PRIMARY KEY,
    user_id TEXT NOT NULL,
    created_at TEXT NOT NULL,
    data_date TEXT NOT NULL,
    type_id TEXT NOT NULL DEFAULT '',
    subject TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    raw_payload TEXT NOT NULL DEFAULT '{}',
    cached_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    r#"CREATE INDEX IF NOT EXISTS idx_activities_user_date ON activities(user_id, data_date);"#,
    r#"CREATE INDEX IF NOT EXISTS idx_activities_date ON activities(data_date);"#,
    r#"
CREATE TABLE IF NOT EXISTS activity_snapshots (
    user_id TEXT NOT NULL,
    date TEXT NOT NULL,
    calls INTEGER NOT NULL DEFAULT 0,
    comments INTEGER NOT NULL DEFAULT 0,
    tasks INTEGER NOT NULL DEFAULT 0,
    meetings INTEGER NOT NULL DEFAULT 0,
    total INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY (user_id, date)
);
"#,
    r#"CREATE INDEX IF NOT EXISTS idx_snapshots_date ON activity_snapshots(date);"#,
];

/// Warehouse handle wrapping a SQLite connection pool.
#[derive(Debug, Clone)]
pub struct Warehouse {
    pool: SqlitePool,
}

impl Warehouse {
    /// Open (or create) the warehouse at the given path and run migrations.
    pub async fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AppError::Database(format!("create db directory: {e}")))?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let warehouse = Self { pool };
        warehouse.run_migrations().await?;
        tracing::info!(path = %path.display(), "Warehouse opened");
        Ok(warehouse)
    }

    /// Open an in-memory warehouse (tests).
    ///
    /// A single connection is pinned because every `:memory:` connection is
    /// its own database.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let warehouse = Self { pool };
        warehouse.run_migrations().await?;
        Ok(warehouse)
    }

    async fn run_migrations(&self) -> Result<()> {
        for statement in MIGRATIONS {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    // ─── Activities ──────────────────────────────────────────────

    /// Bulk replace-by-id upsert. Idempotent: repeating the same batch (or
    /// an overlapping one) leaves the table in the same state.
    ///
    /// Returns the number of rows written.
    pub async fn upsert_activities(&self, activities: &[Activity]) -> Result<u64> {
        if activities.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        for activity in activities {
            let raw = serde_json::to_string(&activity.raw_payload)
                .unwrap_or_else(|_| "{}".to_string());
            sqlx::query(
                r#"
                INSERT INTO activities
                    (id, user_id, created_at, data_date, type_id, subject, description,
                     raw_payload, cached_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
                ON CONFLICT(id) DO UPDATE SET
                    user_id = excluded.user_id,
                    created_at = excluded.created_at,
                    data_date = excluded.data_date,
                    type_id = excluded.type_id,
                    subject = excluded.subject,
                    description = excluded.description,
                    raw_payload = excluded.raw_payload,
                    cached_at = CURRENT_TIMESTAMP
                "#,
            )
            .bind(activity.id)
            .bind(&activity.user_id)
            .bind(activity.created_at.to_rfc3339())
            .bind(activity.data_date.to_string())
            .bind(&activity.type_id)
            .bind(&activity.subject)
            .bind(&activity.description)
            .bind(raw)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(activities.len() as u64)
    }

    /// All stored activities inside the scope, newest first.
    pub async fn query_activities(&self, scope: &QueryScope) -> Result<Vec<Activity>> {
        let mut qb = QueryBuilder::new(
            "SELECT id, user_id, created_at, data_date, type_id, subject, description, \
             raw_payload FROM activities WHERE data_date BETWEEN ",
        );
        qb.push_bind(scope.start_date.to_string());
        qb.push(" AND ");
        qb.push_bind(scope.end_date.to_string());
        push_scope_filters(&mut qb, scope);
        qb.push(" ORDER BY created_at DESC");

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(decode_activity).collect()
    }

    /// Distinct `data_date` values present for the scope: the raw signal
    /// completeness is computed from.
    pub async fn covered_dates(&self, scope: &QueryScope) -> Result<BTreeSet<NaiveDate>> {
        let mut qb = QueryBuilder::new(
            "SELECT DISTINCT data_date FROM activities WHERE data_date BETWEEN ",
        );
        qb.push_bind(scope.start_date.to_string());
        qb.push(" AND ");
        qb.push_bind(scope.end_date.to_string());
        push_scope_filters(&mut qb, scope);

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| {
                let raw: String = row.try_get("data_date")?;
                raw.parse()
                    .map_err(|e| AppError::Database(format!("bad data_date {raw:?}: {e}")))
            })
            .collect()
    }

    // ─── Snapshots ───────────────────────────────────────────────

    /// Replace the snapshots for their (user, date) keys as a unit.
    pub async fn replace_snapshots(&self, snapshots: &[DailySnapshot]) -> Result<()> {
        if snapshots.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for snapshot in snapshots {
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO activity_snapshots
                    (user_id, date, calls, comments, tasks, meetings, total, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
                "#,
            )
            .bind(&snapshot.user_id)
            .bind(snapshot.date.to_string())
            .bind(snapshot.calls)
            .bind(snapshot.comments)
            .bind(snapshot.tasks)
            .bind(snapshot.meetings)
            .bind(snapshot.total)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Fetch one snapshot, if present.
    pub async fn get_snapshot(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DailySnapshot>> {
        let row = sqlx::query(
            "SELECT user_id, date, calls, comments, tasks, meetings, total \
             FROM activity_snapshots WHERE user_id = ? AND date = ?",
        )
        .bind(user_id)
        .bind(date.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(decode_snapshot).transpose()
    }

    // ─── Retention ───────────────────────────────────────────────

    /// Age-based retention sweep: delete activities and snapshots whose data
    /// date is strictly before `horizon`. Runs out of band, never in the
    /// query path.
    ///
    /// Returns `(deleted_activities, deleted_snapshots)`.
    pub async fn sweep_older_than(&self, horizon: NaiveDate) -> Result<(u64, u64)> {
        let activities = sqlx::query("DELETE FROM activities WHERE data_date < ?")
            .bind(horizon.to_string())
            .execute(&self.pool)
            .await?
            .rows_affected();

        let snapshots = sqlx::query("DELETE FROM activity_snapshots WHERE date < ?")
            .bind(horizon.to_string())
            .execute(&self.pool)
            .await?
            .rows_affected();

        tracing::info!(%horizon, activities, snapshots, "Retention sweep completed");
        Ok((activities, snapshots))
    }
}

/// Append `AND user_id IN (...)` and the optional type filter to a query.
fn push_scope_filters(qb: &mut QueryBuilder<'_, sqlx::Sqlite>, scope: &QueryScope) {
    if !scope.user_ids.is_empty() {
        qb.push(" AND user_id IN (");
        let mut separated = qb.separated(", ");
        for user_id in &scope.user_ids {
            separated.push_bind(user_id.clone());
        }
        qb.push(")");
    }
    if let Some(type_id) = &scope.type_filter {
        qb.push(" AND type_id = ");
        qb.push_bind(type_id.clone());
    }
}

fn decode_activity(row: &sqlx::sqlite::SqliteRow) -> Result<Activity> {
    let created_raw: String = row.try_get("created_at")?;
    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_raw)
        .map_err(|e| AppError::Database(format!("bad created_at {created_raw:?}: {e}")))?
        .with_timezone(&Utc);

    let date_raw: String = row.try_get("data_date")?;
    let data_date = date_raw
        .parse()
        .map_err(|e| AppError::Database(format!("bad data_date {date_raw:?}: {e}")))?;

    let payload_raw: String = row.try_get("raw_payload")?;
    let raw_payload =
        serde_json::from_str(&payload_raw).unwrap_or(serde_json::Value::Null);

    Ok(Activity {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        created_at,
        data_date,
        type_id: row.try_get("type_id")?,
        subject: row.try_get("subject")?,
        description: row.try_get("description")?,
        raw_payload,
    })
}

fn decode_snapshot(row: &sqlx::sqlite::SqliteRow) -> Result<DailySnapshot> {
    let date_raw: String = row.try_get("date")?;
    let date = date_raw
        .parse()
        .map_err(|e| AppError::Database(format!("bad snapshot date {date_raw:?}: {e}")))?;

    Ok(DailySnapshot {
        user_id: row.try_get("user_id")?,
        date,
        calls: row.try_get("calls")?,
        comments: row.try_get("comments")?,
        tasks: row.try_get("tasks")?,
        meetings: row.try_get("meetings")?,
        total: row.try_get("total")?,
    })
}
