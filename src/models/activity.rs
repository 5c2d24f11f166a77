// SPDX-License-Identifier: MIT

//! CRM activity record model for storage and API.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Bitrix24 `TYPE_ID` values for the activity kinds the dashboard breaks out.
pub const TYPE_MEETING: &str = "1";
pub const TYPE_CALL: &str = "2";
pub const TYPE_TASK: &str = "4";
pub const TYPE_COMMENT: &str = "6";

/// One activity record from the CRM, as stored in the warehouse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    /// Remote-assigned id (globally unique, upsert key)
    pub id: i64,
    /// Acting person's id. Bitrix24 returns numeric ids; kept as a string
    /// because the rest of the API traffics in string ids.
    pub user_id: String,
    /// Creation timestamp, normalized to UTC on ingest
    pub created_at: DateTime<Utc>,
    /// Calendar date derived from `created_at`; drives range/coverage
    /// bookkeeping
    pub data_date: NaiveDate,
    /// Categorical tag (call, comment, task, meeting); opaque string here
    pub type_id: String,
    /// Short subject line
    pub subject: String,
    /// Free text; may be large, never truncated at storage time
    pub description: String,
    /// Full original record, retained for fields not otherwise modeled
    pub raw_payload: Value,
}

impl Activity {
    /// Parse an activity out of a raw Bitrix24 `crm.activity.list` record.
    ///
    /// Returns `None` when the record is missing its id, author or creation
    /// timestamp; such records are logged and skipped by the caller rather
    /// than failing the whole page.
    pub fn from_remote(record: &Value) -> Option<Self> {
        let id: i64 = field_str(record, "ID")?.parse().ok()?;
        let user_id = field_str(record, "AUTHOR_ID")?;
        let created_at = parse_remote_timestamp(&field_str(record, "CREATED")?)?;

        Some(Self {
            id,
            user_id,
            created_at,
            data_date: created_at.date_naive(),
            type_id: field_str(record, "TYPE_ID").unwrap_or_default(),
            subject: field_str(record, "SUBJECT").unwrap_or_default(),
            description: field_str(record, "DESCRIPTION").unwrap_or_default(),
            raw_payload: record.clone(),
        })
    }
}

/// Read a field that Bitrix24 may return as either a string or a number.
fn field_str(record: &Value, key: &str) -> Option<String> {
    match record.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse the CRM's `CREATED` timestamp.
///
/// Bitrix24 sends RFC3339 with the portal's timezone offset
/// (`2025-01-15T10:30:45+03:00`); older portals omit the offset, in which
/// case the timestamp is taken as UTC.
fn parse_remote_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}
