// SPDX-License-Identifier: MIT

//! Warehouse invariants: idempotent upserts, coverage signal, snapshot
//! consistency, retention sweep.

use bitrix_analytics::db::Warehouse;
use bitrix_analytics::models::{DailySnapshot, QueryScope};
use chrono::NaiveDate;

mod common;
use common::stored_activity;

fn d(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

fn scope(users: &[&str], start: &str, end: &str) -> QueryScope {
    QueryScope::new(users.iter().copied(), d(start), d(end))
}

#[tokio::test]
async fn test_upsert_is_idempotent() {
    let warehouse = Warehouse::in_memory().await.unwrap();
    let batch = vec![
        stored_activity(1, "42", "2025-01-01 10:00:00", "2"),
        stored_activity(2, "42", "2025-01-02 11:00:00", "6"),
    ];

    warehouse.upsert_activities(&batch).await.unwrap();
    warehouse.upsert_activities(&batch).await.unwrap();

    let stored = warehouse
        .query_activities(&scope(&["42"], "2025-01-01", "2025-01-07"))
        .await
        .unwrap();
    assert_eq!(stored.len(), 2, "re-upserting must not duplicate rows");
}

#[tokio::test]
async fn test_upsert_replaces_by_id() {
    let warehouse = Warehouse::in_memory().await.unwrap();
    warehouse
        .upsert_activities(&[stored_activity(1, "42", "2025-01-01 10:00:00", "2")])
        .await
        .unwrap();

    // Same id, changed content: overwrites in place
    let mut updated = stored_activity(1, "42", "2025-01-01 10:00:00", "6");
    updated.subject = "Edited subject".to_string();
    warehouse.upsert_activities(&[updated]).await.unwrap();

    let stored = warehouse
        .query_activities(&scope(&["42"], "2025-01-01", "2025-01-01"))
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].type_id, "6");
    assert_eq!(stored[0].subject, "Edited subject");
}

#[tokio::test]
async fn test_query_filters_by_scope() {
    let warehouse = Warehouse::in_memory().await.unwrap();
    warehouse
        .upsert_activities(&[
            stored_activity(1, "42", "2025-01-01 10:00:00", "2"),
            stored_activity(2, "42", "2025-01-05 10:00:00", "6"),
            stored_activity(3, "7", "2025-01-02 10:00:00", "2"),
            stored_activity(4, "42", "2025-02-01 10:00:00", "2"), // outside range
        ])
        .await
        .unwrap();

    let all = warehouse
        .query_activities(&scope(&["42", "7"], "2025-01-01", "2025-01-31"))
        .await
        .unwrap();
    assert_eq!(all.len(), 3);

    let calls_only = warehouse
        .query_activities(
            &scope(&["42", "7"], "2025-01-01", "2025-01-31")
                .with_type_filter(Some("2".to_string())),
        )
        .await
        .unwrap();
    assert_eq!(calls_only.len(), 2);

    let one_user = warehouse
        .query_activities(&scope(&["7"], "2025-01-01", "2025-01-31"))
        .await
        .unwrap();
    assert_eq!(one_user.len(), 1);
    assert_eq!(one_user[0].user_id, "7");
}

#[tokio::test]
async fn test_query_returns_newest_first() {
    let warehouse = Warehouse::in_memory().await.unwrap();
    warehouse
        .upsert_activities(&[
            stored_activity(1, "42", "2025-01-01 08:00:00", "2"),
            stored_activity(2, "42", "2025-01-03 09:00:00", "2"),
            stored_activity(3, "42", "2025-01-02 10:00:00", "2"),
        ])
        .await
        .unwrap();

    let stored = warehouse
        .query_activities(&scope(&["42"], "2025-01-01", "2025-01-07"))
        .await
        .unwrap();
    let ids: Vec<i64> = stored.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![2, 3, 1]);
}

#[tokio::test]
async fn test_covered_dates_is_distinct_set() {
    let warehouse = Warehouse::in_memory().await.unwrap();
    warehouse
        .upsert_activities(&[
            stored_activity(1, "42", "2025-01-01 08:00:00", "2"),
            stored_activity(2, "42", "2025-01-01 18:00:00", "2"),
            stored_activity(3, "7", "2025-01-03 09:00:00", "6"),
        ])
        .await
        .unwrap();

    let covered = warehouse
        .covered_dates(&scope(&["42", "7"], "2025-01-01", "2025-01-07"))
        .await
        .unwrap();
    assert_eq!(
        covered.into_iter().collect::<Vec<_>>(),
        vec![d("2025-01-01"), d("2025-01-03")]
    );
}

#[tokio::test]
async fn test_coverage_grows_monotonically() {
    let warehouse = Warehouse::in_memory().await.unwrap();
    let query_scope = scope(&["42"], "2025-01-01", "2025-01-07");

    warehouse
        .upsert_activities(&[stored_activity(1, "42", "2025-01-02 08:00:00", "2")])
        .await
        .unwrap();
    let before = warehouse.covered_dates(&query_scope).await.unwrap();

    warehouse
        .upsert_activities(&[
            stored_activity(1, "42", "2025-01-02 08:00:00", "2"), // overlap
            stored_activity(2, "42", "2025-01-04 08:00:00", "2"),
        ])
        .await
        .unwrap();
    let after = warehouse.covered_dates(&query_scope).await.unwrap();

    assert!(after.is_superset(&before));
    assert_eq!(after.len(), 2);
}

#[tokio::test]
async fn test_snapshot_roundtrip_and_replacement() {
    let warehouse = Warehouse::in_memory().await.unwrap();
    let snapshot = DailySnapshot {
        user_id: "42".to_string(),
        date: d("2025-01-01"),
        calls: 3,
        comments: 1,
        tasks: 0,
        meetings: 2,
        total: 6,
    };
    warehouse.replace_snapshots(&[snapshot.clone()]).await.unwrap();

    let stored = warehouse.get_snapshot("42", d("2025-01-01")).await.unwrap();
    assert_eq!(stored, Some(snapshot.clone()));

    // Replacing the same key overwrites rather than accumulating
    let replacement = DailySnapshot {
        calls: 4,
        total: 7,
        ..snapshot
    };
    warehouse
        .replace_snapshots(&[replacement.clone()])
        .await
        .unwrap();
    let stored = warehouse.get_snapshot("42", d("2025-01-01")).await.unwrap();
    assert_eq!(stored, Some(replacement));
}

#[tokio::test]
async fn test_snapshot_matches_store_counts() {
    let warehouse = Warehouse::in_memory().await.unwrap();
    let acts = vec![
        stored_activity(1, "42", "2025-01-01 08:00:00", "2"),
        stored_activity(2, "42", "2025-01-01 09:00:00", "2"),
        stored_activity(3, "42", "2025-01-01 10:00:00", "4"),
    ];
    warehouse.upsert_activities(&acts).await.unwrap();

    let day = warehouse
        .query_activities(&scope(&["42"], "2025-01-01", "2025-01-01"))
        .await
        .unwrap();
    let snapshot = DailySnapshot::from_activities("42", d("2025-01-01"), &day);
    warehouse.replace_snapshots(&[snapshot]).await.unwrap();

    let stored = warehouse
        .get_snapshot("42", d("2025-01-01"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.total as usize, day.len());
    assert_eq!(stored.calls, 2);
    assert_eq!(stored.tasks, 1);
}

#[tokio::test]
async fn test_retention_sweep_deletes_only_old_rows() {
    let warehouse = Warehouse::in_memory().await.unwrap();
    warehouse
        .upsert_activities(&[
            stored_activity(1, "42", "2024-06-01 08:00:00", "2"),
            stored_activity(2, "42", "2025-01-05 08:00:00", "2"),
        ])
        .await
        .unwrap();
    warehouse
        .replace_snapshots(&[
            DailySnapshot::from_activities("42", d("2024-06-01"), &[]),
            DailySnapshot::from_activities("42", d("2025-01-05"), &[]),
        ])
        .await
        .unwrap();

    let (deleted_activities, deleted_snapshots) = warehouse
        .sweep_older_than(d("2025-01-01"))
        .await
        .unwrap();
    assert_eq!(deleted_activities, 1);
    assert_eq!(deleted_snapshots, 1);

    let remaining = warehouse
        .query_activities(&scope(&["42"], "2024-01-01", "2025-12-31"))
        .await
        .unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, 2);
    assert!(warehouse
        .get_snapshot("42", d("2025-01-05"))
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_on_disk_warehouse_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("warehouse.db");

    {
        let warehouse = Warehouse::new(&db_path).await.unwrap();
        warehouse
            .upsert_activities(&[stored_activity(1, "42", "2025-01-01 10:00:00", "2")])
            .await
            .unwrap();
    }

    let reopened = Warehouse::new(&db_path).await.unwrap();
    let stored = reopened
        .query_activities(&scope(&["42"], "2025-01-01", "2025-01-01"))
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, 1);
}

#[tokio::test]
async fn test_raw_payload_survives_roundtrip() {
    let warehouse = Warehouse::in_memory().await.unwrap();
    let mut activity = stored_activity(1, "42", "2025-01-01 08:00:00", "2");
    activity.raw_payload = serde_json::json!({
        "ID": "1",
        "RESULT_MARK": "5",
        "PROVIDER_ID": "VOXIMPLANT_CALL"
    });
    warehouse.upsert_activities(&[activity]).await.unwrap();

    let stored = warehouse
        .query_activities(&scope(&["42"], "2025-01-01", "2025-01-01"))
        .await
        .unwrap();
    assert_eq!(stored[0].raw_payload["PROVIDER_ID"], "VOXIMPLANT_CALL");
}
