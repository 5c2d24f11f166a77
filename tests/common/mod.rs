// SPDX-License-Identifier: MIT

use bitrix_analytics::config::Config;
use bitrix_analytics::db::Warehouse;
use bitrix_analytics::models::Activity;
use bitrix_analytics::services::{BitrixClient, Reconciler, RosterService, ScopeLocks};
use bitrix_analytics::AppState;
use chrono::NaiveDateTime;
use serde_json::{json, Value};
use std::sync::Arc;

/// Test config pointing at a wiremock server, with delays zeroed out.
#[allow(dead_code)]
pub fn test_config(mock_uri: &str) -> Config {
    let mut config = Config::test_default();
    config.bitrix_webhook_url = mock_uri.trim_end_matches('/').to_string();
    config.page_delay_ms = 0;
    config
}

/// Build a reconciler over a fresh in-memory warehouse.
#[allow(dead_code)]
pub async fn test_reconciler(config: &Config) -> (Reconciler, Warehouse) {
    let (reconciler, warehouse, _) = test_reconciler_with_locks(config).await;
    (reconciler, warehouse)
}

/// Like [`test_reconciler`] but also hands back the shared lock map.
#[allow(dead_code)]
pub async fn test_reconciler_with_locks(config: &Config) -> (Reconciler, Warehouse, ScopeLocks) {
    let warehouse = Warehouse::in_memory().await.expect("in-memory warehouse");
    let bitrix = BitrixClient::new(config);
    let roster = RosterService::new(config, bitrix.clone());
    let scope_locks: ScopeLocks = Arc::new(dashmap::DashMap::new());
    let reconciler = Reconciler::new(
        config,
        bitrix,
        warehouse.clone(),
        roster,
        scope_locks.clone(),
    );
    (reconciler, warehouse, scope_locks)
}

/// Build full app state (for router-level tests).
#[allow(dead_code)]
pub async fn test_state(config: Config) -> Arc<AppState> {
    let warehouse = Warehouse::in_memory().await.expect("in-memory warehouse");
    let bitrix = BitrixClient::new(&config);
    let roster = RosterService::new(&config, bitrix.clone());
    let scope_locks = Arc::new(dashmap::DashMap::new());
    let reconciler = Reconciler::new(
        &config,
        bitrix.clone(),
        warehouse.clone(),
        roster.clone(),
        scope_locks,
    );
    Arc::new(AppState {
        config,
        warehouse,
        bitrix,
        roster,
        reconciler,
    })
}

/// A raw Bitrix24 activity record as `crm.activity.list` returns it.
#[allow(dead_code)]
pub fn remote_record(id: i64, user_id: &str, created: &str, type_id: &str) -> Value {
    json!({
        "ID": id.to_string(),
        "AUTHOR_ID": user_id,
        "CREATED": created,
        "TYPE_ID": type_id,
        "SUBJECT": format!("Activity {id}"),
        "DESCRIPTION": ""
    })
}

/// Wrap records in the portal's `result` envelope.
#[allow(dead_code)]
pub fn bitrix_result(records: Vec<Value>) -> Value {
    let total = records.len();
    json!({ "result": records, "total": total })
}

/// A stored activity for direct warehouse seeding.
#[allow(dead_code)]
pub fn stored_activity(id: i64, user_id: &str, created: &str, type_id: &str) -> Activity {
    let created_at = NaiveDateTime::parse_from_str(created, "%Y-%m-%d %H:%M:%S")
        .expect("test timestamp")
        .and_utc();
    Activity {
        id,
        user_id: user_id.to_string(),
        created_at,
        data_date: created_at.date_naive(),
        type_id: type_id.to_string(),
        subject: format!("Activity {id}"),
        description: String::new(),
        raw_payload: json!({"ID": id.to_string()}),
    }
}
