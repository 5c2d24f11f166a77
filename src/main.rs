// SPDX-License-Identifier: MIT

//! Bitrix24 Analytics API Server
//!
//! Serves per-person productivity statistics backed by a locally cached
//! copy of the CRM's activity records.

use bitrix_analytics::{
    config::Config,
    db::Warehouse,
    services::{BitrixClient, Reconciler, RosterService},
    AppState,
};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Bitrix24 Analytics API");

    let warehouse = Warehouse::new(Path::new(&config.database_path))
        .await
        .expect("Failed to open warehouse database");

    let bitrix = BitrixClient::new(&config);
    let roster = RosterService::new(&config, bitrix.clone());
    tracing::info!(
        roster_users = config.presales_user_ids.len(),
        "Roster configured"
    );

    // Scope locks are shared across all reconciler clones within this
    // process so concurrent queries over the same boundary join one fetch.
    let scope_locks = Arc::new(dashmap::DashMap::new());
    let reconciler = Reconciler::new(
        &config,
        bitrix.clone(),
        warehouse.clone(),
        roster.clone(),
        scope_locks,
    );

    let state = Arc::new(AppState {
        config: config.clone(),
        warehouse,
        bitrix,
        roster,
        reconciler,
    });

    let app = bitrix_analytics::routes::create_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("bitrix_analytics=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
