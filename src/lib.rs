// SPDX-License-Identifier: MIT

//! Bitrix24 activity analytics backend.
//!
//! Polls the CRM's activity records over its REST API, caches them in a
//! local SQLite warehouse, and serves per-person productivity statistics
//! over arbitrary date ranges. Cached data is trusted only when its
//! calendar-day coverage clears a completeness threshold; otherwise the
//! query reconciles against the remote source first.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::Warehouse;
use services::{BitrixClient, Reconciler, RosterService};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub warehouse: Warehouse,
    pub bitrix: BitrixClient,
    pub roster: RosterService,
    pub reconciler: Reconciler,
}
