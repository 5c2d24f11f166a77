// SPDX-License-Identifier: MIT

//! Application configuration loaded from environment variables.
//!
//! All fetch tuning knobs (page cap, chunk size, inter-page delay, worker
//! count, completeness threshold) live here as named configuration rather
//! than constants scattered through the fetch path.

use std::env;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bitrix24 inbound webhook base URL (includes the auth token path)
    pub bitrix_webhook_url: String,
    /// Server port
    pub port: u16,
    /// Path to the SQLite warehouse file
    pub database_path: String,

    // --- Remote fetch tuning ---
    /// Records per page as returned by the Bitrix24 list methods
    pub page_size: u32,
    /// Hard cap on pages fetched for a single (user, window) call
    pub page_cap: u32,
    /// Delay between successive page requests, in milliseconds
    pub page_delay_ms: u64,
    /// Per-request timeout for Bitrix24 calls, in seconds
    pub request_timeout_secs: u64,
    /// Maximum date-window length (days) for a single fetch; longer ranges
    /// are chunked into sequential sub-windows
    pub max_window_days: i64,
    /// Number of concurrent (user, window) fetches during reconciliation
    pub fetch_workers: usize,

    // --- Cache policy ---
    /// Completeness percentage (0-100) above which a query is served from
    /// the warehouse without touching Bitrix24
    pub completeness_threshold: f64,

    // --- Roster ---
    /// Target user ids supplied by the deployment (presales staff); used
    /// when a query does not name users explicitly
    pub presales_user_ids: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            bitrix_webhook_url: env::var("BITRIX_WEBHOOK_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .map_err(|_| ConfigError::Missing("BITRIX_WEBHOOK_URL"))?,
            port: env_or("PORT", 8080),
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "data/warehouse.db".to_string()),

            page_size: env_or("BITRIX_PAGE_SIZE", 50),
            page_cap: env_or("BITRIX_PAGE_CAP", 20),
            page_delay_ms: env_or("BITRIX_PAGE_DELAY_MS", 150),
            request_timeout_secs: env_or("BITRIX_REQUEST_TIMEOUT_SECS", 30),
            max_window_days: env_or("FETCH_MAX_WINDOW_DAYS", 100),
            fetch_workers: env_or("FETCH_WORKERS", 4),

            completeness_threshold: env_or("COMPLETENESS_THRESHOLD", 95.0),

            presales_user_ids: env::var("PRESALES_USER_IDS")
                .map(|raw| {
                    raw.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        })
    }

    /// Default config for tests: no real webhook, in-repo temp database.
    pub fn test_default() -> Self {
        Self {
            bitrix_webhook_url: "http://localhost:9/rest/1/test".to_string(),
            port: 8080,
            database_path: ":memory:".to_string(),
            page_size: 50,
            page_cap: 20,
            page_delay_ms: 0,
            request_timeout_secs: 5,
            max_window_days: 100,
            fetch_workers: 4,
            completeness_threshold: 95.0,
            presales_user_ids: vec!["8860".to_string(), "8988".to_string()],
        }
    }
}

/// Read an env var and parse it, falling back to `default` when unset or
/// malformed.
fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}
