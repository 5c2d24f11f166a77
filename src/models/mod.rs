// SPDX-License-Identifier: MIT

//! Data models for the application.

pub mod activity;
pub mod scope;
pub mod snapshot;
pub mod stats;

pub use activity::Activity;
pub use scope::QueryScope;
pub use snapshot::DailySnapshot;
pub use stats::{ActivityStatistics, UserActivitySummary};
