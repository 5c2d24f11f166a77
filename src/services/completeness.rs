// SPDX-License-Identifier: MIT

//! Content-based cache completeness.
//!
//! Instead of TTL guesswork, a scope's trustworthiness is the fraction of
//! its calendar days for which the warehouse holds any data. A day counts
//! as covered when any user in the scope has at least one stored activity
//! on it; for a single-user scope that collapses to plain per-user
//! coverage. A lone user's true silence on a day is indistinguishable from
//! a missing fetch, so the ratio is a heuristic and is always reported to
//! the caller rather than hidden.

use crate::db::Warehouse;
use crate::error::Result;
use crate::models::{Activity, QueryScope};

/// Outcome of evaluating a scope against the warehouse.
#[derive(Debug)]
pub struct Evaluation {
    /// Everything the warehouse currently holds for the scope
    pub activities: Vec<Activity>,
    /// Covered-days ratio, 0-100
    pub ratio: f64,
    pub covered_days: usize,
    pub expected_days: usize,
}

/// Decides whether cached data is trustworthy enough to answer from.
#[derive(Debug, Clone)]
pub struct CompletenessEvaluator {
    /// Ratio (0-100) at or above which a scope is served from cache
    threshold: f64,
}

impl CompletenessEvaluator {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Compute the completeness ratio for `scope` and return the cached
    /// activities alongside it.
    pub async fn evaluate(&self, warehouse: &Warehouse, scope: &QueryScope) -> Result<Evaluation> {
        let expected = scope.expected_dates();
        let covered = warehouse.covered_dates(scope).await?;

        let covered_days = expected.iter().filter(|d| covered.contains(d)).count();
        let expected_days = expected.len();
        let ratio = if expected_days == 0 {
            0.0
        } else {
            covered_days as f64 * 100.0 / expected_days as f64
        };

        let activities = warehouse.query_activities(scope).await?;

        Ok(Evaluation {
            activities,
            ratio,
            covered_days,
            expected_days,
        })
    }

    /// Whether an evaluation clears the serve-from-cache threshold.
    pub fn is_complete(&self, evaluation: &Evaluation) -> bool {
        evaluation.ratio >= self.threshold
    }
}
