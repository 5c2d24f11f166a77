// SPDX-License-Identifier: MIT

//! Reconciliation: completeness check → fetch-through → merge → snapshot
//! re-derivation.
//!
//! Per query the state machine is:
//! 1. Resolve the target user set (explicit scope, or the configured roster).
//! 2. Acquire the per-scope-signature lock so concurrent callers over the
//!    same boundary join one fetch instead of duplicating it.
//! 3. Evaluate completeness (skipped under `force_refresh`); at or above the
//!    threshold the cached activities are returned as-is.
//! 4. Otherwise chunk the date range, fan out one fetch per (user, window)
//!    pair with bounded concurrency, and upsert each window's records as
//!    soon as they land, so an abandoned reconciliation keeps its partial
//!    progress.
//! 5. After all fetches settle, re-derive daily snapshots for every
//!    (user, date) the merge touched, then re-evaluate and return.

use chrono::NaiveDate;
use dashmap::DashMap;
use futures_util::{stream, StreamExt};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::db::Warehouse;
use crate::error::Result;
use crate::models::{Activity, DailySnapshot, QueryScope};
use crate::services::bitrix::BitrixClient;
use crate::services::completeness::CompletenessEvaluator;
use crate::services::roster::RosterService;
use crate::time_utils::chunk_date_range;

/// Per-signature async locks; shared across all reconciler clones.
pub type ScopeLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// Answer for one reconciled query.
#[derive(Debug)]
pub struct ReconcileOutcome {
    /// Merged activity set for the full scope (cached plus freshly fetched)
    pub activities: Vec<Activity>,
    /// Completeness ratio after any fetch-through, 0-100
    pub completeness_ratio: f64,
    /// True when the answer came straight from the warehouse
    pub from_cache: bool,
}

/// Orchestrates the cache-or-fetch decision for statistics queries.
#[derive(Clone)]
pub struct Reconciler {
    bitrix: BitrixClient,
    warehouse: Warehouse,
    evaluator: CompletenessEvaluator,
    roster: RosterService,
    scope_locks: ScopeLocks,
    max_window_days: i64,
    fetch_workers: usize,
}

impl Reconciler {
    pub fn new(
        config: &Config,
        bitrix: BitrixClient,
        warehouse: Warehouse,
        roster: RosterService,
        scope_locks: ScopeLocks,
    ) -> Self {
        Self {
            bitrix,
            warehouse,
            evaluator: CompletenessEvaluator::new(config.completeness_threshold),
            roster,
            scope_locks,
            max_window_days: config.max_window_days,
            fetch_workers: config.fetch_workers.max(1),
        }
    }

    /// Answer a query, fetching through to Bitrix24 only when the cache
    /// cannot be trusted for the scope.
    pub async fn query(&self, scope: &QueryScope) -> Result<ReconcileOutcome> {
        let mut scope = scope.clone();
        if scope.user_ids.is_empty() {
            scope.user_ids = self.roster.target_user_ids().iter().cloned().collect();
        }
        let signature = scope.signature();

        // At-most-one fetch per scope signature. Callers that arrive while a
        // fetch is in flight block here and then see the merged data in
        // their own evaluation.
        let lock = self
            .scope_locks
            .entry(signature.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let outcome = {
            let _guard = lock.lock().await;
            self.reconcile(&scope).await
        };

        // Drop the map entry once no other caller holds the lock (the map's
        // reference plus our own clone). `entry` and `remove_if` serialize on
        // the shard, so a waiter that already cloned keeps the count above
        // two and the entry stays.
        self.scope_locks
            .remove_if(&signature, |_, lock| Arc::strong_count(lock) <= 2);

        outcome
    }

    async fn reconcile(&self, scope: &QueryScope) -> Result<ReconcileOutcome> {
        if !scope.force_refresh {
            let evaluation = self.evaluator.evaluate(&self.warehouse, scope).await?;
            if self.evaluator.is_complete(&evaluation) {
                tracing::debug!(
                    signature = %scope.signature(),
                    ratio = evaluation.ratio,
                    "Cache hit"
                );
                return Ok(ReconcileOutcome {
                    activities: evaluation.activities,
                    completeness_ratio: evaluation.ratio,
                    from_cache: true,
                });
            }
            tracing::info!(
                signature = %scope.signature(),
                ratio = evaluation.ratio,
                covered = evaluation.covered_days,
                expected = evaluation.expected_days,
                "Cache incomplete, fetching through"
            );
        } else {
            tracing::info!(signature = %scope.signature(), "Forced refresh, fetching through");
        }

        self.fetch_through(scope).await?;

        let evaluation = self.evaluator.evaluate(&self.warehouse, scope).await?;
        Ok(ReconcileOutcome {
            activities: evaluation.activities,
            completeness_ratio: evaluation.ratio,
            from_cache: false,
        })
    }

    /// Fan out one fetch per (user, sub-window) pair, merging each result
    /// into the warehouse as it lands, then rebuild the touched snapshots.
    ///
    /// Individual fetch failures are logged and contribute zero records;
    /// they surface only as a lower completeness ratio. Store failures are
    /// fatal to the query.
    async fn fetch_through(&self, scope: &QueryScope) -> Result<()> {
        let windows = chunk_date_range(scope.start_date, scope.end_date, self.max_window_days);

        let pairs: Vec<(String, NaiveDate, NaiveDate)> = scope
            .user_ids
            .iter()
            .flat_map(|user| {
                windows
                    .iter()
                    .map(|(start, end)| (user.clone(), *start, *end))
            })
            .collect();

        tracing::debug!(
            users = scope.user_ids.len(),
            windows = windows.len(),
            fetches = pairs.len(),
            "Fetch-through fan-out"
        );

        let mut fetches = stream::iter(pairs.into_iter().map(|(user, start, end)| {
            let bitrix = self.bitrix.clone();
            let type_filter = scope.type_filter.clone();
            async move {
                let outcome = bitrix
                    .list_activities(&user, start, end, type_filter.as_deref())
                    .await;
                (user, start, end, outcome)
            }
        }))
        .buffer_unordered(self.fetch_workers);

        let mut touched: BTreeSet<(String, NaiveDate)> = BTreeSet::new();
        while let Some((user, start, end, outcome)) = fetches.next().await {
            if !outcome.complete {
                tracing::warn!(
                    user,
                    %start,
                    %end,
                    merged = outcome.activities.len(),
                    "Sub-window fetch incomplete; merging what landed"
                );
            }
            for activity in &outcome.activities {
                touched.insert((activity.user_id.clone(), activity.data_date));
            }
            self.warehouse.upsert_activities(&outcome.activities).await?;
        }

        self.rebuild_snapshots(&touched).await
    }

    /// Re-derive the daily snapshot for every touched (user, date) pair
    /// from what the warehouse now holds for that day, never from the
    /// possibly type-filtered fetch slice. A filtered or partial re-fetch
    /// therefore cannot shrink a previously complete day's counts.
    async fn rebuild_snapshots(&self, touched: &BTreeSet<(String, NaiveDate)>) -> Result<()> {
        if touched.is_empty() {
            return Ok(());
        }

        let mut snapshots = Vec::with_capacity(touched.len());
        for (user_id, date) in touched {
            let day_scope = QueryScope::new([user_id.clone()], *date, *date);
            let day_activities = self.warehouse.query_activities(&day_scope).await?;
            snapshots.push(DailySnapshot::from_activities(user_id, *date, &day_activities));
        }

        tracing::debug!(count = snapshots.len(), "Rebuilding daily snapshots");
        self.warehouse.replace_snapshots(&snapshots).await
    }
}
