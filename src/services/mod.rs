// SPDX-License-Identifier: MIT

//! Services module - business logic layer.

pub mod bitrix;
pub mod completeness;
pub mod reconciler;
pub mod roster;

pub use bitrix::{BitrixClient, FetchOutcome};
pub use completeness::{CompletenessEvaluator, Evaluation};
pub use reconciler::{ReconcileOutcome, Reconciler, ScopeLocks};
pub use roster::{RosterService, RosterUser};
