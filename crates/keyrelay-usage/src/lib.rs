// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Usage accounting: the append-only ledger, cost arithmetic, and
//! read-only analytics rollups.

pub mod analytics;
pub mod ledger;
pub mod pricing;

pub use analytics::{AnalyticsAggregator, AnalyticsSnapshot, CostBasis, SnapshotQuery};
pub use ledger::{UsageLedger, UsageRecord};
