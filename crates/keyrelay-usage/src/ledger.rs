// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The append-only usage ledger.
//!
//! One event per chat call, written exactly once at completion time, success
//! or failure. Events are immutable history: token counts and cost inputs
//! are captured at write time from provider-reported usage and never
//! recomputed or corrected later.

use keyrelay_core::{Provider, RelayError, TokenUsage};
use keyrelay_storage::{Database, UsageEventRow, now_timestamp};
use keyrelay_storage::queries::usage_events;
use tracing::debug;

/// Inputs for one ledger entry.
pub struct UsageRecord {
    pub credential_id: String,
    pub owner_id: String,
    pub provider: Provider,
    pub model: String,
    /// Zero on failed calls; the provider reported nothing.
    pub usage: TokenUsage,
    /// Provider-reported cost in USD. Stays `None` when unreported.
    pub reported_cost: Option<f64>,
    pub latency_ms: u64,
    pub succeeded: bool,
}

/// Append-only ledger over the usage_events table.
#[derive(Clone)]
pub struct UsageLedger {
    db: Database,
}

impl UsageLedger {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Append one event. Pure append: nothing in this crate updates or
    /// deletes ledger rows.
    pub async fn record(&self, record: UsageRecord) -> Result<(), RelayError> {
        let row = UsageEventRow {
            id: uuid::Uuid::new_v4().to_string(),
            credential_id: record.credential_id,
            owner_id: record.owner_id,
            provider: record.provider.to_string(),
            model: record.model,
            prompt_tokens: record.usage.prompt_tokens,
            completion_tokens: record.usage.completion_tokens,
            cost_estimate: record.reported_cost,
            latency_ms: record.latency_ms,
            succeeded: record.succeeded,
            occurred_at: now_timestamp(),
        };
        debug!(
            credential_id = %row.credential_id,
            provider = %row.provider,
            succeeded = row.succeeded,
            total_tokens = row.prompt_tokens + row.completion_tokens,
            "usage event recorded"
        );
        usage_events::insert(&self.db, row).await
    }

    /// Events for an owner within `[from, to)`, most recent first.
    pub async fn query_range(
        &self,
        owner_id: &str,
        from: Option<&str>,
        to: Option<&str>,
    ) -> Result<Vec<UsageEventRow>, RelayError> {
        usage_events::list_range(&self.db, owner_id, from, to).await
    }

    /// Lifetime token total for one credential, for budget utilization.
    pub async fn credential_token_total(
        &self,
        credential_id: &str,
        owner_id: &str,
    ) -> Result<u64, RelayError> {
        usage_events::credential_token_total(&self.db, credential_id, owner_id).await
    }
}
