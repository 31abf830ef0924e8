// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-only analytics rollups over the usage ledger.
//!
//! Snapshots are derived views, recomputed on demand and cached with a short
//! TTL; they are never a source of truth. Aggregation is idempotent: the same
//! ledger state always yields an identical snapshot, which is why groupings
//! run through ordered maps.
//!
//! Cost handling is null-preserving throughout. An event without a cost
//! contributes nothing to cost totals, and a snapshot over events with no
//! cost reports `cost: null` rather than zero, so spend is never silently
//! undercounted.

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use keyrelay_config::model::RateConfig;
use keyrelay_core::{RelayError, TokenUsage};
use keyrelay_storage::queries::credentials;
use keyrelay_storage::{Database, UsageEventRow};
use serde::Serialize;
use tracing::debug;

use crate::ledger::UsageLedger;
use crate::pricing;

const SNAPSHOT_TTL: Duration = Duration::from_secs(15);

/// How snapshot costs are computed.
#[derive(Debug, Clone, Copy)]
pub enum CostBasis {
    /// Use each event's write-time cost estimate; missing stays missing.
    Auto,
    /// Recompute from token counts with caller-supplied rates. The ledger is
    /// never mutated; the rates apply only to this snapshot.
    Manual(RateConfig),
}

/// Window and cost basis for one snapshot request.
#[derive(Debug, Clone, Default)]
pub struct SnapshotQuery {
    /// Inclusive lower bound (ISO 8601), open when `None`.
    pub from: Option<String>,
    /// Exclusive upper bound (ISO 8601), open when `None`.
    pub to: Option<String>,
    pub cost_basis: Option<CostBasis>,
}

/// The derived analytics view for one owner.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsSnapshot {
    pub totals: UsageTotals,
    /// Per-provider breakdown, sorted by provider name.
    pub providers: Vec<ProviderBreakdown>,
    /// Per-model breakdown, sorted by model name.
    pub models: Vec<ModelBreakdown>,
    /// Calendar-day buckets (UTC), most recent first.
    pub daily: Vec<DailyBucket>,
    /// Per-credential leaderboard, heaviest window usage first.
    pub credentials: Vec<CredentialUsage>,
    /// Per-provider reliability over the query window.
    pub reliability: Vec<ProviderReliability>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UsageTotals {
    pub requests: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    /// `None` when no event in the window carried a cost.
    pub cost: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderBreakdown {
    pub provider: String,
    pub requests: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub cost: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelBreakdown {
    pub model: String,
    pub requests: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub cost: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyBucket {
    /// UTC calendar day, `YYYY-MM-DD`.
    pub date: String,
    pub requests: u64,
    pub total_tokens: u64,
    pub cost: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CredentialUsage {
    pub credential_id: String,
    /// `None` for events whose credential was deleted since.
    pub label: Option<String>,
    pub provider: String,
    pub requests: u64,
    pub total_tokens: u64,
    pub cost: Option<f64>,
    /// Lifetime tokens over the configured budget, as a fraction (0.75 means
    /// 75% consumed). `None` when the credential has no budget or no longer
    /// exists.
    pub budget_utilization: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderReliability {
    pub provider: String,
    pub requests: u64,
    /// Fraction of calls in the window that succeeded.
    pub success_rate: f64,
    pub mean_latency_ms: f64,
    pub tokens_per_request: f64,
}

#[derive(Default)]
struct Accum {
    requests: u64,
    prompt_tokens: u64,
    completion_tokens: u64,
    cost: Option<f64>,
    successes: u64,
    latency_sum: u64,
}

impl Accum {
    fn add(&mut self, event: &UsageEventRow, cost: Option<f64>) {
        self.requests += 1;
        self.prompt_tokens += u64::from(event.prompt_tokens);
        self.completion_tokens += u64::from(event.completion_tokens);
        add_cost(&mut self.cost, cost);
        if event.succeeded {
            self.successes += 1;
        }
        self.latency_sum += event.latency_ms;
    }

    fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Null-preserving accumulation: `None + None = None`, anything else sums.
fn add_cost(acc: &mut Option<f64>, cost: Option<f64>) {
    if let Some(c) = cost {
        *acc = Some(acc.unwrap_or(0.0) + c);
    }
}

/// Computes [`AnalyticsSnapshot`]s from the ledger and credential list.
pub struct AnalyticsAggregator {
    db: Database,
    ledger: UsageLedger,
    cache: DashMap<String, (Instant, AnalyticsSnapshot)>,
    ttl: Duration,
}

impl AnalyticsAggregator {
    pub fn new(db: Database) -> Self {
        Self {
            ledger: UsageLedger::new(db.clone()),
            db,
            cache: DashMap::new(),
            ttl: SNAPSHOT_TTL,
        }
    }

    /// Override the cache TTL. A zero TTL disables caching.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Compute (or serve from cache) the analytics snapshot for an owner.
    pub async fn snapshot(
        &self,
        owner_id: &str,
        query: &SnapshotQuery,
    ) -> Result<AnalyticsSnapshot, RelayError> {
        let cache_key = cache_key(owner_id, query);
        if let Some(entry) = self.cache.get(&cache_key) {
            let (computed_at, snapshot) = entry.value();
            if computed_at.elapsed() < self.ttl {
                debug!(owner_id, "analytics snapshot served from cache");
                return Ok(snapshot.clone());
            }
        }

        let events = self
            .ledger
            .query_range(owner_id, query.from.as_deref(), query.to.as_deref())
            .await?;
        let summaries = credentials::list_summaries(&self.db, owner_id).await?;
        let snapshot = self.aggregate(owner_id, &events, &summaries, query).await?;

        self.cache
            .insert(cache_key, (Instant::now(), snapshot.clone()));
        Ok(snapshot)
    }

    async fn aggregate(
        &self,
        owner_id: &str,
        events: &[UsageEventRow],
        summaries: &[keyrelay_storage::CredentialSummary],
        query: &SnapshotQuery,
    ) -> Result<AnalyticsSnapshot, RelayError> {
        let basis = query.cost_basis.unwrap_or(CostBasis::Auto);

        let mut totals = Accum::default();
        let mut by_provider: BTreeMap<String, Accum> = BTreeMap::new();
        let mut by_model: BTreeMap<String, Accum> = BTreeMap::new();
        let mut by_day: BTreeMap<String, Accum> = BTreeMap::new();
        let mut by_credential: BTreeMap<String, Accum> = BTreeMap::new();

        for event in events {
            let cost = event_cost(event, basis);
            totals.add(event, cost);
            by_provider.entry(event.provider.clone()).or_default().add(event, cost);
            by_model.entry(event.model.clone()).or_default().add(event, cost);
            by_day.entry(day_of(&event.occurred_at)).or_default().add(event, cost);
            by_credential
                .entry(event.credential_id.clone())
                .or_default()
                .add(event, cost);
        }

        let summary_index: HashMap<&str, &keyrelay_storage::CredentialSummary> =
            summaries.iter().map(|s| (s.id.as_str(), s)).collect();

        let mut credentials_out = Vec::with_capacity(by_credential.len());
        for (credential_id, acc) in &by_credential {
            let summary = summary_index.get(credential_id.as_str());
            let budget_utilization = match summary.and_then(|s| s.token_budget) {
                Some(budget) if budget > 0 => {
                    // Budgets are lifetime soft caps, so utilization uses the
                    // full ledger history, not just the query window.
                    let lifetime = self
                        .ledger
                        .credential_token_total(credential_id, owner_id)
                        .await?;
                    Some(lifetime as f64 / budget as f64)
                }
                _ => None,
            };
            credentials_out.push(CredentialUsage {
                credential_id: credential_id.clone(),
                label: summary.map(|s| s.label.clone()),
                provider: summary
                    .map(|s| s.provider.clone())
                    .unwrap_or_else(|| events_provider(events, credential_id)),
                requests: acc.requests,
                total_tokens: acc.total_tokens(),
                cost: acc.cost,
                budget_utilization,
            });
        }
        credentials_out.sort_by(|a, b| {
            b.total_tokens
                .cmp(&a.total_tokens)
                .then_with(|| a.credential_id.cmp(&b.credential_id))
        });

        let reliability = by_provider
            .iter()
            .map(|(provider, acc)| ProviderReliability {
                provider: provider.clone(),
                requests: acc.requests,
                success_rate: acc.successes as f64 / acc.requests as f64,
                mean_latency_ms: acc.latency_sum as f64 / acc.requests as f64,
                tokens_per_request: acc.total_tokens() as f64 / acc.requests as f64,
            })
            .collect();

        Ok(AnalyticsSnapshot {
            totals: UsageTotals {
                requests: totals.requests,
                prompt_tokens: totals.prompt_tokens,
                completion_tokens: totals.completion_tokens,
                total_tokens: totals.total_tokens(),
                cost: totals.cost,
            },
            providers: by_provider
                .iter()
                .map(|(provider, acc)| ProviderBreakdown {
                    provider: provider.clone(),
                    requests: acc.requests,
                    prompt_tokens: acc.prompt_tokens,
                    completion_tokens: acc.completion_tokens,
                    cost: acc.cost,
                })
                .collect(),
            models: by_model
                .iter()
                .map(|(model, acc)| ModelBreakdown {
                    model: model.clone(),
                    requests: acc.requests,
                    prompt_tokens: acc.prompt_tokens,
                    completion_tokens: acc.completion_tokens,
                    cost: acc.cost,
                })
                .collect(),
            daily: by_day
                .iter()
                .rev()
                .map(|(date, acc)| DailyBucket {
                    date: date.clone(),
                    requests: acc.requests,
                    total_tokens: acc.total_tokens(),
                    cost: acc.cost,
                })
                .collect(),
            credentials: credentials_out,
            reliability,
        })
    }
}

fn cache_key(owner_id: &str, query: &SnapshotQuery) -> String {
    let basis = match query.cost_basis {
        None | Some(CostBasis::Auto) => "auto".to_string(),
        Some(CostBasis::Manual(rates)) => {
            format!("manual:{}:{}", rates.input_per_mtok, rates.output_per_mtok)
        }
    };
    format!(
        "{owner_id}|{}|{}|{basis}",
        query.from.as_deref().unwrap_or(""),
        query.to.as_deref().unwrap_or("")
    )
}

fn event_cost(event: &UsageEventRow, basis: CostBasis) -> Option<f64> {
    match basis {
        CostBasis::Auto => event.cost_estimate,
        CostBasis::Manual(rates) => {
            let usage = TokenUsage {
                prompt_tokens: event.prompt_tokens,
                completion_tokens: event.completion_tokens,
            };
            Some(pricing::calculate_cost(&usage, &rates))
        }
    }
}

/// UTC calendar day of an ISO 8601 timestamp.
fn day_of(occurred_at: &str) -> String {
    occurred_at.get(..10).unwrap_or(occurred_at).to_string()
}

/// Provider name for a deleted credential, recovered from its events.
fn events_provider(events: &[UsageEventRow], credential_id: &str) -> String {
    events
        .iter()
        .find(|e| e.credential_id == credential_id)
        .map(|e| e.provider.clone())
        .unwrap_or_default()
}
