// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-million-token cost arithmetic.
//!
//! Used in two places: at write time, when a chat call completes without a
//! provider-reported cost and configured rates exist for its provider, and at
//! read time for "manual" analytics where the caller supplies rates. A
//! missing rate means a missing cost, never zero.

use keyrelay_config::model::{PricingConfig, RateConfig};
use keyrelay_core::{Provider, TokenUsage};

/// Look up the configured rates for a provider, if any.
pub fn configured_rates(pricing: &PricingConfig, provider: Provider) -> Option<RateConfig> {
    match provider {
        Provider::OpenAi => pricing.openai,
        Provider::Grok => pricing.grok,
        Provider::Claude => pricing.claude,
        Provider::Google => pricing.google,
    }
}

/// Cost in USD: `(tokens / 1_000_000) * rate` per side, summed.
pub fn calculate_cost(usage: &TokenUsage, rates: &RateConfig) -> f64 {
    let input = (usage.prompt_tokens as f64 / 1_000_000.0) * rates.input_per_mtok;
    let output = (usage.completion_tokens as f64 / 1_000_000.0) * rates.output_per_mtok;
    input + output
}

/// Write-time cost for one completed call: the provider-reported cost when
/// present, otherwise the configured rates, otherwise `None`.
pub fn cost_at_write(
    pricing: &PricingConfig,
    provider: Provider,
    usage: &TokenUsage,
    reported_cost: Option<f64>,
) -> Option<f64> {
    reported_cost.or_else(|| {
        configured_rates(pricing, provider).map(|rates| calculate_cost(usage, &rates))
    })
}
