// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider-to-endpoint mapping.
//!
//! Dispatch is an exhaustive match on [`Provider`], so adding a provider is a
//! compile-time-checked change rather than a string branch.

use keyrelay_config::model::ProvidersConfig;
use keyrelay_core::Provider;

/// The chat completions URL for `(provider, model)`.
///
/// Google embeds the model in the URL path; the other providers carry it in
/// the request body.
pub fn chat_url(config: &ProvidersConfig, provider: Provider, model: &str) -> String {
    match provider {
        Provider::OpenAi => config.openai_url.clone(),
        Provider::Grok => config.grok_url.clone(),
        Provider::Claude => config.claude_url.clone(),
        Provider::Google => format!(
            "{}/{model}:generateContent",
            config.google_url.trim_end_matches('/')
        ),
    }
}

/// The cheap default model used for validation probes.
pub fn probe_model(provider: Provider) -> &'static str {
    match provider {
        Provider::OpenAi => "gpt-4o-mini",
        Provider::Grok => "grok-3-mini",
        Provider::Claude => "claude-3-5-haiku-latest",
        Provider::Google => "gemini-2.0-flash",
    }
}
