// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP chat client for the supported providers.
//!
//! One [`ChatClient`] serves all four providers; the API key travels per call
//! rather than in default headers because every call may use a different
//! stored credential. Calls are single-attempt: a network failure or non-2xx
//! status is reported once and retry is the caller's choice.

use std::time::Duration;

use keyrelay_config::model::ProvidersConfig;
use keyrelay_core::{ChatMessage, Provider, RelayError};
use reqwest::RequestBuilder;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::endpoints;
use crate::wire::{
    self, AnthropicRequest, AnthropicResponse, ChatCompletion, GeminiRequest, GeminiResponse,
    OpenAiRequest, OpenAiResponse,
};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Cap on validation probe output. One token is enough to prove the key is
/// accepted.
const PROBE_MAX_TOKENS: u32 = 1;

/// HTTP client for provider chat endpoints.
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: reqwest::Client,
    config: ProvidersConfig,
}

impl ChatClient {
    /// Build the client. The request timeout applies to every provider call;
    /// a timeout surfaces as a network failure.
    pub fn new(config: ProvidersConfig) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| RelayError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Send one chat request and return the neutral completion.
    ///
    /// Network failure maps to `ProviderUnavailable`, a non-2xx status to
    /// `ProviderRejected`. Single attempt, no retry.
    pub async fn send_chat(
        &self,
        provider: Provider,
        api_key: &SecretString,
        model: &str,
        messages: &[ChatMessage],
        max_tokens: u32,
    ) -> Result<ChatCompletion, RelayError> {
        let url = endpoints::chat_url(&self.config, provider, model);
        debug!(provider = %provider, model, max_tokens, "sending chat request");

        let request = match provider {
            Provider::OpenAi | Provider::Grok => self
                .authorized(provider, &url, api_key)
                .json(&OpenAiRequest::new(model, messages, max_tokens)),
            Provider::Claude => self
                .authorized(provider, &url, api_key)
                .json(&AnthropicRequest::new(model, messages, max_tokens)),
            Provider::Google => self
                .authorized(provider, &url, api_key)
                .json(&GeminiRequest::new(messages, max_tokens)),
        };

        let response = request.send().await.map_err(|e| {
            RelayError::ProviderUnavailable {
                message: format!("request to {provider} failed: {e}"),
                source: Some(Box::new(e)),
            }
        })?;

        let status = response.status();
        debug!(provider = %provider, status = %status, "chat response received");
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::ProviderRejected {
                status: status.as_u16(),
                message: wire::error_message(status.as_u16(), &body),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| RelayError::ProviderUnavailable {
                message: format!("failed to read response body: {e}"),
                source: Some(Box::new(e)),
            })?;

        match provider {
            Provider::OpenAi | Provider::Grok => {
                parse_body::<OpenAiResponse>(&body)?.into_completion()
            }
            Provider::Claude => Ok(parse_body::<AnthropicResponse>(&body)?.into_completion()),
            Provider::Google => parse_body::<GeminiResponse>(&body)?.into_completion(),
        }
    }

    /// Issue the minimal round-trip used for credential validation: a
    /// one-word prompt against the provider's cheap default model, capped at
    /// one output token.
    pub async fn probe(
        &self,
        provider: Provider,
        api_key: &SecretString,
    ) -> Result<ChatCompletion, RelayError> {
        let messages = [ChatMessage {
            role: "user".to_string(),
            content: "ping".to_string(),
        }];
        self.send_chat(
            provider,
            api_key,
            endpoints::probe_model(provider),
            &messages,
            PROBE_MAX_TOKENS,
        )
        .await
    }

    fn authorized(&self, provider: Provider, url: &str, api_key: &SecretString) -> RequestBuilder {
        let builder = self.client.post(url);
        match provider {
            Provider::OpenAi | Provider::Grok => builder.bearer_auth(api_key.expose_secret()),
            Provider::Claude => builder
                .header("x-api-key", api_key.expose_secret())
                .header("anthropic-version", ANTHROPIC_VERSION),
            Provider::Google => builder.header("x-goog-api-key", api_key.expose_secret()),
        }
    }
}

fn parse_body<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, RelayError> {
    serde_json::from_slice(body).map_err(|e| RelayError::ProviderUnavailable {
        message: format!("malformed provider response: {e}"),
        source: Some(Box::new(e)),
    })
}
