// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The chat proxy: forwards a chat request through a stored credential and
//! accounts for it.
//!
//! Every send that reaches the provider stage writes exactly one usage
//! event, success or failure. Failed calls are recorded with zero tokens and
//! `succeeded = false`; cost and reliability analytics must reflect failed
//! attempts, not just successes. The decrypted secret lives only for the
//! duration of one outbound call and is dropped as soon as the request
//! completes.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use keyrelay_config::model::PricingConfig;
use keyrelay_core::{ChatMessage, Provider, RelayError, TokenUsage};
use keyrelay_providers::{ChatClient, ChatCompletion};
use keyrelay_storage::{CredentialStore, CredentialSummary};
use keyrelay_usage::{UsageLedger, UsageRecord};
use keyrelay_usage::pricing;
use tracing::{debug, warn};

/// Output-token ceiling when neither the request nor the credential sets one.
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// One inbound chat request, already authenticated and owner-scoped.
pub struct ChatSend {
    pub credential_id: String,
    pub owner_id: String,
    pub model: String,
    pub messages: Vec<ChatMessage>,
    /// Per-request output ceiling; falls back to the credential's stored
    /// default, then to [`DEFAULT_MAX_TOKENS`].
    pub max_tokens_per_answer: Option<u32>,
}

/// Routes chat requests through stored credentials and records usage.
pub struct ChatProxy {
    store: Arc<CredentialStore>,
    ledger: UsageLedger,
    client: ChatClient,
    pricing: PricingConfig,
}

impl ChatProxy {
    pub fn new(
        store: Arc<CredentialStore>,
        ledger: UsageLedger,
        client: ChatClient,
        pricing: PricingConfig,
    ) -> Self {
        Self {
            store,
            ledger,
            client,
            pricing,
        }
    }

    /// Forward one chat request and write its ledger entry.
    ///
    /// Resolution failures (unknown credential, unsupported provider, vault
    /// integrity) happen before the provider stage and produce no event;
    /// there is nothing attributable to record. Once the provider call is
    /// issued, exactly one event is written on every exit path.
    pub async fn send(&self, request: ChatSend) -> Result<ChatCompletion, RelayError> {
        if request.messages.is_empty() {
            return Err(RelayError::InvalidInput("messages must not be empty".into()));
        }
        if request.model.trim().is_empty() {
            return Err(RelayError::InvalidInput("model must not be empty".into()));
        }

        let summary = self
            .store
            .get_summary(&request.credential_id, &request.owner_id)
            .await?;
        let provider = Provider::from_str(&summary.provider).map_err(|_| {
            RelayError::UnsupportedProvider {
                name: summary.provider.clone(),
            }
        })?;
        let max_tokens = request
            .max_tokens_per_answer
            .or(summary.max_tokens_per_answer)
            .unwrap_or(DEFAULT_MAX_TOKENS);

        let secret = self
            .store
            .get_decrypted_secret(&request.credential_id, &request.owner_id)
            .await?;

        let started = Instant::now();
        let result = self
            .client
            .send_chat(provider, &secret, &request.model, &request.messages, max_tokens)
            .await;
        drop(secret);
        let latency_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(completion) => {
                let cost = pricing::cost_at_write(
                    &self.pricing,
                    provider,
                    &completion.usage,
                    completion.reported_cost,
                );
                self.ledger
                    .record(UsageRecord {
                        credential_id: request.credential_id.clone(),
                        owner_id: request.owner_id.clone(),
                        provider,
                        model: request.model.clone(),
                        usage: completion.usage,
                        reported_cost: cost,
                        latency_ms,
                        succeeded: true,
                    })
                    .await?;
                self.check_budget(&request, &summary).await;
                debug!(
                    credential_id = %request.credential_id,
                    provider = %provider,
                    latency_ms,
                    total_tokens = completion.usage.total(),
                    "chat request completed"
                );
                Ok(completion)
            }
            Err(e @ (RelayError::ProviderUnavailable { .. } | RelayError::ProviderRejected { .. })) => {
                self.ledger
                    .record(UsageRecord {
                        credential_id: request.credential_id.clone(),
                        owner_id: request.owner_id.clone(),
                        provider,
                        model: request.model.clone(),
                        usage: TokenUsage::default(),
                        reported_cost: None,
                        latency_ms,
                        succeeded: false,
                    })
                    .await?;
                warn!(
                    credential_id = %request.credential_id,
                    provider = %provider,
                    latency_ms,
                    "chat request failed at provider"
                );
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Soft budget check after recording. A budget is a warning threshold,
    /// never an enforcement gate.
    async fn check_budget(&self, request: &ChatSend, summary: &CredentialSummary) {
        let Some(budget) = summary.token_budget.filter(|b| *b > 0) else {
            return;
        };
        match self
            .ledger
            .credential_token_total(&request.credential_id, &request.owner_id)
            .await
        {
            Ok(total) if total >= budget as u64 => {
                warn!(
                    credential_id = %request.credential_id,
                    total_tokens = total,
                    token_budget = budget,
                    "credential token budget exceeded"
                );
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "budget check query failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use keyrelay_config::model::{ProvidersConfig, RateConfig};
    use keyrelay_storage::{Database, NewCredential};
    use keyrelay_vault::VaultKeySet;
    use secrecy::SecretString;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    struct Fixture {
        proxy: ChatProxy,
        ledger: UsageLedger,
        credential_id: String,
    }

    async fn fixture(server_uri: &str, budget: Option<i64>, rates: Option<RateConfig>) -> Fixture {
        let db = Database::open_in_memory().await.unwrap();
        let store = Arc::new(CredentialStore::new(
            db.clone(),
            Arc::new(VaultKeySet::from_raw([1u8; 32], None)),
        ));
        let credential_id = store
            .create(NewCredential {
                owner_id: "alice".to_string(),
                provider: Provider::OpenAi,
                label: "proxy key".to_string(),
                secret: SecretString::from("sk-test".to_string()),
                max_tokens_per_answer: Some(256),
                token_budget: budget,
                usage_note: None,
            })
            .await
            .unwrap();

        let config = ProvidersConfig {
            openai_url: format!("{server_uri}/v1/chat/completions"),
            request_timeout_secs: 2,
            ..ProvidersConfig::default()
        };
        let pricing = PricingConfig {
            openai: rates,
            ..PricingConfig::default()
        };
        let ledger = UsageLedger::new(db);
        let proxy = ChatProxy::new(
            store,
            ledger.clone(),
            ChatClient::new(config).unwrap(),
            pricing,
        );
        Fixture {
            proxy,
            ledger,
            credential_id,
        }
    }

    fn send_for(fixture: &Fixture) -> ChatSend {
        ChatSend {
            credential_id: fixture.credential_id.clone(),
            owner_id: "alice".to_string(),
            model: "gpt-4o".to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: "hello".to_string(),
            }],
            max_tokens_per_answer: None,
        }
    }

    fn success_body() -> serde_json::Value {
        json!({
            "choices": [{"message": {"content": "hi there"}}],
            "usage": {"prompt_tokens": 9, "completion_tokens": 4}
        })
    }

    #[tokio::test]
    async fn successful_send_records_one_event() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body()))
            .mount(&server)
            .await;

        let f = fixture(&server.uri(), None, None).await;
        let completion = f.proxy.send(send_for(&f)).await.unwrap();
        assert_eq!(completion.content, "hi there");

        let events = f.ledger.query_range("alice", None, None).await.unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].succeeded);
        assert_eq!(events[0].prompt_tokens, 9);
        assert_eq!(events[0].completion_tokens, 4);
        assert_eq!(events[0].model, "gpt-4o");
    }

    #[tokio::test]
    async fn rejected_send_still_records_one_failed_event() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": {"message": "rate limited"}
            })))
            .mount(&server)
            .await;

        let f = fixture(&server.uri(), None, None).await;
        let err = f.proxy.send(send_for(&f)).await.unwrap_err();
        assert_eq!(err.kind(), "provider_rejected");

        let events = f.ledger.query_range("alice", None, None).await.unwrap();
        assert_eq!(events.len(), 1);
        assert!(!events[0].succeeded);
        assert_eq!(events[0].prompt_tokens, 0);
        assert_eq!(events[0].cost_estimate, None);
    }

    #[tokio::test]
    async fn unreachable_provider_records_one_failed_event() {
        let f = fixture("http://127.0.0.1:9", None, None).await;
        let err = f.proxy.send(send_for(&f)).await.unwrap_err();
        assert_eq!(err.kind(), "provider_unavailable");

        let events = f.ledger.query_range("alice", None, None).await.unwrap();
        assert_eq!(events.len(), 1);
        assert!(!events[0].succeeded);
    }

    #[tokio::test]
    async fn unknown_credential_records_nothing() {
        let f = fixture("http://127.0.0.1:9", None, None).await;
        let mut send = send_for(&f);
        send.credential_id = "no-such-id".to_string();
        let err = f.proxy.send(send).await.unwrap_err();
        assert_eq!(err.kind(), "not_found");

        let events = f.ledger.query_range("alice", None, None).await.unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn empty_messages_rejected_before_any_io() {
        let f = fixture("http://127.0.0.1:9", None, None).await;
        let mut send = send_for(&f);
        send.messages.clear();
        let err = f.proxy.send(send).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
    }

    #[tokio::test]
    async fn configured_rates_produce_write_time_cost() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body()))
            .mount(&server)
            .await;

        let rates = RateConfig {
            input_per_mtok: 2.0,
            output_per_mtok: 8.0,
        };
        let f = fixture(&server.uri(), None, Some(rates)).await;
        f.proxy.send(send_for(&f)).await.unwrap();

        let events = f.ledger.query_range("alice", None, None).await.unwrap();
        let expected = (9.0 / 1e6) * 2.0 + (4.0 / 1e6) * 8.0;
        assert!((events[0].cost_estimate.unwrap() - expected).abs() < 1e-12);
    }

    #[tokio::test]
    async fn concurrent_sends_record_exactly_two_events() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body()))
            .mount(&server)
            .await;

        let f = Arc::new(fixture(&server.uri(), None, None).await);
        let a = {
            let f = f.clone();
            tokio::spawn(async move { f.proxy.send(send_for(&f)).await })
        };
        let b = {
            let f = f.clone();
            tokio::spawn(async move { f.proxy.send(send_for(&f)).await })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let events = f.ledger.query_range("alice", None, None).await.unwrap();
        assert_eq!(events.len(), 2);
    }
}
