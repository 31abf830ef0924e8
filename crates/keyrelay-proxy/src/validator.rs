// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Live credential validation.
//!
//! One bounded probe per call, no retry. Provider flakiness is expected, so a
//! rejected or unreachable provider is a non-throwing `{valid: false}` result
//! rather than an error. The outcome is persisted on every attempt so
//! validity never goes stale silently.

use std::str::FromStr;
use std::sync::Arc;

use keyrelay_core::{Provider, RelayError, Validity};
use keyrelay_providers::ChatClient;
use keyrelay_storage::CredentialStore;
use serde::Serialize;
use tracing::{debug, info};

/// The result of one validation attempt.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub message: String,
}

/// Validates stored credentials against live provider endpoints.
pub struct ProviderValidator {
    store: Arc<CredentialStore>,
    client: ChatClient,
}

impl ProviderValidator {
    pub fn new(store: Arc<CredentialStore>, client: ChatClient) -> Self {
        Self { store, client }
    }

    /// Probe the provider with the decrypted secret and persist the outcome.
    ///
    /// A 2xx probe response means valid; any rejection or network failure
    /// means invalid. Errors before the network stage (unknown credential,
    /// unsupported provider, vault integrity) propagate without persisting a
    /// verdict, since no probe was attempted.
    pub async fn validate(
        &self,
        credential_id: &str,
        owner_id: &str,
    ) -> Result<ValidationOutcome, RelayError> {
        let summary = self.store.get_summary(credential_id, owner_id).await?;
        let provider = Provider::from_str(&summary.provider).map_err(|_| {
            RelayError::UnsupportedProvider {
                name: summary.provider.clone(),
            }
        })?;
        let secret = self.store.get_decrypted_secret(credential_id, owner_id).await?;

        debug!(credential_id, provider = %provider, "probing provider");
        let outcome = match self.client.probe(provider, &secret).await {
            Ok(_) => ValidationOutcome {
                valid: true,
                message: "credential accepted by provider".to_string(),
            },
            Err(RelayError::ProviderRejected { status, message }) => ValidationOutcome {
                valid: false,
                message: format!("provider rejected credential ({status}): {message}"),
            },
            Err(RelayError::ProviderUnavailable { message, .. }) => ValidationOutcome {
                valid: false,
                message: format!("provider unreachable: {message}"),
            },
            Err(e) => return Err(e),
        };

        let validity = if outcome.valid {
            Validity::Valid
        } else {
            Validity::Invalid
        };
        self.store
            .record_validation(credential_id, owner_id, validity)
            .await?;

        info!(credential_id, valid = outcome.valid, "credential validated");
        Ok(outcome)
    }
}
