// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row models for the credentials table.

use serde::Serialize;

/// A full credential row, including cipher material.
///
/// Never serialized; the cipher fields stay inside the storage crate and the
/// heal-on-read path. External reads get [`CredentialSummary`].
#[derive(Debug, Clone)]
pub struct CredentialRow {
    pub id: String,
    pub owner_id: String,
    pub provider: String,
    pub label: String,
    pub ciphertext: Vec<u8>,
    pub nonce: Vec<u8>,
    pub fingerprint: Vec<u8>,
    pub validity: String,
    pub last_validated_at: Option<String>,
    pub max_tokens_per_answer: Option<u32>,
    pub token_budget: Option<i64>,
    pub usage_note: Option<String>,
    pub created_at: String,
}

/// The externally visible view of a credential. Carries no secret material.
#[derive(Debug, Clone, Serialize)]
pub struct CredentialSummary {
    pub id: String,
    pub provider: String,
    pub label: String,
    pub validity: String,
    pub last_validated_at: Option<String>,
    pub max_tokens_per_answer: Option<u32>,
    pub token_budget: Option<i64>,
    pub usage_note: Option<String>,
    pub created_at: String,
}

impl From<&CredentialRow> for CredentialSummary {
    fn from(row: &CredentialRow) -> Self {
        Self {
            id: row.id.clone(),
            provider: row.provider.clone(),
            label: row.label.clone(),
            validity: row.validity.clone(),
            last_validated_at: row.last_validated_at.clone(),
            max_tokens_per_answer: row.max_tokens_per_answer,
            token_budget: row.token_budget,
            usage_note: row.usage_note.clone(),
            created_at: row.created_at.clone(),
        }
    }
}

/// One append-only usage event. Written exactly once per chat send, success
/// or failure, and never updated afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct UsageEventRow {
    pub id: String,
    /// Weak reference; the credential may have been deleted since.
    pub credential_id: String,
    pub owner_id: String,
    pub provider: String,
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    /// Provider-reported cost in USD. `None` when the provider reported
    /// nothing; never coerced to zero.
    pub cost_estimate: Option<f64>,
    pub latency_ms: u64,
    pub succeeded: bool,
    pub occurred_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row() -> CredentialRow {
        CredentialRow {
            id: "cred-1".into(),
            owner_id: "alice".into(),
            provider: "openai".into(),
            label: "work key".into(),
            ciphertext: vec![1, 2, 3],
            nonce: vec![0; 12],
            fingerprint: vec![9; 32],
            validity: "unknown".into(),
            last_validated_at: None,
            max_tokens_per_answer: Some(512),
            token_budget: None,
            usage_note: None,
            created_at: "2026-08-01T00:00:00.000Z".into(),
        }
    }

    #[test]
    fn summary_serialization_excludes_cipher_material() {
        let summary = CredentialSummary::from(&sample_row());
        let json = serde_json::to_string(&summary).unwrap();
        assert!(!json.contains("ciphertext"));
        assert!(!json.contains("nonce"));
        assert!(!json.contains("fingerprint"));
        assert!(!json.contains("owner_id"));
        assert!(json.contains("\"provider\":\"openai\""));
    }
}
