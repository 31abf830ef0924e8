// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The credential store: owner-scoped CRUD over encrypted provider secrets.
//!
//! Secrets are sealed under the current vault key on write. Reads decrypt
//! under the current key and, during a rotation window, fall back to the
//! previous key; a fallback hit triggers heal-on-read -- the record is
//! re-encrypted under the current key (and its fingerprint refreshed) before
//! the plaintext is returned. This keeps rotation lazy: no bulk migration
//! step, each record heals the first time it is touched.

use std::sync::Arc;

use keyrelay_core::{Provider, RelayError, Validity};
use keyrelay_vault::{VaultKeySet, crypto, fingerprint};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, warn};

use crate::database::Database;
use crate::models::{CredentialRow, CredentialSummary};
use crate::queries::credentials;

/// Parameters for registering a new credential.
pub struct NewCredential {
    pub owner_id: String,
    pub provider: Provider,
    pub label: String,
    pub secret: SecretString,
    pub max_tokens_per_answer: Option<u32>,
    pub token_budget: Option<i64>,
    pub usage_note: Option<String>,
}

/// Owner-scoped store for encrypted provider credentials.
pub struct CredentialStore {
    db: Database,
    keys: Arc<VaultKeySet>,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore").finish_non_exhaustive()
    }
}

impl CredentialStore {
    /// Create a store over an opened database and the process key set.
    pub fn new(db: Database, keys: Arc<VaultKeySet>) -> Self {
        Self { db, keys }
    }

    /// Encrypt and persist a new credential. Returns the generated id.
    ///
    /// The fingerprint is computed under the *current* key; validity starts
    /// as `unknown` until the first validation round-trip.
    pub async fn create(&self, new: NewCredential) -> Result<String, RelayError> {
        if new.label.trim().is_empty() {
            return Err(RelayError::InvalidInput("key_name must not be empty".into()));
        }
        if new.secret.expose_secret().is_empty() {
            return Err(RelayError::InvalidInput("api_key must not be empty".into()));
        }

        let plaintext = new.secret.expose_secret().as_bytes();
        let (ciphertext, nonce) = crypto::seal(self.keys.current(), plaintext)?;
        let fp = fingerprint(self.keys.current(), plaintext);

        let id = uuid::Uuid::new_v4().to_string();
        let row = CredentialRow {
            id: id.clone(),
            owner_id: new.owner_id,
            provider: new.provider.to_string(),
            label: new.label,
            ciphertext,
            nonce: nonce.to_vec(),
            fingerprint: fp.to_vec(),
            validity: Validity::Unknown.to_string(),
            last_validated_at: None,
            max_tokens_per_answer: new.max_tokens_per_answer,
            token_budget: new.token_budget,
            usage_note: new.usage_note,
            created_at: now_timestamp(),
        };
        credentials::insert(&self.db, row).await?;

        debug!(credential_id = %id, "credential created");
        Ok(id)
    }

    /// List credential summaries for an owner. Never includes secret material.
    pub async fn list(&self, owner_id: &str) -> Result<Vec<CredentialSummary>, RelayError> {
        credentials::list_summaries(&self.db, owner_id).await
    }

    /// Load the non-secret view of one credential, or `NotFound`.
    pub async fn get_summary(
        &self,
        id: &str,
        owner_id: &str,
    ) -> Result<CredentialSummary, RelayError> {
        let row = self.get_row(id, owner_id).await?;
        Ok(CredentialSummary::from(&row))
    }

    /// Decrypt and return a credential's secret.
    ///
    /// Read-with-possible-write: when the current key fails to authenticate
    /// and the previous key succeeds, the record is re-encrypted under the
    /// current key before the plaintext is returned (heal-on-read). Two
    /// concurrent healers both produce a cipher-equivalent row; fingerprint
    /// equality, not byte equality, is the correctness condition.
    pub async fn get_decrypted_secret(
        &self,
        id: &str,
        owner_id: &str,
    ) -> Result<SecretString, RelayError> {
        let row = self.get_row(id, owner_id).await?;

        let nonce: [u8; 12] = row
            .nonce
            .clone()
            .try_into()
            .map_err(|_| RelayError::VaultIntegrity {
                credential_id: row.id.clone(),
            })?;

        match crypto::open(self.keys.current(), &nonce, &row.ciphertext) {
            Ok(plaintext) => secret_from_bytes(plaintext, &row.id),
            Err(RelayError::Decryption) => self.heal_on_read(&row, &nonce).await,
            Err(e) => Err(e),
        }
    }

    /// Partial metadata update (usage note, token budget). The secret is not
    /// touched.
    pub async fn patch_meta(
        &self,
        id: &str,
        owner_id: &str,
        usage_note: Option<String>,
        token_budget: Option<i64>,
    ) -> Result<(), RelayError> {
        let matched =
            credentials::update_meta(&self.db, id, owner_id, usage_note, token_budget).await?;
        if matched { Ok(()) } else { Err(not_found()) }
    }

    /// Persist a validation outcome and its timestamp. Called on every
    /// validation attempt, success or failure, so validity never goes stale
    /// silently.
    pub async fn record_validation(
        &self,
        id: &str,
        owner_id: &str,
        validity: Validity,
    ) -> Result<(), RelayError> {
        let matched = credentials::update_validation(
            &self.db,
            id,
            owner_id,
            &validity.to_string(),
            &now_timestamp(),
        )
        .await?;
        if matched { Ok(()) } else { Err(not_found()) }
    }

    /// Delete a credential. Its usage events are retained as audit history.
    pub async fn delete(&self, id: &str, owner_id: &str) -> Result<(), RelayError> {
        let matched = credentials::delete(&self.db, id, owner_id).await?;
        if matched {
            debug!(credential_id = %id, "credential deleted; usage history retained");
            Ok(())
        } else {
            Err(not_found())
        }
    }

    async fn get_row(&self, id: &str, owner_id: &str) -> Result<CredentialRow, RelayError> {
        credentials::get(&self.db, id, owner_id)
            .await?
            .ok_or_else(not_found)
    }

    /// Rotation-window fallback: decrypt under the previous key, then
    /// re-encrypt under the current one.
    async fn heal_on_read(
        &self,
        row: &CredentialRow,
        nonce: &[u8; 12],
    ) -> Result<SecretString, RelayError> {
        let Some(previous) = self.keys.previous() else {
            warn!(credential_id = %row.id, "credential undecryptable and no previous key configured");
            return Err(RelayError::VaultIntegrity {
                credential_id: row.id.clone(),
            });
        };

        let plaintext = match crypto::open(previous, nonce, &row.ciphertext) {
            Ok(pt) => pt,
            Err(RelayError::Decryption) => {
                warn!(credential_id = %row.id, "credential undecryptable under current and previous keys");
                return Err(RelayError::VaultIntegrity {
                    credential_id: row.id.clone(),
                });
            }
            Err(e) => return Err(e),
        };

        let (ciphertext, new_nonce) = crypto::seal(self.keys.current(), &plaintext)?;
        let fp = fingerprint(self.keys.current(), &plaintext);
        credentials::update_cipher(&self.db, &row.id, &row.owner_id, ciphertext, new_nonce, fp)
            .await?;

        debug!(credential_id = %row.id, "credential re-encrypted under current vault key");
        secret_from_bytes(plaintext, &row.id)
    }
}

fn not_found() -> RelayError {
    RelayError::NotFound {
        resource: "credential".to_string(),
    }
}

/// UTF-8-check a decrypted secret and wrap it so it is zeroed on drop.
fn secret_from_bytes(plaintext: Vec<u8>, credential_id: &str) -> Result<SecretString, RelayError> {
    let value = String::from_utf8(plaintext).map_err(|_| RelayError::VaultIntegrity {
        credential_id: credential_id.to_string(),
    })?;
    Ok(SecretString::from(value))
}

/// ISO 8601 UTC timestamp with millisecond precision.
pub fn now_timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CURRENT_KEY: [u8; 32] = [1u8; 32];
    const PREVIOUS_KEY: [u8; 32] = [2u8; 32];

    async fn store_with(keys: VaultKeySet) -> CredentialStore {
        let db = Database::open_in_memory().await.unwrap();
        CredentialStore::new(db, Arc::new(keys))
    }

    fn new_credential(owner: &str, secret: &str) -> NewCredential {
        NewCredential {
            owner_id: owner.to_string(),
            provider: Provider::OpenAi,
            label: "test key".to_string(),
            secret: SecretString::from(secret.to_string()),
            max_tokens_per_answer: Some(256),
            token_budget: None,
            usage_note: None,
        }
    }

    #[tokio::test]
    async fn create_and_decrypt_roundtrip() {
        let store = store_with(VaultKeySet::from_raw(CURRENT_KEY, None)).await;
        let id = store.create(new_credential("alice", "sk-test")).await.unwrap();

        let secret = store.get_decrypted_secret(&id, "alice").await.unwrap();
        assert_eq!(secret.expose_secret(), "sk-test");
    }

    #[tokio::test]
    async fn create_rejects_empty_label_and_secret() {
        let store = store_with(VaultKeySet::from_raw(CURRENT_KEY, None)).await;

        let mut cred = new_credential("alice", "sk-test");
        cred.label = "  ".to_string();
        let err = store.create(cred).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_input");

        let err = store
            .create(new_credential("alice", ""))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
    }

    #[tokio::test]
    async fn list_never_exposes_secret() {
        let store = store_with(VaultKeySet::from_raw(CURRENT_KEY, None)).await;
        store.create(new_credential("alice", "sk-super-secret")).await.unwrap();

        let summaries = store.list("alice").await.unwrap();
        assert_eq!(summaries.len(), 1);
        let json = serde_json::to_string(&summaries).unwrap();
        assert!(!json.contains("sk-super-secret"));
        assert_eq!(summaries[0].validity, "unknown");
    }

    #[tokio::test]
    async fn foreign_owner_reads_as_not_found() {
        let store = store_with(VaultKeySet::from_raw(CURRENT_KEY, None)).await;
        let id = store.create(new_credential("alice", "sk-test")).await.unwrap();

        let err = store.get_decrypted_secret(&id, "mallory").await.unwrap_err();
        assert_eq!(err.kind(), "not_found");

        let err = store.delete(&id, "mallory").await.unwrap_err();
        assert_eq!(err.kind(), "not_found");

        // The record is untouched for its real owner.
        assert!(store.get_decrypted_secret(&id, "alice").await.is_ok());
    }

    #[tokio::test]
    async fn heal_on_read_recovers_and_reencrypts() {
        // Write under what will become the previous key.
        let old_store = store_with(VaultKeySet::from_raw(PREVIOUS_KEY, None)).await;
        let id = old_store
            .create(new_credential("alice", "sk-rotated"))
            .await
            .unwrap();
        let db = old_store.db.clone();

        // Rotation: same database, new current key, old key as previous.
        let rotated = CredentialStore::new(
            db.clone(),
            Arc::new(VaultKeySet::from_raw(CURRENT_KEY, Some(PREVIOUS_KEY))),
        );
        let secret = rotated.get_decrypted_secret(&id, "alice").await.unwrap();
        assert_eq!(secret.expose_secret(), "sk-rotated");

        // The record now decrypts under the current key alone.
        let current_only =
            CredentialStore::new(db, Arc::new(VaultKeySet::from_raw(CURRENT_KEY, None)));
        let secret = current_only.get_decrypted_secret(&id, "alice").await.unwrap();
        assert_eq!(secret.expose_secret(), "sk-rotated");
    }

    #[tokio::test]
    async fn heal_on_read_refreshes_fingerprint() {
        let old_store = store_with(VaultKeySet::from_raw(PREVIOUS_KEY, None)).await;
        let id = old_store
            .create(new_credential("alice", "sk-rotated"))
            .await
            .unwrap();
        let before = credentials::get(&old_store.db, &id, "alice")
            .await
            .unwrap()
            .unwrap();

        let rotated = CredentialStore::new(
            old_store.db.clone(),
            Arc::new(VaultKeySet::from_raw(CURRENT_KEY, Some(PREVIOUS_KEY))),
        );
        rotated.get_decrypted_secret(&id, "alice").await.unwrap();

        let after = credentials::get(&rotated.db, &id, "alice")
            .await
            .unwrap()
            .unwrap();
        assert_ne!(before.ciphertext, after.ciphertext);
        assert_ne!(before.fingerprint, after.fingerprint);
        // Fingerprint matches the plaintext under the current key.
        let expected = fingerprint(&CURRENT_KEY, b"sk-rotated");
        assert_eq!(after.fingerprint, expected.to_vec());
    }

    #[tokio::test]
    async fn undecryptable_without_previous_key_is_vault_integrity() {
        let old_store = store_with(VaultKeySet::from_raw(PREVIOUS_KEY, None)).await;
        let id = old_store
            .create(new_credential("alice", "sk-lost"))
            .await
            .unwrap();

        // New key, no rotation window configured.
        let broken = CredentialStore::new(
            old_store.db.clone(),
            Arc::new(VaultKeySet::from_raw(CURRENT_KEY, None)),
        );
        let err = broken.get_decrypted_secret(&id, "alice").await.unwrap_err();
        assert_eq!(err.kind(), "vault_integrity");
    }

    #[tokio::test]
    async fn undecryptable_under_both_keys_is_vault_integrity() {
        let old_store = store_with(VaultKeySet::from_raw([3u8; 32], None)).await;
        let id = old_store
            .create(new_credential("alice", "sk-lost"))
            .await
            .unwrap();

        // Neither configured key matches the one the record was sealed under.
        let broken = CredentialStore::new(
            old_store.db.clone(),
            Arc::new(VaultKeySet::from_raw(CURRENT_KEY, Some(PREVIOUS_KEY))),
        );
        let err = broken.get_decrypted_secret(&id, "alice").await.unwrap_err();
        assert_eq!(err.kind(), "vault_integrity");
    }

    #[tokio::test]
    async fn patch_meta_updates_only_provided_fields() {
        let store = store_with(VaultKeySet::from_raw(CURRENT_KEY, None)).await;
        let mut cred = new_credential("alice", "sk-test");
        cred.usage_note = Some("original note".to_string());
        let id = store.create(cred).await.unwrap();

        store
            .patch_meta(&id, "alice", None, Some(50_000))
            .await
            .unwrap();

        let summary = store.get_summary(&id, "alice").await.unwrap();
        assert_eq!(summary.token_budget, Some(50_000));
        assert_eq!(summary.usage_note.as_deref(), Some("original note"));
    }

    #[tokio::test]
    async fn record_validation_sets_state_and_timestamp() {
        let store = store_with(VaultKeySet::from_raw(CURRENT_KEY, None)).await;
        let id = store.create(new_credential("alice", "sk-test")).await.unwrap();

        store
            .record_validation(&id, "alice", Validity::Valid)
            .await
            .unwrap();
        let summary = store.get_summary(&id, "alice").await.unwrap();
        assert_eq!(summary.validity, "valid");
        assert!(summary.last_validated_at.is_some());

        store
            .record_validation(&id, "alice", Validity::Invalid)
            .await
            .unwrap();
        let summary = store.get_summary(&id, "alice").await.unwrap();
        assert_eq!(summary.validity, "invalid");
    }

    #[tokio::test]
    async fn delete_removes_row() {
        let store = store_with(VaultKeySet::from_raw(CURRENT_KEY, None)).await;
        let id = store.create(new_credential("alice", "sk-test")).await.unwrap();

        store.delete(&id, "alice").await.unwrap();
        let err = store.get_summary(&id, "alice").await.unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }
}
