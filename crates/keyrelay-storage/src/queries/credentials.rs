// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential row CRUD.
//!
//! Every query is owner-scoped: `WHERE id = ? AND owner_id = ?` throughout,
//! so a foreign-owner id behaves exactly like an unknown id.

use keyrelay_core::RelayError;
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::models::{CredentialRow, CredentialSummary};

const ROW_COLUMNS: &str = "id, owner_id, provider, label, ciphertext, nonce, fingerprint, \
     validity, last_validated_at, max_tokens_per_answer, token_budget, usage_note, created_at";

fn row_from(row: &rusqlite::Row<'_>) -> Result<CredentialRow, rusqlite::Error> {
    Ok(CredentialRow {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        provider: row.get(2)?,
        label: row.get(3)?,
        ciphertext: row.get(4)?,
        nonce: row.get(5)?,
        fingerprint: row.get(6)?,
        validity: row.get(7)?,
        last_validated_at: row.get(8)?,
        max_tokens_per_answer: row.get(9)?,
        token_budget: row.get(10)?,
        usage_note: row.get(11)?,
        created_at: row.get(12)?,
    })
}

/// Insert a new credential row.
pub async fn insert(db: &Database, row: CredentialRow) -> Result<(), RelayError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO credentials (id, owner_id, provider, label, ciphertext, nonce, \
                 fingerprint, validity, last_validated_at, max_tokens_per_answer, token_budget, \
                 usage_note, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    row.id,
                    row.owner_id,
                    row.provider,
                    row.label,
                    row.ciphertext,
                    row.nonce,
                    row.fingerprint,
                    row.validity,
                    row.last_validated_at,
                    row.max_tokens_per_answer,
                    row.token_budget,
                    row.usage_note,
                    row.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Load one credential row, scoped by owner.
pub async fn get(
    db: &Database,
    id: &str,
    owner_id: &str,
) -> Result<Option<CredentialRow>, RelayError> {
    let id = id.to_string();
    let owner_id = owner_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ROW_COLUMNS} FROM credentials WHERE id = ?1 AND owner_id = ?2"
            ))?;
            let result = stmt.query_row(params![id, owner_id], row_from);
            match result {
                Ok(row) => Ok(Some(row)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// List credential summaries for an owner, newest first.
pub async fn list_summaries(
    db: &Database,
    owner_id: &str,
) -> Result<Vec<CredentialSummary>, RelayError> {
    let owner_id = owner_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ROW_COLUMNS} FROM credentials WHERE owner_id = ?1 \
                 ORDER BY created_at DESC"
            ))?;
            let rows = stmt.query_map(params![owner_id], row_from)?;
            let mut summaries = Vec::new();
            for row in rows {
                summaries.push(CredentialSummary::from(&row?));
            }
            Ok(summaries)
        })
        .await
        .map_err(map_tr_err)
}

/// Replace the cipher material after heal-on-read.
///
/// Ciphertext, nonce, and fingerprint move together in one UPDATE so two
/// concurrent healers each leave a self-consistent row; the last writer wins.
pub async fn update_cipher(
    db: &Database,
    id: &str,
    owner_id: &str,
    ciphertext: Vec<u8>,
    nonce: [u8; 12],
    fingerprint: [u8; 32],
) -> Result<(), RelayError> {
    let id = id.to_string();
    let owner_id = owner_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE credentials SET ciphertext = ?1, nonce = ?2, fingerprint = ?3 \
                 WHERE id = ?4 AND owner_id = ?5",
                params![ciphertext, nonce.to_vec(), fingerprint.to_vec(), id, owner_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Persist a validation outcome. Returns false when no row matched.
pub async fn update_validation(
    db: &Database,
    id: &str,
    owner_id: &str,
    validity: &str,
    validated_at: &str,
) -> Result<bool, RelayError> {
    let id = id.to_string();
    let owner_id = owner_id.to_string();
    let validity = validity.to_string();
    let validated_at = validated_at.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE credentials SET validity = ?1, last_validated_at = ?2 \
                 WHERE id = ?3 AND owner_id = ?4",
                params![validity, validated_at, id, owner_id],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Partial metadata update. Absent fields keep their stored value; the
/// secret is never touched here. Returns false when no row matched.
pub async fn update_meta(
    db: &Database,
    id: &str,
    owner_id: &str,
    usage_note: Option<String>,
    token_budget: Option<i64>,
) -> Result<bool, RelayError> {
    let id = id.to_string();
    let owner_id = owner_id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE credentials SET \
                 usage_note = COALESCE(?1, usage_note), \
                 token_budget = COALESCE(?2, token_budget) \
                 WHERE id = ?3 AND owner_id = ?4",
                params![usage_note, token_budget, id, owner_id],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Delete a credential row. Returns false when no row matched.
///
/// Usage events referencing the credential are intentionally left in place.
pub async fn delete(db: &Database, id: &str, owner_id: &str) -> Result<bool, RelayError> {
    let id = id.to_string();
    let owner_id = owner_id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "DELETE FROM credentials WHERE id = ?1 AND owner_id = ?2",
                params![id, owner_id],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}
