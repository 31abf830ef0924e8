// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Usage event queries. The table is append-only: inserts and reads, no
//! updates or deletes.

use keyrelay_core::RelayError;
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::models::UsageEventRow;

const ROW_COLUMNS: &str = "id, credential_id, owner_id, provider, model, prompt_tokens, \
     completion_tokens, cost_estimate, latency_ms, succeeded, occurred_at";

fn row_from(row: &rusqlite::Row<'_>) -> Result<UsageEventRow, rusqlite::Error> {
    Ok(UsageEventRow {
        id: row.get(0)?,
        credential_id: row.get(1)?,
        owner_id: row.get(2)?,
        provider: row.get(3)?,
        model: row.get(4)?,
        prompt_tokens: row.get(5)?,
        completion_tokens: row.get(6)?,
        cost_estimate: row.get(7)?,
        latency_ms: row.get(8)?,
        succeeded: row.get(9)?,
        occurred_at: row.get(10)?,
    })
}

/// Append one usage event.
pub async fn insert(db: &Database, row: UsageEventRow) -> Result<(), RelayError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO usage_events (id, credential_id, owner_id, provider, model, \
                 prompt_tokens, completion_tokens, cost_estimate, latency_ms, succeeded, \
                 occurred_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    row.id,
                    row.credential_id,
                    row.owner_id,
                    row.provider,
                    row.model,
                    row.prompt_tokens,
                    row.completion_tokens,
                    row.cost_estimate,
                    row.latency_ms as i64,
                    row.succeeded,
                    row.occurred_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Events for an owner within `[from, to)`, most recent first. `None` bounds
/// are open ends.
pub async fn list_range(
    db: &Database,
    owner_id: &str,
    from: Option<&str>,
    to: Option<&str>,
) -> Result<Vec<UsageEventRow>, RelayError> {
    let owner_id = owner_id.to_string();
    let from = from.map(str::to_string);
    let to = to.map(str::to_string);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ROW_COLUMNS} FROM usage_events WHERE owner_id = ?1 \
                 AND (?2 IS NULL OR occurred_at >= ?2) \
                 AND (?3 IS NULL OR occurred_at < ?3) \
                 ORDER BY occurred_at DESC, id DESC"
            ))?;
            let rows = stmt.query_map(params![owner_id, from, to], row_from)?;
            let mut events = Vec::new();
            for row in rows {
                events.push(row?);
            }
            Ok(events)
        })
        .await
        .map_err(map_tr_err)
}

/// Lifetime token total (prompt + completion) for one credential. Used for
/// budget utilization, so it spans all time regardless of query windows.
pub async fn credential_token_total(
    db: &Database,
    credential_id: &str,
    owner_id: &str,
) -> Result<u64, RelayError> {
    let credential_id = credential_id.to_string();
    let owner_id = owner_id.to_string();
    db.connection()
        .call(move |conn| {
            let total: i64 = conn.query_row(
                "SELECT COALESCE(SUM(prompt_tokens + completion_tokens), 0) \
                 FROM usage_events WHERE credential_id = ?1 AND owner_id = ?2",
                params![credential_id, owner_id],
                |row| row.get(0),
            )?;
            Ok(total.max(0) as u64)
        })
        .await
        .map_err(map_tr_err)
}
