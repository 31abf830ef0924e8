// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request handlers for the `/api` surface.
//!
//! Key management endpoints speak snake_case; the chat endpoint speaks the
//! camelCase contract its clients expect. Every handler receives the
//! authenticated [`OwnerId`] from the auth middleware and passes it down, so
//! no handler can touch another owner's records.

use std::str::FromStr;

use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use keyrelay_config::model::RateConfig;
use keyrelay_core::{ChatMessage, Provider, RelayError};
use keyrelay_proxy::{ChatSend, ValidationOutcome};
use keyrelay_storage::{CredentialSummary, NewCredential};
use keyrelay_usage::{AnalyticsSnapshot, CostBasis, SnapshotQuery};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::auth::OwnerId;
use crate::error::{ApiError, ApiJson};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateKeyBody {
    pub provider: String,
    pub key_name: String,
    pub api_key: String,
    #[serde(default)]
    pub max_tokens_per_answer: Option<u32>,
    #[serde(default)]
    pub usage_note: Option<String>,
    #[serde(default)]
    pub token_budget: Option<i64>,
}

/// `POST /api/keys`
pub async fn post_keys(
    State(state): State<AppState>,
    Extension(OwnerId(owner)): Extension<OwnerId>,
    ApiJson(body): ApiJson<CreateKeyBody>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let provider = Provider::from_str(&body.provider).map_err(|_| {
        RelayError::UnsupportedProvider {
            name: body.provider.clone(),
        }
    })?;
    let id = state
        .store
        .create(NewCredential {
            owner_id: owner,
            provider,
            label: body.key_name,
            secret: SecretString::from(body.api_key),
            max_tokens_per_answer: body.max_tokens_per_answer,
            token_budget: body.token_budget,
            usage_note: body.usage_note,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

#[derive(Debug, Serialize)]
pub struct KeyList {
    pub keys: Vec<CredentialSummary>,
}

/// `GET /api/keys`
pub async fn get_keys(
    State(state): State<AppState>,
    Extension(OwnerId(owner)): Extension<OwnerId>,
) -> Result<Json<KeyList>, ApiError> {
    let keys = state.store.list(&owner).await?;
    Ok(Json(KeyList { keys }))
}

#[derive(Debug, Deserialize)]
pub struct PatchKeyBody {
    #[serde(default)]
    pub usage_note: Option<String>,
    #[serde(default)]
    pub token_budget: Option<i64>,
}

/// `PATCH /api/keys/{id}`
pub async fn patch_key(
    State(state): State<AppState>,
    Extension(OwnerId(owner)): Extension<OwnerId>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<PatchKeyBody>,
) -> Result<Json<Value>, ApiError> {
    state
        .store
        .patch_meta(&id, &owner, body.usage_note, body.token_budget)
        .await?;
    Ok(Json(json!({ "success": true })))
}

/// `DELETE /api/keys/{id}`
pub async fn delete_key(
    State(state): State<AppState>,
    Extension(OwnerId(owner)): Extension<OwnerId>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.store.delete(&id, &owner).await?;
    Ok(Json(json!({ "success": true })))
}

/// `POST /api/keys/{id}/test`
pub async fn test_key(
    State(state): State<AppState>,
    Extension(OwnerId(owner)): Extension<OwnerId>,
    Path(id): Path<String>,
) -> Result<Json<ValidationOutcome>, ApiError> {
    Ok(Json(state.validator.validate(&id, &owner).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatBody {
    pub key_id: String,
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub max_tokens_per_answer: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub content: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// `POST /api/chat`
pub async fn post_chat(
    State(state): State<AppState>,
    Extension(OwnerId(owner)): Extension<OwnerId>,
    ApiJson(body): ApiJson<ChatBody>,
) -> Result<Json<ChatReply>, ApiError> {
    let completion = state
        .proxy
        .send(ChatSend {
            credential_id: body.key_id,
            owner_id: owner,
            model: body.model,
            messages: body.messages,
            max_tokens_per_answer: body.max_tokens_per_answer,
        })
        .await?;
    Ok(Json(ChatReply {
        content: completion.content,
        prompt_tokens: completion.usage.prompt_tokens,
        completion_tokens: completion.usage.completion_tokens,
    }))
}

#[derive(Debug, Deserialize)]
pub struct AnalyticsParams {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    /// "auto" (default) or "manual".
    #[serde(default)]
    pub cost_basis: Option<String>,
    #[serde(default)]
    pub input_rate: Option<f64>,
    #[serde(default)]
    pub output_rate: Option<f64>,
}

/// `GET /api/analytics`
pub async fn get_analytics(
    State(state): State<AppState>,
    Extension(OwnerId(owner)): Extension<OwnerId>,
    Query(params): Query<AnalyticsParams>,
) -> Result<Json<AnalyticsSnapshot>, ApiError> {
    let cost_basis = match params.cost_basis.as_deref() {
        None | Some("auto") => None,
        Some("manual") => match (params.input_rate, params.output_rate) {
            (Some(input_per_mtok), Some(output_per_mtok)) => {
                Some(CostBasis::Manual(RateConfig {
                    input_per_mtok,
                    output_per_mtok,
                }))
            }
            _ => {
                return Err(RelayError::InvalidInput(
                    "manual cost basis requires input_rate and output_rate".into(),
                )
                .into());
            }
        },
        Some(other) => {
            return Err(RelayError::InvalidInput(format!(
                "unknown cost_basis '{other}', expected 'auto' or 'manual'"
            ))
            .into());
        }
    };
    let query = SnapshotQuery {
        from: params.from,
        to: params.to,
        cost_basis,
    };
    Ok(Json(state.analytics.snapshot(&owner, &query).await?))
}

/// `GET /api/health`, unauthenticated.
pub async fn get_health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": crate::server::uptime().as_secs(),
    }))
}
