// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bearer token authentication.
//!
//! Each configured token maps to an owner id; the middleware resolves the
//! token and injects the owner into the request so every handler downstream
//! is owner-scoped. With no tokens configured, all requests are rejected
//! (fail-closed).

use std::collections::HashMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use keyrelay_config::model::AuthConfig;
use serde_json::json;
use tracing::error;

/// The authenticated owner of the current request, inserted by
/// [`auth_middleware`].
#[derive(Debug, Clone)]
pub struct OwnerId(pub String);

/// Token-to-owner lookup table.
#[derive(Clone)]
pub struct AuthTokens {
    tokens: Arc<HashMap<String, String>>,
}

impl std::fmt::Debug for AuthTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthTokens")
            .field("count", &self.tokens.len())
            .finish()
    }
}

impl AuthTokens {
    pub fn from_config(config: &AuthConfig) -> Self {
        let tokens = config
            .tokens
            .iter()
            .map(|t| (t.token.clone(), t.owner.clone()))
            .collect();
        Self {
            tokens: Arc::new(tokens),
        }
    }

    fn resolve(&self, token: &str) -> Option<&str> {
        self.tokens.get(token).map(String::as_str)
    }
}

/// Middleware resolving `Authorization: Bearer <token>` to an owner.
pub async fn auth_middleware(
    State(auth): State<AuthTokens>,
    mut request: Request,
    next: Next,
) -> Result<Response, Response> {
    if auth.tokens.is_empty() {
        error!("no auth tokens configured, rejecting request");
        return Err(unauthorized());
    }

    let bearer = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match bearer.and_then(|token| auth.resolve(token)) {
        Some(owner) => {
            request.extensions_mut().insert(OwnerId(owner.to_string()));
            Ok(next.run(request).await)
        }
        None => Err(unauthorized()),
    }
}

fn unauthorized() -> Response {
    let body = json!({
        "error": {
            "kind": "unauthorized",
            "message": "missing or invalid bearer token",
        }
    });
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}
