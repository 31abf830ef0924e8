// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP error mapping.
//!
//! Every failure leaves the API as a structured JSON object with a stable
//! machine-checkable kind, never a raw stack trace or a bare status line:
//!
//! ```json
//! {"error": {"kind": "not_found", "message": "credential not found"}}
//! ```

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use keyrelay_core::RelayError;
use serde_json::json;
use tracing::{error, warn};

/// A [`RelayError`] on its way out as an HTTP response.
pub struct ApiError(pub RelayError);

impl From<RelayError> for ApiError {
    fn from(e: RelayError) -> Self {
        Self(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            RelayError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            RelayError::NotFound { .. } => StatusCode::NOT_FOUND,
            RelayError::UnsupportedProvider { .. } => StatusCode::BAD_REQUEST,
            RelayError::ProviderUnavailable { .. } | RelayError::ProviderRejected { .. } => {
                StatusCode::BAD_GATEWAY
            }
            RelayError::Decryption
            | RelayError::VaultIntegrity { .. }
            | RelayError::Storage { .. }
            | RelayError::Config(_)
            | RelayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Integrity failures indicate secret loss and must never pass
        // silently.
        match &self.0 {
            RelayError::Decryption | RelayError::VaultIntegrity { .. } => {
                error!(error = %self.0, "vault integrity failure surfaced to client");
            }
            e if status.is_server_error() => {
                error!(error = %e, "request failed");
            }
            e => {
                warn!(error = %e, "request rejected");
            }
        }
        let body = json!({
            "error": {
                "kind": self.0.kind(),
                "message": self.0.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}

/// JSON body extractor whose rejection is the structured error shape rather
/// than axum's plain-text default.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError(RelayError::InvalidInput(rejection.body_text()))),
        }
    }
}
