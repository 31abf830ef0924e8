// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, auth middleware, CORS, and shared state.

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::{
    Router,
    middleware as axum_middleware,
    routing::{get, patch, post},
};
use keyrelay_config::model::ServerConfig;
use keyrelay_core::RelayError;
use keyrelay_proxy::{ChatProxy, ProviderValidator};
use keyrelay_storage::CredentialStore;
use keyrelay_usage::AnalyticsAggregator;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::auth::{AuthTokens, auth_middleware};
use crate::handlers;

static STARTED_AT: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();

/// Time elapsed since the first router was built in this process.
pub fn uptime() -> std::time::Duration {
    STARTED_AT.get_or_init(std::time::Instant::now).elapsed()
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<CredentialStore>,
    pub validator: Arc<ProviderValidator>,
    pub proxy: Arc<ChatProxy>,
    pub analytics: Arc<AnalyticsAggregator>,
}

/// Assemble the full `/api` router.
///
/// `GET /api/health` is public; everything else sits behind the bearer auth
/// middleware.
pub fn build_router(state: AppState, auth: AuthTokens, allowed_origins: &[String]) -> Router {
    // Anchor the uptime clock at first assembly.
    let _ = uptime();

    let public_routes = Router::new().route("/api/health", get(handlers::get_health));

    let authed_routes = Router::new()
        .route("/api/keys", post(handlers::post_keys).get(handlers::get_keys))
        .route(
            "/api/keys/{id}",
            patch(handlers::patch_key).delete(handlers::delete_key),
        )
        .route("/api/keys/{id}/test", post(handlers::test_key))
        .route("/api/chat", post(handlers::post_chat))
        .route("/api/analytics", get(handlers::get_analytics))
        .route_layer(axum_middleware::from_fn_with_state(auth, auth_middleware))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(authed_routes)
        .layer(cors_layer(allowed_origins))
}

/// CORS from the configured origin list. No origins configured means no
/// cross-origin access.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin, "ignoring unparseable CORS origin");
                None
            }
        })
        .collect();
    if origins.is_empty() {
        CorsLayer::new()
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any)
    }
}

/// Bind and serve until the process receives ctrl-c.
pub async fn start_server(
    config: &ServerConfig,
    state: AppState,
    auth: AuthTokens,
) -> Result<(), RelayError> {
    let app = build_router(state, auth, &config.allowed_origins);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| RelayError::Internal(format!("failed to bind to {addr}: {e}")))?;

    info!("listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| RelayError::Internal(format!("server error: {e}")))?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to install ctrl-c handler: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cors_layer_skips_bad_origins() {
        // Should not panic on an origin that is not a valid header value.
        let _ = cors_layer(&["http://localhost:3000".to_string(), "\u{0}bad".to_string()]);
    }
}
