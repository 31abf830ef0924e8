// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests over the full stack: TOML config in, HTTP surface out.
//!
//! Each test wires the real components (Argon2id key derivation, SQLite on a
//! temp file, the provider client against wiremock) exactly the way `serve`
//! does, then drives the router directly through tower.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use keyrelay_config::KeyrelayConfig;
use keyrelay_gateway::{AppState, AuthTokens, build_router};
use keyrelay_providers::ChatClient;
use keyrelay_proxy::{ChatProxy, ProviderValidator};
use keyrelay_storage::{CredentialStore, Database};
use keyrelay_usage::{AnalyticsAggregator, UsageLedger};
use keyrelay_vault::VaultKeySet;
use serde_json::{Value, json};
use tower::ServiceExt;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Config with fast KDF parameters, one bearer token, and all provider
/// traffic pointed at `provider_uri`.
fn test_config(db_path: &str, provider_uri: &str, master: &str, previous: Option<&str>) -> KeyrelayConfig {
    let previous_line = match previous {
        Some(p) => format!("previous_master_secret = \"{p}\"\n"),
        None => String::new(),
    };
    keyrelay_config::load_config_from_str(&format!(
        r#"
        [vault]
        master_secret = "{master}"
        {previous_line}
        kdf_salt = "e2e-test-salt"
        kdf_memory_cost = 8192
        kdf_iterations = 1

        [storage]
        database_path = "{db_path}"

        [auth]
        tokens = [{{ token = "tok-alice", owner = "alice" }}]

        [providers]
        openai_url = "{provider_uri}/v1/chat/completions"
        request_timeout_secs = 2
        "#
    ))
    .unwrap()
}

/// Mirror of the serve wiring, minus the TCP listener.
async fn build_app(config: &KeyrelayConfig) -> Router {
    keyrelay_config::validate(config).unwrap();
    let keys = Arc::new(VaultKeySet::from_config(&config.vault).unwrap());
    let db = Database::open(&config.storage.database_path, config.storage.wal_mode)
        .await
        .unwrap();
    let store = Arc::new(CredentialStore::new(db.clone(), keys));
    let client = ChatClient::new(config.providers.clone()).unwrap();
    let state = AppState {
        validator: Arc::new(ProviderValidator::new(store.clone(), client.clone())),
        proxy: Arc::new(ChatProxy::new(
            store.clone(),
            UsageLedger::new(db.clone()),
            client,
            config.pricing.clone(),
        )),
        analytics: Arc::new(AnalyticsAggregator::new(db)),
        store,
    };
    let auth = AuthTokens::from_config(&config.auth);
    build_router(state, auth, &config.server.allowed_origins)
}

fn authed(request: Request<Body>) -> Request<Body> {
    let (mut parts, body) = request.into_parts();
    parts
        .headers
        .insert(header::AUTHORIZATION, "Bearer tok-alice".parse().unwrap());
    Request::from_parts(parts, body)
}

fn json_request(method_name: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method_name)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn mock_provider() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "ok"}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5}
        })))
        .mount(&server)
        .await;
    server
}

async fn create_key(app: &Router) -> String {
    let response = app
        .clone()
        .oneshot(authed(json_request(
            "POST",
            "/api/keys",
            json!({"provider": "openai", "key_name": "work key", "api_key": "sk-e2e-secret"}),
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["id"].as_str().unwrap().to_string()
}

async fn chat(app: &Router, key_id: &str) -> axum::response::Response {
    app.clone()
        .oneshot(authed(json_request(
            "POST",
            "/api/chat",
            json!({
                "keyId": key_id,
                "model": "gpt-4o",
                "messages": [{"role": "user", "content": "hello"}]
            }),
        )))
        .await
        .unwrap()
}

#[tokio::test]
async fn full_lifecycle_create_validate_chat_analyze() {
    let provider = mock_provider().await;
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("e2e.db");
    let config = test_config(db_path.to_str().unwrap(), &provider.uri(), "e2e-master", None);
    let app = build_app(&config).await;

    let id = create_key(&app).await;

    // The stored secret never leaves through the list.
    let response = app
        .clone()
        .oneshot(authed(Request::get("/api/keys").body(Body::empty()).unwrap()))
        .await
        .unwrap();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert!(!String::from_utf8(bytes.to_vec()).unwrap().contains("sk-e2e-secret"));

    // Validation marks the key valid.
    let response = app
        .clone()
        .oneshot(authed(
            Request::post(format!("/api/keys/{id}/test"))
                .body(Body::empty())
                .unwrap(),
        ))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["valid"], true);

    // Chat succeeds and lands in the ledger.
    let response = chat(&app, &id).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["content"], "ok");

    let response = app
        .oneshot(authed(Request::get("/api/analytics").body(Body::empty()).unwrap()))
        .await
        .unwrap();
    let snapshot = body_json(response).await;
    assert_eq!(snapshot["totals"]["requests"], 1);
    assert_eq!(snapshot["totals"]["total_tokens"], 15);
    assert_eq!(snapshot["providers"][0]["provider"], "openai");
}

#[tokio::test]
async fn master_secret_rotation_heals_stored_keys() {
    let provider = mock_provider().await;
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("rotate.db");
    let db_path = db_path.to_str().unwrap();

    // First process lifetime: old master secret.
    let config = test_config(db_path, &provider.uri(), "old-master", None);
    let app = build_app(&config).await;
    let id = create_key(&app).await;
    drop(app);

    // Restart with a new master secret and the old one in the rotation
    // window. The stored key heals on first use.
    let config = test_config(db_path, &provider.uri(), "new-master", Some("old-master"));
    let app = build_app(&config).await;
    assert_eq!(chat(&app, &id).await.status(), StatusCode::OK);
    drop(app);

    // Third lifetime: rotation window closed. The healed record must
    // decrypt under the new key alone.
    let config = test_config(db_path, &provider.uri(), "new-master", None);
    let app = build_app(&config).await;
    assert_eq!(chat(&app, &id).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn unhealed_key_after_rotation_window_is_an_integrity_error() {
    let provider = mock_provider().await;
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("lost.db");
    let db_path = db_path.to_str().unwrap();

    let config = test_config(db_path, &provider.uri(), "old-master", None);
    let app = build_app(&config).await;
    let id = create_key(&app).await;
    drop(app);

    // New secret, no rotation window: the record is unrecoverable.
    let config = test_config(db_path, &provider.uri(), "new-master", None);
    let app = build_app(&config).await;
    let response = chat(&app, &id).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["error"]["kind"], "vault_integrity");
}

#[tokio::test]
async fn usage_history_survives_restart_and_key_deletion() {
    let provider = mock_provider().await;
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("history.db");
    let db_path = db_path.to_str().unwrap();

    let config = test_config(db_path, &provider.uri(), "e2e-master", None);
    let app = build_app(&config).await;
    let id = create_key(&app).await;
    assert_eq!(chat(&app, &id).await.status(), StatusCode::OK);

    // Delete the key; its ledger rows are audit history and stay.
    let response = app
        .clone()
        .oneshot(authed(
            Request::delete(format!("/api/keys/{id}"))
                .body(Body::empty())
                .unwrap(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    drop(app);

    let config = test_config(db_path, &provider.uri(), "e2e-master", None);
    let app = build_app(&config).await;
    let response = app
        .oneshot(authed(Request::get("/api/analytics").body(Body::empty()).unwrap()))
        .await
        .unwrap();
    let snapshot = body_json(response).await;
    assert_eq!(snapshot["totals"]["requests"], 1);
    assert_eq!(snapshot["credentials"][0]["credential_id"], id);
    assert_eq!(snapshot["credentials"][0]["label"], Value::Null);
}
