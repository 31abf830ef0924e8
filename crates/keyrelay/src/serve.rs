// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `keyrelay serve` command implementation.
//!
//! Wires the full stack: vault key derivation (once, at startup), SQLite
//! storage, the provider chat client, validation and proxying, usage
//! analytics, and the HTTP gateway.

use std::sync::Arc;

use keyrelay_config::KeyrelayConfig;
use keyrelay_core::RelayError;
use keyrelay_gateway::{AppState, AuthTokens, start_server};
use keyrelay_providers::ChatClient;
use keyrelay_proxy::{ChatProxy, ProviderValidator};
use keyrelay_storage::{CredentialStore, Database};
use keyrelay_usage::{AnalyticsAggregator, UsageLedger};
use keyrelay_vault::VaultKeySet;
use tracing::info;

/// Build the gateway state from validated configuration.
///
/// The vault key set is derived exactly once here; everything downstream
/// receives it by reference counting, never re-derives.
pub async fn build_state(config: &KeyrelayConfig) -> Result<(AppState, AuthTokens), RelayError> {
    keyrelay_config::validate(config)?;

    let keys = Arc::new(VaultKeySet::from_config(&config.vault)?);

    if let Some(parent) = std::path::Path::new(&config.storage.database_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                RelayError::Config(format!(
                    "cannot create database directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
    }
    let db = Database::open(&config.storage.database_path, config.storage.wal_mode).await?;

    let store = Arc::new(CredentialStore::new(db.clone(), keys));
    let client = ChatClient::new(config.providers.clone())?;
    let ledger = UsageLedger::new(db.clone());

    let state = AppState {
        validator: Arc::new(ProviderValidator::new(store.clone(), client.clone())),
        proxy: Arc::new(ChatProxy::new(
            store.clone(),
            ledger,
            client,
            config.pricing.clone(),
        )),
        analytics: Arc::new(AnalyticsAggregator::new(db)),
        store,
    };
    let auth = AuthTokens::from_config(&config.auth);
    Ok((state, auth))
}

/// Runs the `keyrelay serve` command.
pub async fn run_serve(config: KeyrelayConfig) -> Result<(), RelayError> {
    init_tracing();

    info!("starting keyrelay serve");
    let (state, auth) = build_state(&config).await?;

    if config.auth.tokens.is_empty() {
        tracing::warn!("no auth tokens configured; every API request will be rejected");
    }

    start_server(&config.server, state, auth).await
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("keyrelay=info,warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
