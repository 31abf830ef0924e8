// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Merge order: compiled defaults, then `~/.config/keyrelay/keyrelay.toml`,
//! then `./keyrelay.toml`, then `KEYRELAY_*` environment variables.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use keyrelay_core::RelayError;

use crate::model::KeyrelayConfig;

/// Load configuration from the standard hierarchy with env var overrides.
pub fn load_config() -> Result<KeyrelayConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(KeyrelayConfig::default()))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("keyrelay/keyrelay.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("keyrelay.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no file lookup, no env).
///
/// Used for testing and explicit config injection.
pub fn load_config_from_str(toml_content: &str) -> Result<KeyrelayConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(KeyrelayConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<KeyrelayConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(KeyrelayConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `KEYRELAY_VAULT_MASTER_SECRET` must map
/// to `vault.master_secret`, not `vault.master.secret`.
fn env_provider() -> Env {
    Env::prefixed("KEYRELAY_").map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("vault_", "vault.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("server_", "server.", 1)
            .replacen("providers_", "providers.", 1);
        mapped.into()
    })
}

/// Startup validation beyond what serde enforces.
///
/// The master secret is required before any vault operation can run, so the
/// server refuses to start without it.
pub fn validate(config: &KeyrelayConfig) -> Result<(), RelayError> {
    if config.vault.master_secret.is_empty() {
        return Err(RelayError::Config(
            "vault.master_secret is empty -- set it in keyrelay.toml or KEYRELAY_VAULT_MASTER_SECRET"
                .to_string(),
        ));
    }
    if config.vault.kdf_salt.len() < 8 {
        return Err(RelayError::Config(
            "vault.kdf_salt must be at least 8 bytes".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_from_str_applies_defaults() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.server.port, 8640);
        assert!(config.vault.master_secret.is_empty());
    }

    #[test]
    fn load_from_str_overrides_defaults() {
        let config = load_config_from_str(
            r#"
            [vault]
            master_secret = "hunter2-but-longer"
            kdf_iterations = 3

            [server]
            port = 9001
            allowed_origins = ["http://localhost:5173"]
            "#,
        )
        .unwrap();
        assert_eq!(config.vault.master_secret, "hunter2-but-longer");
        assert_eq!(config.vault.kdf_iterations, 3);
        assert_eq!(config.server.port, 9001);
        assert_eq!(config.server.allowed_origins, vec!["http://localhost:5173"]);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result = load_config_from_str(
            r#"
            [vault]
            master_sekret = "typo"
            "#,
        );
        assert!(result.is_err(), "unknown key should fail extraction");
    }

    #[test]
    fn auth_tokens_parse() {
        let config = load_config_from_str(
            r#"
            [[auth.tokens]]
            token = "tok-alpha"
            owner = "alice"

            [[auth.tokens]]
            token = "tok-beta"
            owner = "bob"
            "#,
        )
        .unwrap();
        assert_eq!(config.auth.tokens.len(), 2);
        assert_eq!(config.auth.tokens[0].owner, "alice");
    }

    #[test]
    fn pricing_rates_parse() {
        let config = load_config_from_str(
            r#"
            [pricing.openai]
            input_per_mtok = 2.5
            output_per_mtok = 10.0
            "#,
        )
        .unwrap();
        let rates = config.pricing.openai.unwrap();
        assert!((rates.input_per_mtok - 2.5).abs() < f64::EPSILON);
        assert!(config.pricing.claude.is_none());
    }

    #[test]
    fn validate_rejects_empty_master_secret() {
        let config = load_config_from_str("").unwrap();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("master_secret"));
    }

    #[test]
    fn validate_rejects_short_salt() {
        let config = load_config_from_str(
            r#"
            [vault]
            master_secret = "some-secret"
            kdf_salt = "tiny"
            "#,
        )
        .unwrap();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn validate_accepts_complete_config() {
        let config = load_config_from_str(
            r#"
            [vault]
            master_secret = "some-secret"
            "#,
        )
        .unwrap();
        assert!(validate(&config).is_ok());
    }
}
