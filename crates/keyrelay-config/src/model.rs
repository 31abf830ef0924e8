// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for Keyrelay.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup.

use serde::{Deserialize, Serialize};

/// Top-level Keyrelay configuration.
///
/// Loaded from TOML with environment variable overrides. All sections are
/// optional and default to sensible values, except that `vault.master_secret`
/// must be non-empty before the server will start.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct KeyrelayConfig {
    /// Vault key derivation settings.
    #[serde(default)]
    pub vault: VaultConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Authenticated owners (bearer token -> owner id).
    #[serde(default)]
    pub auth: AuthConfig,

    /// Provider endpoint overrides and request timeout.
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Per-provider pricing rates for cost estimation.
    #[serde(default)]
    pub pricing: PricingConfig,
}

/// Vault key derivation configuration.
///
/// The master secret and salt feed Argon2id once at startup; changing the
/// master secret requires a restart. During a rotation window the previous
/// secret can be configured alongside the new one so stored credentials are
/// re-encrypted lazily on first read.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VaultConfig {
    /// Master passphrase the vault key is derived from. Empty = vault locked.
    #[serde(default)]
    pub master_secret: String,

    /// Previous master passphrase, set transiently after a rotation so old
    /// records can be healed on read. `None` outside rotation windows.
    #[serde(default)]
    pub previous_master_secret: Option<String>,

    /// Hex-free ASCII salt fed to Argon2id together with the master secret.
    #[serde(default = "default_kdf_salt")]
    pub kdf_salt: String,

    /// Argon2id memory cost in KiB.
    #[serde(default = "default_kdf_memory_cost")]
    pub kdf_memory_cost: u32,

    /// Argon2id iteration count.
    #[serde(default = "default_kdf_iterations")]
    pub kdf_iterations: u32,

    /// Argon2id parallelism.
    #[serde(default = "default_kdf_parallelism")]
    pub kdf_parallelism: u32,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            master_secret: String::new(),
            previous_master_secret: None,
            kdf_salt: default_kdf_salt(),
            kdf_memory_cost: default_kdf_memory_cost(),
            kdf_iterations: default_kdf_iterations(),
            kdf_parallelism: default_kdf_parallelism(),
        }
    }
}

fn default_kdf_salt() -> String {
    "keyrelay-vault-salt".to_string()
}

// OWASP-recommended Argon2id defaults.
fn default_kdf_memory_cost() -> u32 {
    19456
}

fn default_kdf_iterations() -> u32 {
    2
}

fn default_kdf_parallelism() -> u32 {
    1
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("keyrelay").join("keyrelay.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("keyrelay.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origins. Empty list = no cross-origin access.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origins: Vec::new(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8640
}

/// Authenticated-owner configuration.
///
/// Each entry maps a bearer token to the owner id it authenticates. With no
/// entries configured the gateway rejects every request (fail-closed).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Static bearer tokens.
    #[serde(default)]
    pub tokens: Vec<AuthToken>,
}

/// One bearer token and the owner it resolves to.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuthToken {
    /// The bearer token value.
    pub token: String,
    /// Owner id all vault operations under this token are scoped to.
    pub owner: String,
}

/// Provider endpoint configuration.
///
/// Base URLs default to the public provider endpoints; overriding them is
/// mainly for tests and self-hosted gateways.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProvidersConfig {
    /// OpenAI chat completions URL.
    #[serde(default = "default_openai_url")]
    pub openai_url: String,

    /// Grok (x.ai) chat completions URL.
    #[serde(default = "default_grok_url")]
    pub grok_url: String,

    /// Anthropic messages URL.
    #[serde(default = "default_claude_url")]
    pub claude_url: String,

    /// Google Gemini base URL; the model name and `:generateContent` verb are
    /// appended per request.
    #[serde(default = "default_google_url")]
    pub google_url: String,

    /// Upper-bound timeout for any single provider call, in seconds.
    /// A timeout is treated identically to a network failure.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            openai_url: default_openai_url(),
            grok_url: default_grok_url(),
            claude_url: default_claude_url(),
            google_url: default_google_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_openai_url() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_grok_url() -> String {
    "https://api.x.ai/v1/chat/completions".to_string()
}

fn default_claude_url() -> String {
    "https://api.anthropic.com/v1/messages".to_string()
}

fn default_google_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta/models".to_string()
}

fn default_request_timeout_secs() -> u64 {
    60
}

/// Pricing configuration for write-time cost estimation.
///
/// Rates are USD per million tokens. A provider with no configured rates
/// produces `cost = null` usage events rather than 0.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PricingConfig {
    #[serde(default)]
    pub openai: Option<RateConfig>,
    #[serde(default)]
    pub grok: Option<RateConfig>,
    #[serde(default)]
    pub claude: Option<RateConfig>,
    #[serde(default)]
    pub google: Option<RateConfig>,
}

/// Per-million-token rates for one provider.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RateConfig {
    /// USD per million prompt tokens.
    pub input_per_mtok: f64,
    /// USD per million completion tokens.
    pub output_per_mtok: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_empty_master_secret() {
        let config = KeyrelayConfig::default();
        assert!(config.vault.master_secret.is_empty());
        assert!(config.vault.previous_master_secret.is_none());
        assert_eq!(config.vault.kdf_memory_cost, 19456);
    }

    #[test]
    fn default_server_binds_loopback() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8640);
        assert!(config.allowed_origins.is_empty());
    }

    #[test]
    fn default_endpoints_point_at_public_apis() {
        let p = ProvidersConfig::default();
        assert!(p.openai_url.contains("api.openai.com"));
        assert!(p.grok_url.contains("api.x.ai"));
        assert!(p.claude_url.contains("api.anthropic.com"));
        assert!(p.google_url.contains("generativelanguage.googleapis.com"));
        assert_eq!(p.request_timeout_secs, 60);
    }

    #[test]
    fn pricing_defaults_to_no_rates() {
        let pricing = PricingConfig::default();
        assert!(pricing.openai.is_none());
        assert!(pricing.claude.is_none());
    }
}
