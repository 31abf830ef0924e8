// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Keyrelay credential vault and proxy.

use thiserror::Error;

/// The primary error type used across all Keyrelay crates.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Configuration errors (invalid TOML, missing required fields, bad key material).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Malformed request input, rejected before it reaches the vault.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Unknown id, or an id owned by someone else. The two cases are
    /// deliberately indistinguishable so ids cannot be probed for existence.
    #[error("{resource} not found")]
    NotFound { resource: String },

    /// AEAD authentication failed. Wrong key and corrupted data produce the
    /// same signal; callers must not distinguish further.
    #[error("decryption failed")]
    Decryption,

    /// A stored secret could not be decrypted under any configured vault key.
    /// Indicates secret loss for that record; never retried, never swallowed.
    #[error("vault integrity failure for credential {credential_id}")]
    VaultIntegrity { credential_id: String },

    /// A provider identifier that is not part of the supported set.
    #[error("unsupported provider: {name}")]
    UnsupportedProvider { name: String },

    /// The provider endpoint could not be reached (network failure or timeout).
    #[error("provider unavailable: {message}")]
    ProviderUnavailable {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The provider answered with a non-2xx status.
    #[error("provider rejected request ({status}): {message}")]
    ProviderRejected { status: u16, message: String },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Stable machine-checkable kind string, used in JSON error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::Config(_) => "config",
            RelayError::Storage { .. } => "storage",
            RelayError::InvalidInput(_) => "invalid_input",
            RelayError::NotFound { .. } => "not_found",
            RelayError::Decryption => "decryption",
            RelayError::VaultIntegrity { .. } => "vault_integrity",
            RelayError::UnsupportedProvider { .. } => "unsupported_provider",
            RelayError::ProviderUnavailable { .. } => "provider_unavailable",
            RelayError::ProviderRejected { .. } => "provider_rejected",
            RelayError::Internal(_) => "internal",
        }
    }
}
