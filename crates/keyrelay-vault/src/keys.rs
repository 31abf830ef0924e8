// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The process-wide vault key set.
//!
//! [`VaultKeySet`] holds the current vault key and, during a rotation window,
//! the key derived from the previous master secret. It is built once at
//! startup and passed explicitly into the credential store -- never ambient
//! global state. Keys live only in memory, are zeroed on drop, and are
//! redacted from Debug output.

use keyrelay_config::model::VaultConfig;
use keyrelay_core::RelayError;
use tracing::info;
use zeroize::Zeroizing;

use crate::kdf;

/// The derived vault key(s) for this process.
pub struct VaultKeySet {
    current: Zeroizing<[u8; 32]>,
    previous: Option<Zeroizing<[u8; 32]>>,
}

impl std::fmt::Debug for VaultKeySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultKeySet")
            .field("current", &"[REDACTED]")
            .field("previous", &self.previous.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl VaultKeySet {
    /// Derive the key set from config. Runs Argon2id once per configured
    /// secret; this is the slow path and must happen exactly once at startup.
    pub fn from_config(config: &VaultConfig) -> Result<Self, RelayError> {
        let started = std::time::Instant::now();
        let salt = config.kdf_salt.as_bytes();

        let current = kdf::derive_vault_key(
            config.master_secret.as_bytes(),
            salt,
            config.kdf_memory_cost,
            config.kdf_iterations,
            config.kdf_parallelism,
        )?;

        let previous = match &config.previous_master_secret {
            Some(secret) => Some(kdf::derive_vault_key(
                secret.as_bytes(),
                salt,
                config.kdf_memory_cost,
                config.kdf_iterations,
                config.kdf_parallelism,
            )?),
            None => None,
        };

        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            rotation_window = previous.is_some(),
            "vault key set derived"
        );

        Ok(Self { current, previous })
    }

    /// Build a key set from raw key material. Test-oriented constructor that
    /// skips the slow KDF.
    pub fn from_raw(current: [u8; 32], previous: Option<[u8; 32]>) -> Self {
        Self {
            current: Zeroizing::new(current),
            previous: previous.map(Zeroizing::new),
        }
    }

    /// The key all new encryptions and fingerprints use.
    pub fn current(&self) -> &[u8; 32] {
        &self.current
    }

    /// The previous key, present only during a rotation window. Read paths
    /// fall back to it when the current key fails to authenticate.
    pub fn previous(&self) -> Option<&[u8; 32]> {
        self.previous.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(master: &str, previous: Option<&str>) -> VaultConfig {
        VaultConfig {
            master_secret: master.to_string(),
            previous_master_secret: previous.map(str::to_string),
            kdf_salt: "test-salt-16byte".to_string(),
            kdf_memory_cost: 8192,
            kdf_iterations: 1,
            kdf_parallelism: 1,
        }
    }

    #[test]
    fn from_config_without_previous() {
        let keys = VaultKeySet::from_config(&test_config("master", None)).unwrap();
        assert!(keys.previous().is_none());
        assert_eq!(keys.current().len(), 32);
    }

    #[test]
    fn from_config_with_rotation_window() {
        let keys = VaultKeySet::from_config(&test_config("new-master", Some("old-master"))).unwrap();
        let previous = keys.previous().expect("previous key should be derived");
        assert_ne!(keys.current(), previous);

        // The previous key equals a set derived solely from the old secret.
        let old_only = VaultKeySet::from_config(&test_config("old-master", None)).unwrap();
        assert_eq!(previous, old_only.current());
    }

    #[test]
    fn empty_master_secret_fails() {
        assert!(VaultKeySet::from_config(&test_config("", None)).is_err());
    }

    #[test]
    fn debug_redacts_key_material() {
        let keys = VaultKeySet::from_raw([0x41u8; 32], Some([0x42u8; 32]));
        let debug = format!("{keys:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("65")); // 0x41 as decimal byte
        assert!(!debug.contains("AAAA"));
    }
}
