// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Argon2id vault-key derivation from the master secret.
//!
//! Derives a 32-byte key using Argon2id (Algorithm::Argon2id, Version::V0x13).
//! Derivation is deliberately slow and must run once per configured secret per
//! process; callers hold the result for the process lifetime.

use keyrelay_core::RelayError;
use zeroize::Zeroizing;

/// Derive a 32-byte vault key from the master secret and salt.
///
/// Deterministic and side-effect free. Fails on an empty secret -- a vault
/// key derived from nothing would silently protect nothing.
pub fn derive_vault_key(
    secret: &[u8],
    salt: &[u8],
    memory_cost: u32,
    iterations: u32,
    parallelism: u32,
) -> Result<Zeroizing<[u8; 32]>, RelayError> {
    if secret.is_empty() {
        return Err(RelayError::Config(
            "cannot derive a vault key from an empty master secret".to_string(),
        ));
    }

    let params = argon2::Params::new(memory_cost, iterations, parallelism, Some(32))
        .map_err(|e| RelayError::Config(format!("invalid Argon2id parameters: {e}")))?;

    let argon2 = argon2::Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let mut output = Zeroizing::new([0u8; 32]);
    argon2
        .hash_password_into(secret, salt, output.as_mut())
        .map_err(|e| RelayError::Config(format!("Argon2id key derivation failed: {e}")))?;

    Ok(output)
}
