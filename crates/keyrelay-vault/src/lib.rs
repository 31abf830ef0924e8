// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cryptographic primitives for the Keyrelay credential vault.
//!
//! - [`kdf`]: Argon2id derivation of the 32-byte vault key from the master
//!   secret, performed once per process.
//! - [`crypto`]: AES-256-GCM seal/open with a fresh random nonce per seal.
//! - [`fingerprint`]: keyed HMAC-SHA256 digests used to verify secret
//!   identity without exposing the secret.
//! - [`keys`]: the [`VaultKeySet`] holding the current key plus, during a
//!   rotation window, the previous key.

pub mod crypto;
pub mod fingerprint;
pub mod kdf;
pub mod keys;

pub use fingerprint::fingerprint;
pub use keys::VaultKeySet;
