// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keyed secret fingerprints (HMAC-SHA256).
//!
//! A fingerprint verifies secret identity without storing or returning the
//! secret: for a fixed vault key, equal fingerprints imply equal plaintext
//! with overwhelming probability. The fingerprint is recomputed whenever a
//! record is re-encrypted under the current key, which is what makes stale
//! encryption detectable after a rotation.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Compute the keyed fingerprint of a plaintext secret.
pub fn fingerprint(key: &[u8; 32], plaintext: &[u8]) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(plaintext);
    let digest = mac.finalize().into_bytes();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_A: [u8; 32] = [7u8; 32];
    const KEY_B: [u8; 32] = [8u8; 32];

    #[test]
    fn equal_plaintext_equal_fingerprint() {
        assert_eq!(fingerprint(&KEY_A, b"sk-test"), fingerprint(&KEY_A, b"sk-test"));
    }

    #[test]
    fn different_plaintext_different_fingerprint() {
        assert_ne!(fingerprint(&KEY_A, b"sk-test-1"), fingerprint(&KEY_A, b"sk-test-2"));
    }

    #[test]
    fn fingerprint_is_keyed() {
        // The same secret under a different vault key must not be linkable.
        assert_ne!(fingerprint(&KEY_A, b"sk-test"), fingerprint(&KEY_B, b"sk-test"));
    }

    #[test]
    fn fingerprint_does_not_reveal_plaintext() {
        let fp = fingerprint(&KEY_A, b"sk-live-verysecret");
        assert_eq!(fp.len(), 32);
        // No substring of the secret appears in the digest bytes.
        assert!(!fp.windows(7).any(|w| w == b"sk-live"));
    }
}
