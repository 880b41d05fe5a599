//! Symmetric sealer (C3): NaCl-style secretbox (XSalsa20-Poly1305).
//!
//! Mirrors the call shape of `zrc-crypto::envelope`'s use of
//! `ChaCha20Poly1305` (`aead::{Aead, KeyInit}`, fresh random nonce per
//! call), but with the primitive spec.md 4.3/6 actually mandates for this
//! wire format.

use chatbox_wire::types::SealedData;
use rand_core::{OsRng, RngCore};
use xsalsa20poly1305::aead::{Aead, KeyInit};
use xsalsa20poly1305::{Key, Nonce, XSalsa20Poly1305};

use crate::errors::BoxError;

const SEALED_VERSION: u32 = 1;
const NONCE_LEN: usize = 24;

/// Encode `plaintext` (already encoded by the caller via `chatbox_wire`)
/// and seal it under `key` with a fresh random nonce.
pub fn seal(plaintext: &[u8], key: &[u8; 32]) -> SealedData {
    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);

    let cipher = XSalsa20Poly1305::new(Key::from_slice(key));
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .expect("secretbox seal does not fail for in-memory plaintext");

    SealedData {
        version: SEALED_VERSION,
        ciphertext,
        nonce: nonce_bytes.to_vec(),
    }
}

/// Authenticate and decrypt `sealed` under `key`. Permanent failures only:
/// a malformed nonce or a failed authentication tag are both unrecoverable
/// for this ciphertext (spec.md 4.3).
pub fn open(sealed: &SealedData, key: &[u8; 32]) -> Result<Vec<u8>, BoxError> {
    if sealed.nonce.len() != NONCE_LEN {
        return Err(BoxError::BadNonce);
    }
    let cipher = XSalsa20Poly1305::new(Key::from_slice(key));
    cipher
        .decrypt(Nonce::from_slice(sealed.nonce.as_slice()), sealed.ciphertext.as_slice())
        .map_err(|_| BoxError::DecryptOpen)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let key = [7u8; 32];
        let sealed = seal(b"hello, world", &key);
        let opened = open(&sealed, &key).unwrap();
        assert_eq!(opened, b"hello, world");
    }

    #[test]
    fn wrong_key_fails() {
        let sealed = seal(b"hello, world", &[1u8; 32]);
        assert!(matches!(open(&sealed, &[2u8; 32]), Err(BoxError::DecryptOpen)));
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let key = [3u8; 32];
        let mut sealed = seal(b"hello, world", &key);
        sealed.ciphertext[0] ^= 0xFF;
        assert!(matches!(open(&sealed, &key), Err(BoxError::DecryptOpen)));
    }

    #[test]
    fn short_nonce_rejected() {
        let key = [3u8; 32];
        let mut sealed = seal(b"hello, world", &key);
        sealed.nonce.truncate(12);
        assert!(matches!(open(&sealed, &key), Err(BoxError::BadNonce)));
    }

    #[test]
    fn distinct_nonces_per_call() {
        let key = [9u8; 32];
        let a = seal(b"same plaintext", &key);
        let b = seal(b"same plaintext", &key);
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }
}
