//! Content hashing (C2).
//!
//! `hash_v1` is SHA-256; the version is implicit in the surrounding
//! record's own version field. A future hash version would need to bind
//! the algorithm identifier into the header plaintext schema itself
//! (spec.md 4.2) — nothing here carries a version byte on its own.

use sha2::{Digest, Sha256};

pub fn hash_v1(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        assert_eq!(hash_v1(b"hello"), hash_v1(b"hello"));
    }

    #[test]
    fn sensitive_to_every_byte() {
        assert_ne!(hash_v1(b"hello"), hash_v1(b"hellp"));
    }

    #[test]
    fn known_vector() {
        // echo -n "" | sha256sum
        let expected = [
            0xe3, 0xb0, 0xc4, 0x42, 0x98, 0xfc, 0x1c, 0x14, 0x9a, 0xfb, 0xf4, 0xc8, 0x99, 0x6f,
            0xb9, 0x24, 0x27, 0xae, 0x41, 0xe4, 0x64, 0x9b, 0x93, 0x4c, 0xa4, 0x95, 0x99, 0x1b,
            0x78, 0x52, 0xb8, 0x55,
        ];
        assert_eq!(hash_v1(b""), expected);
    }
}
