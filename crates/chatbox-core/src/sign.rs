//! Detached signing with domain separation (C4).
//!
//! `sign`/`verify` are free functions over raw bytes, the same shape as
//! `zrc-crypto::identity::{Identity::sign, verify_signature}`. The `BoxSigner`
//! trait above them is the seam spec.md 9's "Replaceable signer for tests"
//! design note asks for: tests can supply a malleable or broken signer
//! without touching the pipeline.

use chatbox_wire::types::SignatureInfo;
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};

/// Domain separation prefix. A signature produced under this prefix must
/// fail verification under any other prefix (spec.md 8).
pub const CHAT_SIG_PREFIX: &[u8] = b"Keybase-Chat-2";

const SIGNATURE_VERSION: u32 = 2;

/// Sign `bytes` with `signing_key`, prefixed by `prefix` for domain
/// separation. Returns the detached signature plus the signer's key id.
///
/// `kid` here is the raw 32-byte Ed25519 verifying key, not a hash of it —
/// the unbox path needs to reconstruct a `VerifyingKey` from `kid` alone to
/// check the signature (there is no separate "fetch public key" collaborator
/// call), so it has to carry the actual key material.
pub fn sign(bytes: &[u8], signing_key: &SigningKey, prefix: &[u8]) -> SignatureInfo {
    let mut prefixed = Vec::with_capacity(prefix.len() + bytes.len());
    prefixed.extend_from_slice(prefix);
    prefixed.extend_from_slice(bytes);

    let signature: Signature = signing_key.sign(&prefixed);

    SignatureInfo {
        version: SIGNATURE_VERSION,
        sig: signature.to_bytes(),
        kid: signing_key.verifying_key().to_bytes().to_vec(),
    }
}

/// Verify a detached signature produced by `sign`. The primitive is its
/// own MAC, so no additional constant-time compare is needed here — but
/// callers comparing `sig_info.kid`/body hashes against an expected value
/// MUST use a constant-time compare (spec.md 4.4), see
/// [`crate::boxer::verify_v1`].
pub fn verify(bytes: &[u8], sig_info: &SignatureInfo, prefix: &[u8], verifying_key: &VerifyingKey) -> bool {
    let mut prefixed = Vec::with_capacity(prefix.len() + bytes.len());
    prefixed.extend_from_slice(prefix);
    prefixed.extend_from_slice(bytes);

    let signature = Signature::from_bytes(&sig_info.sig);
    verifying_key.verify_strict(&prefixed, &signature).is_ok()
}

/// A seam for injecting signers into the box pipeline, so tests can supply
/// a malleable or broken signer (spec.md 9).
pub trait BoxSigner: Send + Sync {
    fn sign(&self, bytes: &[u8]) -> SignatureInfo;
}

/// The production signer: wraps an Ed25519 device signing keypair.
pub struct Ed25519BoxSigner {
    signing_key: SigningKey,
}

impl Ed25519BoxSigner {
    pub fn new(signing_key: SigningKey) -> Self {
        Self { signing_key }
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }
}

impl BoxSigner for Ed25519BoxSigner {
    fn sign(&self, bytes: &[u8]) -> SignatureInfo {
        sign(bytes, &self.signing_key, CHAT_SIG_PREFIX)
    }
}
