//! Sealing, signing, and verification for chat message envelopes.
//!
//! Layout mirrors `zrc-core`: one module per pipeline stage (C1-C10), wired
//! together by [`boxer::Boxer`].

#![forbid(unsafe_code)]

pub mod boxer;
pub mod collaborators;
pub mod errors;
pub mod hash;
pub mod seal;
pub mod sign;

#[cfg(test)]
pub mod test_support;

pub use boxer::{BoxFailure, Boxer, FinalizeInfo, MessageUnboxed, PlaintextMessage, UnboxOutcome};
pub use collaborators::{
    Collaborators, DeviceInfo, KeyFinder, KeyFinderResult, KidCheck, MerkleClient, ReplayGuard,
    ReplayGuardError, UserLoader,
};
pub use errors::{BoxError, ErrorRecord, IdentityError, TransientError};
pub use sign::{BoxSigner, Ed25519BoxSigner, CHAT_SIG_PREFIX};
