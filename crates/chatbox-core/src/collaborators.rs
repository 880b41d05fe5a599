//! Collaborator interfaces (C5 Key Resolver, C6 Replay Guard) plus the
//! User Loader and Merkle Client named in spec.md 6.
//!
//! These are `#[async_trait]` traits taking `&self`, the same shape as
//! `zrc-core::store::Store` and `zrc-core::pairing::ConsentHandler`. A
//! `Boxer` is constructed from an explicit `Collaborators` bundle
//! (`Arc<dyn Trait>` per field) rather than reaching into ambient global
//! state — spec.md 9's "cyclic dependencies" design note.
//!
//! Cancellation (spec.md 5) has no bespoke type here: a caller cancels by
//! dropping the future these `async fn`s return, and a collaborator that
//! notices cancellation reports it through its own transient error variant.

use std::sync::Arc;

use async_trait::async_trait;
use chatbox_wire::types::{ConvId, CryptKey, DeviceId, MerkleRoot, MessageId, Uid};

use crate::errors::TransientError;

/// What `KeyFinder::find` returns: the canonical TLF name (which may differ
/// from the name the client asked for) plus every crypt key currently
/// known for it.
#[derive(Clone, Debug)]
pub struct KeyFinderResult {
    pub canonical_name: String,
    pub crypt_keys: Vec<CryptKey>,
}

/// C5 (key half): given a TLF name and its public flag, resolve the
/// canonical name and its key list.
#[async_trait]
pub trait KeyFinder: Send + Sync {
    async fn find(&self, tlf_name: &str, public: bool) -> Result<KeyFinderResult, TransientError>;
}

/// Resolved username/device metadata for display. Device fields are empty
/// strings when only the username lookup succeeded (spec.md 4.6 step 5).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    pub username: String,
    pub device_name: String,
    pub device_type: String,
}

/// The result of validating a signer's key at a point in time (spec.md
/// 4.6.2 step 3).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KidCheck {
    pub found: bool,
    pub deleted: bool,
    pub revoked_at: Option<i64>,
    pub valid_at_ctime: bool,
}

/// C5 (identity half) + User Loader (spec.md 6).
#[async_trait]
pub trait UserLoader: Send + Sync {
    async fn lookup_username_and_device(
        &self,
        uid: Uid,
        device: DeviceId,
    ) -> Result<DeviceInfo, TransientError>;

    /// Username-only fallback used when the full device lookup fails
    /// (spec.md 4.6 step 5).
    async fn lookup_username(&self, uid: Uid) -> Result<String, TransientError>;

    async fn check_kid_for_uid(&self, uid: Uid, kid: &[u8]) -> Result<KidCheck, TransientError>;
}

/// Merkle root retrieval. Spec.md 4.5 step 5 is unusual: a failure here is
/// *permanent* at box time (not transient like the other collaborators), so
/// this trait reports a plain string error rather than `TransientError`.
#[async_trait]
pub trait MerkleClient: Send + Sync {
    async fn last_root_info(&self) -> Result<Option<MerkleRoot>, String>;
}

/// What a replay/history check reports back (spec.md 4.6 steps 6-7, I4/I5).
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ReplayGuardError {
    #[error("replayed body hash")]
    DuplicateBodyHash,
    #[error("replayed header hash")]
    DuplicateHeaderHash,
    #[error("prev-pointer hash mismatch for message {id}")]
    PrevHashMismatch { id: MessageId },
}

/// C6: indexes enforcing I4 (body hash uniqueness) and I5 (header hash
/// uniqueness + prev-pointer consistency) per conversation. Implementations
/// own the backing store and MUST make `check_and_record_*` atomic per key
/// (spec.md 5) — the core never locks anything itself.
#[async_trait]
pub trait ReplayGuard: Send + Sync {
    /// Record `(body_hash, message_id)` for `conv_id`; error if this
    /// `body_hash` was already recorded for this conversation (I4).
    async fn check_and_record_body_hash(
        &self,
        conv_id: ConvId,
        body_hash: [u8; 32],
        message_id: MessageId,
    ) -> Result<(), ReplayGuardError>;

    /// Record `(message_id, header_hash)` for `conv_id`; error if this
    /// `message_id` was already recorded with a *different* header hash
    /// (I5, first half).
    async fn check_and_record_header(
        &self,
        conv_id: ConvId,
        message_id: MessageId,
        header_hash: [u8; 32],
    ) -> Result<(), ReplayGuardError>;

    /// Check one embedded prev-pointer against whatever header hash was
    /// previously recorded for that message id (I5, second half). Does not
    /// record anything new — the pointed-to message's own unbox is what
    /// records its header hash.
    async fn check_prev_pointer(
        &self,
        conv_id: ConvId,
        prev_id: MessageId,
        prev_header_hash: [u8; 32],
    ) -> Result<(), ReplayGuardError>;
}

/// The explicit collaborators bundle a `Boxer` is constructed from, in
/// place of the source's ambient global context (spec.md 9).
#[derive(Clone)]
pub struct Collaborators {
    pub key_finder: Arc<dyn KeyFinder>,
    pub user_loader: Arc<dyn UserLoader>,
    pub merkle_client: Arc<dyn MerkleClient>,
    pub replay_guard: Arc<dyn ReplayGuard>,
}
