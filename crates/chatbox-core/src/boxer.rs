//! The box/unbox pipelines (C7, C8) and the version dispatch embedded in
//! them (C9).
//!
//! A `Boxer` is constructed once per caller from an explicit
//! [`Collaborators`] bundle and [`BoxSigner`], then used for every
//! message — same shape as `zrc-core::pairing::PairingHost::new`.

use std::sync::Arc;

use chatbox_wire::codec::{decode_body, decode_header, encode, encode_body_v1, encode_header_v1};
use chatbox_wire::types::{
    BodyPlaintextV1, ClientHeader, CryptKey, DeviceId, HeaderPlaintextV1, MessageBody,
    MessageBoxed, ServerHeader, Uid, VersionedBody, VersionedHeader,
};
use constant_time_eq::constant_time_eq;
use ed25519_dalek::VerifyingKey;
use tracing::{debug, warn};

use crate::collaborators::{Collaborators, DeviceInfo, ReplayGuardError, UserLoader};
use crate::errors::{BoxError, ErrorRecord, IdentityError, TransientError};
use crate::hash::hash_v1;
use crate::seal;
use crate::sign::{self, BoxSigner};

/// What the caller wants sealed: the header fields it controls plus the
/// body. `merkle_root` and `tlf_name` are filled in/overwritten by the box
/// pipeline and don't need to be pre-populated.
#[derive(Clone, Debug)]
pub struct PlaintextMessage {
    pub client_header: ClientHeader,
    pub message_body: MessageBody,
}

/// A successfully unboxed, verified message.
#[derive(Clone, Debug)]
pub struct MessageUnboxed {
    pub client_header: ClientHeader,
    pub server_header: ServerHeader,
    /// `None` only for a superseded message whose body was never kept
    /// (spec.md 4.6.1 step 3, I1).
    pub message_body: Option<MessageBody>,
    pub sender_username: String,
    pub sender_device: DeviceInfo,
    /// `Some(t)` when the signer's key has since been revoked/deleted —
    /// the message is still valid, but callers may want to show this.
    pub signing_kid_revoked_at: Option<i64>,
}

/// The outcome of unboxing one envelope: either a valid message, or a
/// permanent failure recorded as its stored representation (spec.md 4.8).
#[derive(Debug, Clone)]
pub enum UnboxOutcome {
    Valid(MessageUnboxed),
    Error(ErrorRecord),
}

/// Context needed to expand a TLF name for a conversation that has since
/// been reset and finalized, so the key finder is asked about the right
/// name (spec.md 6).
#[derive(Clone, Debug)]
pub struct FinalizeInfo {
    pub reset_user_suffix: String,
}

/// Either classification the box pipeline can fail with. Unlike unbox, box
/// failures are never persisted — there is nothing to persist them into
/// yet — so the two classifications are just folded into one error type
/// for the caller to match on.
#[derive(Debug, thiserror::Error)]
pub enum BoxFailure {
    #[error(transparent)]
    Permanent(#[from] BoxError),
    #[error(transparent)]
    Transient(#[from] TransientError),
}

pub struct Boxer {
    collaborators: Collaborators,
    signer: Arc<dyn BoxSigner>,
}

impl Boxer {
    pub fn new(collaborators: Collaborators, signer: Arc<dyn BoxSigner>) -> Self {
        Self {
            collaborators,
            signer,
        }
    }

    /// C7: seal and sign a plaintext message for a conversation.
    pub async fn box_message(&self, mut plaintext: PlaintextMessage) -> Result<MessageBoxed, BoxFailure> {
        if plaintext.client_header.tlf_name.trim().is_empty() {
            return Err(BoxFailure::Permanent(BoxError::BlankTlfName));
        }

        let key_result = self
            .collaborators
            .key_finder
            .find(&plaintext.client_header.tlf_name, plaintext.client_header.tlf_public)
            .await?;

        if key_result.canonical_name.trim().is_empty() {
            return Err(BoxFailure::Permanent(BoxError::BlankTlfName));
        }
        plaintext.client_header.tlf_name = key_result.canonical_name;

        let key = if plaintext.client_header.tlf_public {
            CryptKey::public_sentinel()
        } else {
            key_result
                .crypt_keys
                .iter()
                .max_by_key(|k| k.generation)
                .cloned()
                .ok_or_else(|| BoxFailure::Permanent(BoxError::Misc("no crypt keys available".into())))?
        };

        plaintext.client_header.merkle_root = match self.collaborators.merkle_client.last_root_info().await {
            Ok(root) => root,
            Err(e) => {
                warn!(error = %e, "merkle root lookup failed during box");
                return Err(BoxFailure::Permanent(BoxError::MerkleRootFailed(e)));
            }
        };

        let body_plaintext = BodyPlaintextV1 {
            message_body: plaintext.message_body,
        };
        let body_encoded =
            encode_body_v1(&body_plaintext).map_err(|e| BoxFailure::Permanent(BoxError::from(e)))?;
        let body_ciphertext = seal::seal(&body_encoded, &key.key);
        let body_hash = hash_v1(&body_ciphertext.ciphertext);

        let mut header = HeaderPlaintextV1 {
            client_header: plaintext.client_header,
            body_hash,
            header_signature: None,
        };

        let signing_bytes =
            encode(&header.signing_view()).map_err(|e| BoxFailure::Permanent(BoxError::from(e)))?;
        header.header_signature = Some(self.signer.sign(&signing_bytes));

        let header_encoded =
            encode_header_v1(&header).map_err(|e| BoxFailure::Permanent(BoxError::from(e)))?;
        let header_ciphertext = seal::seal(&header_encoded, &key.key);

        debug!(generation = key.generation, "boxed message");

        Ok(MessageBoxed {
            client_header: header.client_header,
            header_ciphertext,
            body_ciphertext,
            server_header: None,
            key_generation: key.generation,
        })
    }

    /// C8: open, verify, and dispatch a single boxed envelope.
    pub async fn unbox_message(
        &self,
        envelope: &MessageBoxed,
        finalize_info: Option<&FinalizeInfo>,
    ) -> Result<UnboxOutcome, TransientError> {
        let tlf_name = match finalize_info {
            Some(info) => format!("{}{}", envelope.client_header.tlf_name, info.reset_user_suffix),
            None => envelope.client_header.tlf_name.clone(),
        };

        let key_result = self
            .collaborators
            .key_finder
            .find(&tlf_name, envelope.client_header.tlf_public)
            .await?;

        let key = if envelope.client_header.tlf_public {
            CryptKey::public_sentinel()
        } else {
            key_result
                .crypt_keys
                .iter()
                .find(|k| k.generation == envelope.key_generation)
                .cloned()
                .ok_or(TransientError::NoKeyForGeneration(envelope.key_generation))?
        };

        match self.unbox_with_key(envelope, &key).await? {
            Ok(valid) => Ok(UnboxOutcome::Valid(valid)),
            Err(box_err) => {
                warn!(error = %box_err, "permanent unbox failure");
                let ctime = envelope.server_header.as_ref().map(|s| s.ctime).unwrap_or(0);
                let message_id = envelope.server_header.as_ref().map(|s| s.message_id).unwrap_or(0);
                Ok(UnboxOutcome::Error(ErrorRecord::from_box_error(
                    &box_err,
                    message_id,
                    envelope.client_header.message_type,
                    ctime,
                )))
            }
        }
    }

    /// 4.6.1: open under a resolved key, verify, and dispatch on version.
    /// The outer `Result` is the transient/propagate channel; the inner one
    /// is the permanent/persist channel.
    async fn unbox_with_key(
        &self,
        envelope: &MessageBoxed,
        key: &CryptKey,
    ) -> Result<Result<MessageUnboxed, BoxError>, TransientError> {
        let server_header = match &envelope.server_header {
            Some(sh) => sh.clone(),
            None => return Ok(Err(BoxError::EnvelopeInvalid("missing server header".into()))),
        };

        let header_hash = hash_v1(&envelope.header_ciphertext.ciphertext);
        let skip_body_verification = envelope.body_ciphertext.ciphertext.is_empty();

        if skip_body_verification && server_header.superseded_by == 0 {
            return Ok(Err(BoxError::EnvelopeInvalid(
                "empty body without a superseding message".into(),
            )));
        }

        let body_plaintext_bytes = if skip_body_verification {
            None
        } else {
            match seal::open(&envelope.body_ciphertext, &key.key) {
                Ok(bytes) => Some(bytes),
                Err(e) => return Ok(Err(e)),
            }
        };

        let versioned_body = match &body_plaintext_bytes {
            Some(bytes) => match decode_body(bytes) {
                Ok(v) => Some(v),
                Err(e) => return Ok(Err(BoxError::from(e))),
            },
            None => None,
        };

        let header_plaintext_bytes = match seal::open(&envelope.header_ciphertext, &key.key) {
            Ok(bytes) => bytes,
            Err(e) => return Ok(Err(e)),
        };

        let header = match decode_header(&header_plaintext_bytes) {
            Ok(VersionedHeader::V1(h)) => h,
            Ok(VersionedHeader::Unsupported { version, critical }) => {
                return Ok(Err(if critical {
                    BoxError::BadVersionCritical { version }
                } else {
                    BoxError::BadVersion { version }
                }));
            }
            Err(e) => return Ok(Err(BoxError::from(e))),
        };

        let revoked_at = match verify_v1(
            &header,
            if skip_body_verification {
                None
            } else {
                Some(envelope.body_ciphertext.ciphertext.as_slice())
            },
            server_header.ctime,
            self.collaborators.user_loader.as_ref(),
        )
        .await
        {
            Ok(r) => r,
            Err(BoxFailure::Permanent(e)) => return Ok(Err(e)),
            Err(BoxFailure::Transient(e)) => return Err(e),
        };

        let message_body = if skip_body_verification {
            None
        } else {
            match versioned_body.expect("body ciphertext was non-empty, so it was opened and decoded") {
                VersionedBody::V1(b) => Some(b.message_body),
                VersionedBody::Unsupported { version, critical } => {
                    return Ok(Err(if critical {
                        BoxError::BadBodyVersionCritical { version }
                    } else {
                        BoxError::BadBodyVersion { version }
                    }));
                }
            }
        };

        if let Err(e) = self
            .collaborators
            .replay_guard
            .check_and_record_body_hash(header.client_header.conv_id, header.body_hash, server_header.message_id)
            .await
        {
            return Ok(Err(replay_guard_error_to_box_error(e)));
        }

        if let Err(e) = self
            .collaborators
            .replay_guard
            .check_and_record_header(header.client_header.conv_id, server_header.message_id, header_hash)
            .await
        {
            return Ok(Err(replay_guard_error_to_box_error(e)));
        }

        for prev in &header.client_header.prev_pointers {
            if let Err(e) = self
                .collaborators
                .replay_guard
                .check_prev_pointer(header.client_header.conv_id, prev.id, prev.header_hash)
                .await
            {
                return Ok(Err(replay_guard_error_to_box_error(e)));
            }
        }

        let sender_device = self
            .resolve_sender(header.client_header.sender, header.client_header.sender_device)
            .await?;

        Ok(Ok(MessageUnboxed {
            sender_username: sender_device.username.clone(),
            client_header: header.client_header,
            server_header,
            message_body,
            sender_device,
            signing_kid_revoked_at: revoked_at,
        }))
    }

    /// Resolve display metadata for the sender. A device lookup failure
    /// falls back to a username-only lookup rather than failing the whole
    /// message (spec.md 4.6.1 step 9).
    async fn resolve_sender(&self, uid: Uid, device: DeviceId) -> Result<DeviceInfo, TransientError> {
        match self.collaborators.user_loader.lookup_username_and_device(uid, device).await {
            Ok(info) => Ok(info),
            Err(_) => {
                let username = self.collaborators.user_loader.lookup_username(uid).await?;
                Ok(DeviceInfo {
                    username,
                    ..Default::default()
                })
            }
        }
    }

    /// Unbox a batch of envelopes from the same conversation, in order. A
    /// transient failure anywhere aborts the remainder of the batch
    /// (spec.md 5: "serially per conversation").
    pub async fn unbox_thread(
        &self,
        envelopes: &[MessageBoxed],
        finalize_info: Option<&FinalizeInfo>,
    ) -> Result<Vec<UnboxOutcome>, TransientError> {
        let mut out = Vec::with_capacity(envelopes.len());
        for envelope in envelopes {
            out.push(self.unbox_message(envelope, finalize_info).await?);
        }
        Ok(out)
    }
}

/// 4.6.2: body-hash binding, detached signature, and signer validity.
/// `ctime` is the sealed message's server-assigned time, used to judge
/// whether a later key revocation invalidates this particular message.
async fn verify_v1(
    header: &HeaderPlaintextV1,
    body_ciphertext_bytes: Option<&[u8]>,
    ctime: i64,
    user_loader: &dyn UserLoader,
) -> Result<Option<i64>, BoxFailure> {
    // body_hash binds the header to the *sealed* body (boxer::box_message hashes
    // body_ciphertext.ciphertext, never the plaintext), so the recompute here
    // must hash the same ciphertext bytes, not the opened plaintext.
    if let Some(bytes) = body_ciphertext_bytes {
        let recomputed = hash_v1(bytes);
        if !constant_time_eq(&recomputed, &header.body_hash) {
            return Err(BoxFailure::Permanent(BoxError::BodyHashInvalid));
        }
    }

    let sig_info = header
        .header_signature
        .as_ref()
        .ok_or_else(|| BoxFailure::Permanent(BoxError::EnvelopeInvalid("missing header signature".into())))?;

    let verifying_key_bytes: [u8; 32] = sig_info.kid.as_slice().try_into().map_err(|_| {
        BoxFailure::Permanent(BoxError::EnvelopeInvalid("signing key id has the wrong length".into()))
    })?;
    let verifying_key = VerifyingKey::from_bytes(&verifying_key_bytes)
        .map_err(|_| BoxFailure::Permanent(BoxError::EnvelopeInvalid("malformed signing key".into())))?;

    let signing_bytes = encode(&header.signing_view()).map_err(|e| BoxFailure::Permanent(BoxError::from(e)))?;
    if !sign::verify(&signing_bytes, sig_info, sign::CHAT_SIG_PREFIX, &verifying_key) {
        return Err(BoxFailure::Permanent(BoxError::BadSig));
    }

    let kid_check = user_loader
        .check_kid_for_uid(header.client_header.sender, &sig_info.kid)
        .await?;

    if !kid_check.found {
        return Err(BoxFailure::Permanent(BoxError::Identity(IdentityError::NotFound)));
    }

    if kid_check.deleted {
        return Ok(Some(0));
    }

    if let Some(revoked_at) = kid_check.revoked_at {
        return if revoked_at > ctime {
            Ok(Some(revoked_at))
        } else {
            Err(BoxFailure::Permanent(BoxError::Identity(IdentityError::InvalidAtCtime)))
        };
    }

    if !kid_check.valid_at_ctime {
        return Err(BoxFailure::Permanent(BoxError::Identity(IdentityError::InvalidAtCtime)));
    }

    Ok(None)
}

/// Prev-pointer mismatches get their own `InconsistentHeader` detail rather
/// than being folded into the duplicate-header-hash case, so a caller
/// reading `ErrorRecord::err_msg` can tell which check actually failed.
fn replay_guard_error_to_box_error(e: ReplayGuardError) -> BoxError {
    match e {
        ReplayGuardError::DuplicateBodyHash => BoxError::ReplayedBodyHash,
        ReplayGuardError::DuplicateHeaderHash => {
            BoxError::InconsistentHeader("duplicate header hash for this message id".into())
        }
        ReplayGuardError::PrevHashMismatch { id } => {
            BoxError::InconsistentHeader(format!("prev pointer for message {id} does not match recorded header hash"))
        }
    }
}
