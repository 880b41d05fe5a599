//! Error taxonomy (C10).
//!
//! Two levels, enforced by the type system rather than a runtime tag:
//! `BoxError` is always permanent (it becomes a stored `ErrorRecord`);
//! `TransientError` is always transient (the caller retries, nothing is
//! persisted). `unbox_with_key`/`unbox_message` return
//! `Result<Result<MessageUnboxed, ErrorRecord>, TransientError>` so the
//! permanent/transient split is visible at the type level, mirroring how
//! `zrc-core::errors::CoreError` keeps a closed classification separate
//! from the larger internal error surface.

use chatbox_wire::types::{MessageId, MessageKind};
use thiserror::Error;

/// Failures in validating the signer's identity/key (spec.md 4.6.2 step 3).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("sender key not found")]
    NotFound,
    #[error("invalid at ctime")]
    InvalidAtCtime,
}

/// Every permanent failure the unbox pipeline can produce. Permanent means:
/// this envelope will never succeed no matter how current the caller's view
/// of keys/users/Merkle state becomes, so the result is worth persisting as
/// the message's stored representation.
#[derive(Debug, Error, Clone)]
pub enum BoxError {
    #[error("{0}")]
    Misc(String),

    #[error("unsupported header version {version}")]
    BadVersionCritical { version: u32 },

    #[error("unsupported header version {version}")]
    BadVersion { version: u32 },

    #[error("unsupported body version {version}")]
    BadBodyVersionCritical { version: u32 },

    #[error("unsupported body version {version}")]
    BadBodyVersion { version: u32 },

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error("body hash mismatch")]
    BodyHashInvalid,

    #[error("signature verification failed")]
    BadSig,

    #[error("replayed body hash")]
    ReplayedBodyHash,

    #[error("inconsistent header/prev hash: {0}")]
    InconsistentHeader(String),

    #[error("blank tlf name")]
    BlankTlfName,

    #[error("envelope invalid: {0}")]
    EnvelopeInvalid(String),

    #[error("bad nonce length")]
    BadNonce,

    #[error("decrypt/open failed")]
    DecryptOpen,

    #[error("merkle root lookup failed: {0}")]
    MerkleRootFailed(String),

    #[error("wire decode failed: {0}")]
    Wire(#[from] chatbox_wire::codec::WireError),
}

impl BoxError {
    /// Whether this error should render as "unsupported — please update"
    /// (critical) rather than a generic inline error notice (spec.md 7).
    pub fn critical(&self) -> bool {
        matches!(
            self,
            BoxError::BadVersionCritical { .. } | BoxError::BadBodyVersionCritical { .. }
        )
    }

    /// Stable string for `ErrorRecord::err_type`, independent of the
    /// `Display` message (which may carry variable detail).
    pub fn err_type(&self) -> &'static str {
        match self {
            BoxError::Misc(_) => "Misc",
            BoxError::BadVersionCritical { .. } | BoxError::BadBodyVersionCritical { .. } => {
                "BadVersion_Critical"
            }
            BoxError::BadVersion { .. } | BoxError::BadBodyVersion { .. } => "BadVersion",
            BoxError::Identity(_) => "Identity",
            BoxError::BodyHashInvalid => "Misc",
            BoxError::BadSig => "Misc",
            BoxError::ReplayedBodyHash => "Misc",
            BoxError::InconsistentHeader(_) => "Misc",
            BoxError::BlankTlfName => "Misc",
            BoxError::EnvelopeInvalid(_) => "Misc",
            BoxError::BadNonce => "Misc",
            BoxError::DecryptOpen => "Misc",
            BoxError::MerkleRootFailed(_) => "Misc",
            BoxError::Wire(_) => "Misc",
        }
    }
}

/// Every transient failure the unbox pipeline can produce. Transient means:
/// re-running with a more current key/user/Merkle view could succeed, so
/// the caller should retry and nothing is persisted.
#[derive(Debug, Error, Clone)]
pub enum TransientError {
    #[error("crypt keys lookup failed: {0}")]
    CryptKeysFailed(String),

    #[error("no key found for generation {0}")]
    NoKeyForGeneration(u32),

    #[error("ephemeral: {0}")]
    Ephemeral(String),
}

/// The persisted representation of a permanently-failed unbox: what the
/// message timeline stores forever in place of the plaintext (spec.md 4.8).
#[derive(Debug, Clone)]
pub struct ErrorRecord {
    pub err_type: String,
    pub err_msg: String,
    pub message_id: MessageId,
    pub message_type: MessageKind,
    pub ctime: i64,
}

impl ErrorRecord {
    pub fn from_box_error(
        err: &BoxError,
        message_id: MessageId,
        message_type: MessageKind,
        ctime: i64,
    ) -> Self {
        ErrorRecord {
            err_type: err.err_type().to_string(),
            err_msg: err.to_string(),
            message_id,
            message_type,
            ctime,
        }
    }
}
