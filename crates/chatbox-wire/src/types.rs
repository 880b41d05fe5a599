//! Wire records for sealed chat message envelopes.
//!
//! Every type here is a plain data record: no crypto, no I/O. Field order is
//! the encoded order (MessagePack named-map encoding preserves declaration
//! order), which is what makes `Codec::encode` deterministic.

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

pub type ConvId = [u8; 16];
pub type Uid = [u8; 16];
pub type DeviceId = [u8; 16];
pub type MessageId = u32;

/// Coarse message classification, carried in cleartext on `ClientHeader` so
/// the server can authorize without decrypting, and echoed inside the body.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    Text,
    Attachment,
    Edit,
    Delete,
    Metadata,
    Reaction,
}

/// Asserts a prior message's identity: "the message with this id had this
/// header hash." Embedded in every new message to build a tamper-evident
/// history chain (I5).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrevPointer {
    pub id: MessageId,
    pub header_hash: [u8; 32],
}

/// Outbox bookkeeping carried through the core opaquely.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutboxInfo {
    pub outbox_id: [u8; 16],
    pub outbox_rate_limit_seconds: Option<u32>,
}

/// A snapshot of the identity-server Merkle tree, embedded for later
/// auditability. Absent when the Merkle client couldn't be reached at box
/// time (spec.md 4.5 step 5: failure to fetch is non-fatal to boxing).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MerkleRoot {
    pub seqno: u64,
    pub hash: [u8; 32],
}

/// Metadata duplicated into the header plaintext and visible to the server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClientHeader {
    pub conv_id: ConvId,
    pub tlf_name: String,
    pub tlf_public: bool,
    pub message_type: MessageKind,
    pub prev_pointers: Vec<PrevPointer>,
    pub sender: Uid,
    pub sender_device: DeviceId,
    pub outbox_info: Option<OutboxInfo>,
    pub merkle_root: Option<MerkleRoot>,
}

/// Server-assigned fields. Absent on outbound (not-yet-sealed) envelopes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServerHeader {
    pub message_id: MessageId,
    pub ctime: i64,
    /// 0 means "not superseded". Nonzero means the body has been tombstoned
    /// by a later edit/delete (I1).
    pub superseded_by: MessageId,
}

/// `(generation, key)` for a TLF's symmetric key hierarchy. Zeroized on
/// drop, matching `zrc-crypto::identity::Identity`'s handling of raw key
/// material.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct CryptKey {
    pub generation: u32,
    pub key: [u8; 32],
}

impl CryptKey {
    /// The sentinel key used for public (non-encrypted) conversations:
    /// generation 1, all-zero key, regardless of what the key resolver
    /// actually returns.
    pub fn public_sentinel() -> Self {
        CryptKey {
            generation: 1,
            key: [0u8; 32],
        }
    }
}

impl std::fmt::Debug for CryptKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptKey")
            .field("generation", &self.generation)
            .field("key", &"<redacted>")
            .finish()
    }
}

/// `(version, ciphertext, nonce)` — the output of the symmetric sealer (C3).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SealedData {
    pub version: u32,
    #[serde(with = "serde_bytes")]
    pub ciphertext: Vec<u8>,
    /// MUST be 24 bytes; carried as a `Vec` rather than `[u8; 24]` so a
    /// malformed wire nonce decodes into a normal value instead of a codec
    /// error, and the length check in `Sealer::open` (C3) has something to
    /// reject.
    #[serde(with = "serde_bytes")]
    pub nonce: Vec<u8>,
}

/// `(version, sig, kid)` — a detached signature plus the signing key's
/// identifier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignatureInfo {
    pub version: u32,
    #[serde(with = "serde_bytes")]
    pub sig: [u8; 64],
    #[serde(with = "serde_bytes")]
    pub kid: Vec<u8>,
}

/// Header plaintext, version 1. Duplicates the relevant `ClientHeader`
/// fields plus `body_hash` (binding header to body ciphertext, I2) plus an
/// optional detached signature over this same record with the signature
/// field nulled out.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeaderPlaintextV1 {
    pub client_header: ClientHeader,
    pub body_hash: [u8; 32],
    pub header_signature: Option<SignatureInfo>,
}

impl HeaderPlaintextV1 {
    /// The record that was actually signed: a copy of `self` with
    /// `header_signature` nulled out. Must be used both when signing and
    /// when verifying so both sides encode the identical bytes.
    pub fn signing_view(&self) -> HeaderPlaintextV1 {
        HeaderPlaintextV1 {
            client_header: self.client_header.clone(),
            body_hash: self.body_hash,
            header_signature: None,
        }
    }
}

/// An attachment reference. The core never inspects these bytes; they pass
/// through as part of `MessageBody`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttachmentObject {
    pub path: String,
    pub size: u64,
    pub mime_type: String,
}

/// The tagged union over message kinds. The core treats this opaquely
/// except to pass it through; it never branches on which variant it holds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum MessageBody {
    Text {
        text: String,
    },
    Attachment {
        object: AttachmentObject,
        preview: Option<AttachmentObject>,
        title: String,
    },
    Edit {
        message_id: MessageId,
        text: String,
    },
    Delete {
        message_ids: Vec<MessageId>,
    },
    Metadata {
        headline: Option<String>,
    },
    Reaction {
        message_id: MessageId,
        emoji: String,
    },
}

/// Body plaintext, version 1.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BodyPlaintextV1 {
    pub message_body: MessageBody,
}

/// The decoded form of a versioned header plaintext: either the one
/// version this core understands, or an opaque placeholder for a version
/// reserved for the future.
#[derive(Clone, Debug, PartialEq)]
pub enum VersionedHeader {
    V1(HeaderPlaintextV1),
    Unsupported { version: u32, critical: bool },
}

/// The decoded form of a versioned body plaintext.
#[derive(Clone, Debug, PartialEq)]
pub enum VersionedBody {
    V1(BodyPlaintextV1),
    Unsupported { version: u32, critical: bool },
}

/// The sealed, signed wire representation of a chat message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageBoxed {
    pub client_header: ClientHeader,
    pub header_ciphertext: SealedData,
    pub body_ciphertext: SealedData,
    pub server_header: Option<ServerHeader>,
    pub key_generation: u32,
}
