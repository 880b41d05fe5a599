//! Deterministic MessagePack encode/decode (C1).
//!
//! Encoding is used for signed bytes, so it must be byte-identical for
//! byte-identical inputs: named-map MessagePack encodes struct fields in
//! their declaration order, never a randomized map order, so this holds by
//! construction.
//!
//! Version dispatch (spec.md 4.7, "Codec extension preservation"): header
//! and body plaintexts are wrapped in a small envelope carrying the version
//! tag and a `critical` bit before sealing. A decoder that doesn't
//! recognize the inner version doesn't attempt to parse the payload at all
//! — it just reports `{version, critical}` to the caller, which is enough
//! for the unbox pipeline's "unsupported version" escape (spec.md 4.6.1
//! step 7/8) without needing to round-trip the unknown payload bytes
//! anywhere downstream.

use serde::{de::DeserializeOwned, Serialize};

use crate::types::{BodyPlaintextV1, HeaderPlaintextV1, VersionedBody, VersionedHeader};

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("encode failed: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    #[error("decode failed: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

const HEADER_VERSION: u32 = 1;
const BODY_VERSION: u32 = 1;

#[derive(Serialize, serde::Deserialize)]
struct WireVersioned {
    version: u32,
    critical: bool,
    #[serde(with = "serde_bytes")]
    payload: Vec<u8>,
}

/// Encode any record with the deterministic named-map MessagePack codec.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, WireError> {
    Ok(rmp_serde::to_vec_named(value)?)
}

/// Decode any record with the deterministic named-map MessagePack codec.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, WireError> {
    Ok(rmp_serde::from_slice(bytes)?)
}

/// Wrap and encode a header plaintext V1 record as the versioned envelope
/// that gets sealed.
pub fn encode_header_v1(header: &HeaderPlaintextV1) -> Result<Vec<u8>, WireError> {
    let payload = encode(header)?;
    encode(&WireVersioned {
        version: HEADER_VERSION,
        critical: false,
        payload,
    })
}

/// Decode a versioned header plaintext envelope, preserving unknown
/// versions as `Unsupported`.
pub fn decode_header(bytes: &[u8]) -> Result<VersionedHeader, WireError> {
    let wire: WireVersioned = decode(bytes)?;
    if wire.version == HEADER_VERSION {
        let v1: HeaderPlaintextV1 = decode(&wire.payload)?;
        Ok(VersionedHeader::V1(v1))
    } else {
        Ok(VersionedHeader::Unsupported {
            version: wire.version,
            critical: wire.critical,
        })
    }
}

/// Wrap and encode a body plaintext V1 record as the versioned envelope
/// that gets sealed.
pub fn encode_body_v1(body: &BodyPlaintextV1) -> Result<Vec<u8>, WireError> {
    let payload = encode(body)?;
    encode(&WireVersioned {
        version: BODY_VERSION,
        critical: false,
        payload,
    })
}

/// Decode a versioned body plaintext envelope, preserving unknown versions
/// as `Unsupported`.
pub fn decode_body(bytes: &[u8]) -> Result<VersionedBody, WireError> {
    let wire: WireVersioned = decode(bytes)?;
    if wire.version == BODY_VERSION {
        let v1: BodyPlaintextV1 = decode(&wire.payload)?;
        Ok(VersionedBody::V1(v1))
    } else {
        Ok(VersionedBody::Unsupported {
            version: wire.version,
            critical: wire.critical,
        })
    }
}

/// Build a reserved-but-unimplemented header envelope, for tests that need
/// to exercise the "unsupported version" escape.
pub fn encode_unsupported_header(version: u32, critical: bool) -> Result<Vec<u8>, WireError> {
    encode(&WireVersioned {
        version,
        critical,
        payload: Vec::new(),
    })
}

/// Build a reserved-but-unimplemented body envelope, for tests that need to
/// exercise the "unsupported version" escape.
pub fn encode_unsupported_body(version: u32, critical: bool) -> Result<Vec<u8>, WireError> {
    encode(&WireVersioned {
        version,
        critical,
        payload: Vec::new(),
    })
}
