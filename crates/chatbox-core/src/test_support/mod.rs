//! Test-only fakes for the collaborator traits, grounded on
//! `zrc-core::harness`'s `AutoApprove`-style fakes: small, deterministic
//! stand-ins driven by a fixed table rather than a real backend.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chatbox_wire::types::{ConvId, CryptKey, DeviceId, MerkleRoot, MessageId, Uid};

use crate::collaborators::{
    Collaborators, DeviceInfo, KeyFinder, KeyFinderResult, KidCheck, MerkleClient, ReplayGuard,
    ReplayGuardError, UserLoader,
};
use crate::errors::TransientError;

/// Always resolves to a fixed key list, under whatever name it's asked
/// about (no TLF-name aliasing simulated).
pub struct FakeKeyFinder {
    pub crypt_keys: Vec<CryptKey>,
}

impl FakeKeyFinder {
    pub fn single_key(key: [u8; 32]) -> Self {
        FakeKeyFinder {
            crypt_keys: vec![CryptKey { generation: 1, key }],
        }
    }
}

#[async_trait]
impl KeyFinder for FakeKeyFinder {
    async fn find(&self, tlf_name: &str, _public: bool) -> Result<KeyFinderResult, TransientError> {
        Ok(KeyFinderResult {
            canonical_name: tlf_name.to_string(),
            crypt_keys: self.crypt_keys.clone(),
        })
    }
}

/// Always fails, for exercising the rekey-needed transient path.
pub struct FailingKeyFinder;

#[async_trait]
impl KeyFinder for FailingKeyFinder {
    async fn find(&self, _tlf_name: &str, _public: bool) -> Result<KeyFinderResult, TransientError> {
        Err(TransientError::CryptKeysFailed("simulated outage".into()))
    }
}

/// A user loader whose kid checks come from a table set by the test, so
/// revocation branches can be exercised deliberately instead of by wiring
/// up a real identity server.
#[derive(Default)]
pub struct FakeUserLoader {
    kid_checks: Mutex<HashMap<Vec<u8>, KidCheck>>,
    usernames: Mutex<HashMap<Uid, String>>,
}

impl FakeUserLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_username(&self, uid: Uid, username: &str) {
        self.usernames.lock().unwrap().insert(uid, username.to_string());
    }

    pub fn set_kid_check(&self, kid: &[u8], check: KidCheck) {
        self.kid_checks.lock().unwrap().insert(kid.to_vec(), check);
    }
}

#[async_trait]
impl UserLoader for FakeUserLoader {
    async fn lookup_username_and_device(&self, uid: Uid, _device: DeviceId) -> Result<DeviceInfo, TransientError> {
        let username = self.usernames.lock().unwrap().get(&uid).cloned().unwrap_or_else(|| "unknown".into());
        Ok(DeviceInfo {
            username,
            device_name: "test-device".into(),
            device_type: "desktop".into(),
        })
    }

    async fn lookup_username(&self, uid: Uid) -> Result<String, TransientError> {
        Ok(self.usernames.lock().unwrap().get(&uid).cloned().unwrap_or_else(|| "unknown".into()))
    }

    async fn check_kid_for_uid(&self, _uid: Uid, kid: &[u8]) -> Result<KidCheck, TransientError> {
        Ok(self.kid_checks.lock().unwrap().get(kid).cloned().unwrap_or(KidCheck {
            found: true,
            deleted: false,
            revoked_at: None,
            valid_at_ctime: true,
        }))
    }
}

/// Always returns the same fixed root.
pub struct FakeMerkleClient {
    pub root: Option<MerkleRoot>,
}

#[async_trait]
impl MerkleClient for FakeMerkleClient {
    async fn last_root_info(&self) -> Result<Option<MerkleRoot>, String> {
        Ok(self.root.clone())
    }
}

/// A Merkle client that always fails, for exercising the permanent
/// `MerkleRootFailed` box-time error (spec.md 4.5 step 5).
pub struct FailingMerkleClient;

#[async_trait]
impl MerkleClient for FailingMerkleClient {
    async fn last_root_info(&self) -> Result<Option<MerkleRoot>, String> {
        Err("simulated merkle outage".into())
    }
}

/// An in-memory replay guard enforcing the same invariants a persistent
/// index would (I4/I5), scoped per conversation.
#[derive(Default)]
pub struct FakeReplayGuard {
    body_hashes: Mutex<HashSet<(ConvId, [u8; 32])>>,
    header_hashes: Mutex<HashMap<(ConvId, MessageId), [u8; 32]>>,
}

impl FakeReplayGuard {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReplayGuard for FakeReplayGuard {
    async fn check_and_record_body_hash(
        &self,
        conv_id: ConvId,
        body_hash: [u8; 32],
        _message_id: MessageId,
    ) -> Result<(), ReplayGuardError> {
        let mut seen = self.body_hashes.lock().unwrap();
        if !seen.insert((conv_id, body_hash)) {
            return Err(ReplayGuardError::DuplicateBodyHash);
        }
        Ok(())
    }

    async fn check_and_record_header(
        &self,
        conv_id: ConvId,
        message_id: MessageId,
        header_hash: [u8; 32],
    ) -> Result<(), ReplayGuardError> {
        let mut seen = self.header_hashes.lock().unwrap();
        match seen.get(&(conv_id, message_id)) {
            Some(existing) if *existing != header_hash => Err(ReplayGuardError::DuplicateHeaderHash),
            Some(_) => Ok(()),
            None => {
                seen.insert((conv_id, message_id), header_hash);
                Ok(())
            }
        }
    }

    async fn check_prev_pointer(
        &self,
        conv_id: ConvId,
        prev_id: MessageId,
        prev_header_hash: [u8; 32],
    ) -> Result<(), ReplayGuardError> {
        let seen = self.header_hashes.lock().unwrap();
        match seen.get(&(conv_id, prev_id)) {
            Some(existing) if *existing == prev_header_hash => Ok(()),
            Some(_) => Err(ReplayGuardError::PrevHashMismatch { id: prev_id }),
            None => Ok(()),
        }
    }
}

/// A ready-made `Collaborators` bundle wired from the fakes above, for
/// tests that don't care about the specific wiring.
pub fn default_collaborators(key: [u8; 32]) -> Collaborators {
    Collaborators {
        key_finder: Arc::new(FakeKeyFinder::single_key(key)),
        user_loader: Arc::new(FakeUserLoader::new()),
        merkle_client: Arc::new(FakeMerkleClient { root: None }),
        replay_guard: Arc::new(FakeReplayGuard::new()),
    }
}
