//! In-memory software vault.
//!
//! A reference [`KeyVault`] implementation for development and tests. All
//! key material lives in process memory and is lost on drop; the device
//! lock-screen credential and the out-of-band user-authentication step are
//! simulated so the full stack is exercisable without hardware.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::identity::{KeyId, StorageTier};
use crate::vault::{
    CryptoParams, KeyPolicy, KeyVault, OpPolicy, Purpose, VaultError, VaultResult, CHALLENGE_LEN,
    NONCE_LEN, TAG_LEN,
};

/// Length of a simulated user-authentication token, in bytes.
pub const AUTH_TOKEN_LEN: usize = 148;

const KEY_LEN: usize = 32;
const HANDLE_LEN: usize = 8;

struct KeyEntry {
    material: Zeroizing<Vec<u8>>,
    needs_auth: bool,
}

struct SessionEntry {
    material: Zeroizing<Vec<u8>>,
    purpose: Purpose,
    batch: bool,
    needs_auth: bool,
    challenge: Vec<u8>,
    expires_at: Option<Instant>,
    poisoned: bool,
}

/// In-memory key vault.
pub struct SoftwareVault {
    keys: Mutex<HashMap<(StorageTier, Vec<u8>), KeyEntry>>,
    sessions: Mutex<HashMap<u64, SessionEntry>>,
    next_handle: AtomicU64,
    token_secret: Zeroizing<Vec<u8>>,
    password_enrolled: AtomicBool,
}

impl SoftwareVault {
    /// Create an empty vault with a lock-screen credential enrolled.
    pub fn new() -> Self {
        let mut secret = vec![0u8; KEY_LEN];
        OsRng.fill_bytes(&mut secret);
        Self {
            keys: Mutex::new(HashMap::new()),
            sessions: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
            token_secret: Zeroizing::new(secret),
            password_enrolled: AtomicBool::new(true),
        }
    }

    /// Simulate enrolling or removing the device lock-screen credential.
    pub fn set_password_enrolled(&self, enrolled: bool) {
        self.password_enrolled.store(enrolled, Ordering::SeqCst);
    }

    /// Simulate the out-of-band user-authentication step: produce the token
    /// a successful PIN/biometric verification would yield for `challenge`.
    pub fn issue_auth_token(&self, challenge: &[u8]) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(&*self.token_secret);
        hasher.update(challenge);
        let mut token = hasher.finalize().to_vec();
        token.resize(AUTH_TOKEN_LEN, 0);
        token
    }

    fn verify_auth_token(&self, challenge: &[u8], token: &[u8]) -> bool {
        let expected = self.issue_auth_token(challenge);
        token.len() == expected.len() && bool::from(token.ct_eq(&expected))
    }

    fn parse_handle(handle: &[u8]) -> VaultResult<u64> {
        let bytes: [u8; HANDLE_LEN] =
            handle.try_into().map_err(|_| VaultError::InvalidArgument)?;
        Ok(u64::from_le_bytes(bytes))
    }

    fn seal(material: &[u8], aad: &[u8], plaintext: &[u8]) -> VaultResult<Vec<u8>> {
        let cipher = Aes256Gcm::new_from_slice(material).map_err(|_| VaultError::Corrupted)?;
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let mut out = cipher
            .encrypt(Nonce::from_slice(&nonce), Payload { msg: plaintext, aad })
            .map_err(|_| VaultError::Corrupted)?;
        out.extend_from_slice(&nonce);
        Ok(out)
    }

    fn open(
        material: &[u8],
        params: &CryptoParams,
        ciphertext: &[u8],
    ) -> VaultResult<Vec<u8>> {
        let (Some(nonce), Some(tag)) = (params.nonce, params.tag) else {
            return Err(VaultError::InvalidArgument);
        };
        if nonce.len() != NONCE_LEN || tag.len() != TAG_LEN {
            return Err(VaultError::InvalidArgument);
        }

        let cipher = Aes256Gcm::new_from_slice(material).map_err(|_| VaultError::Corrupted)?;
        let mut sealed = Vec::with_capacity(ciphertext.len() + TAG_LEN);
        sealed.extend_from_slice(ciphertext);
        sealed.extend_from_slice(tag);

        cipher
            .decrypt(Nonce::from_slice(nonce), Payload { msg: &sealed, aad: params.aad })
            .map_err(|_| VaultError::Corrupted)
    }
}

impl Default for SoftwareVault {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyVault for SoftwareVault {
    fn generate_key(&self, id: &KeyId, policy: &KeyPolicy) -> VaultResult<()> {
        if policy.requires_password_set && !self.password_enrolled.load(Ordering::SeqCst) {
            return Err(VaultError::CredentialUnset);
        }

        let mut material = Zeroizing::new(vec![0u8; KEY_LEN]);
        OsRng.fill_bytes(&mut material);

        self.keys.lock().unwrap().insert(
            (id.tier(), id.alias().to_vec()),
            KeyEntry { material, needs_auth: policy.needs_auth },
        );
        Ok(())
    }

    fn delete_key(&self, id: &KeyId) -> VaultResult<()> {
        match self.keys.lock().unwrap().remove(&(id.tier(), id.alias().to_vec())) {
            Some(_) => Ok(()),
            None => Err(VaultError::NotFound),
        }
    }

    fn key_exists(&self, id: &KeyId) -> VaultResult<bool> {
        Ok(self
            .keys
            .lock()
            .unwrap()
            .contains_key(&(id.tier(), id.alias().to_vec())))
    }

    fn init(&self, id: &KeyId, op: &OpPolicy) -> VaultResult<(Vec<u8>, Vec<u8>)> {
        let keys = self.keys.lock().unwrap();
        let entry = keys
            .get(&(id.tier(), id.alias().to_vec()))
            .ok_or(VaultError::NotFound)?;

        // An auth-bound key can only be decrypted through a batch operation
        // carrying the matching token.
        if entry.needs_auth && op.purpose == Purpose::Decrypt && !op.batch {
            return Err(VaultError::AuthFailed);
        }

        let mut challenge = Vec::new();
        if entry.needs_auth && op.batch {
            challenge = vec![0u8; CHALLENGE_LEN];
            OsRng.fill_bytes(&mut challenge);
        }

        let session = SessionEntry {
            material: entry.material.clone(),
            purpose: op.purpose,
            batch: op.batch,
            needs_auth: entry.needs_auth,
            challenge: challenge.clone(),
            expires_at: op
                .validity_secs
                .filter(|_| op.batch)
                .map(|secs| Instant::now() + Duration::from_secs(u64::from(secs))),
            poisoned: false,
        };
        drop(keys);

        let raw = self.next_handle.fetch_add(1, Ordering::SeqCst);
        self.sessions.lock().unwrap().insert(raw, session);
        Ok((raw.to_le_bytes().to_vec(), challenge))
    }

    fn update_or_finish(
        &self,
        handle: &[u8],
        params: &CryptoParams,
        input: &[u8],
        last: bool,
    ) -> VaultResult<Vec<u8>> {
        let raw = Self::parse_handle(handle)?;
        let mut sessions = self.sessions.lock().unwrap();

        if last {
            let session = sessions.remove(&raw).ok_or(VaultError::NotFound)?;
            drop(sessions);

            // An empty terminal input is a pure release.
            if input.is_empty() {
                return Ok(Vec::new());
            }
            match session.purpose {
                Purpose::Encrypt => Self::seal(&session.material, params.aad, input),
                Purpose::Decrypt => Self::open(&session.material, params, input),
            }
        } else {
            let session = sessions.get_mut(&raw).ok_or(VaultError::NotFound)?;
            if !session.batch || session.poisoned {
                return Err(VaultError::InvalidArgument);
            }
            if session.expires_at.is_some_and(|at| Instant::now() > at) {
                session.poisoned = true;
                return Err(VaultError::SessionExpired);
            }
            if session.needs_auth {
                let authorized = params
                    .auth_token
                    .is_some_and(|token| self.verify_auth_token(&session.challenge, token));
                if !authorized {
                    session.poisoned = true;
                    return Err(VaultError::AuthFailed);
                }
            }

            let material = session.material.clone();
            let purpose = session.purpose;
            drop(sessions);

            match purpose {
                Purpose::Encrypt => Self::seal(&material, params.aad, input),
                Purpose::Decrypt => Self::open(&material, params, input),
            }
        }
    }

    fn rename_key_alias(&self, id: &KeyId, new_alias: &[u8]) -> VaultResult<()> {
        let mut keys = self.keys.lock().unwrap();
        let entry = keys
            .get(&(id.tier(), id.alias().to_vec()))
            .ok_or(VaultError::NotFound)?;
        let copy = KeyEntry { material: entry.material.clone(), needs_auth: entry.needs_auth };
        keys.insert((id.tier(), new_alias.to_vec()), copy);
        Ok(())
    }
}
