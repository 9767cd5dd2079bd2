//! Registry of live authenticated sessions.
//!
//! Pre-query opens batch decrypt sessions that later query and post-query
//! calls look up by challenge. The registry owns the sessions, so there is
//! no hidden global state, and dropping an entry releases the vault-side
//! resource through the session's own drop.

use std::sync::Mutex;

use subtle::ConstantTimeEq;
use tracing::debug;

use sealstore_common::{Error, Result};
use sealstore_crypto::{CipherSession, KeyId};

/// Holds at most `capacity` live sessions, keyed by their challenge.
pub struct SessionRegistry {
    sessions: Mutex<Vec<CipherSession>>,
    capacity: usize,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new(capacity: usize) -> Self {
        Self { sessions: Mutex::new(Vec::new()), capacity }
    }

    fn challenge_matches(session: &CipherSession, challenge: &[u8]) -> bool {
        let own = session.challenge();
        own.len() == challenge.len() && bool::from(own.ct_eq(challenge))
    }

    /// Register a session.
    ///
    /// Expired sessions are pruned first; their vault resources are released
    /// by dropping them.
    ///
    /// # Errors
    /// - `LimitExceeded` when the registry is full.
    pub fn add(&self, session: CipherSession) -> Result<()> {
        let mut sessions = self.sessions.lock().unwrap();
        sessions.retain(|s| !s.expired());
        if sessions.len() >= self.capacity {
            return Err(Error::LimitExceeded(
                "the number of authenticated sessions exceeds the upper limit".to_string(),
            ));
        }
        sessions.push(session);
        Ok(())
    }

    /// Decrypt `cipher` through the session matching `challenge` and `key`.
    ///
    /// # Errors
    /// - `NotFound` if no live session matches: the session expired or
    ///   pre-query was never called.
    /// - Errors of [`CipherSession::exec`] otherwise.
    pub fn exec(
        &self,
        challenge: &[u8],
        key: &KeyId,
        aad: &[u8],
        auth_token: &[u8],
        cipher: &[u8],
    ) -> Result<Vec<u8>> {
        let mut sessions = self.sessions.lock().unwrap();
        sessions.retain(|s| !s.expired());
        let session = sessions
            .iter()
            .find(|s| Self::challenge_matches(s, challenge) && s.key() == key)
            .ok_or_else(|| {
                Error::NotFound(
                    "no session matches the challenge; call pre-query first".to_string(),
                )
            })?;
        session.exec(aad, auth_token, cipher)
    }

    /// Drop every session matching `challenge`, releasing its vault
    /// resource. Unknown challenges are a no-op.
    pub fn remove(&self, challenge: &[u8]) {
        let mut sessions = self.sessions.lock().unwrap();
        sessions.retain(|s| !Self::challenge_matches(s, challenge));
        debug!(live = sessions.len(), "removed authenticated sessions");
    }

    /// Drop every session whose key is only usable while the device is
    /// unlocked. Called when the device locks.
    pub fn remove_device_locked(&self) {
        let mut sessions = self.sessions.lock().unwrap();
        sessions.retain(|s| {
            s.key().accessibility() != sealstore_common::Accessibility::DeviceUnlocked
        });
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    /// Whether no session is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use sealstore_common::{Accessibility, AuthType, ErrorCode};
    use sealstore_crypto::{encrypt, KeyVault, SecretKey, SoftwareVault};

    fn session_for(
        vault: &Arc<SoftwareVault>,
        owner: &[u8],
        accessibility: Accessibility,
    ) -> CipherSession {
        let key = SecretKey::new(0, owner, AuthType::Any, accessibility, false);
        key.generate(vault.as_ref()).unwrap();
        CipherSession::init(vault.clone() as Arc<dyn KeyVault>, key.id().clone(), 60).unwrap()
    }

    #[test]
    fn test_exec_through_registry() {
        let vault = Arc::new(SoftwareVault::new());
        let session = session_for(&vault, b"owner", Accessibility::DeviceUnlocked);
        let key = session.key().clone();
        let challenge = session.challenge().to_vec();

        let cipher = encrypt(vault.as_ref(), &key, b"aad", b"secret").unwrap();

        let registry = SessionRegistry::new(4);
        registry.add(session).unwrap();

        let token = vault.issue_auth_token(&challenge);
        let plain = registry.exec(&challenge, &key, b"aad", &token, &cipher).unwrap();
        assert_eq!(plain, b"secret");
    }

    #[test]
    fn test_unknown_challenge_is_not_found() {
        let vault = Arc::new(SoftwareVault::new());
        let session = session_for(&vault, b"owner", Accessibility::DeviceUnlocked);
        let key = session.key().clone();

        let registry = SessionRegistry::new(4);
        registry.add(session).unwrap();

        let err = registry
            .exec(&[0u8; 32], &key, b"aad", &[0u8; 148], &[0u8; 64])
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[test]
    fn test_capacity_limit() {
        let vault = Arc::new(SoftwareVault::new());
        let registry = SessionRegistry::new(1);
        registry
            .add(session_for(&vault, b"one", Accessibility::DeviceUnlocked))
            .unwrap();
        let err = registry
            .add(session_for(&vault, b"two", Accessibility::DeviceUnlocked))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::LimitExceeded);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let vault = Arc::new(SoftwareVault::new());
        let session = session_for(&vault, b"owner", Accessibility::DeviceUnlocked);
        let challenge = session.challenge().to_vec();

        let registry = SessionRegistry::new(4);
        registry.add(session).unwrap();
        assert_eq!(registry.len(), 1);

        registry.remove(&challenge);
        assert!(registry.is_empty());
        // Removing an already-removed challenge is a no-op, never a panic.
        registry.remove(&challenge);
    }

    #[test]
    fn test_lock_event_drops_unlocked_only_sessions() {
        let vault = Arc::new(SoftwareVault::new());
        let registry = SessionRegistry::new(4);
        registry
            .add(session_for(&vault, b"one", Accessibility::DeviceUnlocked))
            .unwrap();
        registry
            .add(session_for(&vault, b"two", Accessibility::DeviceFirstUnlocked))
            .unwrap();

        registry.remove_device_locked();
        assert_eq!(registry.len(), 1);
    }
}
