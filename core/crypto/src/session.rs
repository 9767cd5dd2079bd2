//! AEAD protocols on top of the key vault.
//!
//! Two protocols share the same ciphertext layout
//! (`ciphertext ‖ tag ‖ nonce`): single-shot encrypt/decrypt for secrets
//! released without user interaction, and the Init → Exec → Drop batch
//! protocol for secrets whose release requires a fresh user-presence proof.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use sealstore_common::{Error, Result};

use crate::identity::KeyId;
use crate::translate::translate;
use crate::vault::{CryptoParams, KeyVault, OpPolicy, Purpose, NONCE_LEN, TAG_LEN};

/// Slice the `tag ‖ nonce` trailer off a ciphertext.
///
/// Inputs that cannot even hold the trailers are a caller error, not a
/// crypto-layer fault.
fn split_layout(input: &[u8]) -> Result<(&[u8], &[u8], &[u8])> {
    if input.len() <= TAG_LEN + NONCE_LEN {
        return Err(Error::InvalidArgument(format!(
            "ciphertext of [{}] bytes cannot hold the {TAG_LEN}-byte tag and {NONCE_LEN}-byte nonce",
            input.len()
        )));
    }
    let nonce_at = input.len() - NONCE_LEN;
    let tag_at = nonce_at - TAG_LEN;
    Ok((&input[..tag_at], &input[tag_at..nonce_at], &input[nonce_at..]))
}

fn require_aad(aad: &[u8]) -> Result<()> {
    // Callers always authenticate at least an identity marker; an empty AAD
    // is a programming error, not a degenerate case.
    if aad.is_empty() {
        return Err(Error::InvalidArgument("associated data must not be empty".to_string()));
    }
    Ok(())
}

/// Encrypt `plaintext` under the identified key.
///
/// One init-then-finish round trip against the vault, with no externally
/// observable intermediate state. The result is laid out
/// `ciphertext ‖ tag ‖ nonce`.
///
/// # Errors
/// - `InvalidArgument` if `aad` is empty.
/// - Translated vault errors otherwise.
pub fn encrypt(vault: &dyn KeyVault, key: &KeyId, aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    require_aad(aad)?;
    let (handle, _) = vault
        .init(key, &OpPolicy::single_shot(Purpose::Encrypt))
        .map_err(|e| translate(e, "encrypt init"))?;
    vault
        .update_or_finish(&handle, &CryptoParams { aad, ..Default::default() }, plaintext, true)
        .map_err(|e| translate(e, "encrypt finish"))
}

/// Decrypt a `ciphertext ‖ tag ‖ nonce` payload under the identified key.
///
/// # Errors
/// - `InvalidArgument` if `aad` is empty or the input cannot hold the
///   trailers.
/// - Translated vault errors otherwise (a tampered payload surfaces as
///   `DataCorrupted`).
pub fn decrypt(vault: &dyn KeyVault, key: &KeyId, aad: &[u8], cipher: &[u8]) -> Result<Vec<u8>> {
    require_aad(aad)?;
    let (body, tag, nonce) = split_layout(cipher)?;
    let (handle, _) = vault
        .init(key, &OpPolicy::single_shot(Purpose::Decrypt))
        .map_err(|e| translate(e, "decrypt init"))?;
    vault
        .update_or_finish(
            &handle,
            &CryptoParams { aad, nonce: Some(nonce), tag: Some(tag), auth_token: None },
            body,
            true,
        )
        .map_err(|e| translate(e, "decrypt finish"))
}

/// One in-flight authenticated batch decryption.
///
/// Owning the session is owning the vault-side resource: the handle is not
/// copyable, exec is only reachable while the value lives, and dropping the
/// value releases the vault operation exactly once. This makes
/// exec-after-drop and forgotten or double releases unrepresentable.
pub struct CipherSession {
    vault: Arc<dyn KeyVault>,
    key: KeyId,
    handle: Vec<u8>,
    challenge: Vec<u8>,
    expires_at: Instant,
    released: bool,
}

impl CipherSession {
    /// Open a decrypt-purpose batch operation with a bounded validity
    /// window.
    ///
    /// The returned session holds the vault challenge to relay to the
    /// out-of-band user-authentication step.
    ///
    /// # Errors
    /// - Translated vault errors; on failure no vault-side resource is left
    ///   behind.
    pub fn init(vault: Arc<dyn KeyVault>, key: KeyId, validity_secs: u32) -> Result<Self> {
        let (handle, challenge) = vault
            .init(&key, &OpPolicy::batch_decrypt(validity_secs))
            .map_err(|e| translate(e, "session init"))?;
        debug!(validity_secs, "opened batch decrypt session");
        Ok(Self {
            vault,
            key,
            handle,
            challenge,
            expires_at: Instant::now() + Duration::from_secs(u64::from(validity_secs)),
            released: false,
        })
    }

    /// The key this session operates on.
    pub fn key(&self) -> &KeyId {
        &self.key
    }

    /// The anti-replay challenge issued by the vault.
    pub fn challenge(&self) -> &[u8] {
        &self.challenge
    }

    /// Whether the session's validity window has elapsed.
    ///
    /// Advisory only: the vault enforces the window itself, this is for
    /// registry housekeeping.
    pub fn expired(&self) -> bool {
        Instant::now() > self.expires_at
    }

    /// Decrypt one `ciphertext ‖ tag ‖ nonce` payload.
    ///
    /// May be called repeatedly while the session lives; every call consumes
    /// a fresh auth token. A vault failure leaves the handle unusable but
    /// the session must still be dropped (or [`release`](Self::release)d).
    ///
    /// # Errors
    /// - `InvalidArgument` if `aad` is empty or the input cannot hold the
    ///   trailers.
    /// - `AccessDenied` if the vault rejects the auth token or the validity
    ///   window has elapsed.
    pub fn exec(&self, aad: &[u8], auth_token: &[u8], cipher: &[u8]) -> Result<Vec<u8>> {
        require_aad(aad)?;
        let (body, tag, nonce) = split_layout(cipher)?;
        self.vault
            .update_or_finish(
                &self.handle,
                &CryptoParams {
                    aad,
                    nonce: Some(nonce),
                    tag: Some(tag),
                    auth_token: Some(auth_token),
                },
                body,
                false,
            )
            .map_err(|e| translate(e, "session exec"))
    }

    /// Release the vault-side resource, reporting the outcome.
    ///
    /// Dropping the session releases it as well; this variant exists for
    /// callers that want the error instead of a log line.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.vault
            .update_or_finish(&self.handle, &CryptoParams::default(), &[], true)
            .map(|_| ())
            .map_err(|e| translate(e, "session release"))
    }
}

impl Drop for CipherSession {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(err) =
            self.vault.update_or_finish(&self.handle, &CryptoParams::default(), &[], true)
        {
            warn!(error = %err, "failed to release vault session");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::SecretKey;
    use crate::software::{SoftwareVault, AUTH_TOKEN_LEN};
    use crate::vault::VaultError;
    use proptest::prelude::*;
    use sealstore_common::{Accessibility, AuthType, ErrorCode};

    fn plain_key(vault: &SoftwareVault) -> KeyId {
        let key = SecretKey::new(0, b"owner", AuthType::None, Accessibility::DevicePowerOn, false);
        key.generate(vault).unwrap();
        key.id().clone()
    }

    fn auth_key(vault: &SoftwareVault) -> KeyId {
        let key = SecretKey::new(0, b"a", AuthType::Any, Accessibility::DeviceUnlocked, false);
        key.generate(vault).unwrap();
        key.id().clone()
    }

    #[test]
    fn test_round_trip() {
        let vault = SoftwareVault::new();
        let key = plain_key(&vault);

        let cipher = encrypt(&vault, &key, b"aad", b"hunter2").unwrap();
        assert_eq!(cipher.len(), b"hunter2".len() + TAG_LEN + NONCE_LEN);
        let plain = decrypt(&vault, &key, b"aad", &cipher).unwrap();
        assert_eq!(plain, b"hunter2");
    }

    #[test]
    fn test_mismatched_aad_is_data_corrupted() {
        let vault = SoftwareVault::new();
        let key = plain_key(&vault);

        let cipher = encrypt(&vault, &key, b"aad", b"hunter2").unwrap();
        let err = decrypt(&vault, &key, b"other", &cipher).unwrap_err();
        assert_eq!(err.code(), ErrorCode::DataCorrupted);
    }

    #[test]
    fn test_empty_aad_is_rejected() {
        let vault = SoftwareVault::new();
        let key = plain_key(&vault);
        assert!(encrypt(&vault, &key, b"", b"x").is_err());
        assert!(decrypt(&vault, &key, b"", &[0; 64]).is_err());
    }

    #[test]
    fn test_short_ciphertext_is_caller_error() {
        let vault = SoftwareVault::new();
        let key = plain_key(&vault);
        // Exactly tag + nonce leaves no room for ciphertext.
        let err = decrypt(&vault, &key, b"aad", &[0u8; TAG_LEN + NONCE_LEN]).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
    }

    #[test]
    fn test_session_end_to_end() {
        let vault = Arc::new(SoftwareVault::new());
        let key = auth_key(&vault);

        let cipher = encrypt(vault.as_ref(), &key, b"aad", b"guarded").unwrap();

        let session = CipherSession::init(vault.clone(), key, 60).unwrap();
        assert_eq!(session.challenge().len(), 32);
        assert!(!session.handle.is_empty());

        // A forged token is an authentication failure, not a malformed call.
        let forged = vec![0u8; AUTH_TOKEN_LEN];
        let err = session.exec(b"aad", &forged, &cipher).unwrap_err();
        assert_eq!(err.code(), ErrorCode::AccessDenied);

        // Drop still releases the vault-side resource.
        drop(session);
    }

    #[test]
    fn test_session_exec_with_genuine_token() {
        let vault = Arc::new(SoftwareVault::new());
        let key = auth_key(&vault);
        let cipher = encrypt(vault.as_ref(), &key, b"aad", b"guarded").unwrap();

        let session = CipherSession::init(vault.clone(), key, 60).unwrap();
        let token = vault.issue_auth_token(session.challenge());
        let plain = session.exec(b"aad", &token, &cipher).unwrap();
        assert_eq!(plain, b"guarded");

        // Exec does not consume the session; a second exec with a fresh
        // token still works.
        let token = vault.issue_auth_token(session.challenge());
        let plain = session.exec(b"aad", &token, &cipher).unwrap();
        assert_eq!(plain, b"guarded");

        session.release().unwrap();
    }

    #[test]
    fn test_new_init_yields_new_challenge() {
        let vault = Arc::new(SoftwareVault::new());
        let key = auth_key(&vault);

        let first = CipherSession::init(vault.clone(), key.clone(), 60).unwrap();
        let second = CipherSession::init(vault.clone(), key, 60).unwrap();
        assert_ne!(first.challenge(), second.challenge());
    }

    #[test]
    fn test_release_consumes_the_vault_handle() {
        let vault = Arc::new(SoftwareVault::new());
        let key = auth_key(&vault);

        let session = CipherSession::init(vault.clone(), key, 60).unwrap();
        let handle = session.handle.clone();
        session.release().unwrap();

        // The handle is gone vault-side; nothing can be executed against it.
        let err = vault
            .update_or_finish(&handle, &CryptoParams::default(), b"x", false)
            .unwrap_err();
        assert_eq!(err, VaultError::NotFound);
    }

    proptest! {
        #[test]
        fn prop_round_trip(plaintext in proptest::collection::vec(any::<u8>(), 1..512),
                           aad in proptest::collection::vec(any::<u8>(), 1..64)) {
            let vault = SoftwareVault::new();
            let key = plain_key(&vault);
            let cipher = encrypt(&vault, &key, &aad, &plaintext).unwrap();
            let plain = decrypt(&vault, &key, &aad, &cipher).unwrap();
            prop_assert_eq!(plain, plaintext);
        }
    }
}
