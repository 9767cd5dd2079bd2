//! Key lifecycle: generation, deletion, existence and alias renaming.

use tracing::info;

use sealstore_common::{Accessibility, AuthType, Result};

use crate::identity::{derive_alias, KeyId, PRIMARY_USER_ID};
use crate::translate::translate;
use crate::vault::{KeyPolicy, KeyVault, VaultError};

/// Attributes of one vault key, excluding the key material itself.
///
/// A `SecretKey` is resolved from an owner's access-policy combination; keys
/// with equal inputs always resolve to the same vault key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretKey {
    id: KeyId,
    auth_type: AuthType,
    require_password_set: bool,
}

impl SecretKey {
    /// Resolve the key for `(user, owner, auth_type, accessibility,
    /// require_password_set)`.
    pub fn new(
        user_id: u32,
        owner: &[u8],
        auth_type: AuthType,
        accessibility: Accessibility,
        require_password_set: bool,
    ) -> Self {
        let alias = derive_alias(user_id, owner, auth_type, accessibility, require_password_set);
        let id = KeyId::resolve(user_id, alias, accessibility);
        Self { id, auth_type, require_password_set }
    }

    /// The resolved key identity.
    pub fn id(&self) -> &KeyId {
        &self.id
    }

    /// Whether decryption with this key requires user authentication.
    pub fn needs_auth(&self) -> bool {
        self.auth_type == AuthType::Any
    }

    /// Whether this key is only usable while the device is unlocked.
    pub fn needs_device_unlocked(&self) -> bool {
        self.id.accessibility() == Accessibility::DeviceUnlocked
    }

    fn policy(&self) -> KeyPolicy {
        KeyPolicy {
            needs_auth: self.needs_auth(),
            requires_password_set: self.require_password_set,
            user_scope: (self.id.user_id() != PRIMARY_USER_ID).then(|| self.id.user_id()),
        }
    }

    /// Generate the key in the vault.
    ///
    /// # Errors
    /// - `StatusMismatch` if the key requires a lock-screen credential and
    ///   none is enrolled.
    /// - Translated vault errors otherwise.
    pub fn generate(&self, vault: &dyn KeyVault) -> Result<()> {
        vault
            .generate_key(&self.id, &self.policy())
            .map_err(|e| translate(e, "generate key"))?;
        info!(tier = ?self.id.tier(), needs_auth = self.needs_auth(), "generated secret key");
        Ok(())
    }

    /// Whether the key exists in the vault.
    pub fn exists(&self, vault: &dyn KeyVault) -> Result<bool> {
        vault.key_exists(&self.id).map_err(|e| translate(e, "check key"))
    }

    /// Generate the key if it does not exist yet.
    pub fn ensure(&self, vault: &dyn KeyVault) -> Result<()> {
        if !self.exists(vault)? {
            self.generate(vault)?;
        }
        Ok(())
    }

    /// Delete the key. Deleting an absent key is not an error.
    pub fn delete(&self, vault: &dyn KeyVault) -> Result<()> {
        match vault.delete_key(&self.id) {
            Ok(()) | Err(VaultError::NotFound) => Ok(()),
            Err(e) => Err(translate(e, "delete key")),
        }
    }

    /// Copy the key material to `new_alias` in the same tier.
    ///
    /// The old alias stays valid; callers that want a move must delete it
    /// separately.
    pub fn rename_alias(&self, vault: &dyn KeyVault, new_alias: &[u8]) -> Result<()> {
        vault
            .rename_key_alias(&self.id, new_alias)
            .map_err(|e| translate(e, "rename key alias"))
    }

    /// Delete every policy combination of an owner's keys.
    ///
    /// Used when an owner is removed: each accessibility, auth-type and
    /// password-requirement combination resolves to its own key, and all of
    /// them are swept. The first failure is reported after the sweep
    /// completes.
    pub fn delete_all_for_owner(vault: &dyn KeyVault, user_id: u32, owner: &[u8]) -> Result<()> {
        let mut result = Ok(());
        for accessibility in [
            Accessibility::DevicePowerOn,
            Accessibility::DeviceFirstUnlocked,
            Accessibility::DeviceUnlocked,
        ] {
            for auth_type in [AuthType::None, AuthType::Any] {
                for require_password_set in [false, true] {
                    let key =
                        SecretKey::new(user_id, owner, auth_type, accessibility, require_password_set);
                    if let Err(e) = key.delete(vault) {
                        result = Err(e);
                    }
                }
            }
        }
        result
    }
}
