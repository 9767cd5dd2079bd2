//! Key identity: durable key handles and storage-tier policy.

use sha2::{Digest, Sha256};

use sealstore_common::{Accessibility, AuthType};

/// The primary user. Its keys are vault-global; any other user id carries an
/// explicit scope parameter into the vault.
pub const PRIMARY_USER_ID: u32 = 0;

/// The vault-internal isolation class a key is created under.
///
/// Derived from the record's accessibility. The mapping defaults to the
/// strictest tier: a raw accessibility value this revision does not know is
/// never allowed to land in a looser tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageTier {
    /// Available from device power-on.
    DeviceEncrypted,

    /// Available after the first unlock since boot.
    CredentialEncrypted,

    /// Available only while the device is unlocked.
    EnhancedCredentialEncrypted,
}

impl StorageTier {
    /// Map a raw accessibility value onto a tier, strictest-by-default.
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => StorageTier::DeviceEncrypted,
            1 => StorageTier::CredentialEncrypted,
            _ => StorageTier::EnhancedCredentialEncrypted,
        }
    }
}

impl From<Accessibility> for StorageTier {
    fn from(accessibility: Accessibility) -> Self {
        StorageTier::from_raw(accessibility as u32)
    }
}

/// Durable identity of one vault key.
///
/// A pure lookup key: it owns no runtime resources, and two `KeyId`s with
/// equal fields resolve to the same underlying vault key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyId {
    user_id: u32,
    alias: Vec<u8>,
    accessibility: Accessibility,
}

impl KeyId {
    /// Resolve the key identity for `(user, alias, accessibility)`.
    pub fn resolve(user_id: u32, alias: Vec<u8>, accessibility: Accessibility) -> Self {
        Self { user_id, alias, accessibility }
    }

    /// The owning user.
    pub fn user_id(&self) -> u32 {
        self.user_id
    }

    /// The key alias bytes.
    pub fn alias(&self) -> &[u8] {
        &self.alias
    }

    /// The accessibility the key was resolved for.
    pub fn accessibility(&self) -> Accessibility {
        self.accessibility
    }

    /// The storage tier the key lives in.
    pub fn tier(&self) -> StorageTier {
        StorageTier::from(self.accessibility)
    }
}

fn append_policy_component(label: &str, value: u32, input: &mut Vec<u8>) {
    // Default-valued components stay out of the digest so that aliases
    // derived by older revisions keep resolving to the same key.
    if value != 0 {
        input.push(b'_');
        input.extend_from_slice(label.as_bytes());
        input.push(b':');
        input.extend_from_slice(&value.to_le_bytes());
    }
}

/// Derive the vault key alias for an owner's access-policy combination.
///
/// The alias is the SHA-256 digest of the owner identity and the labelled
/// non-default policy components, so equal inputs always resolve to the same
/// vault key and distinct policies never share one.
pub fn derive_alias(
    user_id: u32,
    owner: &[u8],
    auth_type: AuthType,
    accessibility: Accessibility,
    require_password_set: bool,
) -> Vec<u8> {
    let mut input: Vec<u8> = Vec::with_capacity(64 + owner.len());
    input.extend_from_slice(&user_id.to_le_bytes());
    input.push(b'_');
    input.extend_from_slice(owner);
    append_policy_component("AuthType", auth_type as u32, &mut input);
    append_policy_component("Accessibility", accessibility as u32, &mut input);
    append_policy_component("RequirePasswordSet", require_password_set as u32, &mut input);
    Sha256::digest(&input).to_vec()
}
