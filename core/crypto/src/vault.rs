//! The key-vault capability boundary.
//!
//! The vault is an external service: it generates and stores AES-256-GCM
//! keys, and performs every cryptographic operation itself. This crate never
//! sees key material, only aliases, operation handles and ciphertext.

use thiserror::Error;

use crate::identity::KeyId;

/// Authentication tag length of the vault's AEAD, in bytes.
pub const TAG_LEN: usize = 16;

/// Nonce length of the vault's AEAD, in bytes.
pub const NONCE_LEN: usize = 12;

/// Length of the anti-replay challenge issued by a batch init, in bytes.
pub const CHALLENGE_LEN: usize = 32;

/// Errors reported by a key-vault implementation.
///
/// These are the vault's own failure modes; [`crate::translate`] maps them
/// onto the domain error taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaultError {
    /// No key is stored under the given alias and tier.
    #[error("key not found")]
    NotFound,

    /// The caller is not allowed to use the key in the current device state.
    #[error("no permission for this key")]
    NoPermission,

    /// Key creation requires a lock-screen credential and none is enrolled.
    #[error("no lock-screen credential enrolled")]
    CredentialUnset,

    /// The supplied user-authentication proof was rejected.
    #[error("user authentication failed")]
    AuthFailed,

    /// The operation's validity window has elapsed.
    #[error("operation validity window elapsed")]
    SessionExpired,

    /// A parameter was malformed at the vault boundary.
    #[error("invalid vault argument")]
    InvalidArgument,

    /// The vault ran out of memory.
    #[error("vault out of memory")]
    OutOfMemory,

    /// Key material or ciphertext failed integrity checks.
    #[error("key material or ciphertext corrupted")]
    Corrupted,

    /// The vault does not support the requested operation.
    #[error("operation not supported by the vault")]
    Unsupported,

    /// Unclassified vault failure code.
    #[error("vault failure code {0}")]
    Other(i32),
}

/// Result alias for vault-boundary calls.
pub type VaultResult<T> = std::result::Result<T, VaultError>;

/// Policy attached to a generated key.
///
/// Generated keys are AES-256-GCM, scoped to the tier resolved from the
/// key identity. An auth-bound key additionally carries a decrypt-purpose
/// user-authentication policy with always-valid-after-first-auth access and
/// a custom-challenge anti-replay scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPolicy {
    /// Bind decryption to a fresh user authentication.
    pub needs_auth: bool,

    /// Refuse generation unless a lock-screen credential is enrolled.
    pub requires_password_set: bool,

    /// Explicit user scope for secondary users; `None` for the primary
    /// user, whose keys are vault-global.
    pub user_scope: Option<u32>,
}

/// Direction of a cryptographic operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    /// AEAD encryption.
    Encrypt,

    /// AEAD decryption.
    Decrypt,
}

/// Parameters of one vault operation opened with [`KeyVault::init`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpPolicy {
    /// Direction of the operation.
    pub purpose: Purpose,

    /// Whether the operation stays open for repeated updates.
    pub batch: bool,

    /// Validity window of a batch operation, in seconds.
    pub validity_secs: Option<u32>,
}

impl OpPolicy {
    /// A single init-then-finish operation.
    pub fn single_shot(purpose: Purpose) -> Self {
        Self { purpose, batch: false, validity_secs: None }
    }

    /// A decrypt-purpose batch operation with a bounded validity window.
    pub fn batch_decrypt(validity_secs: u32) -> Self {
        Self { purpose: Purpose::Decrypt, batch: true, validity_secs: Some(validity_secs) }
    }
}

/// Per-call parameters of [`KeyVault::update_or_finish`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CryptoParams<'a> {
    /// Associated data authenticated alongside the payload.
    pub aad: &'a [u8],

    /// Nonce sliced from the ciphertext trailer, for decryption.
    pub nonce: Option<&'a [u8]>,

    /// Authentication tag sliced from the ciphertext trailer, for decryption.
    pub tag: Option<&'a [u8]>,

    /// Proof of user authentication, for auth-bound batch decryption.
    pub auth_token: Option<&'a [u8]>,
}

/// The key-vault capability.
///
/// All calls carry the resolved storage tier inside the [`KeyId`]; user
/// scoping for secondary users travels in the [`KeyPolicy`]. Implementations
/// must be safe to share across threads; every handle returned by
/// [`init`](Self::init) is owned by exactly one logical caller.
pub trait KeyVault: Send + Sync {
    /// Create a key under the identity's alias and tier.
    fn generate_key(&self, id: &KeyId, policy: &KeyPolicy) -> VaultResult<()>;

    /// Delete the key. Deleting an absent key reports [`VaultError::NotFound`].
    fn delete_key(&self, id: &KeyId) -> VaultResult<()>;

    /// Whether a key exists under the identity's alias and tier.
    fn key_exists(&self, id: &KeyId) -> VaultResult<bool>;

    /// Open an operation on the key.
    ///
    /// Returns the opaque operation handle and, for auth-bound batch
    /// operations, the anti-replay challenge to relay to the out-of-band
    /// user-authentication step.
    fn init(&self, id: &KeyId, op: &OpPolicy) -> VaultResult<(Vec<u8>, Vec<u8>)>;

    /// Feed data through an open operation.
    ///
    /// With `last == false` the operation stays open for further calls; with
    /// `last == true` the vault releases the handle after processing, and an
    /// empty `input` makes the call a pure release.
    fn update_or_finish(
        &self,
        handle: &[u8],
        params: &CryptoParams,
        input: &[u8],
        last: bool,
    ) -> VaultResult<Vec<u8>>;

    /// Copy the key material to a new alias in the same tier. The old alias
    /// is not removed.
    fn rename_key_alias(&self, id: &KeyId, new_alias: &[u8]) -> VaultResult<()>;
}
