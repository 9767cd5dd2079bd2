//! Key identity, key lifecycle and authenticated encryption for SealStore.
//!
//! This crate talks to the key vault, an opaque capability behind the
//! [`KeyVault`] trait, and builds two protocols on top of it:
//! single-shot AEAD encrypt/decrypt, and an authenticated batch protocol
//! ([`CipherSession`]) for secrets whose release requires a fresh
//! user-presence proof.
//!
//! # Security Guarantees
//! - Key material never leaves the vault; this crate only handles aliases,
//!   handles and ciphertext.
//! - Session handles are owned, non-copyable objects; the vault-side
//!   resource is released exactly once, on drop.
//! - Auth tokens and challenges are compared in constant time by the
//!   software reference vault.

pub mod identity;
pub mod lifecycle;
pub mod session;
pub mod software;
pub mod translate;
pub mod vault;

pub use identity::{derive_alias, KeyId, StorageTier, PRIMARY_USER_ID};
pub use lifecycle::SecretKey;
pub use session::{decrypt, encrypt, CipherSession};
pub use software::SoftwareVault;
pub use translate::translate;
pub use vault::{
    CryptoParams, KeyPolicy, KeyVault, OpPolicy, Purpose, VaultError, VaultResult, CHALLENGE_LEN,
    NONCE_LEN, TAG_LEN,
};
