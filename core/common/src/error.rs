//! Common error types for SealStore.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error type for SealStore operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The supplied attributes or parameters are malformed.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The requested record or key does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A record with the same alias already exists.
    #[error("Duplicated: {0}")]
    Duplicated(String),

    /// User authentication was rejected.
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// The device lock state does not satisfy the access policy.
    #[error("Status mismatch: {0}")]
    StatusMismatch(String),

    /// The vault or store ran out of memory.
    #[error("Out of memory: {0}")]
    OutOfMemory(String),

    /// Stored data or key material is corrupted.
    #[error("Data corrupted: {0}")]
    DataCorrupted(String),

    /// A cryptographic operation failed.
    #[error("Crypto error: {0}")]
    CryptoError(String),

    /// The operation is not supported in this configuration.
    #[error("Not supported: {0}")]
    Unsupported(String),

    /// A quota (session count, result size, ...) was exceeded.
    #[error("Limit exceeded: {0}")]
    LimitExceeded(String),
}

/// Result codes exposed at the call boundary.
///
/// Collaborators that cannot carry a structured error (bindings, IPC stubs)
/// report one of these codes instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// The operation completed.
    Success,
    /// See [`Error::InvalidArgument`].
    InvalidArgument,
    /// See [`Error::NotFound`].
    NotFound,
    /// See [`Error::Duplicated`].
    Duplicated,
    /// See [`Error::AccessDenied`].
    AccessDenied,
    /// See [`Error::StatusMismatch`].
    StatusMismatch,
    /// See [`Error::OutOfMemory`].
    OutOfMemory,
    /// See [`Error::DataCorrupted`].
    DataCorrupted,
    /// See [`Error::CryptoError`].
    CryptoError,
    /// See [`Error::Unsupported`].
    Unsupported,
    /// See [`Error::LimitExceeded`].
    LimitExceeded,
}

impl Error {
    /// The boundary result code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Error::NotFound(_) => ErrorCode::NotFound,
            Error::Duplicated(_) => ErrorCode::Duplicated,
            Error::AccessDenied(_) => ErrorCode::AccessDenied,
            Error::StatusMismatch(_) => ErrorCode::StatusMismatch,
            Error::OutOfMemory(_) => ErrorCode::OutOfMemory,
            Error::DataCorrupted(_) => ErrorCode::DataCorrupted,
            Error::CryptoError(_) => ErrorCode::CryptoError,
            Error::Unsupported(_) => ErrorCode::Unsupported,
            Error::LimitExceeded(_) => ErrorCode::LimitExceeded,
        }
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
