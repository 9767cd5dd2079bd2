//! Translation of vault failures onto the domain error taxonomy.

use sealstore_common::Error;

use crate::vault::VaultError;

/// Map a vault failure onto the domain error taxonomy.
///
/// The table is fixed: permission and credential preconditions surface as
/// `StatusMismatch`, rejected authentication as `AccessDenied`, engine
/// corruption as `DataCorrupted`, and anything unclassified as `CryptoError`.
/// `context` names the operation for the error message; the caller-visible
/// contract is the error kind.
pub fn translate(err: VaultError, context: &str) -> Error {
    match err {
        VaultError::NoPermission | VaultError::CredentialUnset => {
            Error::StatusMismatch(format!("{context}: {err}"))
        },
        VaultError::NotFound => Error::NotFound(format!("{context}: {err}")),
        VaultError::AuthFailed | VaultError::SessionExpired => {
            Error::AccessDenied(format!("{context}: {err}"))
        },
        VaultError::Corrupted => Error::DataCorrupted(format!("{context}: {err}")),
        VaultError::OutOfMemory => Error::OutOfMemory(format!("{context}: {err}")),
        VaultError::InvalidArgument => Error::InvalidArgument(format!("{context}: {err}")),
        VaultError::Unsupported => Error::Unsupported(format!("{context}: {err}")),
        VaultError::Other(code) => {
            Error::CryptoError(format!("{context}: vault failure code {code}"))
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealstore_common::ErrorCode;

    #[test]
    fn test_translation_table() {
        let cases = [
            (VaultError::NoPermission, ErrorCode::StatusMismatch),
            (VaultError::CredentialUnset, ErrorCode::StatusMismatch),
            (VaultError::NotFound, ErrorCode::NotFound),
            (VaultError::AuthFailed, ErrorCode::AccessDenied),
            (VaultError::SessionExpired, ErrorCode::AccessDenied),
            (VaultError::Corrupted, ErrorCode::DataCorrupted),
            (VaultError::OutOfMemory, ErrorCode::OutOfMemory),
            (VaultError::InvalidArgument, ErrorCode::InvalidArgument),
            (VaultError::Unsupported, ErrorCode::Unsupported),
            (VaultError::Other(-42), ErrorCode::CryptoError),
        ];
        for (vault_err, expected) in cases {
            assert_eq!(translate(vault_err, "test").code(), expected);
        }
    }

    #[test]
    fn test_context_lands_in_message() {
        let err = translate(VaultError::NotFound, "delete key");
        assert!(err.to_string().contains("delete key"));
    }
}
