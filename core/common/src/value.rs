//! Attribute values and the enumerations stored in them.

use std::fmt;

use zeroize::Zeroize;

use crate::error::{Error, Result};
use crate::tag::ValueKind;

/// Value of a secret-store attribute.
///
/// The active variant is determined solely by the owning tag's kind nibble;
/// validation enforces the match before any value is interpreted.
#[derive(Clone, PartialEq, Eq)]
pub enum Value {
    /// A boolean attribute value.
    Bool(bool),

    /// A 32-bit unsigned integer attribute value.
    Number(u32),

    /// A byte-array attribute value. Zeroized on drop because secrets and
    /// auth tokens travel through this variant.
    Bytes(Vec<u8>),
}

impl Value {
    /// The kind of the active variant.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Bool(_) => ValueKind::Bool,
            Value::Number(_) => ValueKind::Number,
            Value::Bytes(_) => ValueKind::Bytes,
        }
    }
}

impl Drop for Value {
    fn drop(&mut self) {
        if let Value::Bytes(bytes) = self {
            bytes.zeroize();
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            // Byte payloads may be secrets; never print their content.
            Value::Bytes(b) => write!(f, "Bytes([REDACTED; {} bytes])", b.len()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Number(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Bytes(v.as_bytes().to_vec())
    }
}

/// When a secret may be released relative to device lock state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Accessibility {
    /// Released any time after the device powers on.
    DevicePowerOn = 0,

    /// Released after the device has been unlocked once since boot.
    DeviceFirstUnlocked = 1,

    /// Released only while the device is unlocked.
    DeviceUnlocked = 2,
}

impl TryFrom<u32> for Accessibility {
    type Error = Error;

    fn try_from(raw: u32) -> Result<Self> {
        match raw {
            0 => Ok(Accessibility::DevicePowerOn),
            1 => Ok(Accessibility::DeviceFirstUnlocked),
            2 => Ok(Accessibility::DeviceUnlocked),
            _ => Err(Error::InvalidArgument(format!(
                "unknown accessibility value [{raw}]"
            ))),
        }
    }
}

/// User-authentication requirement for releasing a secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum AuthType {
    /// No user authentication required.
    None = 0x00,

    /// Any enrolled authenticator (PIN, pattern, password or biometrics).
    Any = 0xFF,
}

impl TryFrom<u32> for AuthType {
    type Error = Error;

    fn try_from(raw: u32) -> Result<Self> {
        match raw {
            0x00 => Ok(AuthType::None),
            0xFF => Ok(AuthType::Any),
            _ => Err(Error::InvalidArgument(format!(
                "unknown auth type value [{raw}]"
            ))),
        }
    }
}

/// Bitmask describing how a record may be synchronized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum SyncType {
    /// Never leaves the device.
    Never = 0,

    /// May only be restored to the device it was backed up from.
    ThisDevice = 1 << 0,

    /// May be transferred to devices on the same trusted account.
    TrustedAccount = 1 << 1,

    /// May be transferred to explicitly trusted devices.
    TrustedDevice = 1 << 2,
}

/// Return shape of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ReturnType {
    /// Return the secret together with its attributes.
    All = 0,

    /// Return attributes only.
    Attributes = 1,
}

impl TryFrom<u32> for ReturnType {
    type Error = Error;

    fn try_from(raw: u32) -> Result<Self> {
        match raw {
            0 => Ok(ReturnType::All),
            1 => Ok(ReturnType::Attributes),
            _ => Err(Error::InvalidArgument(format!(
                "unknown return type value [{raw}]"
            ))),
        }
    }
}

/// Strategy applied when an added alias already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ConflictResolution {
    /// Replace the existing record.
    Overwrite = 0,

    /// Report `Duplicated` and leave the existing record untouched.
    ThrowError = 1,
}

impl TryFrom<u32> for ConflictResolution {
    type Error = Error;

    fn try_from(raw: u32) -> Result<Self> {
        match raw {
            0 => Ok(ConflictResolution::Overwrite),
            1 => Ok(ConflictResolution::ThrowError),
            _ => Err(Error::InvalidArgument(format!(
                "unknown conflict resolution value [{raw}]"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_kind() {
        assert_eq!(Value::Bool(true).kind(), ValueKind::Bool);
        assert_eq!(Value::Number(7).kind(), ValueKind::Number);
        assert_eq!(Value::Bytes(vec![1]).kind(), ValueKind::Bytes);
    }

    #[test]
    fn test_debug_redacts_bytes() {
        let v = Value::Bytes(b"hunter2".to_vec());
        let printed = format!("{v:?}");
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("7 bytes"));
    }

    #[test]
    fn test_enum_parsing_rejects_unknown() {
        assert!(Accessibility::try_from(3).is_err());
        assert!(AuthType::try_from(0x01).is_err());
        assert!(ReturnType::try_from(2).is_err());
        assert!(ConflictResolution::try_from(9).is_err());
    }

    #[test]
    fn test_enum_parsing_accepts_known() {
        assert_eq!(
            Accessibility::try_from(2).unwrap(),
            Accessibility::DeviceUnlocked
        );
        assert_eq!(AuthType::try_from(0xFF).unwrap(), AuthType::Any);
    }
}
