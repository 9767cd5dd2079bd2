//! Attribute tags and their value kinds.
//!
//! A tag is a 32-bit identifier whose top nibble encodes the kind of value it
//! carries and whose low bits encode the semantic field. The kind nibble is
//! authoritative: validation rejects any attribute whose value variant does
//! not match its tag's kind.

use std::fmt;

use crate::error::{Error, Result};

/// The kind of value a tag carries, encoded in the tag's top nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ValueKind {
    /// The attribute value is a bool.
    Bool = 1 << 28,

    /// The attribute value is a 32-bit unsigned integer.
    Number = 2 << 28,

    /// The attribute value is a byte array.
    Bytes = 3 << 28,
}

/// Mask selecting the kind nibble of a tag.
const KIND_MASK: u32 = 0xF << 28;

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Bool => write!(f, "bool"),
            ValueKind::Number => write!(f, "number"),
            ValueKind::Bytes => write!(f, "bytes"),
        }
    }
}

/// Tag of a secret-store attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Tag {
    /// The sensitive payload (password, token, ...).
    Secret = ValueKind::Bytes as u32 | 0x01,

    /// The alias identifying a record.
    Alias = ValueKind::Bytes as u32 | 0x02,

    /// When the secret may be released relative to device lock state.
    Accessibility = ValueKind::Number as u32 | 0x03,

    /// Whether a lock-screen credential must be configured for the record
    /// to be usable.
    RequirePasswordSet = ValueKind::Bool as u32 | 0x04,

    /// The user-authentication type gating access to the secret.
    AuthType = ValueKind::Number as u32 | 0x05,

    /// Validity period, in seconds, of one user authentication.
    AuthValidityPeriod = ValueKind::Number as u32 | 0x06,

    /// Anti-replay challenge issued by a batch-session init.
    AuthChallenge = ValueKind::Bytes as u32 | 0x07,

    /// Proof of a completed user authentication.
    AuthToken = ValueKind::Bytes as u32 | 0x08,

    /// Bitmask describing how the record may be synchronized.
    SyncType = ValueKind::Number as u32 | 0x10,

    /// Whether the record survives removal of its owning application.
    IsPersistent = ValueKind::Bool as u32 | 0x11,

    /// First user-defined label, immutable after creation.
    DataLabelCritical1 = ValueKind::Bytes as u32 | 0x20,
    /// Second user-defined label, immutable after creation.
    DataLabelCritical2 = ValueKind::Bytes as u32 | 0x21,
    /// Third user-defined label, immutable after creation.
    DataLabelCritical3 = ValueKind::Bytes as u32 | 0x22,
    /// Fourth user-defined label, immutable after creation.
    DataLabelCritical4 = ValueKind::Bytes as u32 | 0x23,

    /// First user-defined label, updatable.
    DataLabelNormal1 = ValueKind::Bytes as u32 | 0x30,
    /// Second user-defined label, updatable.
    DataLabelNormal2 = ValueKind::Bytes as u32 | 0x31,
    /// Third user-defined label, updatable.
    DataLabelNormal3 = ValueKind::Bytes as u32 | 0x32,
    /// Fourth user-defined label, updatable.
    DataLabelNormal4 = ValueKind::Bytes as u32 | 0x33,

    /// Whether queries return the secret or attributes only.
    ReturnType = ValueKind::Number as u32 | 0x40,

    /// Maximum number of records returned by a query.
    ReturnLimit = ValueKind::Number as u32 | 0x41,

    /// Offset of the first record returned by a batch query.
    ReturnOffset = ValueKind::Number as u32 | 0x42,

    /// Tag by which query results are ordered; the value is itself a tag.
    ReturnOrderedBy = ValueKind::Number as u32 | 0x43,

    /// Strategy applied when adding a record whose alias already exists.
    ConflictResolution = ValueKind::Number as u32 | 0x44,

    /// Target user for multi-user operations.
    UserId = ValueKind::Number as u32 | 0x45,

    /// Group the record is shared with.
    GroupId = ValueKind::Bytes as u32 | 0x46,

    /// Whether synchronized attributes must stay encrypted in transit.
    RequireAttrEncrypted = ValueKind::Bool as u32 | 0x47,
}

impl Tag {
    /// The value kind encoded in this tag's top nibble.
    pub fn kind(self) -> ValueKind {
        match self as u32 & KIND_MASK {
            k if k == ValueKind::Bool as u32 => ValueKind::Bool,
            k if k == ValueKind::Number as u32 => ValueKind::Number,
            // Every variant carries one of the three kind nibbles.
            _ => ValueKind::Bytes,
        }
    }
}

impl TryFrom<u32> for Tag {
    type Error = Error;

    fn try_from(raw: u32) -> Result<Self> {
        let tag = match raw {
            x if x == Tag::Secret as u32 => Tag::Secret,
            x if x == Tag::Alias as u32 => Tag::Alias,
            x if x == Tag::Accessibility as u32 => Tag::Accessibility,
            x if x == Tag::RequirePasswordSet as u32 => Tag::RequirePasswordSet,
            x if x == Tag::AuthType as u32 => Tag::AuthType,
            x if x == Tag::AuthValidityPeriod as u32 => Tag::AuthValidityPeriod,
            x if x == Tag::AuthChallenge as u32 => Tag::AuthChallenge,
            x if x == Tag::AuthToken as u32 => Tag::AuthToken,
            x if x == Tag::SyncType as u32 => Tag::SyncType,
            x if x == Tag::IsPersistent as u32 => Tag::IsPersistent,
            x if x == Tag::DataLabelCritical1 as u32 => Tag::DataLabelCritical1,
            x if x == Tag::DataLabelCritical2 as u32 => Tag::DataLabelCritical2,
            x if x == Tag::DataLabelCritical3 as u32 => Tag::DataLabelCritical3,
            x if x == Tag::DataLabelCritical4 as u32 => Tag::DataLabelCritical4,
            x if x == Tag::DataLabelNormal1 as u32 => Tag::DataLabelNormal1,
            x if x == Tag::DataLabelNormal2 as u32 => Tag::DataLabelNormal2,
            x if x == Tag::DataLabelNormal3 as u32 => Tag::DataLabelNormal3,
            x if x == Tag::DataLabelNormal4 as u32 => Tag::DataLabelNormal4,
            x if x == Tag::ReturnType as u32 => Tag::ReturnType,
            x if x == Tag::ReturnLimit as u32 => Tag::ReturnLimit,
            x if x == Tag::ReturnOffset as u32 => Tag::ReturnOffset,
            x if x == Tag::ReturnOrderedBy as u32 => Tag::ReturnOrderedBy,
            x if x == Tag::ConflictResolution as u32 => Tag::ConflictResolution,
            x if x == Tag::UserId as u32 => Tag::UserId,
            x if x == Tag::GroupId as u32 => Tag::GroupId,
            x if x == Tag::RequireAttrEncrypted as u32 => Tag::RequireAttrEncrypted,
            _ => {
                return Err(Error::InvalidArgument(format!(
                    "unknown tag number 0x{raw:x}"
                )))
            },
        };
        Ok(tag)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_nibble_is_authoritative() {
        assert_eq!(Tag::Secret.kind(), ValueKind::Bytes);
        assert_eq!(Tag::Accessibility.kind(), ValueKind::Number);
        assert_eq!(Tag::RequirePasswordSet.kind(), ValueKind::Bool);
        assert_eq!(Tag::IsPersistent.kind(), ValueKind::Bool);
        assert_eq!(Tag::ReturnOrderedBy.kind(), ValueKind::Number);
        assert_eq!(Tag::GroupId.kind(), ValueKind::Bytes);
    }

    #[test]
    fn test_round_trip_through_raw() {
        for tag in [
            Tag::Secret,
            Tag::Alias,
            Tag::AuthChallenge,
            Tag::SyncType,
            Tag::DataLabelNormal4,
            Tag::ConflictResolution,
            Tag::RequireAttrEncrypted,
        ] {
            assert_eq!(Tag::try_from(tag as u32).unwrap(), tag);
        }
    }

    #[test]
    fn test_unknown_raw_tag_rejected() {
        assert!(Tag::try_from(0xDEAD_BEEF).is_err());
        // Valid field bits but an undefined kind nibble.
        assert!(Tag::try_from(0x01).is_err());
    }
}
