//! Static attribute schema: each tag's domain constraint.

use sealstore_common::Tag;

/// Maximum secret payload length in bytes.
pub const MAX_SECRET_LEN: usize = 1024;
/// Maximum alias length in bytes.
pub const MAX_ALIAS_LEN: usize = 256;
/// Maximum user-defined label length in bytes.
pub const MAX_LABEL_LEN: usize = 512;
/// Maximum group identifier length in bytes.
pub const MAX_GROUP_ID_LEN: usize = 127;
/// Exact length of a batch-session challenge.
pub const CHALLENGE_LEN: usize = 32;
/// Exact length of a user-authentication token.
pub const AUTH_TOKEN_LEN: usize = 148;
/// Maximum number of records one query may return.
pub const MAX_RETURN_LIMIT: u32 = 0x10000;
/// Maximum user-authentication validity window in seconds.
pub const MAX_AUTH_VALIDITY_SECS: u32 = 600;
/// Lowest front-user id, exclusive bound.
pub const MIN_USER_ID: u32 = 99;
/// Highest front-user id, inclusive bound.
pub const MAX_USER_ID: u32 = 10736;

/// The user-defined labels that are immutable after creation.
pub const CRITICAL_LABELS: [Tag; 4] = [
    Tag::DataLabelCritical1,
    Tag::DataLabelCritical2,
    Tag::DataLabelCritical3,
    Tag::DataLabelCritical4,
];

/// The user-defined labels that may be updated.
pub const NORMAL_LABELS: [Tag; 4] = [
    Tag::DataLabelNormal1,
    Tag::DataLabelNormal2,
    Tag::DataLabelNormal3,
    Tag::DataLabelNormal4,
];

const ORDERABLE_LABELS: [Tag; 8] = [
    Tag::DataLabelCritical1,
    Tag::DataLabelCritical2,
    Tag::DataLabelCritical3,
    Tag::DataLabelCritical4,
    Tag::DataLabelNormal1,
    Tag::DataLabelNormal2,
    Tag::DataLabelNormal3,
    Tag::DataLabelNormal4,
];

const ACCESSIBILITY_VALUES: [u32; 3] = [0, 1, 2];
const AUTH_TYPE_VALUES: [u32; 2] = [0x00, 0xFF];
const RETURN_TYPE_VALUES: [u32; 2] = [0, 1];
const CONFLICT_RESOLUTION_VALUES: [u32; 2] = [0, 1];

/// Domain constraint of one tag's value.
///
/// Continuous ranges are bottom-exclusive, top-inclusive (`min < v <= max`).
/// A byte-length range whose bounds are `(len - 1, len]` is an intentional
/// fixed-length check, not a degenerate range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    /// Numeric value in `(min, max]`.
    NumberRange {
        /// Exclusive lower bound.
        min: u32,
        /// Inclusive upper bound.
        max: u32,
    },

    /// Byte-array length in `(min, max]`.
    ByteLen {
        /// Exclusive lower bound on the length.
        min: usize,
        /// Inclusive upper bound on the length.
        max: usize,
    },

    /// Numeric value in `[2^min_bits - 1, 2^max_bits)`: only combinations of
    /// the defined low bits are accepted.
    Bits {
        /// Minimum number of meaningful bits.
        min_bits: u32,
        /// Number of defined bits.
        max_bits: u32,
    },

    /// Numeric value drawn from a fixed set.
    Discrete(&'static [u32]),

    /// Numeric value that must itself be one of these tags.
    TagMembership(&'static [Tag]),

    /// Any value of the declared kind.
    Unconstrained,
}

/// The domain constraint registered for `tag`.
///
/// Raw tag numbers outside the [`Tag`] enumeration never reach this table:
/// they fail tag parsing and are illegal for every operation.
pub fn constraint_of(tag: Tag) -> Constraint {
    match tag {
        Tag::Secret => Constraint::ByteLen { min: 0, max: MAX_SECRET_LEN },
        Tag::Alias => Constraint::ByteLen { min: 0, max: MAX_ALIAS_LEN },
        Tag::Accessibility => Constraint::Discrete(&ACCESSIBILITY_VALUES),
        Tag::RequirePasswordSet => Constraint::Unconstrained,
        Tag::AuthType => Constraint::Discrete(&AUTH_TYPE_VALUES),
        Tag::AuthValidityPeriod => {
            Constraint::NumberRange { min: 0, max: MAX_AUTH_VALIDITY_SECS }
        },
        Tag::AuthChallenge => {
            Constraint::ByteLen { min: CHALLENGE_LEN - 1, max: CHALLENGE_LEN }
        },
        Tag::AuthToken => {
            Constraint::ByteLen { min: AUTH_TOKEN_LEN - 1, max: AUTH_TOKEN_LEN }
        },
        Tag::SyncType => Constraint::Bits { min_bits: 0, max_bits: 3 },
        Tag::IsPersistent => Constraint::Unconstrained,
        Tag::DataLabelCritical1
        | Tag::DataLabelCritical2
        | Tag::DataLabelCritical3
        | Tag::DataLabelCritical4
        | Tag::DataLabelNormal1
        | Tag::DataLabelNormal2
        | Tag::DataLabelNormal3
        | Tag::DataLabelNormal4 => Constraint::ByteLen { min: 0, max: MAX_LABEL_LEN },
        Tag::ReturnType => Constraint::Discrete(&RETURN_TYPE_VALUES),
        Tag::ReturnLimit => Constraint::NumberRange { min: 0, max: MAX_RETURN_LIMIT },
        Tag::ReturnOffset => Constraint::Unconstrained,
        Tag::ReturnOrderedBy => Constraint::TagMembership(&ORDERABLE_LABELS),
        Tag::ConflictResolution => Constraint::Discrete(&CONFLICT_RESOLUTION_VALUES),
        Tag::UserId => Constraint::NumberRange { min: MIN_USER_ID, max: MAX_USER_ID },
        Tag::GroupId => Constraint::ByteLen { min: 0, max: MAX_GROUP_ID_LEN },
        Tag::RequireAttrEncrypted => Constraint::Unconstrained,
    }
}
