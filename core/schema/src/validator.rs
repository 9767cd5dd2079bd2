//! Per-operation attribute validation.
//!
//! Validation runs in fixed phases: duplicate detection, required-tag check,
//! whitelist check, type-consistency check, then domain checks against the
//! static schema. The first failing attribute aborts validation; nothing is
//! collected. Failures carry the operation, the offending tag, the offending
//! value and the violated constraint in their message, but the caller-visible
//! contract is the error kind alone.

use std::fmt;

use sealstore_common::{Attrs, Error, Result, Tag, Value};

use crate::table::{constraint_of, Constraint, CRITICAL_LABELS, NORMAL_LABELS};

/// The logical operation an attribute list is validated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Store a new secret.
    Add,
    /// Remove matching records.
    Remove,
    /// Update one record located by the query half.
    Update,
    /// Open an authenticated batch session.
    PreQuery,
    /// Query records, optionally releasing the secret.
    Query,
    /// Close an authenticated batch session.
    PostQuery,
    /// Query the result of the last synchronization.
    QuerySyncResult,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Add => "add",
            Action::Remove => "remove",
            Action::Update => "update",
            Action::PreQuery => "pre-query",
            Action::Query => "query",
            Action::PostQuery => "post-query",
            Action::QuerySyncResult => "query-sync-result",
        };
        write!(f, "{name}")
    }
}

/// Tags that select or constrain a record's access policy.
const ACCESS_CONTROL: [Tag; 7] = [
    Tag::Alias,
    Tag::Accessibility,
    Tag::AuthType,
    Tag::SyncType,
    Tag::RequirePasswordSet,
    Tag::IsPersistent,
    Tag::UserId,
];

const ADD_REQUIRED: [Tag; 2] = [Tag::Secret, Tag::Alias];
const ADD_EXTRA: [Tag; 3] = [Tag::Secret, Tag::ConflictResolution, Tag::GroupId];

const UPDATE_QUERY_REQUIRED: [Tag; 1] = [Tag::Alias];
const UPDATE_EXTRA: [Tag; 1] = [Tag::GroupId];

const QUERY_EXTRA: [Tag; 7] = [
    Tag::ReturnType,
    Tag::ReturnLimit,
    Tag::ReturnOffset,
    Tag::ReturnOrderedBy,
    Tag::AuthChallenge,
    Tag::AuthToken,
    Tag::GroupId,
];

const PRE_QUERY_EXTRA: [Tag; 2] = [Tag::AuthValidityPeriod, Tag::GroupId];

const POST_QUERY_REQUIRED: [Tag; 1] = [Tag::AuthChallenge];
const POST_QUERY_LEGAL: [Tag; 2] = [Tag::AuthChallenge, Tag::GroupId];

const SYNC_RESULT_LEGAL: [Tag; 2] = [Tag::GroupId, Tag::RequireAttrEncrypted];

/// Tags legal on the update half of an update operation. Critical labels are
/// immutable and never appear here.
const UPDATE_SIDE_LEGAL: [Tag; 5] = [
    Tag::Secret,
    Tag::DataLabelNormal1,
    Tag::DataLabelNormal2,
    Tag::DataLabelNormal3,
    Tag::DataLabelNormal4,
];

fn required_tags(action: Action) -> &'static [Tag] {
    match action {
        Action::Add => &ADD_REQUIRED,
        Action::Update => &UPDATE_QUERY_REQUIRED,
        Action::PostQuery => &POST_QUERY_REQUIRED,
        _ => &[],
    }
}

fn legal_tags(action: Action) -> Vec<Tag> {
    let mut legal: Vec<Tag> = Vec::new();
    match action {
        Action::PostQuery => legal.extend_from_slice(&POST_QUERY_LEGAL),
        Action::QuerySyncResult => legal.extend_from_slice(&SYNC_RESULT_LEGAL),
        _ => {
            legal.extend_from_slice(&ACCESS_CONTROL);
            legal.extend_from_slice(&CRITICAL_LABELS);
            legal.extend_from_slice(&NORMAL_LABELS);
            match action {
                Action::Add => legal.extend_from_slice(&ADD_EXTRA),
                Action::Remove => legal.push(Tag::GroupId),
                Action::Update => legal.extend_from_slice(&UPDATE_EXTRA),
                Action::Query => legal.extend_from_slice(&QUERY_EXTRA),
                Action::PreQuery => legal.extend_from_slice(&PRE_QUERY_EXTRA),
                _ => unreachable!(),
            }
        },
    }
    legal
}

fn check_no_duplicates(action: Action, attrs: &Attrs) -> Result<()> {
    let mut seen: Vec<Tag> = Vec::with_capacity(attrs.len());
    for (tag, _) in attrs.iter() {
        if seen.contains(&tag) {
            return Err(Error::InvalidArgument(format!(
                "[{action}] attribute [{tag}] is supplied more than once"
            )));
        }
        seen.push(tag);
    }
    Ok(())
}

fn check_required(action: Action, attrs: &Attrs, required: &[Tag]) -> Result<()> {
    for tag in required {
        if !attrs.contains(*tag) {
            return Err(Error::InvalidArgument(format!(
                "[{action}] required attribute [{tag}] is missing"
            )));
        }
    }
    Ok(())
}

fn check_whitelist(action: Action, attrs: &Attrs, legal: &[Tag]) -> Result<()> {
    for (tag, _) in attrs.iter() {
        if !legal.contains(&tag) {
            return Err(Error::InvalidArgument(format!(
                "[{action}] attribute [{tag}] is not legal for this operation"
            )));
        }
    }
    Ok(())
}

fn check_types(action: Action, attrs: &Attrs) -> Result<()> {
    for (tag, value) in attrs.iter() {
        if tag.kind() != value.kind() {
            return Err(Error::InvalidArgument(format!(
                "[{action}] attribute [{tag}] expects a {} value, got {}",
                tag.kind(),
                value.kind()
            )));
        }
    }
    Ok(())
}

fn check_constraint(action: Action, tag: Tag, value: &Value) -> Result<()> {
    match (constraint_of(tag), value) {
        (Constraint::NumberRange { min, max }, Value::Number(n)) => {
            if *n <= min || *n > max {
                return Err(Error::InvalidArgument(format!(
                    "[{action}] value [{n}] of attribute [{tag}] is outside ({min}, {max}]"
                )));
            }
        },
        (Constraint::ByteLen { min, max }, Value::Bytes(b)) => {
            if b.len() <= min || b.len() > max {
                return Err(Error::InvalidArgument(format!(
                    "[{action}] length [{}] of attribute [{tag}] is outside ({min}, {max}]",
                    b.len()
                )));
            }
        },
        (Constraint::Bits { min_bits, max_bits }, Value::Number(n)) => {
            if *n >= 1 << max_bits || *n < (1 << min_bits) - 1 {
                return Err(Error::InvalidArgument(format!(
                    "[{action}] value [{n}] of attribute [{tag}] sets undefined bits"
                )));
            }
        },
        (Constraint::Discrete(values), Value::Number(n)) => {
            if !values.contains(n) {
                return Err(Error::InvalidArgument(format!(
                    "[{action}] value [{n}] of attribute [{tag}] is not a legal variant"
                )));
            }
        },
        (Constraint::TagMembership(tags), Value::Number(n)) => {
            match Tag::try_from(*n) {
                Ok(referenced) if tags.contains(&referenced) => {},
                _ => {
                    return Err(Error::InvalidArgument(format!(
                        "[{action}] value [{n}] of attribute [{tag}] is not a legal tag reference"
                    )))
                },
            }
        },
        (Constraint::Unconstrained, _) => {},
        // Kind mismatches were rejected by the type-consistency phase.
        (_, _) => {
            return Err(Error::InvalidArgument(format!(
                "[{action}] attribute [{tag}] has a value of the wrong kind"
            )))
        },
    }
    Ok(())
}

fn check_domains(action: Action, attrs: &Attrs) -> Result<()> {
    for (tag, value) in attrs.iter() {
        check_constraint(action, tag, value)?;
    }
    Ok(())
}

/// Validate an attribute list for one operation.
///
/// # Errors
/// - `InvalidArgument` naming the first offending attribute: duplicate tag,
///   missing required tag, tag outside the operation's legal set, value
///   variant not matching the tag's kind, or value outside the tag's domain.
pub fn validate(action: Action, attrs: &Attrs) -> Result<()> {
    check_no_duplicates(action, attrs)?;
    check_required(action, attrs, required_tags(action))?;
    check_whitelist(action, attrs, &legal_tags(action))?;
    check_types(action, attrs)?;
    check_domains(action, attrs)
}

/// Validate the two halves of an update operation.
///
/// The query half is validated as [`Action::Update`]; the update half must be
/// non-empty and is checked against its own, smaller legal set (the secret
/// and the updatable labels; critical labels are immutable).
///
/// # Errors
/// - `InvalidArgument` as for [`validate`], or if the update half is empty.
pub fn validate_update(query_attrs: &Attrs, update_attrs: &Attrs) -> Result<()> {
    validate(Action::Update, query_attrs)?;

    if update_attrs.is_empty() {
        return Err(Error::InvalidArgument(
            "[update] the attributes to update are empty".to_string(),
        ));
    }
    check_no_duplicates(Action::Update, update_attrs)?;
    check_whitelist(Action::Update, update_attrs, &UPDATE_SIDE_LEGAL)?;
    check_types(Action::Update, update_attrs)?;
    check_domains(Action::Update, update_attrs)
}
