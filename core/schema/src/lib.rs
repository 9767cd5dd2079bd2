//! Attribute schema and validation engine for SealStore.
//!
//! Every operation's attribute list passes through [`validate`] (or
//! [`validate_update`]) before anything touches storage or cryptography.
//! The schema itself is a static table: [`constraint_of`] reports each tag's
//! domain, and per-action required/legal tag sets are declarative constants.

pub mod table;
pub mod validator;

pub use table::{constraint_of, Constraint, CRITICAL_LABELS, NORMAL_LABELS};
pub use validator::{validate, validate_update, Action};
