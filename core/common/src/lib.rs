//! Common types shared across SealStore modules.
//!
//! This crate defines the tagged-attribute data model (tags, values,
//! attribute lists) and the domain error taxonomy that every other crate
//! builds on.

pub mod attrs;
pub mod error;
pub mod tag;
pub mod value;

pub use attrs::Attrs;
pub use error::{Error, ErrorCode, Result};
pub use tag::{Tag, ValueKind};
pub use value::{Accessibility, AuthType, ConflictResolution, ReturnType, SyncType, Value};
