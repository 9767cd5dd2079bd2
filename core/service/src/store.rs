//! Storage-engine boundary and the in-memory store.
//!
//! The persistent storage engine is an external collaborator; this core only
//! depends on a keyed record store queried by attribute predicates. The
//! in-memory [`MemoryStore`] backs development and tests.

use std::cmp::Ordering;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use sealstore_common::{Attrs, Error, Result, Tag, Value};

use crate::platform::{CallerIdentity, OwnerKind};

/// One stored secret record.
///
/// `attrs` holds the record's attribute list with the secret already
/// replaced by its ciphertext; identity fields scope the record to its
/// owner.
#[derive(Debug, Clone)]
pub struct Record {
    /// Store-assigned record identity.
    pub id: Uuid,

    /// The user the record belongs to.
    pub user_id: u32,

    /// Owner identity bytes.
    pub owner: Vec<u8>,

    /// What kind of process the owner is.
    pub owner_kind: OwnerKind,

    /// Group the record is shared with, if any.
    pub group: Option<Vec<u8>>,

    /// Attribute list, secret stored as ciphertext.
    pub attrs: Attrs,

    /// When the record was created.
    pub created_at: DateTime<Utc>,

    /// When the record was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Record {
    /// Create a record owned by `caller`.
    pub fn new(caller: &CallerIdentity, user_id: u32, group: Option<Vec<u8>>, attrs: Attrs) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            owner: caller.owner.clone(),
            owner_kind: caller.kind,
            group,
            attrs,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Equality predicates a store query matches records against.
#[derive(Debug, Clone)]
pub struct Filter {
    /// The user whose records are visible.
    pub user_id: u32,

    /// Owner identity the records must belong to.
    pub owner: Vec<u8>,

    /// Group scope; `None` matches only ungrouped records.
    pub group: Option<Vec<u8>>,

    /// Attribute equality predicates.
    pub attrs: Attrs,
}

impl Filter {
    /// A filter scoped to the caller with no attribute predicates.
    pub fn for_caller(caller: &CallerIdentity, user_id: u32) -> Self {
        Self { user_id, owner: caller.owner.clone(), group: caller.group.clone(), attrs: Attrs::new() }
    }

    /// Add an attribute equality predicate.
    pub fn with_attr(mut self, tag: Tag, value: impl Into<Value>) -> Self {
        self.attrs.push(tag, value);
        self
    }

    /// Whether `record` satisfies every predicate.
    pub fn matches(&self, record: &Record) -> bool {
        record.user_id == self.user_id
            && record.owner == self.owner
            && record.group == self.group
            && self.attrs.iter().all(|(tag, value)| record.attrs.get(tag) == Some(value))
    }
}

/// Pagination and ordering of a query.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Skip this many matching records.
    pub offset: Option<u32>,

    /// Return at most this many records.
    pub limit: Option<u32>,

    /// Order results by this attribute before paginating.
    pub order_by: Option<Tag>,
}

/// The storage-engine capability.
///
/// Implementations persist records however they like; this core only issues
/// attribute predicates and never sees the storage format.
pub trait Store: Send + Sync {
    /// Insert a record.
    fn insert(&self, record: Record) -> Result<()>;

    /// Records matching `filter`, ordered and paginated per `options`.
    fn query(&self, filter: &Filter, options: &QueryOptions) -> Result<Vec<Record>>;

    /// Apply `patch` to every matching record, returning how many changed.
    fn update(&self, filter: &Filter, patch: &Attrs) -> Result<u32>;

    /// Remove every matching record, returning how many were removed.
    fn remove(&self, filter: &Filter) -> Result<u32>;
}

/// In-memory record store.
///
/// Useful for testing and development. All records are stored in memory and
/// lost on drop.
pub struct MemoryStore {
    records: Mutex<Vec<Record>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self { records: Mutex::new(Vec::new()) }
    }

    fn compare_by(tag: Tag, a: &Record, b: &Record) -> Ordering {
        match (a.attrs.get(tag), b.attrs.get(tag)) {
            (Some(Value::Bytes(x)), Some(Value::Bytes(y))) => x.cmp(y),
            (Some(Value::Number(x)), Some(Value::Number(y))) => x.cmp(y),
            (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            _ => Ordering::Equal,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemoryStore {
    fn insert(&self, record: Record) -> Result<()> {
        self.records.lock().unwrap().push(record);
        Ok(())
    }

    fn query(&self, filter: &Filter, options: &QueryOptions) -> Result<Vec<Record>> {
        let records = self.records.lock().unwrap();
        let mut matches: Vec<Record> =
            records.iter().filter(|r| filter.matches(r)).cloned().collect();

        if let Some(tag) = options.order_by {
            matches.sort_by(|a, b| Self::compare_by(tag, a, b));
        }

        let offset = options.offset.unwrap_or(0) as usize;
        if offset >= matches.len() {
            return Ok(Vec::new());
        }
        let mut matches = matches.split_off(offset);
        if let Some(limit) = options.limit {
            matches.truncate(limit as usize);
        }
        Ok(matches)
    }

    fn update(&self, filter: &Filter, patch: &Attrs) -> Result<u32> {
        let mut records = self.records.lock().unwrap();
        let mut changed = 0;
        for record in records.iter_mut().filter(|r| filter.matches(r)) {
            for (tag, value) in patch.iter() {
                record.attrs.set(tag, value.clone());
            }
            record.updated_at = Utc::now();
            changed += 1;
        }
        Ok(changed)
    }

    fn remove(&self, filter: &Filter) -> Result<u32> {
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|r| !filter.matches(r));
        u32::try_from(before - records.len())
            .map_err(|_| Error::LimitExceeded("removed record count".to_string()))
    }
}
