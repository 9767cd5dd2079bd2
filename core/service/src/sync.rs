//! Synchronization boundary.
//!
//! Synchronization itself is owned by an external collaborator; this core
//! only validates the query attributes and forwards the request.

use serde::{Deserialize, Serialize};

use sealstore_common::{Attrs, Result};

use crate::platform::CallerIdentity;

/// Outcome of the last synchronization run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    /// Result code reported by the synchronization backend.
    pub result_code: i32,

    /// Number of records considered.
    pub total_count: u32,

    /// Number of records that failed to synchronize.
    pub failed_count: u32,
}

/// The synchronization collaborator.
pub trait SyncGateway: Send + Sync {
    /// Report the outcome of the last synchronization for this caller.
    fn query_sync_result(&self, caller: &CallerIdentity, attrs: &Attrs) -> Result<SyncResult>;
}

/// Gateway used when no synchronization backend is wired in.
pub struct NullSyncGateway;

impl SyncGateway for NullSyncGateway {
    fn query_sync_result(&self, _caller: &CallerIdentity, _attrs: &Attrs) -> Result<SyncResult> {
        Ok(SyncResult::default())
    }
}
