//! Platform-service boundaries: caller identity and device state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use sealstore_common::Result;

/// What kind of process a caller is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum OwnerKind {
    /// An installed application.
    App = 0,

    /// A native system process.
    Native = 1,
}

/// Resolved identity of the calling process.
///
/// Produced by the platform's identity resolvers before an operation enters
/// this core; records are scoped to `(user, owner, group)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    /// The user the caller is running as.
    pub user_id: u32,

    /// Opaque owner identity (bundle or process identity bytes).
    pub owner: Vec<u8>,

    /// What kind of process the owner is.
    pub kind: OwnerKind,

    /// Group the caller shares records with, if any.
    pub group: Option<Vec<u8>>,
}

impl CallerIdentity {
    /// Identity of an application caller.
    pub fn app(user_id: u32, owner: impl Into<Vec<u8>>) -> Self {
        Self { user_id, owner: owner.into(), kind: OwnerKind::App, group: None }
    }

    /// Identity of a native-process caller.
    pub fn native(user_id: u32, owner: impl Into<Vec<u8>>) -> Self {
        Self { user_id, owner: owner.into(), kind: OwnerKind::Native, group: None }
    }

    /// Scope this identity to a group.
    pub fn with_group(mut self, group: impl Into<Vec<u8>>) -> Self {
        self.group = Some(group.into());
        self
    }
}

/// Device-state resolvers this core depends on.
pub trait DeviceState: Send + Sync {
    /// Whether a user with this id exists on the device.
    fn user_exists(&self, user_id: u32) -> Result<bool>;

    /// Whether a lock-screen credential is configured.
    fn screen_lock_enrolled(&self) -> Result<bool>;
}

/// Fixed device state for development and tests.
pub struct FixedDeviceState {
    known_users: Mutex<Vec<u32>>,
    screen_lock: AtomicBool,
}

impl FixedDeviceState {
    /// A device with the primary user, one front user and a lock-screen
    /// credential enrolled.
    pub fn new() -> Self {
        Self { known_users: Mutex::new(vec![0, 100]), screen_lock: AtomicBool::new(true) }
    }

    /// Register another known user.
    pub fn add_user(&self, user_id: u32) {
        self.known_users.lock().unwrap().push(user_id);
    }

    /// Simulate enrolling or removing the lock-screen credential.
    pub fn set_screen_lock_enrolled(&self, enrolled: bool) {
        self.screen_lock.store(enrolled, Ordering::SeqCst);
    }
}

impl Default for FixedDeviceState {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceState for FixedDeviceState {
    fn user_exists(&self, user_id: u32) -> Result<bool> {
        Ok(self.known_users.lock().unwrap().contains(&user_id))
    }

    fn screen_lock_enrolled(&self) -> Result<bool> {
        Ok(self.screen_lock.load(Ordering::SeqCst))
    }
}
