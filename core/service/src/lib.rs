//! SealStore service layer.
//!
//! Wires the validator, key identity and crypto session protocol into the
//! CRUD-style operations: every attribute list is validated before anything
//! touches storage or cryptography, the key identity is resolved from the
//! caller and the record's access policy, and vault failures are translated
//! onto the domain error taxonomy on their way out.
//!
//! The storage engine and the platform services are external collaborators,
//! represented by the [`Store`], [`DeviceState`] and [`SyncGateway`] traits
//! with in-memory implementations for tests.

pub mod config;
pub mod operations;
pub mod platform;
pub mod registry;
pub mod service;
pub mod store;
pub mod sync;

pub use config::ServiceConfig;
pub use platform::{CallerIdentity, DeviceState, FixedDeviceState, OwnerKind};
pub use registry::SessionRegistry;
pub use service::SecretService;
pub use store::{Filter, MemoryStore, QueryOptions, Record, Store};
pub use sync::{NullSyncGateway, SyncGateway, SyncResult};
