//! The secret service: shared state and helpers for the operations.

use std::sync::Arc;

use sealstore_common::{Accessibility, Attrs, AuthType, Error, Result, SyncType, Tag, Value};
use sealstore_crypto::{KeyVault, SecretKey};

use crate::config::ServiceConfig;
use crate::platform::{CallerIdentity, DeviceState, OwnerKind};
use crate::registry::SessionRegistry;
use crate::store::{Filter, Record, Store};
use crate::sync::{NullSyncGateway, SyncGateway};

/// Tags that may appear as equality predicates in a store query.
const FILTERABLE: [Tag; 14] = [
    Tag::Alias,
    Tag::Accessibility,
    Tag::AuthType,
    Tag::SyncType,
    Tag::RequirePasswordSet,
    Tag::IsPersistent,
    Tag::DataLabelCritical1,
    Tag::DataLabelCritical2,
    Tag::DataLabelCritical3,
    Tag::DataLabelCritical4,
    Tag::DataLabelNormal1,
    Tag::DataLabelNormal2,
    Tag::DataLabelNormal3,
    Tag::DataLabelNormal4,
];

/// The SealStore service.
///
/// Owns the collaborator handles and the registry of live authenticated
/// sessions; the operations themselves live in [`crate::operations`]. The
/// service keeps no other mutable state, so one instance may be shared
/// across threads.
pub struct SecretService {
    pub(crate) vault: Arc<dyn KeyVault>,
    pub(crate) store: Arc<dyn Store>,
    pub(crate) device: Arc<dyn DeviceState>,
    pub(crate) sync: Arc<dyn SyncGateway>,
    pub(crate) sessions: SessionRegistry,
    pub(crate) config: ServiceConfig,
}

impl SecretService {
    /// Create a service over the given collaborators with the default
    /// configuration and no synchronization backend.
    pub fn new(
        vault: Arc<dyn KeyVault>,
        store: Arc<dyn Store>,
        device: Arc<dyn DeviceState>,
    ) -> Self {
        let config = ServiceConfig::default();
        Self {
            vault,
            store,
            device,
            sync: Arc::new(NullSyncGateway),
            sessions: SessionRegistry::new(config.max_sessions),
            config,
        }
    }

    /// Replace the synchronization backend.
    pub fn with_sync(mut self, sync: Arc<dyn SyncGateway>) -> Self {
        self.sync = sync;
        self
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: ServiceConfig) -> Self {
        self.sessions = SessionRegistry::new(config.max_sessions);
        self.config = config;
        self
    }

    /// Drop every authenticated session that requires the device to be
    /// unlocked. Wired to the platform's lock event.
    pub fn on_device_lock(&self) {
        self.sessions.remove_device_locked();
    }

    /// The user an operation acts for: the target user attribute when
    /// supplied, the caller's own user otherwise.
    ///
    /// # Errors
    /// - `InvalidArgument` if the target user does not exist on the device.
    pub(crate) fn resolve_user_id(&self, caller: &CallerIdentity, attrs: &Attrs) -> Result<u32> {
        match attrs.get(Tag::UserId) {
            Some(Value::Number(user_id)) => {
                if !self.device.user_exists(*user_id)? {
                    return Err(Error::InvalidArgument(format!(
                        "user [{user_id}] does not exist"
                    )));
                }
                Ok(*user_id)
            },
            _ => Ok(caller.user_id),
        }
    }

    /// Resolve the vault key for a record's access-policy attributes.
    pub(crate) fn secret_key_for(
        &self,
        owner: &[u8],
        user_id: u32,
        attrs: &Attrs,
    ) -> Result<SecretKey> {
        let auth_type: AuthType = attrs.decode(Tag::AuthType)?;
        let accessibility: Accessibility = attrs.decode(Tag::Accessibility)?;
        let require_password_set = attrs.flag(Tag::RequirePasswordSet)?;
        Ok(SecretKey::new(user_id, owner, auth_type, accessibility, require_password_set))
    }

    /// Build the store filter for an operation's attribute list.
    ///
    /// Only filterable tags become predicates; the group scope comes from
    /// the explicit group attribute or the caller's own group.
    pub(crate) fn build_filter(
        &self,
        caller: &CallerIdentity,
        user_id: u32,
        attrs: &Attrs,
    ) -> Filter {
        let mut filter = Filter {
            user_id,
            owner: caller.owner.clone(),
            group: effective_group(caller, attrs),
            attrs: Attrs::new(),
        };
        for (tag, value) in attrs.iter() {
            if FILTERABLE.contains(&tag) {
                filter.attrs.push(tag, value.clone());
            }
        }
        filter
    }
}

/// The group an operation acts in: the explicit group attribute when
/// supplied, the caller's own group otherwise.
pub(crate) fn effective_group(caller: &CallerIdentity, attrs: &Attrs) -> Option<Vec<u8>> {
    match attrs.get(Tag::GroupId) {
        Some(Value::Bytes(group)) => Some(group.clone()),
        _ => caller.group.clone(),
    }
}

/// Fill the access-policy defaults an add operation leaves implicit.
pub(crate) fn fill_add_defaults(attrs: &Attrs) -> Attrs {
    let mut filled = attrs.clone();
    let defaults: [(Tag, Value); 5] = [
        (Tag::Accessibility, Value::Number(Accessibility::DeviceFirstUnlocked as u32)),
        (Tag::AuthType, Value::Number(AuthType::None as u32)),
        (Tag::SyncType, Value::Number(SyncType::Never as u32)),
        (Tag::RequirePasswordSet, Value::Bool(false)),
        (Tag::IsPersistent, Value::Bool(false)),
    ];
    for (tag, value) in defaults {
        if !filled.contains(tag) {
            filled.push(tag, value);
        }
    }
    filled
}

/// Associated data binding a ciphertext to the record's identity and
/// access-control attributes, in fixed order.
pub(crate) fn build_aad(
    owner: &[u8],
    owner_kind: OwnerKind,
    group: Option<&[u8]>,
    attrs: &Attrs,
) -> Vec<u8> {
    let mut aad = Vec::new();

    let push_bytes = |tag: Tag, aad: &mut Vec<u8>| {
        if let Some(Value::Bytes(b)) = attrs.get(tag) {
            aad.extend_from_slice(b);
        }
    };
    let push_number = |tag: Tag, aad: &mut Vec<u8>| {
        if let Some(Value::Number(n)) = attrs.get(tag) {
            aad.extend_from_slice(&n.to_le_bytes());
        }
    };
    let push_bool = |tag: Tag, aad: &mut Vec<u8>| {
        if let Some(Value::Bool(b)) = attrs.get(tag) {
            aad.push(*b as u8);
        }
    };

    push_bytes(Tag::Alias, &mut aad);
    aad.extend_from_slice(owner);
    aad.extend_from_slice(&(owner_kind as u32).to_le_bytes());
    if let Some(group) = group {
        aad.extend_from_slice(group);
    }
    push_number(Tag::SyncType, &mut aad);
    push_number(Tag::Accessibility, &mut aad);
    push_bool(Tag::RequirePasswordSet, &mut aad);
    push_number(Tag::AuthType, &mut aad);
    push_bytes(Tag::DataLabelCritical1, &mut aad);
    push_bytes(Tag::DataLabelCritical2, &mut aad);
    push_bytes(Tag::DataLabelCritical3, &mut aad);
    push_bytes(Tag::DataLabelCritical4, &mut aad);
    aad
}

/// Associated data of a stored record.
pub(crate) fn record_aad(record: &Record) -> Vec<u8> {
    build_aad(&record.owner, record.owner_kind, record.group.as_deref(), &record.attrs)
}
