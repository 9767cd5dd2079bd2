//! The CRUD-style operations.
//!
//! Every operation validates its attribute list first; a validation failure
//! is reported before any vault or store call, so a rejected operation is
//! never partially applied.

use tracing::{debug, info};

use sealstore_common::{
    Attrs, AuthType, ConflictResolution, Error, Result, ReturnType, Tag, Value,
};
use sealstore_crypto::{decrypt, encrypt, CipherSession};
use sealstore_schema::{validate, validate_update, Action};

use crate::platform::CallerIdentity;
use crate::service::{build_aad, effective_group, fill_add_defaults, record_aad, SecretService};
use crate::store::{QueryOptions, Record};
use crate::sync::SyncResult;

impl SecretService {
    /// Store a new secret.
    ///
    /// Access-policy attributes left implicit are filled with their
    /// defaults, the secret is encrypted under the resolved key, and the
    /// record is inserted. An existing alias is replaced only when the
    /// caller asked for `Overwrite`.
    ///
    /// # Errors
    /// - `InvalidArgument` for malformed attributes or an unknown target
    ///   user.
    /// - `StatusMismatch` if a lock-screen credential is required but not
    ///   enrolled.
    /// - `Duplicated` if the alias exists and no overwrite was requested.
    pub fn add(&self, caller: &CallerIdentity, attrs: &Attrs) -> Result<()> {
        validate(Action::Add, attrs)?;
        let user_id = self.resolve_user_id(caller, attrs)?;

        if attrs.get(Tag::RequirePasswordSet) == Some(&Value::Bool(true))
            && !self.device.screen_lock_enrolled()?
        {
            return Err(Error::StatusMismatch(
                "the record requires a lock-screen credential and none is enrolled".to_string(),
            ));
        }

        let filled = fill_add_defaults(attrs);
        let group = effective_group(caller, &filled);

        let mut stored = filled.clone();
        stored.remove(Tag::Secret);
        stored.remove(Tag::ConflictResolution);
        stored.remove(Tag::UserId);
        stored.remove(Tag::GroupId);

        let key = self.secret_key_for(&caller.owner, user_id, &stored)?;
        key.ensure(self.vault.as_ref())?;

        let aad = build_aad(&caller.owner, caller.kind, group.as_deref(), &stored);
        let cipher = encrypt(self.vault.as_ref(), key.id(), &aad, filled.bytes(Tag::Secret)?)?;
        stored.set(Tag::Secret, cipher);

        let alias = filled.bytes(Tag::Alias)?.to_vec();
        let mut by_alias = self.build_filter(caller, user_id, &Attrs::new());
        by_alias.group = group.clone();
        by_alias.attrs.push(Tag::Alias, alias.clone());

        if !self.store.query(&by_alias, &QueryOptions::default())?.is_empty() {
            match filled.get(Tag::ConflictResolution) {
                Some(Value::Number(n)) if *n == ConflictResolution::Overwrite as u32 => {
                    self.store.remove(&by_alias)?;
                },
                _ => {
                    return Err(Error::Duplicated(
                        "a record with the specified alias already exists".to_string(),
                    ))
                },
            }
        }

        self.store.insert(Record::new(caller, user_id, group, stored))?;
        info!(user_id, "added secret record");
        Ok(())
    }

    /// Remove every record matching the attribute predicates.
    ///
    /// # Errors
    /// - `NotFound` if nothing matched.
    pub fn remove(&self, caller: &CallerIdentity, attrs: &Attrs) -> Result<()> {
        validate(Action::Remove, attrs)?;
        let user_id = self.resolve_user_id(caller, attrs)?;
        let filter = self.build_filter(caller, user_id, attrs);

        let removed = self.store.remove(&filter)?;
        if removed == 0 {
            return Err(Error::NotFound("no record matches the attributes".to_string()));
        }
        info!(removed, "removed secret records");
        Ok(())
    }

    /// Update the record located by `query_attrs` with `update_attrs`.
    ///
    /// A new secret is re-encrypted under the record's existing key and
    /// access policy; normal labels are patched in place.
    ///
    /// # Errors
    /// - `NotFound` if no record matches the query half.
    pub fn update(
        &self,
        caller: &CallerIdentity,
        query_attrs: &Attrs,
        update_attrs: &Attrs,
    ) -> Result<()> {
        validate_update(query_attrs, update_attrs)?;
        let user_id = self.resolve_user_id(caller, query_attrs)?;
        let filter = self.build_filter(caller, user_id, query_attrs);

        let records = self.store.query(&filter, &QueryOptions::default())?;
        let Some(record) = records.first() else {
            return Err(Error::NotFound("the record to update does not exist".to_string()));
        };

        let mut patch = update_attrs.clone();
        if let Ok(secret) = update_attrs.bytes(Tag::Secret) {
            let key = self.secret_key_for(&record.owner, record.user_id, &record.attrs)?;
            let cipher = encrypt(self.vault.as_ref(), key.id(), &record_aad(record), secret)?;
            patch.set(Tag::Secret, cipher);
        }

        self.store.update(&filter, &patch)?;
        info!("updated secret record");
        Ok(())
    }

    /// Query records.
    ///
    /// With `ReturnType::All` the single matching record is decrypted and
    /// returned with its secret; auth-gated records take the supplied
    /// challenge and token through the session registry. Without it, the
    /// matching records are returned attributes-only, honoring limit,
    /// offset and ordering.
    ///
    /// # Errors
    /// - `Unsupported` for a secret query without an alias.
    /// - `NotFound` if nothing matched.
    /// - `AccessDenied` if an auth-gated secret is queried without a valid
    ///   session proof.
    pub fn query(&self, caller: &CallerIdentity, attrs: &Attrs) -> Result<Vec<Attrs>> {
        validate(Action::Query, attrs)?;
        let user_id = self.resolve_user_id(caller, attrs)?;
        let filter = self.build_filter(caller, user_id, attrs);

        match attrs.get(Tag::ReturnType) {
            Some(Value::Number(n)) if *n == ReturnType::All as u32 => {
                if !attrs.contains(Tag::Alias) {
                    return Err(Error::Unsupported(
                        "batch secret query is not supported".to_string(),
                    ));
                }
                let mut records = self.store.query(&filter, &QueryOptions::default())?;
                let record = match records.len() {
                    0 => {
                        return Err(Error::NotFound(
                            "the record to query does not exist".to_string(),
                        ))
                    },
                    1 => records.remove(0),
                    n => {
                        return Err(Error::DataCorrupted(format!(
                            "the store contains [{n}] records with the specified alias"
                        )))
                    },
                };
                let secret = self.release_secret(attrs, &record)?;
                let mut out = record.attrs.clone();
                out.set(Tag::Secret, secret);
                Ok(vec![out])
            },
            _ => {
                let options = QueryOptions {
                    offset: attrs.number(Tag::ReturnOffset).ok(),
                    limit: attrs.number(Tag::ReturnLimit).ok(),
                    order_by: attrs
                        .number(Tag::ReturnOrderedBy)
                        .ok()
                        .and_then(|raw| Tag::try_from(raw).ok()),
                };
                let records = self.store.query(&filter, &options)?;
                if records.is_empty() {
                    return Err(Error::NotFound(
                        "the records to query do not exist".to_string(),
                    ));
                }
                debug!(found = records.len(), "attribute query");
                Ok(records
                    .into_iter()
                    .map(|record| {
                        let mut out = record.attrs.clone();
                        out.remove(Tag::Secret);
                        out
                    })
                    .collect())
            },
        }
    }

    /// Open authenticated sessions for the matching auth-gated records.
    ///
    /// One session is opened per distinct accessibility among the matches
    /// and registered under its challenge; the returned challenge is relayed
    /// to the out-of-band user-authentication step.
    ///
    /// # Errors
    /// - `NotFound` if no auth-gated record matches.
    /// - `LimitExceeded` if the session registry is full.
    pub fn pre_query(&self, caller: &CallerIdentity, attrs: &Attrs) -> Result<Vec<u8>> {
        validate(Action::PreQuery, attrs)?;
        let user_id = self.resolve_user_id(caller, attrs)?;
        let validity = attrs
            .number(Tag::AuthValidityPeriod)
            .unwrap_or(self.config.default_auth_validity_secs);

        let mut filter = self.build_filter(caller, user_id, attrs);
        filter.attrs.set(Tag::AuthType, AuthType::Any as u32);

        let records = self.store.query(&filter, &QueryOptions::default())?;
        if records.is_empty() {
            return Err(Error::NotFound(
                "no auth-gated record matches the attributes".to_string(),
            ));
        }

        let mut combos: Vec<(u32, bool)> = Vec::new();
        for record in &records {
            let combo = (
                record.attrs.number(Tag::Accessibility)?,
                record.attrs.flag(Tag::RequirePasswordSet)?,
            );
            if !combos.contains(&combo) {
                combos.push(combo);
            }
        }

        let mut challenge = Vec::new();
        for (accessibility, require_password_set) in combos {
            let key = self.secret_key_for(
                &caller.owner,
                user_id,
                &Attrs::new()
                    .with(Tag::AuthType, AuthType::Any as u32)
                    .with(Tag::Accessibility, accessibility)
                    .with(Tag::RequirePasswordSet, require_password_set),
            )?;
            let session = CipherSession::init(self.vault.clone(), key.id().clone(), validity)?;
            challenge = session.challenge().to_vec();
            self.sessions.add(session)?;
        }
        info!(validity, "opened authenticated query sessions");
        Ok(challenge)
    }

    /// Close the authenticated sessions opened for `challenge`.
    ///
    /// Dropping the sessions releases their vault-side resources; an
    /// unknown challenge is a no-op, so post-query always succeeds after a
    /// successful pre-query, even if the exec step failed.
    pub fn post_query(&self, _caller: &CallerIdentity, attrs: &Attrs) -> Result<()> {
        validate(Action::PostQuery, attrs)?;
        self.sessions.remove(attrs.bytes(Tag::AuthChallenge)?);
        Ok(())
    }

    /// Report the outcome of the last synchronization.
    pub fn query_sync_result(&self, caller: &CallerIdentity, attrs: &Attrs) -> Result<SyncResult> {
        validate(Action::QuerySyncResult, attrs)?;
        self.sync.query_sync_result(caller, attrs)
    }

    fn release_secret(&self, attrs: &Attrs, record: &Record) -> Result<Vec<u8>> {
        let auth_type: AuthType = record.attrs.decode(Tag::AuthType)?;
        let key = self.secret_key_for(&record.owner, record.user_id, &record.attrs)?;
        let aad = record_aad(record);
        let cipher = record.attrs.bytes(Tag::Secret)?;

        match auth_type {
            AuthType::None => decrypt(self.vault.as_ref(), key.id(), &aad, cipher),
            AuthType::Any => {
                let (Ok(challenge), Ok(token)) =
                    (attrs.bytes(Tag::AuthChallenge), attrs.bytes(Tag::AuthToken))
                else {
                    return Err(Error::AccessDenied(
                        "releasing this secret requires user authentication".to_string(),
                    ));
                };
                self.sessions.exec(challenge, key.id(), &aad, token, cipher)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use sealstore_common::{Accessibility, ErrorCode, SyncType};
    use sealstore_crypto::SoftwareVault;

    use crate::platform::FixedDeviceState;
    use crate::store::MemoryStore;

    struct Fixture {
        service: SecretService,
        vault: Arc<SoftwareVault>,
        device: Arc<FixedDeviceState>,
    }

    fn fixture() -> Fixture {
        let vault = Arc::new(SoftwareVault::new());
        let device = Arc::new(FixedDeviceState::new());
        let service = SecretService::new(
            vault.clone(),
            Arc::new(MemoryStore::new()),
            device.clone(),
        );
        Fixture { service, vault, device }
    }

    fn caller() -> CallerIdentity {
        CallerIdentity::app(100, "com.example.mail")
    }

    fn add_attrs(alias: &str, secret: &str) -> Attrs {
        Attrs::new().with(Tag::Secret, secret).with(Tag::Alias, alias)
    }

    #[test]
    fn test_add_and_query_secret_round_trip() {
        let fx = fixture();
        fx.service.add(&caller(), &add_attrs("mail", "hunter2")).unwrap();

        let query = Attrs::new()
            .with(Tag::Alias, "mail")
            .with(Tag::ReturnType, ReturnType::All as u32);
        let results = fx.service.query(&caller(), &query).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].bytes(Tag::Secret).unwrap(), b"hunter2");
    }

    #[test]
    fn test_add_fills_defaults() {
        let fx = fixture();
        fx.service.add(&caller(), &add_attrs("mail", "s")).unwrap();

        let results = fx
            .service
            .query(&caller(), &Attrs::new().with(Tag::Alias, "mail"))
            .unwrap();
        let record = &results[0];
        assert_eq!(
            record.number(Tag::Accessibility).unwrap(),
            Accessibility::DeviceFirstUnlocked as u32
        );
        assert_eq!(record.number(Tag::AuthType).unwrap(), AuthType::None as u32);
        assert_eq!(record.number(Tag::SyncType).unwrap(), SyncType::Never as u32);
        assert!(!record.flag(Tag::RequirePasswordSet).unwrap());
    }

    #[test]
    fn test_add_validation_precedes_storage() {
        let fx = fixture();
        let err = fx
            .service
            .add(&caller(), &Attrs::new().with(Tag::Alias, "mail"))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidArgument);

        // Nothing was stored.
        let err = fx
            .service
            .query(&caller(), &Attrs::new().with(Tag::Alias, "mail"))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[test]
    fn test_add_duplicate_alias() {
        let fx = fixture();
        fx.service.add(&caller(), &add_attrs("mail", "one")).unwrap();

        let err = fx.service.add(&caller(), &add_attrs("mail", "two")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Duplicated);

        let overwrite = add_attrs("mail", "two")
            .with(Tag::ConflictResolution, ConflictResolution::Overwrite as u32);
        fx.service.add(&caller(), &overwrite).unwrap();

        let query = Attrs::new()
            .with(Tag::Alias, "mail")
            .with(Tag::ReturnType, ReturnType::All as u32);
        let results = fx.service.query(&caller(), &query).unwrap();
        assert_eq!(results[0].bytes(Tag::Secret).unwrap(), b"two");
    }

    #[test]
    fn test_add_for_unknown_user_is_rejected() {
        let fx = fixture();
        let attrs = add_attrs("mail", "s").with(Tag::UserId, 101u32);
        let err = fx.service.add(&caller(), &attrs).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidArgument);

        fx.device.add_user(101);
        fx.service.add(&caller(), &add_attrs("mail", "s").with(Tag::UserId, 101u32)).unwrap();
    }

    #[test]
    fn test_add_requires_enrolled_credential_when_asked() {
        let fx = fixture();
        fx.device.set_screen_lock_enrolled(false);
        fx.vault.set_password_enrolled(false);

        let attrs = add_attrs("mail", "s").with(Tag::RequirePasswordSet, true);
        let err = fx.service.add(&caller(), &attrs).unwrap_err();
        assert_eq!(err.code(), ErrorCode::StatusMismatch);
    }

    #[test]
    fn test_remove() {
        let fx = fixture();
        fx.service.add(&caller(), &add_attrs("mail", "s")).unwrap();

        fx.service
            .remove(&caller(), &Attrs::new().with(Tag::Alias, "mail"))
            .unwrap();
        let err = fx
            .service
            .remove(&caller(), &Attrs::new().with(Tag::Alias, "mail"))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[test]
    fn test_records_are_scoped_to_their_owner() {
        let fx = fixture();
        fx.service.add(&caller(), &add_attrs("mail", "s")).unwrap();

        let other = CallerIdentity::app(100, "com.example.other");
        let err = fx
            .service
            .query(&other, &Attrs::new().with(Tag::Alias, "mail"))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[test]
    fn test_update_labels_and_secret() {
        let fx = fixture();
        fx.service.add(
            &caller(),
            &add_attrs("mail", "old").with(Tag::DataLabelNormal1, "v1"),
        )
        .unwrap();

        let query_half = Attrs::new().with(Tag::Alias, "mail");
        let update_half = Attrs::new()
            .with(Tag::Secret, "new")
            .with(Tag::DataLabelNormal1, "v2");
        fx.service.update(&caller(), &query_half, &update_half).unwrap();

        let results = fx
            .service
            .query(
                &caller(),
                &Attrs::new()
                    .with(Tag::Alias, "mail")
                    .with(Tag::ReturnType, ReturnType::All as u32),
            )
            .unwrap();
        assert_eq!(results[0].bytes(Tag::Secret).unwrap(), b"new");
        assert_eq!(results[0].bytes(Tag::DataLabelNormal1).unwrap(), b"v2");
    }

    #[test]
    fn test_update_missing_record() {
        let fx = fixture();
        let err = fx
            .service
            .update(
                &caller(),
                &Attrs::new().with(Tag::Alias, "absent"),
                &Attrs::new().with(Tag::DataLabelNormal1, "x"),
            )
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[test]
    fn test_attribute_query_strips_secret() {
        let fx = fixture();
        fx.service.add(&caller(), &add_attrs("mail", "s")).unwrap();

        let results = fx
            .service
            .query(&caller(), &Attrs::new().with(Tag::Alias, "mail"))
            .unwrap();
        assert!(!results[0].contains(Tag::Secret));
    }

    #[test]
    fn test_attribute_query_pagination_and_order() {
        let fx = fixture();
        for alias in ["c", "a", "b"] {
            fx.service
                .add(
                    &caller(),
                    &add_attrs(alias, "s").with(Tag::DataLabelNormal1, alias),
                )
                .unwrap();
        }

        let query = Attrs::new()
            .with(Tag::ReturnOrderedBy, Tag::DataLabelNormal1 as u32)
            .with(Tag::ReturnOffset, 1u32)
            .with(Tag::ReturnLimit, 1u32);
        let results = fx.service.query(&caller(), &query).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].bytes(Tag::Alias).unwrap(), b"b");
    }

    #[test]
    fn test_batch_secret_query_is_unsupported() {
        let fx = fixture();
        fx.service.add(&caller(), &add_attrs("mail", "s")).unwrap();

        let query = Attrs::new().with(Tag::ReturnType, ReturnType::All as u32);
        let err = fx.service.query(&caller(), &query).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Unsupported);
    }

    fn add_auth_gated(fx: &Fixture, alias: &str, secret: &str) {
        let attrs = add_attrs(alias, secret)
            .with(Tag::AuthType, AuthType::Any as u32)
            .with(Tag::Accessibility, Accessibility::DeviceUnlocked as u32);
        fx.service.add(&caller(), &attrs).unwrap();
    }

    #[test]
    fn test_authenticated_release_end_to_end() {
        let fx = fixture();
        add_auth_gated(&fx, "bank", "pin-1234");

        let challenge = fx
            .service
            .pre_query(&caller(), &Attrs::new().with(Tag::Alias, "bank"))
            .unwrap();
        assert_eq!(challenge.len(), 32);

        let base_query = Attrs::new()
            .with(Tag::Alias, "bank")
            .with(Tag::ReturnType, ReturnType::All as u32)
            .with(Tag::AuthChallenge, challenge.clone());

        // A forged token is rejected as an authentication failure, not as a
        // malformed argument.
        let forged = base_query.clone().with(Tag::AuthToken, vec![0u8; 148]);
        let err = fx.service.query(&caller(), &forged).unwrap_err();
        assert_eq!(err.code(), ErrorCode::AccessDenied);

        // Closing the sessions succeeds regardless of the failed release.
        fx.service
            .post_query(
                &caller(),
                &Attrs::new().with(Tag::AuthChallenge, challenge),
            )
            .unwrap();
    }

    #[test]
    fn test_authenticated_release_with_genuine_token() {
        let fx = fixture();
        add_auth_gated(&fx, "bank", "pin-1234");

        let challenge = fx
            .service
            .pre_query(&caller(), &Attrs::new().with(Tag::Alias, "bank"))
            .unwrap();
        let token = fx.vault.issue_auth_token(&challenge);

        let query = Attrs::new()
            .with(Tag::Alias, "bank")
            .with(Tag::ReturnType, ReturnType::All as u32)
            .with(Tag::AuthChallenge, challenge.clone())
            .with(Tag::AuthToken, token);
        let results = fx.service.query(&caller(), &query).unwrap();
        assert_eq!(results[0].bytes(Tag::Secret).unwrap(), b"pin-1234");

        fx.service
            .post_query(&caller(), &Attrs::new().with(Tag::AuthChallenge, challenge.clone()))
            .unwrap();

        // The session is gone: the same challenge no longer releases.
        let token = fx.vault.issue_auth_token(&challenge);
        let query = Attrs::new()
            .with(Tag::Alias, "bank")
            .with(Tag::ReturnType, ReturnType::All as u32)
            .with(Tag::AuthChallenge, challenge)
            .with(Tag::AuthToken, token);
        let err = fx.service.query(&caller(), &query).unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[test]
    fn test_auth_gated_query_without_session_is_denied() {
        let fx = fixture();
        add_auth_gated(&fx, "bank", "pin-1234");

        let query = Attrs::new()
            .with(Tag::Alias, "bank")
            .with(Tag::ReturnType, ReturnType::All as u32);
        let err = fx.service.query(&caller(), &query).unwrap_err();
        assert_eq!(err.code(), ErrorCode::AccessDenied);
    }

    #[test]
    fn test_pre_query_without_matching_record() {
        let fx = fixture();
        fx.service.add(&caller(), &add_attrs("plain", "s")).unwrap();

        let err = fx
            .service
            .pre_query(&caller(), &Attrs::new().with(Tag::Alias, "plain"))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[test]
    fn test_device_lock_drops_unlocked_only_sessions() {
        let fx = fixture();
        add_auth_gated(&fx, "bank", "pin-1234");

        let challenge = fx
            .service
            .pre_query(&caller(), &Attrs::new().with(Tag::Alias, "bank"))
            .unwrap();
        fx.service.on_device_lock();

        let token = fx.vault.issue_auth_token(&challenge);
        let query = Attrs::new()
            .with(Tag::Alias, "bank")
            .with(Tag::ReturnType, ReturnType::All as u32)
            .with(Tag::AuthChallenge, challenge)
            .with(Tag::AuthToken, token);
        let err = fx.service.query(&caller(), &query).unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[test]
    fn test_query_sync_result_validates_and_delegates() {
        let fx = fixture();
        let result = fx
            .service
            .query_sync_result(&caller(), &Attrs::new().with(Tag::RequireAttrEncrypted, true))
            .unwrap();
        assert_eq!(result, SyncResult::default());

        let err = fx
            .service
            .query_sync_result(&caller(), &Attrs::new().with(Tag::Alias, "mail"))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
    }
}
