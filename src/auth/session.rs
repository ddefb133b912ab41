//! Session state machine: open, validate, list, get, delete.
//!
//! A session is `Active` while `now - lastupdate <= TTL`; expiry is computed
//! at read time, never swept for correctness. Every successful validation
//! slides the window forward. Expired rows are reclaimed lazily on the
//! validation path and, optionally, by the background reaper.

use std::sync::Arc;
use tracing::debug;

use crate::auth::credential::CredentialVerifier;
use crate::auth::error::AuthError;
use crate::auth::identity::{SessionSelector, UserId};
use crate::auth::keys::{generate_session_key, hash_session_key, now_unix};
use crate::auth::store::{AuthStore, InsertSessionOutcome, SessionRecord, TouchOutcome};
use anyhow::anyhow;
use uuid::Uuid;

/// Retry budget for the freak case of a session key-hash collision.
const KEY_INSERT_ATTEMPTS: usize = 3;

/// A freshly opened session together with its raw key. The key exists only
/// in this value; it is never recoverable afterwards.
pub struct SessionCreated {
    pub session: SessionRecord,
    pub key: String,
}

#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn AuthStore>,
    credentials: CredentialVerifier,
    ttl_seconds: i64,
}

impl SessionManager {
    #[must_use]
    pub fn new(store: Arc<dyn AuthStore>, credentials: CredentialVerifier, ttl_seconds: i64) -> Self {
        Self {
            store,
            credentials,
            ttl_seconds,
        }
    }

    #[must_use]
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    /// Authenticate and open a new session for `user`.
    ///
    /// A user that exists but has no credential fails exactly like a wrong
    /// password, so unprovisioned accounts cannot be probed.
    pub async fn open(&self, user: &UserId, submitted: &str) -> Result<SessionCreated, AuthError> {
        if self.store.get_user(user).await?.is_none() {
            return Err(AuthError::UnknownUser);
        }

        match self.credentials.verify(user, submitted).await {
            Ok(true) => {}
            Ok(false) | Err(AuthError::NotFound) => return Err(AuthError::InvalidCredential),
            Err(err) => return Err(err),
        }

        let now = now_unix();
        for _ in 0..KEY_INSERT_ATTEMPTS {
            let key = generate_session_key()?;
            let record = SessionRecord {
                session_id: Uuid::new_v4(),
                key_hash: hash_session_key(&key),
                owner: user.clone(),
                startdate: now,
                lastupdate: now,
            };

            match self.store.insert_session(&record).await? {
                InsertSessionOutcome::Inserted => {
                    debug!(user = %user, session_id = %record.session_id, "session opened");
                    return Ok(SessionCreated { session: record, key });
                }
                InsertSessionOutcome::DuplicateKey => {}
            }
        }

        Err(AuthError::Internal(anyhow!(
            "failed to allocate a unique session key"
        )))
    }

    /// Validate a presented key, sliding its expiration window forward.
    pub async fn validate(&self, key: &str) -> Result<SessionRecord, AuthError> {
        let key_hash = hash_session_key(key);
        match self
            .store
            .touch_session(&key_hash, now_unix(), self.ttl_seconds)
            .await?
        {
            TouchOutcome::Touched(record) => Ok(record),
            TouchOutcome::Expired => Err(AuthError::KeyExpired),
            TouchOutcome::Missing => Err(AuthError::KeyInvalid),
        }
    }

    /// All live sessions owned by `owner`.
    pub async fn list_for(&self, owner: &UserId) -> Result<Vec<SessionRecord>, AuthError> {
        Ok(self
            .store
            .sessions_for_owner(owner, now_unix(), self.ttl_seconds)
            .await?)
    }

    /// Resolve `selector` for an already-validated requester session.
    ///
    /// `current` resolves to the requester's own session; failing to find it
    /// again means the store dropped a row we just touched, which is an
    /// internal inconsistency rather than a normal outcome.
    pub async fn get(
        &self,
        requester: &SessionRecord,
        selector: SessionSelector,
    ) -> Result<SessionRecord, AuthError> {
        match selector {
            SessionSelector::Current => self
                .store
                .session_by_id(requester.session_id)
                .await?
                .ok_or_else(|| {
                    AuthError::Internal(anyhow!(
                        "store inconsistency: current session {} vanished",
                        requester.session_id
                    ))
                }),
            SessionSelector::Id(session_id) => {
                let Some(record) = self.store.session_by_id(session_id).await? else {
                    return Err(AuthError::NotFound);
                };
                // Expired rows are dead for every read, whoever owns them.
                if record.is_expired(now_unix(), self.ttl_seconds) {
                    return Err(AuthError::NotFound);
                }
                if record.owner != requester.owner {
                    return Err(AuthError::Forbidden);
                }
                Ok(record)
            }
        }
    }

    /// Delete the selected session. Deleting a session that is already gone
    /// or already expired is a success, not an error.
    pub async fn delete(
        &self,
        requester: &SessionRecord,
        selector: SessionSelector,
    ) -> Result<(), AuthError> {
        match selector {
            SessionSelector::Current => {
                self.store.delete_session(requester.session_id).await?;
                Ok(())
            }
            SessionSelector::Id(session_id) => {
                let Some(record) = self.store.session_by_id(session_id).await? else {
                    return Ok(());
                };
                if record.is_expired(now_unix(), self.ttl_seconds) {
                    // Already dead; reclaim the row and report success.
                    self.store.delete_session(session_id).await?;
                    return Ok(());
                }
                if record.owner != requester.owner {
                    return Err(AuthError::Forbidden);
                }
                self.store.delete_session(session_id).await?;
                Ok(())
            }
        }
    }
}
