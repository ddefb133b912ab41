//! In-memory store used by tests and DSN-less local runs.
//!
//! All state lives behind one async `RwLock`; every mutating operation takes
//! the write lock for its whole read-check-write sequence, which is what
//! makes `touch_session` and `consume_reset` atomic here.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::identity::UserId;
use crate::auth::store::{
    AuthStore, CreateUserOutcome, CredentialRecord, InsertSessionOutcome, ResetRecord,
    SessionRecord, TouchOutcome, UserRecord,
};

#[derive(Default)]
struct State {
    users: HashMap<UserId, UserRecord>,
    orgs: HashMap<String, bool>,
    credentials: HashMap<UserId, CredentialRecord>,
    sessions: HashMap<Vec<u8>, SessionRecord>,
    resets: HashMap<Uuid, ResetRecord>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<State>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuthStore for MemoryStore {
    async fn create_user(&self, user: &UserRecord) -> Result<CreateUserOutcome> {
        let mut state = self.inner.write().await;
        if state.users.contains_key(&user.id) {
            return Ok(CreateUserOutcome::Exists);
        }
        state.users.insert(user.id.clone(), user.clone());
        Ok(CreateUserOutcome::Created)
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<UserRecord>> {
        let state = self.inner.read().await;
        Ok(state.users.get(id).cloned())
    }

    async fn registration_open(&self, org: &str) -> Result<Option<bool>> {
        let state = self.inner.read().await;
        Ok(state.orgs.get(org).copied())
    }

    async fn set_registration_open(&self, org: &str, open: bool) -> Result<()> {
        let mut state = self.inner.write().await;
        state.orgs.insert(org.to_string(), open);
        Ok(())
    }

    async fn get_credential(&self, id: &UserId) -> Result<Option<CredentialRecord>> {
        let state = self.inner.read().await;
        Ok(state.credentials.get(id).cloned())
    }

    async fn put_credential(&self, id: &UserId, credential: &CredentialRecord) -> Result<()> {
        let mut state = self.inner.write().await;
        state.credentials.insert(id.clone(), credential.clone());
        Ok(())
    }

    async fn insert_session(&self, record: &SessionRecord) -> Result<InsertSessionOutcome> {
        let mut state = self.inner.write().await;
        if state.sessions.contains_key(&record.key_hash) {
            return Ok(InsertSessionOutcome::DuplicateKey);
        }
        state.sessions.insert(record.key_hash.clone(), record.clone());
        Ok(InsertSessionOutcome::Inserted)
    }

    async fn touch_session(
        &self,
        key_hash: &[u8],
        now: i64,
        ttl_seconds: i64,
    ) -> Result<TouchOutcome> {
        let mut state = self.inner.write().await;
        let Some(record) = state.sessions.get_mut(key_hash) else {
            return Ok(TouchOutcome::Missing);
        };

        if record.is_expired(now, ttl_seconds) {
            // Lazy reclamation; safe because we hold the write lock.
            state.sessions.remove(key_hash);
            return Ok(TouchOutcome::Expired);
        }

        record.lastupdate = now;
        Ok(TouchOutcome::Touched(record.clone()))
    }

    async fn session_by_id(&self, session_id: Uuid) -> Result<Option<SessionRecord>> {
        let state = self.inner.read().await;
        Ok(state
            .sessions
            .values()
            .find(|record| record.session_id == session_id)
            .cloned())
    }

    async fn sessions_for_owner(
        &self,
        owner: &UserId,
        now: i64,
        ttl_seconds: i64,
    ) -> Result<Vec<SessionRecord>> {
        let state = self.inner.read().await;
        let mut sessions: Vec<SessionRecord> = state
            .sessions
            .values()
            .filter(|record| &record.owner == owner && !record.is_expired(now, ttl_seconds))
            .cloned()
            .collect();
        sessions.sort_by_key(|record| record.startdate);
        Ok(sessions)
    }

    async fn delete_session(&self, session_id: Uuid) -> Result<bool> {
        let mut state = self.inner.write().await;
        let key = state
            .sessions
            .values()
            .find(|record| record.session_id == session_id)
            .map(|record| record.key_hash.clone());
        match key {
            Some(key) => {
                state.sessions.remove(&key);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_sessions_for_owner(&self, owner: &UserId) -> Result<u64> {
        let mut state = self.inner.write().await;
        let before = state.sessions.len();
        state.sessions.retain(|_, record| &record.owner != owner);
        Ok((before - state.sessions.len()) as u64)
    }

    async fn reap_expired_sessions(&self, now: i64, ttl_seconds: i64) -> Result<u64> {
        let mut state = self.inner.write().await;
        let before = state.sessions.len();
        state
            .sessions
            .retain(|_, record| !record.is_expired(now, ttl_seconds));
        Ok((before - state.sessions.len()) as u64)
    }

    async fn insert_reset(&self, record: &ResetRecord) -> Result<()> {
        let mut state = self.inner.write().await;
        state.resets.insert(record.reset_id, record.clone());
        Ok(())
    }

    async fn consume_reset(
        &self,
        reset_id: Uuid,
        owner: &UserId,
        now: i64,
    ) -> Result<Option<UserId>> {
        let mut state = self.inner.write().await;
        let Some(record) = state.resets.get_mut(&reset_id) else {
            return Ok(None);
        };

        if &record.owner != owner || record.consumed_at.is_some() || now >= record.expires_at {
            return Ok(None);
        }

        record.consumed_at = Some(now);
        Ok(Some(record.owner.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::keys::hash_session_key;

    fn alice() -> UserId {
        UserId::new("alice", "org1")
    }

    fn session(key: &str, owner: &UserId, start: i64) -> SessionRecord {
        SessionRecord {
            session_id: Uuid::new_v4(),
            key_hash: hash_session_key(key),
            owner: owner.clone(),
            startdate: start,
            lastupdate: start,
        }
    }

    fn user(id: &UserId) -> UserRecord {
        UserRecord {
            id: id.clone(),
            email: format!("{}@mail.test", id.username),
            parent: None,
            createdate: 0,
        }
    }

    #[tokio::test]
    async fn duplicate_user_is_reported_not_overwritten() {
        let store = MemoryStore::new();
        let record = user(&alice());

        assert_eq!(
            store.create_user(&record).await.expect("create"),
            CreateUserOutcome::Created
        );

        let mut again = record.clone();
        again.email = "other@mail.test".to_string();
        assert_eq!(
            store.create_user(&again).await.expect("create"),
            CreateUserOutcome::Exists
        );

        let stored = store.get_user(&alice()).await.expect("get").expect("some");
        assert_eq!(stored.email, "alice@mail.test");
    }

    #[tokio::test]
    async fn touch_extends_live_sessions_only() {
        let store = MemoryStore::new();
        let record = session("key-a", &alice(), 1_000);
        store.insert_session(&record).await.expect("insert");

        // Within the TTL window: extended.
        match store
            .touch_session(&record.key_hash, 1_050, 60)
            .await
            .expect("touch")
        {
            TouchOutcome::Touched(touched) => assert_eq!(touched.lastupdate, 1_050),
            other => panic!("expected Touched, got {other:?}"),
        }

        // Past the TTL window: expired, and the row is gone afterwards.
        match store
            .touch_session(&record.key_hash, 1_200, 60)
            .await
            .expect("touch")
        {
            TouchOutcome::Expired => {}
            other => panic!("expected Expired, got {other:?}"),
        }
        match store
            .touch_session(&record.key_hash, 1_201, 60)
            .await
            .expect("touch")
        {
            TouchOutcome::Missing => {}
            other => panic!("expected Missing, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_key_is_missing() {
        let store = MemoryStore::new();
        match store
            .touch_session(&hash_session_key("never-issued"), 0, 60)
            .await
            .expect("touch")
        {
            TouchOutcome::Missing => {}
            other => panic!("expected Missing, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn owner_listing_filters_expired_rows() {
        let store = MemoryStore::new();
        let owner = alice();
        store
            .insert_session(&session("live", &owner, 1_000))
            .await
            .expect("insert");
        store
            .insert_session(&session("stale", &owner, 100))
            .await
            .expect("insert");

        let live = store
            .sessions_for_owner(&owner, 1_030, 60)
            .await
            .expect("list");
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].startdate, 1_000);
    }

    #[tokio::test]
    async fn reap_removes_only_expired_rows() {
        let store = MemoryStore::new();
        let owner = alice();
        store
            .insert_session(&session("live", &owner, 1_000))
            .await
            .expect("insert");
        store
            .insert_session(&session("stale", &owner, 100))
            .await
            .expect("insert");

        assert_eq!(store.reap_expired_sessions(1_030, 60).await.expect("reap"), 1);
        assert_eq!(store.reap_expired_sessions(1_030, 60).await.expect("reap"), 0);
    }

    #[tokio::test]
    async fn consume_reset_succeeds_exactly_once() {
        let store = MemoryStore::new();
        let owner = alice();
        let reset = ResetRecord {
            reset_id: Uuid::new_v4(),
            owner: owner.clone(),
            createdate: 1_000,
            expires_at: 2_000,
            consumed_at: None,
        };
        store.insert_reset(&reset).await.expect("insert");

        assert_eq!(
            store
                .consume_reset(reset.reset_id, &owner, 1_500)
                .await
                .expect("consume"),
            Some(owner.clone())
        );
        assert_eq!(
            store
                .consume_reset(reset.reset_id, &owner, 1_501)
                .await
                .expect("consume"),
            None
        );
    }

    #[tokio::test]
    async fn consume_reset_rejects_expiry_and_foreign_owner() {
        let store = MemoryStore::new();
        let owner = alice();
        let reset = ResetRecord {
            reset_id: Uuid::new_v4(),
            owner: owner.clone(),
            createdate: 1_000,
            expires_at: 2_000,
            consumed_at: None,
        };
        store.insert_reset(&reset).await.expect("insert");

        // Wrong owner does not burn the token.
        let mallory = UserId::new("mallory", "org1");
        assert_eq!(
            store
                .consume_reset(reset.reset_id, &mallory, 1_500)
                .await
                .expect("consume"),
            None
        );

        // Expired, never consumed: still rejected.
        assert_eq!(
            store
                .consume_reset(reset.reset_id, &owner, 2_000)
                .await
                .expect("consume"),
            None
        );
    }

    #[tokio::test]
    async fn put_credential_replaces_atomically() {
        let store = MemoryStore::new();
        let id = alice();
        store
            .put_credential(
                &id,
                &CredentialRecord {
                    wrapped: "old".to_string(),
                    updated_at: 1,
                },
            )
            .await
            .expect("put");
        store
            .put_credential(
                &id,
                &CredentialRecord {
                    wrapped: "new".to_string(),
                    updated_at: 2,
                },
            )
            .await
            .expect("put");

        let stored = store.get_credential(&id).await.expect("get").expect("some");
        assert_eq!(stored.wrapped, "new");
        assert_eq!(stored.updated_at, 2);
    }
}
