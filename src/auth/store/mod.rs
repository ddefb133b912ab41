//! Keyed-store contract behind the auth engine.
//!
//! The engine only ever talks to [`AuthStore`]; [`MemoryStore`] backs tests
//! and DSN-less runs, [`PgStore`] backs production. The two hot paths the
//! session and reset state machines depend on are modelled as single atomic
//! operations on the trait itself: [`AuthStore::touch_session`] (sliding
//! expiry extension) and [`AuthStore::consume_reset`] (single-use token
//! redemption). Implementations must guarantee that concurrent callers of
//! either observe exactly one winner.

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::auth::identity::UserId;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// A provisioned user.
#[derive(Clone, Debug)]
pub struct UserRecord {
    pub id: UserId,
    pub email: String,
    pub parent: Option<UserId>,
    pub createdate: i64,
}

/// Wrapped credential blob for one user. At most one live record per user;
/// `put` replaces it atomically.
#[derive(Clone, Debug)]
pub struct CredentialRecord {
    pub wrapped: String,
    pub updated_at: i64,
}

/// One authenticated login. The raw key is never stored, only its hash.
#[derive(Clone, Debug)]
pub struct SessionRecord {
    pub session_id: Uuid,
    pub key_hash: Vec<u8>,
    pub owner: UserId,
    pub startdate: i64,
    pub lastupdate: i64,
}

impl SessionRecord {
    #[must_use]
    pub fn is_expired(&self, now: i64, ttl_seconds: i64) -> bool {
        now - self.lastupdate > ttl_seconds
    }
}

/// One password-reset request. `consumed_at` flips exactly once.
#[derive(Clone, Debug)]
pub struct ResetRecord {
    pub reset_id: Uuid,
    pub owner: UserId,
    pub createdate: i64,
    pub expires_at: i64,
    pub consumed_at: Option<i64>,
}

/// Outcome of a user insert.
#[derive(Debug, PartialEq, Eq)]
pub enum CreateUserOutcome {
    Created,
    Exists,
}

/// Outcome of a session insert.
#[derive(Debug, PartialEq, Eq)]
pub enum InsertSessionOutcome {
    Inserted,
    DuplicateKey,
}

/// Outcome of a sliding-expiry extension attempt.
#[derive(Debug)]
pub enum TouchOutcome {
    /// The session was live; `lastupdate` now equals the supplied `now`.
    Touched(SessionRecord),
    /// A session carries this key but its TTL had elapsed. The store has
    /// already reclaimed the row (conditional on the observed `lastupdate`).
    Expired,
    /// No session carries this key.
    Missing,
}

#[async_trait]
pub trait AuthStore: Send + Sync {
    // Users and orgs.
    async fn create_user(&self, user: &UserRecord) -> Result<CreateUserOutcome>;
    async fn get_user(&self, id: &UserId) -> Result<Option<UserRecord>>;
    /// `None` means the org itself is unknown.
    async fn registration_open(&self, org: &str) -> Result<Option<bool>>;
    async fn set_registration_open(&self, org: &str, open: bool) -> Result<()>;

    // Credentials.
    async fn get_credential(&self, id: &UserId) -> Result<Option<CredentialRecord>>;
    async fn put_credential(&self, id: &UserId, credential: &CredentialRecord) -> Result<()>;

    // Sessions.
    async fn insert_session(&self, record: &SessionRecord) -> Result<InsertSessionOutcome>;
    /// Atomically extend a live session's `lastupdate` to `now`.
    async fn touch_session(&self, key_hash: &[u8], now: i64, ttl_seconds: i64)
        -> Result<TouchOutcome>;
    async fn session_by_id(&self, session_id: Uuid) -> Result<Option<SessionRecord>>;
    /// Live sessions only; rows past their TTL are filtered out.
    async fn sessions_for_owner(
        &self,
        owner: &UserId,
        now: i64,
        ttl_seconds: i64,
    ) -> Result<Vec<SessionRecord>>;
    async fn delete_session(&self, session_id: Uuid) -> Result<bool>;
    async fn delete_sessions_for_owner(&self, owner: &UserId) -> Result<u64>;
    /// Reclaim rows whose TTL elapsed. The delete predicate re-checks
    /// `lastupdate`, so an extension racing the sweep always wins.
    async fn reap_expired_sessions(&self, now: i64, ttl_seconds: i64) -> Result<u64>;

    // Password resets.
    async fn insert_reset(&self, record: &ResetRecord) -> Result<()>;
    /// Atomically mark the reset consumed iff it is unconsumed, unexpired,
    /// and owned by `owner`. Returns the owner on the one successful call.
    async fn consume_reset(&self, reset_id: Uuid, owner: &UserId, now: i64)
        -> Result<Option<UserId>>;
}
