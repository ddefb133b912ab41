//! Self-service password reset: single-use, time-limited tokens.
//!
//! `request` issues a token for out-of-band delivery; `complete` redeems it.
//! Redemption is the one critical section in the system: the store-level
//! consume is a single atomic check-and-set, so of two racing completions
//! exactly one succeeds and the other observes an invalid request.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::auth::credential::CredentialVerifier;
use crate::auth::error::AuthError;
use crate::auth::identity::UserId;
use crate::auth::keys::now_unix;
use crate::auth::store::{AuthStore, ResetRecord};

/// Out-of-band delivery seam for issued reset ids. Real deployments plug in
/// a mail-backed implementation; the default logs and returns `Ok`.
pub trait ResetNotifier: Send + Sync {
    fn deliver(&self, user: &UserId, email: &str, reset_id: Uuid) -> Result<()>;
}

/// Local dev notifier that logs the reset id instead of delivering it.
#[derive(Clone, Debug)]
pub struct LogResetNotifier;

impl ResetNotifier for LogResetNotifier {
    fn deliver(&self, user: &UserId, email: &str, reset_id: Uuid) -> Result<()> {
        info!(user = %user, email = %email, reset_id = %reset_id, "password reset delivery stub");
        Ok(())
    }
}

/// A freshly issued reset request plus the address to deliver it to.
pub struct ResetIssued {
    pub reset_id: Uuid,
    pub email: String,
}

#[derive(Clone)]
pub struct PasswordResetManager {
    store: Arc<dyn AuthStore>,
    credentials: CredentialVerifier,
    reset_ttl_seconds: i64,
    revoke_sessions: bool,
}

impl PasswordResetManager {
    #[must_use]
    pub fn new(
        store: Arc<dyn AuthStore>,
        credentials: CredentialVerifier,
        reset_ttl_seconds: i64,
        revoke_sessions: bool,
    ) -> Self {
        Self {
            store,
            credentials,
            reset_ttl_seconds,
            revoke_sessions,
        }
    }

    /// Issue a new reset request for `user`.
    ///
    /// Multiple pending requests may coexist; each is independently
    /// single-use.
    pub async fn request(&self, user: &UserId) -> Result<ResetIssued, AuthError> {
        let Some(record) = self.store.get_user(user).await? else {
            return Err(AuthError::UnknownUser);
        };

        let now = now_unix();
        let reset = ResetRecord {
            reset_id: Uuid::new_v4(),
            owner: user.clone(),
            createdate: now,
            expires_at: now + self.reset_ttl_seconds,
            consumed_at: None,
        };
        self.store.insert_reset(&reset).await?;

        info!(user = %user, reset_id = %reset.reset_id, "password reset requested");
        Ok(ResetIssued {
            reset_id: reset.reset_id,
            email: record.email,
        })
    }

    /// Redeem a reset token and install the new credential.
    ///
    /// Absent, consumed, expired, and foreign-owner tokens all collapse into
    /// [`AuthError::InvalidRequest`] so callers cannot probe token state.
    pub async fn complete(
        &self,
        user: &UserId,
        reset_id: Uuid,
        new_hash: &str,
    ) -> Result<(), AuthError> {
        let Some(owner) = self
            .store
            .consume_reset(reset_id, user, now_unix())
            .await?
        else {
            return Err(AuthError::InvalidRequest);
        };

        self.credentials.set_credential(&owner, new_hash).await?;

        if self.revoke_sessions {
            let revoked = self.store.delete_sessions_for_owner(&owner).await?;
            info!(user = %owner, revoked, "password reset completed, sessions revoked");
        } else {
            info!(user = %owner, "password reset completed");
        }

        Ok(())
    }
}
