//! Credential verification over the store.
//!
//! Clients submit an already-derived password hash; it is treated as an
//! opaque blob, wrapped once more server-side, and compared in constant
//! time. A mismatch is a normal negative result, not an error.

use std::sync::Arc;

use crate::auth::error::AuthError;
use crate::auth::identity::UserId;
use crate::auth::keys::{constant_time_eq, now_unix, wrap_credential};
use crate::auth::store::{AuthStore, CredentialRecord};

#[derive(Clone)]
pub struct CredentialVerifier {
    store: Arc<dyn AuthStore>,
}

impl CredentialVerifier {
    #[must_use]
    pub fn new(store: Arc<dyn AuthStore>) -> Self {
        Self { store }
    }

    /// Check a submitted hash against the stored credential.
    ///
    /// Returns `Ok(false)` on mismatch; fails with [`AuthError::NotFound`]
    /// only when the user has no credential at all.
    pub async fn verify(&self, user: &UserId, submitted: &str) -> Result<bool, AuthError> {
        let Some(stored) = self.store.get_credential(user).await? else {
            return Err(AuthError::NotFound);
        };

        let wrapped = wrap_credential(submitted);
        Ok(constant_time_eq(wrapped.as_bytes(), stored.wrapped.as_bytes()))
    }

    /// Overwrite the stored credential. Used by account provisioning and by
    /// reset completion.
    pub async fn set_credential(&self, user: &UserId, submitted: &str) -> Result<(), AuthError> {
        let record = CredentialRecord {
            wrapped: wrap_credential(submitted),
            updated_at: now_unix(),
        };
        self.store.put_credential(user, &record).await?;
        Ok(())
    }
}
