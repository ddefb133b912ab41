//! User directory: lookups and provisioning with all business rules.

use secrecy::ExposeSecret;
use std::sync::Arc;
use tracing::info;

use crate::auth::config::BootstrapConfig;
use crate::auth::credential::CredentialVerifier;
use crate::auth::error::AuthError;
use crate::auth::guard::AuthorizationGuard;
use crate::auth::identity::UserId;
use crate::auth::keys::now_unix;
use crate::auth::store::{AuthStore, CreateUserOutcome, UserRecord};

/// Provisioning request for one new user.
pub struct NewUser {
    pub id: UserId,
    pub email: String,
    pub parent: Option<UserId>,
    /// Optional client-derived password hash, installed as the initial
    /// credential when present.
    pub password_hash: Option<String>,
}

#[derive(Clone)]
pub struct UserDirectory {
    store: Arc<dyn AuthStore>,
    guard: AuthorizationGuard,
    credentials: CredentialVerifier,
}

impl UserDirectory {
    #[must_use]
    pub fn new(
        store: Arc<dyn AuthStore>,
        guard: AuthorizationGuard,
        credentials: CredentialVerifier,
    ) -> Self {
        Self {
            store,
            guard,
            credentials,
        }
    }

    /// Fetch one user record.
    pub async fn get(&self, id: &UserId) -> Result<UserRecord, AuthError> {
        self.store
            .get_user(id)
            .await?
            .ok_or(AuthError::NotFound)
    }

    /// Create a user, enforcing the provisioning rules:
    /// duplicate identities and closed or unknown orgs are rejected, a
    /// declared parent must exist, and the caller must prove ownership of
    /// that parent with a live session key.
    pub async fn provision(&self, new_user: NewUser, key: Option<&str>) -> Result<(), AuthError> {
        if self.store.get_user(&new_user.id).await?.is_some() {
            return Err(AuthError::UserExists);
        }

        // Closed and unknown orgs share one answer so org names cannot be
        // probed through the registration endpoint.
        match self.store.registration_open(&new_user.id.org).await? {
            Some(true) => {}
            Some(false) | None => return Err(AuthError::OrgClosed),
        }

        if let Some(parent) = &new_user.parent {
            if self.store.get_user(parent).await?.is_none() {
                return Err(AuthError::Validation(format!(
                    "parent user {parent} does not exist"
                )));
            }
            self.guard.authorize_parentage(parent, key).await?;
        }

        let record = UserRecord {
            id: new_user.id.clone(),
            email: new_user.email,
            parent: new_user.parent,
            createdate: now_unix(),
        };
        match self.store.create_user(&record).await? {
            CreateUserOutcome::Created => {}
            // Lost a race with a concurrent creation of the same identity.
            CreateUserOutcome::Exists => return Err(AuthError::UserExists),
        }

        if let Some(hash) = &new_user.password_hash {
            self.credentials.set_credential(&new_user.id, hash).await?;
        }

        info!(user = %new_user.id, "user created");
        Ok(())
    }

    /// Seed the default org and admin account on a fresh deployment.
    /// Everything here is ensure-style: existing state is left alone.
    pub async fn ensure_bootstrap(&self, bootstrap: &BootstrapConfig) -> Result<(), AuthError> {
        if self.store.registration_open(bootstrap.org()).await?.is_none() {
            self.store
                .set_registration_open(bootstrap.org(), true)
                .await?;
            info!(org = bootstrap.org(), "bootstrap org created");
        }

        let admin = UserId::new(bootstrap.admin_username(), bootstrap.org());
        if self.store.get_user(&admin).await?.is_none() {
            self.store
                .create_user(&UserRecord {
                    id: admin.clone(),
                    email: bootstrap.admin_email().to_string(),
                    parent: None,
                    createdate: now_unix(),
                })
                .await?;
            info!(user = %admin, "bootstrap admin created");
        }

        if let Some(hash) = bootstrap.admin_password_hash() {
            if self.store.get_credential(&admin).await?.is_none() {
                self.credentials
                    .set_credential(&admin, hash.expose_secret())
                    .await?;
                info!(user = %admin, "bootstrap admin credential installed");
            }
        }

        Ok(())
    }
}
