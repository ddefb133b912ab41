//! Authentication core: credentials, sessions, password resets, and the
//! authorization rules between them.
//!
//! The engine is assembled over one [`store::AuthStore`] trait object, so
//! the same components run against PostgreSQL in production and the
//! in-memory store in tests. Components:
//!
//! - [`credential::CredentialVerifier`] — opaque credential compare/replace
//! - [`session::SessionManager`] — session lifecycle with sliding expiration
//! - [`reset::PasswordResetManager`] — single-use reset tokens
//! - [`guard::AuthorizationGuard`] — ownership and parentage checks
//! - [`directory::UserDirectory`] — user lookups and provisioning rules

use std::sync::Arc;

pub mod config;
pub mod credential;
pub mod directory;
pub mod error;
pub mod guard;
pub mod identity;
pub mod keys;
pub mod reaper;
pub mod reset;
pub mod session;
pub mod store;

use config::AuthConfig;
use credential::CredentialVerifier;
use directory::UserDirectory;
use error::AuthError;
use guard::AuthorizationGuard;
use reset::{PasswordResetManager, ResetNotifier};
use session::SessionManager;
use store::AuthStore;

/// The assembled engine handed to the HTTP surface.
pub struct AuthEngine {
    config: AuthConfig,
    store: Arc<dyn AuthStore>,
    credentials: CredentialVerifier,
    sessions: SessionManager,
    guard: AuthorizationGuard,
    resets: PasswordResetManager,
    directory: UserDirectory,
    notifier: Arc<dyn ResetNotifier>,
}

impl AuthEngine {
    #[must_use]
    pub fn new(
        store: Arc<dyn AuthStore>,
        config: AuthConfig,
        notifier: Arc<dyn ResetNotifier>,
    ) -> Self {
        let credentials = CredentialVerifier::new(store.clone());
        let sessions = SessionManager::new(
            store.clone(),
            credentials.clone(),
            config.session_ttl_seconds(),
        );
        let guard = AuthorizationGuard::new(sessions.clone());
        let resets = PasswordResetManager::new(
            store.clone(),
            credentials.clone(),
            config.reset_ttl_seconds(),
            config.revoke_sessions_on_reset(),
        );
        let directory = UserDirectory::new(store.clone(), guard.clone(), credentials.clone());

        Self {
            config,
            store,
            credentials,
            sessions,
            guard,
            resets,
            directory,
            notifier,
        }
    }

    /// Seed bootstrap state and spawn the reaper, when configured.
    pub async fn start_background(&self) -> Result<(), AuthError> {
        if let Some(bootstrap) = self.config.bootstrap() {
            self.directory.ensure_bootstrap(bootstrap).await?;
        }

        let interval = self.config.reaper_interval_seconds();
        if interval > 0 {
            reaper::spawn_session_reaper(
                self.store.clone(),
                self.config.session_ttl_seconds(),
                std::time::Duration::from_secs(interval),
            );
        }

        Ok(())
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn credentials(&self) -> &CredentialVerifier {
        &self.credentials
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    #[must_use]
    pub fn guard(&self) -> &AuthorizationGuard {
        &self.guard
    }

    #[must_use]
    pub fn resets(&self) -> &PasswordResetManager {
        &self.resets
    }

    #[must_use]
    pub fn directory(&self) -> &UserDirectory {
        &self.directory
    }

    #[must_use]
    pub fn notifier(&self) -> &dyn ResetNotifier {
        self.notifier.as_ref()
    }
}
