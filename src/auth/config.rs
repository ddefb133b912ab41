//! Engine configuration with builder-style overrides.

use secrecy::SecretString;

const DEFAULT_SESSION_TTL_SECONDS: i64 = 12 * 60 * 60;
const DEFAULT_RESET_TTL_SECONDS: i64 = 30 * 60;
const DEFAULT_REAPER_INTERVAL_SECONDS: u64 = 60;

/// Bootstrap identity seeded at startup so a fresh deployment has one org
/// open for registrations and one admin account to provision from.
#[derive(Clone, Debug)]
pub struct BootstrapConfig {
    org: String,
    admin_username: String,
    admin_email: String,
    admin_password_hash: Option<SecretString>,
}

impl BootstrapConfig {
    #[must_use]
    pub fn new(org: String, admin_username: String, admin_email: String) -> Self {
        Self {
            org,
            admin_username,
            admin_email,
            admin_password_hash: None,
        }
    }

    #[must_use]
    pub fn with_admin_password_hash(mut self, hash: SecretString) -> Self {
        self.admin_password_hash = Some(hash);
        self
    }

    #[must_use]
    pub fn org(&self) -> &str {
        &self.org
    }

    #[must_use]
    pub fn admin_username(&self) -> &str {
        &self.admin_username
    }

    #[must_use]
    pub fn admin_email(&self) -> &str {
        &self.admin_email
    }

    #[must_use]
    pub fn admin_password_hash(&self) -> Option<&SecretString> {
        self.admin_password_hash.as_ref()
    }
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    session_ttl_seconds: i64,
    reset_ttl_seconds: i64,
    revoke_sessions_on_reset: bool,
    reaper_interval_seconds: u64,
    bootstrap: Option<BootstrapConfig>,
}

impl AuthConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            reset_ttl_seconds: DEFAULT_RESET_TTL_SECONDS,
            revoke_sessions_on_reset: true,
            reaper_interval_seconds: DEFAULT_REAPER_INTERVAL_SECONDS,
            bootstrap: None,
        }
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_reset_ttl_seconds(mut self, seconds: i64) -> Self {
        self.reset_ttl_seconds = seconds;
        self
    }

    /// Whether completing a password reset revokes the owner's sessions.
    #[must_use]
    pub fn with_revoke_sessions_on_reset(mut self, revoke: bool) -> Self {
        self.revoke_sessions_on_reset = revoke;
        self
    }

    /// Cadence of the background expired-session sweep. Zero disables it;
    /// expiry stays correct either way since it is computed at read time.
    #[must_use]
    pub fn with_reaper_interval_seconds(mut self, seconds: u64) -> Self {
        self.reaper_interval_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_bootstrap(mut self, bootstrap: BootstrapConfig) -> Self {
        self.bootstrap = Some(bootstrap);
        self
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub fn reset_ttl_seconds(&self) -> i64 {
        self.reset_ttl_seconds
    }

    #[must_use]
    pub fn revoke_sessions_on_reset(&self) -> bool {
        self.revoke_sessions_on_reset
    }

    #[must_use]
    pub fn reaper_interval_seconds(&self) -> u64 {
        self.reaper_interval_seconds
    }

    #[must_use]
    pub fn bootstrap(&self) -> Option<&BootstrapConfig> {
        self.bootstrap.as_ref()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_overrides() {
        let config = AuthConfig::new();
        assert_eq!(config.session_ttl_seconds(), DEFAULT_SESSION_TTL_SECONDS);
        assert_eq!(config.reset_ttl_seconds(), DEFAULT_RESET_TTL_SECONDS);
        assert!(config.revoke_sessions_on_reset());
        assert_eq!(
            config.reaper_interval_seconds(),
            DEFAULT_REAPER_INTERVAL_SECONDS
        );
        assert!(config.bootstrap().is_none());

        let config = config
            .with_session_ttl_seconds(60)
            .with_reset_ttl_seconds(120)
            .with_revoke_sessions_on_reset(false)
            .with_reaper_interval_seconds(0);

        assert_eq!(config.session_ttl_seconds(), 60);
        assert_eq!(config.reset_ttl_seconds(), 120);
        assert!(!config.revoke_sessions_on_reset());
        assert_eq!(config.reaper_interval_seconds(), 0);
    }

    #[test]
    fn bootstrap_holds_identity() {
        let bootstrap = BootstrapConfig::new(
            "example.net".to_string(),
            "admin".to_string(),
            "admin@example.net".to_string(),
        );
        assert_eq!(bootstrap.org(), "example.net");
        assert_eq!(bootstrap.admin_username(), "admin");
        assert_eq!(bootstrap.admin_email(), "admin@example.net");
        assert!(bootstrap.admin_password_hash().is_none());
    }
}
