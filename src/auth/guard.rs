//! Identity and ownership checks shared by the HTTP surface.

use crate::auth::error::AuthError;
use crate::auth::identity::UserId;
use crate::auth::session::SessionManager;
use crate::auth::store::SessionRecord;

#[derive(Clone)]
pub struct AuthorizationGuard {
    sessions: SessionManager,
}

impl AuthorizationGuard {
    #[must_use]
    pub fn new(sessions: SessionManager) -> Self {
        Self { sessions }
    }

    /// Validate `key` and require its session to belong to `target`.
    pub async fn authorize_self_access(
        &self,
        key: &str,
        target: &UserId,
    ) -> Result<SessionRecord, AuthError> {
        let session = self.sessions.validate(key).await?;
        if &session.owner != target {
            return Err(AuthError::Forbidden);
        }
        Ok(session)
    }

    /// Require proof that the caller owns `parent` before a child user may
    /// be created under it. No key at all is an authentication failure, a
    /// key belonging to someone else is an authorization failure.
    pub async fn authorize_parentage(
        &self,
        parent: &UserId,
        key: Option<&str>,
    ) -> Result<SessionRecord, AuthError> {
        let Some(key) = key else {
            return Err(AuthError::MissingKey);
        };
        let session = self.sessions.validate(key).await?;
        if &session.owner != parent {
            return Err(AuthError::Forbidden);
        }
        Ok(session)
    }
}
