//! Domain error taxonomy and its HTTP status mapping.
//!
//! Every fallible core operation returns [`AuthError`]. The default mapping
//! below is the binding contract for the HTTP boundary; the one documented
//! exception is session open, where `UnknownUser` surfaces as 404 instead of
//! 400 (the handler applies that override explicitly).
//!
//! | error | status |
//! |---|---|
//! | `Validation`, `UnknownUser`, `InvalidCredential`, `InvalidRequest`, `UserExists`, `OrgClosed` | 400 |
//! | `KeyInvalid`, `KeyExpired`, `MissingKey` | 401 |
//! | `Forbidden` | 403 |
//! | `NotFound` | 404 |
//! | `Internal` | 500 |
//!
//! Wrong-password and unknown-user outcomes are deliberately collapsed into
//! coarse variants so responses never reveal which field was wrong beyond the
//! documented status codes.

use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Missing or malformed request parameter.
    #[error("{0}")]
    Validation(String),

    /// The referenced user does not exist.
    #[error("invalid user")]
    UnknownUser,

    /// Credential verification failed (wrong or absent password).
    #[error("password authentication failed")]
    InvalidCredential,

    /// Reset token absent, already consumed, or expired. One message for all
    /// three so callers cannot probe token state.
    #[error("invalid reset request")]
    InvalidRequest,

    /// A user with the requested identity already exists.
    #[error("user already exists")]
    UserExists,

    /// Organization is closed for registrations or does not exist.
    #[error("organization is closed for registrations or does not exist")]
    OrgClosed,

    /// No session carries the presented key.
    #[error("invalid session key")]
    KeyInvalid,

    /// The session behind the presented key outlived its TTL.
    #[error("session key has expired")]
    KeyExpired,

    /// The operation requires a session key and none was presented.
    #[error("session key required")]
    MissingKey,

    /// Valid identity, insufficient rights.
    #[error("forbidden")]
    Forbidden,

    /// Referenced resource is absent.
    #[error("not found")]
    NotFound,

    /// Store inconsistency or unexpected fault.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    /// Default HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_)
            | Self::UnknownUser
            | Self::InvalidCredential
            | Self::InvalidRequest
            | Self::UserExists
            | Self::OrgClosed => StatusCode::BAD_REQUEST,
            Self::KeyInvalid | Self::KeyExpired | Self::MissingKey => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
