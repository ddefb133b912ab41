pub mod health;
pub use self::health::health;

pub mod sessions;
pub mod users;

pub mod password_reset;

// common functions for the handlers
use axum::response::{IntoResponse, Json, Response};
use regex::Regex;
use serde_json::json;
use tracing::error;

use crate::auth::error::AuthError;
use crate::auth::identity::UserId;

/// One fixed message for every internal fault; details stay in the log.
const INTERNAL_ERROR_MESSAGE: &str = "There was an error fulfilling your request";

pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").map_or(false, |re| re.is_match(email))
}

/// Client-submitted password hashes are hex digests; 40-128 characters
/// covers every PBKDF2 digest length in the wild.
pub fn valid_password_hash(password: &str) -> bool {
    Regex::new(r"^[0-9a-fA-F]{40,128}$").map_or(false, |re| re.is_match(password))
}

/// Parse a `user@org` path segment, surfacing parse failures as 400s.
pub fn parse_identity(raw: &str) -> Result<UserId, AuthError> {
    raw.parse()
}

/// Map a domain error onto its response using the default status table.
/// Handlers that need a per-endpoint override (session open) adjust the
/// status before calling [`error_body`] themselves.
pub fn error_response(err: AuthError) -> Response {
    let status = err.status();
    (status, error_body(&err)).into_response()
}

pub fn error_body(err: &AuthError) -> Json<serde_json::Value> {
    if let AuthError::Internal(fault) = err {
        error!("internal error: {fault:?}");
        return Json(json!({ "message": INTERNAL_ERROR_MESSAGE }));
    }
    Json(json!({ "message": err.to_string() }))
}
