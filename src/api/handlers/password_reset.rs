//! Self-service password reset endpoints.
//!
//! The reset id never appears in a response body; it travels out-of-band
//! through the configured notifier.

use anyhow::Context;
use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{error_response, parse_identity, valid_password_hash};
use crate::auth::error::AuthError;
use crate::auth::AuthEngine;

#[derive(ToSchema, Deserialize, Debug)]
pub struct CompleteResetRequest {
    resetid: String,
    /// PBKDF2 hash of the new password using `user@org` as the salt and
    /// count=10000.
    password: String,
}

#[utoipa::path(
    post,
    path = "/users/{user}/requestpasswordreset",
    params(
        ("user" = String, Path, description = "User identity as user@org")
    ),
    responses(
        (status = 200, description = "Reset issued; id delivered out-of-band"),
        (status = 400, description = "Malformed identity or unknown user"),
        (status = 500, description = "Store or delivery failure")
    ),
    tag = "password-reset"
)]
pub async fn request_reset(
    Path(user): Path<String>,
    engine: Extension<Arc<AuthEngine>>,
) -> Response {
    let result = async {
        let user = parse_identity(&user)?;
        let issued = engine.resets().request(&user).await?;
        engine
            .notifier()
            .deliver(&user, &issued.email, issued.reset_id)
            .context("failed to deliver reset id")?;
        Ok::<(), AuthError>(())
    }
    .await;

    match result {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => error_response(err),
    }
}

#[utoipa::path(
    post,
    path = "/users/{user}/completepasswordreset",
    params(
        ("user" = String, Path, description = "User identity as user@org")
    ),
    request_body = CompleteResetRequest,
    responses(
        (status = 200, description = "Password replaced"),
        (status = 400, description = "Malformed request or invalid reset token"),
        (status = 500, description = "Store failure")
    ),
    tag = "password-reset"
)]
pub async fn complete_reset(
    Path(user): Path<String>,
    engine: Extension<Arc<AuthEngine>>,
    payload: Option<Json<CompleteResetRequest>>,
) -> Response {
    let result = async {
        let user = parse_identity(&user)?;
        let Some(Json(request)) = payload else {
            return Err(AuthError::Validation("missing payload".to_string()));
        };

        let reset_id = Uuid::parse_str(&request.resetid)
            .map_err(|_| AuthError::Validation("resetid must be a UUID".to_string()))?;
        if !valid_password_hash(&request.password) {
            return Err(AuthError::Validation(
                "password must be a hex password digest".to_string(),
            ));
        }

        engine
            .resets()
            .complete(&user, reset_id, &request.password)
            .await
    }
    .await;

    match result {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => error_response(err),
    }
}
