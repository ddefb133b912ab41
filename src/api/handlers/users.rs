//! User provisioning and lookup endpoints.

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use super::{error_response, parse_identity, valid_email, valid_password_hash};
use crate::auth::directory::NewUser;
use crate::auth::error::AuthError;
use crate::auth::identity::UserId;
use crate::auth::AuthEngine;

#[derive(ToSchema, Deserialize, Debug)]
pub struct CreateUserRequest {
    username: String,
    org: String,
    email: String,
    /// Parent user in the form `user@org`. When set, `key` must carry a live
    /// session key owned by that parent.
    parentuser: Option<String>,
    key: Option<String>,
    /// Optional initial credential: a PBKDF2 hash of the user's password
    /// using `user@org` as the salt and count=10000.
    password: Option<String>,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct UserResponse {
    pub username: String,
    pub org: String,
    pub parentuser: Option<String>,
    pub createdate: i64,
}

fn parse_request(request: CreateUserRequest) -> Result<(NewUser, Option<String>), AuthError> {
    let id = parse_identity(&format!("{}@{}", request.username, request.org))?;

    if !valid_email(&request.email) {
        return Err(AuthError::Validation(format!(
            "invalid email address {:?}",
            request.email
        )));
    }

    let parent = request
        .parentuser
        .as_deref()
        .map(parse_identity)
        .transpose()?;

    if let Some(password) = &request.password {
        if !valid_password_hash(password) {
            return Err(AuthError::Validation(
                "password must be a hex password digest".to_string(),
            ));
        }
    }

    Ok((
        NewUser {
            id,
            email: request.email,
            parent,
            password_hash: request.password,
        },
        request.key,
    ))
}

#[utoipa::path(
    post,
    path = "/users",
    request_body = CreateUserRequest,
    responses(
        (status = 200, description = "User created"),
        (status = 400, description = "Malformed request, duplicate user, or closed org"),
        (status = 401, description = "Parent declared but key missing or invalid"),
        (status = 403, description = "Key does not belong to the declared parent"),
        (status = 500, description = "Store failure")
    ),
    tag = "users"
)]
pub async fn create_user(
    engine: Extension<Arc<AuthEngine>>,
    payload: Option<Json<CreateUserRequest>>,
) -> Response {
    let result = async {
        let Some(Json(request)) = payload else {
            return Err(AuthError::Validation("missing payload".to_string()));
        };
        let (new_user, key) = parse_request(request)?;
        engine.directory().provision(new_user, key.as_deref()).await
    }
    .await;

    match result {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => error_response(err),
    }
}

#[utoipa::path(
    get,
    path = "/users/{user}",
    params(
        ("user" = String, Path, description = "User identity as user@org")
    ),
    responses(
        (status = 200, description = "User record", body = UserResponse),
        (status = 400, description = "Malformed identity"),
        (status = 404, description = "No such user"),
        (status = 500, description = "Store failure")
    ),
    tag = "users"
)]
pub async fn get_user(
    Path(user): Path<String>,
    engine: Extension<Arc<AuthEngine>>,
) -> Response {
    let result = async {
        let user: UserId = parse_identity(&user)?;
        engine.directory().get(&user).await
    }
    .await;

    match result {
        Ok(record) => (
            StatusCode::OK,
            Json(UserResponse {
                username: record.id.username,
                org: record.id.org,
                parentuser: record.parent.map(|p| p.to_string()),
                createdate: record.createdate,
            }),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(parent: Option<&str>, password: Option<&str>) -> CreateUserRequest {
        CreateUserRequest {
            username: "alice".to_string(),
            org: "org1".to_string(),
            email: "alice@mail.test".to_string(),
            parentuser: parent.map(str::to_string),
            key: None,
            password: password.map(str::to_string),
        }
    }

    #[test]
    fn parse_request_accepts_plain_user() {
        let (new_user, key) = parse_request(request(None, None)).expect("parse");
        assert_eq!(new_user.id, UserId::new("alice", "org1"));
        assert!(new_user.parent.is_none());
        assert!(new_user.password_hash.is_none());
        assert!(key.is_none());
    }

    #[test]
    fn parse_request_resolves_parent_identity() {
        let (new_user, _key) =
            parse_request(request(Some("root@org1"), None)).expect("parse");
        assert_eq!(new_user.parent, Some(UserId::new("root", "org1")));
    }

    #[test]
    fn parse_request_rejects_bad_fields() {
        let mut bad_email = request(None, None);
        bad_email.email = "not-an-email".to_string();
        assert!(parse_request(bad_email).is_err());

        assert!(parse_request(request(Some("not-qualified"), None)).is_err());
        assert!(parse_request(request(None, Some("shorthex"))).is_err());
    }
}
