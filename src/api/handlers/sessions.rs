//! Session endpoints: open, list, inspect, delete.

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use super::{error_body, error_response, parse_identity, valid_password_hash};
use crate::auth::error::AuthError;
use crate::auth::identity::SessionSelector;
use crate::auth::store::SessionRecord;
use crate::auth::AuthEngine;

#[derive(Deserialize, Debug)]
pub struct KeyQuery {
    key: Option<String>,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct OpenSessionRequest {
    /// PBKDF2 hash of the user's password using `user@org` as the salt and
    /// count=10000.
    password: String,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct SessionCreatedResponse {
    pub id: String,
    pub key: String,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct SessionSummary {
    pub sessionid: String,
    pub startdate: i64,
    pub lastupdate: i64,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct SessionDetail {
    pub username: String,
    pub org: String,
    pub sessionid: String,
    pub startdate: i64,
    pub lastupdate: i64,
}

impl From<&SessionRecord> for SessionSummary {
    fn from(record: &SessionRecord) -> Self {
        Self {
            sessionid: record.session_id.to_string(),
            startdate: record.startdate,
            lastupdate: record.lastupdate,
        }
    }
}

impl From<&SessionRecord> for SessionDetail {
    fn from(record: &SessionRecord) -> Self {
        Self {
            username: record.owner.username.clone(),
            org: record.owner.org.clone(),
            sessionid: record.session_id.to_string(),
            startdate: record.startdate,
            lastupdate: record.lastupdate,
        }
    }
}

fn require_key(params: KeyQuery) -> Result<String, AuthError> {
    params
        .key
        .ok_or_else(|| AuthError::Validation("missing required parameter: key".to_string()))
}

#[utoipa::path(
    get,
    path = "/sessions/{user}",
    params(
        ("user" = String, Path, description = "User identity as user@org"),
        ("key" = String, Query, description = "Session key of the requesting user")
    ),
    responses(
        (status = 200, description = "Live sessions owned by the user", body = [SessionSummary]),
        (status = 400, description = "Malformed identity or missing key"),
        (status = 401, description = "Invalid or expired session key"),
        (status = 403, description = "Key belongs to a different user")
    ),
    tag = "sessions"
)]
pub async fn list_sessions(
    Path(user): Path<String>,
    Query(params): Query<KeyQuery>,
    engine: Extension<Arc<AuthEngine>>,
) -> Response {
    let result = async {
        let user = parse_identity(&user)?;
        let key = require_key(params)?;
        engine.guard().authorize_self_access(&key, &user).await?;
        engine.sessions().list_for(&user).await
    }
    .await;

    match result {
        Ok(sessions) => {
            let summaries: Vec<SessionSummary> = sessions.iter().map(Into::into).collect();
            (StatusCode::OK, Json(summaries)).into_response()
        }
        Err(err) => error_response(err),
    }
}

#[utoipa::path(
    post,
    path = "/sessions/{user}",
    params(
        ("user" = String, Path, description = "User identity as user@org")
    ),
    request_body = OpenSessionRequest,
    responses(
        (status = 200, description = "Session opened", body = SessionCreatedResponse),
        (status = 400, description = "Malformed request or failed authentication"),
        (status = 404, description = "Unknown user")
    ),
    tag = "sessions"
)]
pub async fn open_session(
    Path(user): Path<String>,
    engine: Extension<Arc<AuthEngine>>,
    payload: Option<Json<OpenSessionRequest>>,
) -> Response {
    let result = async {
        let user = parse_identity(&user)?;
        let Some(Json(request)) = payload else {
            return Err(AuthError::Validation(
                "missing required parameter: password".to_string(),
            ));
        };
        if !valid_password_hash(&request.password) {
            return Err(AuthError::Validation(
                "password must be a hex password digest".to_string(),
            ));
        }
        engine.sessions().open(&user, &request.password).await
    }
    .await;

    match result {
        Ok(created) => (
            StatusCode::OK,
            Json(SessionCreatedResponse {
                id: created.session.session_id.to_string(),
                key: created.key,
            }),
        )
            .into_response(),
        // Endpoint override: opening a session for a nonexistent user is the
        // one place UnknownUser surfaces as 404 rather than 400.
        Err(err @ AuthError::UnknownUser) => {
            (StatusCode::NOT_FOUND, error_body(&err)).into_response()
        }
        Err(err) => error_response(err),
    }
}

#[utoipa::path(
    get,
    path = "/sessions/{user}/{session}",
    params(
        ("user" = String, Path, description = "User identity as user@org"),
        ("session" = String, Path, description = "Session id or the literal `current`"),
        ("key" = String, Query, description = "Session key of the requesting user")
    ),
    responses(
        (status = 200, description = "Session detail", body = SessionDetail),
        (status = 400, description = "Malformed identity, selector, or missing key"),
        (status = 401, description = "Invalid or expired session key"),
        (status = 403, description = "Session owned by a different user"),
        (status = 404, description = "No such session"),
        (status = 500, description = "Store inconsistency")
    ),
    tag = "sessions"
)]
pub async fn get_session(
    Path((user, selector)): Path<(String, String)>,
    Query(params): Query<KeyQuery>,
    engine: Extension<Arc<AuthEngine>>,
) -> Response {
    let result = async {
        let user = parse_identity(&user)?;
        let selector: SessionSelector = selector.parse()?;
        let key = require_key(params)?;
        let requester = engine.guard().authorize_self_access(&key, &user).await?;
        engine.sessions().get(&requester, selector).await
    }
    .await;

    match result {
        Ok(record) => (StatusCode::OK, Json(SessionDetail::from(&record))).into_response(),
        Err(err) => error_response(err),
    }
}

#[utoipa::path(
    delete,
    path = "/sessions/{user}/{session}",
    params(
        ("user" = String, Path, description = "User identity as user@org"),
        ("session" = String, Path, description = "Session id or the literal `current`"),
        ("key" = String, Query, description = "Session key of the requesting user")
    ),
    responses(
        (status = 200, description = "Session removed, or was already absent"),
        (status = 400, description = "Malformed identity, selector, or missing key"),
        (status = 401, description = "Invalid or expired session key"),
        (status = 403, description = "Session owned by a different user"),
        (status = 500, description = "Store inconsistency")
    ),
    tag = "sessions"
)]
pub async fn delete_session(
    Path((user, selector)): Path<(String, String)>,
    Query(params): Query<KeyQuery>,
    engine: Extension<Arc<AuthEngine>>,
) -> Response {
    let result = async {
        let user = parse_identity(&user)?;
        let selector: SessionSelector = selector.parse()?;
        let key = require_key(params)?;
        let requester = engine.guard().authorize_self_access(&key, &user).await?;
        engine.sessions().delete(&requester, selector).await
    }
    .await;

    match result {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => error_response(err),
    }
}
